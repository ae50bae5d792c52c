//! Scalar, vector, ray, transform, and bounding-box primitives shared by
//! every shape in the kernel.

pub mod aabb;
pub mod ray;
pub mod transform;
pub mod vec3;

pub use aabb::{ray_in_bound, BoundingBox};
pub use ray::{Ray, RayFlags};
pub use transform::{Mat4, Transform};
pub use vec3::{Point3, Vec2, Vec3};
