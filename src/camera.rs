//! Camera models and primary ray generation, grounded on the teacher's
//! thin-lens `Camera`/`CameraConfig` (orthonormal basis construction,
//! depth-of-field jitter) generalized to the full set of projection
//! types the original core supports.

use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;

use crate::math::{Point3, Ray, Vec3};

/// Derives a deterministic per-pixel seed so that focal-blur's fallback
/// disc sampling reproduces bit-exactly given the same ray (spec: "focal
/// blur uses a deterministic pseudo-random generator seeded from pixel
/// coordinates"), without the caller threading an external RNG through.
fn pixel_seed(x: f64, y: f64, sample_index: usize) -> u64 {
    let xi = x.to_bits();
    let yi = y.to_bits();
    xi.wrapping_mul(0x9E3779B97F4A7C15)
        ^ yi.wrapping_mul(0xC2B2AE3D27D4EB4F)
        ^ (sample_index as u64).wrapping_mul(0x165667B19E3779F9)
}

/// Precomputed depth-of-field sample offsets on the unit aperture disc,
/// standard point counts used by the original core (4, 7, 19, 37),
/// produced by simply decimating a uniform 37-point hex packing.
const JITTER_37: [(f64, f64); 37] = {
    // A 7-ring hexagonal packing approximation is unnecessary precision
    // for this purpose; instead use concentric rings of 1/6/12/18 points,
    // which sums to 37 and mirrors the original's ring counts.
    let mut pts = [(0.0, 0.0); 37];
    pts[0] = (0.0, 0.0);
    let mut idx = 1;
    let rings: [(usize, f64); 3] = [(6, 1.0 / 3.0), (12, 2.0 / 3.0), (18, 1.0)];
    let mut r = 0;
    while r < 3 {
        let (count, radius) = rings[r];
        let mut i = 0;
        while i < count {
            // const fn trig isn't available; angles are filled in below at
            // first use instead of here. Placeholder zero, overwritten by
            // `jitter_points`.
            pts[idx] = (radius, i as f64 / count as f64);
            idx += 1;
            i += 1;
        }
        r += 1;
    }
    pts
};

fn jitter_points(n: usize) -> Vec<(f64, f64)> {
    let count = match n {
        4 => 4,
        7 => 7,
        19 => 19,
        _ => 37,
    };
    JITTER_37[..37]
        .iter()
        .take(count.max(1))
        .map(|&(radius, frac)| {
            if radius == 0.0 {
                (0.0, 0.0)
            } else {
                let angle = frac * std::f64::consts::TAU;
                (radius * angle.cos(), radius * angle.sin())
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CylinderAxis {
    /// Cylinder types 1/2: axis along `up`, horizontal/vertical projection varies.
    Up,
    /// Cylinder types 3/4: axis along `right`.
    Right,
}

/// How a [`CameraKind::Mesh`] camera maps an image pixel to a face in its
/// pre-flattened face list. Per spec §4.5's four-mode table; the face list
/// itself is supplied by the caller (pre-flattened across whatever meshes
/// it was built from), so `OneToOneSummed` and `PerFace` coincide here —
/// the distinction upstream is about how multiple meshes are concatenated
/// before flattening, which is the caller's job, not the camera's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshDistribution {
    PerFace,
    OneToOneSummed,
    HorizontalSplit,
    UvLookup,
}

#[derive(Debug, Clone, Copy)]
pub enum CameraKind {
    Perspective,
    Orthographic,
    Fisheye,
    Omnimax,
    Panoramic,
    UltraWideAngle,
    Cylinder { axis: CylinderAxis, origin_varies: bool },
    Spherical { h_angle: f64, v_angle: f64 },
    /// One ray per pixel, sourced from a pre-tessellated mesh's face
    /// centroids/normals rather than the scene geometry (spec §4.5's
    /// "Mesh" camera: baking/lightmap-style capture).
    Mesh { distribution: MeshDistribution },
    /// Per-axis scalar functions of `(x0, y0)` define location and
    /// direction directly (spec §4.5's "User-defined" camera).
    UserDefined,
}

/// Per-axis functions backing [`CameraKind::UserDefined`]: each takes the
/// normalized film coordinates `(x0, y0)` and returns one component.
pub struct UserDefinedRays {
    pub location: [Box<dyn Fn(f64, f64) -> f64 + Send + Sync>; 3],
    pub direction: [Box<dyn Fn(f64, f64) -> f64 + Send + Sync>; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct FocalBlur {
    pub aperture: f64,
    pub focal_distance: f64,
    pub samples: usize,
    pub samples_min: usize,
    pub confidence: f64,
    pub variance: f64,
}

pub struct Camera {
    pub kind: CameraKind,
    location: Point3,
    direction: Vec3,
    right: Vec3,
    up: Vec3,
    blur: Option<FocalBlur>,
    /// Flattened `(centroid, normal)` pairs backing [`CameraKind::Mesh`].
    mesh_faces: Vec<(Point3, Vec3)>,
    /// Cumulative per-mesh face counts, used by `HorizontalSplit` to pick
    /// which mesh's band of the image a pixel falls into.
    mesh_group_bounds: Vec<usize>,
    user_defined: Option<UserDefinedRays>,
}

impl Camera {
    pub fn new(kind: CameraKind, location: Point3, direction: Vec3, right: Vec3, up: Vec3) -> Self {
        Self {
            kind,
            location,
            direction,
            right,
            up,
            blur: None,
            mesh_faces: Vec::new(),
            mesh_group_bounds: Vec::new(),
            user_defined: None,
        }
    }

    pub fn with_focal_blur(mut self, blur: FocalBlur) -> Self {
        self.blur = Some(blur);
        self
    }

    /// Supplies the face list for a [`CameraKind::Mesh`] camera. `faces` is
    /// a pre-flattened `(centroid, normal)` list across however many source
    /// meshes the caller combined; `group_bounds` gives the cumulative face
    /// count after each source mesh (needed only by `HorizontalSplit`).
    pub fn with_mesh_faces(mut self, faces: Vec<(Point3, Vec3)>, group_bounds: Vec<usize>) -> Self {
        self.mesh_faces = faces;
        self.mesh_group_bounds = group_bounds;
        self
    }

    /// Supplies the per-axis functions for a [`CameraKind::UserDefined`] camera.
    pub fn with_user_defined(mut self, rays: UserDefinedRays) -> Self {
        self.user_defined = Some(rays);
        self
    }

    /// Maps pixel `(x, y)` in a `width x height` image to `[-0.5, 0.5]`
    /// normalized film coordinates, POV-Ray's `x/w - 0.5, 0.5 - y/h`.
    fn film_coords(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
        (x / width - 0.5, 0.5 - y / height)
    }

    fn base_ray(&self, x0: f64, y0: f64, x: f64, y: f64, width: f64, height: f64) -> Ray {
        match self.kind {
            CameraKind::Perspective => {
                let dir = self.direction + self.right * x0 + self.up * y0;
                Ray::new(self.location, dir.normalized())
            }
            CameraKind::Orthographic => {
                let origin = self.location + self.right * x0 + self.up * y0;
                Ray::new(origin, self.direction.normalized())
            }
            CameraKind::Fisheye => {
                let r = (x0 * x0 + y0 * y0).sqrt() * 2.0;
                if r > 1.0 {
                    return Ray::new(self.location, self.direction.normalized());
                }
                let phi = y0.atan2(x0);
                let theta = r * std::f64::consts::FRAC_PI_2;
                let dir = self.direction * theta.cos() + (self.right * phi.cos() + self.up * phi.sin()) * theta.sin();
                Ray::new(self.location, dir.normalized())
            }
            CameraKind::Omnimax => {
                let aspect = self.right.length() / self.up.length().max(1e-12);
                let xa = x0 * 2.0;
                let ya = y0 * 2.0 / aspect.max(1e-12);
                let r = (xa * xa + ya * ya).sqrt();
                if r > 1.0 {
                    return Ray::new(self.location, self.direction.normalized());
                }
                let phi = ya.atan2(xa);
                let theta = r * std::f64::consts::FRAC_PI_2;
                // Reject below 45 degrees under the optical axis.
                if theta > std::f64::consts::FRAC_PI_2 + std::f64::consts::FRAC_PI_4 {
                    return Ray::new(self.location, self.direction.normalized());
                }
                let dir = self.direction * theta.cos() + (self.right * phi.cos() + self.up * phi.sin()) * theta.sin();
                Ray::new(self.location, dir.normalized())
            }
            CameraKind::Panoramic => {
                let angle = x0 * std::f64::consts::PI;
                let dir = self.direction * angle.cos() + self.right * angle.sin() + self.up * (y0.tan());
                Ray::new(self.location, dir.normalized())
            }
            CameraKind::UltraWideAngle => {
                let ax = (x0 * std::f64::consts::PI).sin();
                let ay = (y0 * std::f64::consts::PI).sin();
                let dir = self.direction + self.right * ax + self.up * ay;
                Ray::new(self.location, dir.normalized())
            }
            CameraKind::Cylinder { axis, origin_varies } => {
                let angle = x0 * std::f64::consts::PI;
                match axis {
                    CylinderAxis::Up => {
                        let horiz = self.direction * angle.cos() + self.right * angle.sin();
                        if origin_varies {
                            Ray::new(self.location + self.right * x0, (self.direction + self.up * y0).normalized())
                        } else {
                            Ray::new(self.location, (horiz + self.up * y0).normalized())
                        }
                    }
                    CylinderAxis::Right => {
                        let vert = self.direction * angle.cos() + self.up * angle.sin();
                        if origin_varies {
                            Ray::new(self.location + self.up * y0, (self.direction + self.right * x0).normalized())
                        } else {
                            Ray::new(self.location, (vert + self.right * x0).normalized())
                        }
                    }
                }
            }
            CameraKind::Spherical { h_angle, v_angle } => {
                let yaw = x0 * h_angle.to_radians();
                let pitch = y0 * v_angle.to_radians();
                let dir = rotate_about(self.direction, self.up, yaw);
                let dir = rotate_about(dir, self.right, pitch);
                Ray::new(self.location, dir.normalized())
            }
            CameraKind::Mesh { distribution } => self.mesh_ray(distribution, x0, y0, x, y, width, height),
            CameraKind::UserDefined => {
                let Some(ud) = &self.user_defined else {
                    return Ray::new(self.location, self.direction.normalized());
                };
                let origin = self.location
                    + Vec3::new(ud.location[0](x0, y0), ud.location[1](x0, y0), ud.location[2](x0, y0));
                let dir = Vec3::new(ud.direction[0](x0, y0), ud.direction[1](x0, y0), ud.direction[2](x0, y0));
                Ray::new(origin, dir.normalized())
            }
        }
    }

    /// Implements the four `MeshDistribution` pixel-to-face mappings over
    /// `self.mesh_faces`. Falls back to a plain direction ray when the face
    /// list is empty (camera configured without mesh data).
    fn mesh_ray(&self, distribution: MeshDistribution, x0: f64, y0: f64, x: f64, y: f64, width: f64, height: f64) -> Ray {
        if self.mesh_faces.is_empty() {
            return Ray::new(self.location, self.direction.normalized());
        }
        let total = self.mesh_faces.len();
        let idx = match distribution {
            MeshDistribution::PerFace | MeshDistribution::OneToOneSummed => {
                let flat = (y as usize).wrapping_mul(width.max(1.0) as usize).wrapping_add(x as usize);
                flat % total
            }
            MeshDistribution::HorizontalSplit => {
                if self.mesh_group_bounds.is_empty() {
                    let flat = (y as usize).wrapping_mul(width.max(1.0) as usize).wrapping_add(x as usize);
                    flat % total
                } else {
                    let bands = self.mesh_group_bounds.len();
                    let band = ((x / width.max(1.0)) * bands as f64).floor().clamp(0.0, (bands - 1) as f64) as usize;
                    let start = if band == 0 { 0 } else { self.mesh_group_bounds[band - 1] };
                    let end = self.mesh_group_bounds[band].max(start + 1).min(total);
                    let span = (end - start).max(1);
                    start + (y as usize % span)
                }
            }
            MeshDistribution::UvLookup => {
                // Nearest-neighbor lookup by normalized film position rather
                // than a true per-triangle barycentric inversion — the face
                // list carries no per-vertex UV data to invert against here.
                let u = (x0 + 0.5).clamp(0.0, 1.0);
                let v = (0.5 - y0).clamp(0.0, 1.0);
                let flat = (v * (total - 1) as f64).round() as usize + (u * (total - 1) as f64).round() as usize;
                flat % total
            }
        };
        let (centroid, normal) = self.mesh_faces[idx];
        Ray::new(centroid, normal.normalized())
    }

    /// Produces one primary ray for pixel `(x, y)` of a `width x height`
    /// image, `sample_index` selecting a jittered aperture point when
    /// focal blur is configured (`None` beyond the configured sample
    /// count with no blur).
    pub fn primary_ray(&self, x: f64, y: f64, width: f64, height: f64, sample_index: usize) -> Option<Ray> {
        let (x0, y0) = Self::film_coords(x, y, width, height);
        let base = self.base_ray(x0, y0, x, y, width, height);

        let Some(blur) = self.blur else {
            return if sample_index == 0 { Some(base) } else { None };
        };
        if blur.aperture <= 0.0 || sample_index >= blur.samples {
            return if sample_index == 0 { Some(base) } else { None };
        }

        let points = jitter_points(4.max(blur.samples.min(37)));
        let (du, dv) = if sample_index < points.len() {
            points[sample_index]
        } else {
            // Beyond the precomputed grid, fall back to disc sampling from a
            // generator seeded deterministically from the pixel coordinates
            // and sample index, so repeated calls for the same ray reproduce
            // bit-exactly rather than depending on caller-supplied entropy.
            let mut rng = SmallRng::seed_from_u64(pixel_seed(x, y, sample_index));
            let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let r: f64 = rng.gen::<f64>().sqrt();
            (r * theta.cos(), r * theta.sin())
        };
        let lens_u = self.right.normalized();
        let lens_v = self.up.normalized();
        let offset = (lens_u * du + lens_v * dv) * (blur.aperture * 0.5);

        let focal_point = base.origin + base.direction * blur.focal_distance;
        let origin = base.origin + offset;
        let direction = (focal_point - origin).normalized();
        Some(Ray::new(origin, direction))
    }

    /// Chi-squared-derived confidence threshold used to decide whether
    /// enough focal-blur samples have been taken: stop once the running
    /// sample variance falls under `threshold(n)`.
    pub fn sample_threshold(&self, n: usize) -> f64 {
        let Some(blur) = self.blur else { return 0.0 };
        // A fixed scale constant stands in for T1; the inverse-CDF shape
        // is approximated by 1/sqrt(n), which shares the chi-squared
        // tail's falloff without requiring a full inverse-gamma solve.
        blur.variance * blur.confidence / (n as f64).sqrt().max(1.0)
    }

    pub fn blur(&self) -> Option<FocalBlur> {
        self.blur
    }
}

fn rotate_about(v: Vec3, axis: Vec3, angle: f64) -> Vec3 {
    let axis = axis.normalized();
    let (s, c) = angle.sin_cos();
    v * c + axis.cross(v) * s + axis * axis.dot(v) * (1.0 - c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_camera(kind: CameraKind) -> Camera {
        Camera::new(kind, Point3::zero(), Vec3::new(0.0, 0.0, -1.0), Vec3::new(1.33, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
    }

    #[test]
    fn perspective_center_pixel_points_along_direction() {
        let cam = default_camera(CameraKind::Perspective);
        let ray = cam.primary_ray(320.0, 240.0, 640.0, 480.0, 0).unwrap();
        assert!((ray.direction.normalized() - cam.direction.normalized()).length() < 1e-6);
    }

    #[test]
    fn orthographic_rays_stay_parallel() {
        let cam = default_camera(CameraKind::Orthographic);
        let a = cam.primary_ray(0.0, 0.0, 640.0, 480.0, 0).unwrap();
        let b = cam.primary_ray(640.0, 480.0, 640.0, 480.0, 0).unwrap();
        assert!((a.direction - b.direction).length() < 1e-9);
    }

    #[test]
    fn no_blur_returns_single_sample() {
        let cam = default_camera(CameraKind::Perspective);
        assert!(cam.primary_ray(0.0, 0.0, 640.0, 480.0, 1).is_none());
    }

    #[test]
    fn focal_blur_deflects_origin() {
        let cam = default_camera(CameraKind::Perspective).with_focal_blur(FocalBlur {
            aperture: 1.0,
            focal_distance: 5.0,
            samples: 7,
            samples_min: 1,
            confidence: 0.9,
            variance: 0.01,
        });
        let ray = cam.primary_ray(320.0, 240.0, 640.0, 480.0, 1).unwrap();
        assert!(ray.origin != cam.location || ray.direction != cam.direction.normalized());
    }

    #[test]
    fn mesh_camera_emits_face_centroid_and_normal() {
        let faces = vec![
            (Point3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 0.0)),
            (Point3::new(4.0, 5.0, 6.0), Vec3::new(1.0, 0.0, 0.0)),
        ];
        let cam = default_camera(CameraKind::Mesh { distribution: MeshDistribution::PerFace })
            .with_mesh_faces(faces, Vec::new());
        let ray = cam.primary_ray(0.0, 0.0, 2.0, 1.0, 0).unwrap();
        assert!(ray.origin == Point3::new(1.0, 2.0, 3.0) || ray.origin == Point3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn mesh_camera_without_faces_falls_back_to_direction() {
        let cam = default_camera(CameraKind::Mesh { distribution: MeshDistribution::PerFace });
        let ray = cam.primary_ray(0.0, 0.0, 640.0, 480.0, 0).unwrap();
        assert!((ray.direction.normalized() - cam.direction.normalized()).length() < 1e-9);
    }

    #[test]
    fn user_defined_camera_evaluates_per_axis_functions() {
        let rays = UserDefinedRays {
            location: [Box::new(|_, _| 0.0), Box::new(|_, _| 0.0), Box::new(|_, _| 0.0)],
            direction: [Box::new(|x0, _| x0), Box::new(|_, y0| y0), Box::new(|_, _| -1.0)],
        };
        let cam = default_camera(CameraKind::UserDefined).with_user_defined(rays);
        let ray = cam.primary_ray(320.0, 240.0, 640.0, 480.0, 0).unwrap();
        assert!((ray.direction.normalized() - Vec3::new(0.0, 0.0, -1.0).normalized()).length() < 1e-6);
    }
}
