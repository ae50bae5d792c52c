use super::vec3::{Point3, Vec3};
use std::ops::Mul;

/// A row-major 4x4 matrix used for affine transforms of points, vectors
/// and normals. Only `Transform` (which pairs a matrix with its inverse)
/// is exposed outside this module — primitives never invert a `Mat4`
/// themselves, since that is the expensive, error-prone part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub m: [[f64; 4]; 4],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(t: Vec3) -> Self {
        let mut r = Self::IDENTITY;
        r.m[0][3] = t.x;
        r.m[1][3] = t.y;
        r.m[2][3] = t.z;
        r
    }

    pub fn scaling(s: Vec3) -> Self {
        let mut r = Self::IDENTITY;
        r.m[0][0] = s.x;
        r.m[1][1] = s.y;
        r.m[2][2] = s.z;
        r
    }

    /// Rotation by `degrees` about a unit `axis`, via Rodrigues' formula.
    pub fn rotation(axis: Vec3, degrees: f64) -> Self {
        let axis = axis.normalized();
        let theta = degrees.to_radians();
        let (s, c) = theta.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.x, axis.y, axis.z);
        let mut r = Self::IDENTITY;
        r.m[0] = [t * x * x + c, t * x * y - s * z, t * x * z + s * y, 0.0];
        r.m[1] = [t * x * y + s * z, t * y * y + c, t * y * z - s * x, 0.0];
        r.m[2] = [t * x * z - s * y, t * y * z + s * x, t * z * z + c, 0.0];
        r.m[3] = [0.0, 0.0, 0.0, 1.0];
        r
    }

    /// Affine point transform (translation applied).
    pub fn transform_point(&self, p: Point3) -> Point3 {
        let m = &self.m;
        Point3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
        )
    }

    /// Linear-only transform (no translation) for directions.
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    /// Full general 4x4 inverse via Gauss-Jordan elimination with partial
    /// pivoting. Returns `None` for a singular matrix (zero-volume scale,
    /// degenerate basis) — callers treat this as a construction-time error.
    pub fn inverse(&self) -> Option<Mat4> {
        let mut a = self.m;
        let mut inv = Mat4::IDENTITY.m;

        for col in 0..4 {
            let mut pivot_row = col;
            let mut pivot_val = a[col][col].abs();
            for row in (col + 1)..4 {
                if a[row][col].abs() > pivot_val {
                    pivot_val = a[row][col].abs();
                    pivot_row = row;
                }
            }
            if pivot_val < 1e-14 {
                return None;
            }
            if pivot_row != col {
                a.swap(col, pivot_row);
                inv.swap(col, pivot_row);
            }

            let pivot = a[col][col];
            for j in 0..4 {
                a[col][j] /= pivot;
                inv[col][j] /= pivot;
            }

            for row in 0..4 {
                if row == col {
                    continue;
                }
                let factor = a[row][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..4 {
                    a[row][j] -= factor * a[col][j];
                    inv[row][j] -= factor * inv[col][j];
                }
            }
        }

        Some(Mat4 { m: inv })
    }

    pub fn transpose(&self) -> Mat4 {
        let m = &self.m;
        let mut r = Mat4::IDENTITY;
        for i in 0..4 {
            for j in 0..4 {
                r.m[i][j] = m[j][i];
            }
        }
        r
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut r = [[0.0; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                r[i][j] = (0..4).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Mat4 { m: r }
    }
}

/// A pair of mutually-inverse 4x4 matrices. Every transformable primitive
/// stores at most one of these: the ray is pre-transformed into the
/// primitive's local frame with `to_local`, intersection happens there,
/// and hit points/normals are transformed back with `to_world`/`normal_to_world`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    forward: Mat4,
    inverse: Mat4,
    inverse_transpose: Mat4,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            forward: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            inverse_transpose: Mat4::IDENTITY,
        }
    }

    /// Builds a transform from a forward matrix, computing (and caching)
    /// its inverse and inverse-transpose. Returns `None` if the matrix is
    /// singular — callers surface this as `SceneError::DegenerateGeometry`.
    pub fn from_forward(forward: Mat4) -> Option<Self> {
        let inverse = forward.inverse()?;
        let inverse_transpose = inverse.transpose();
        Some(Self {
            forward,
            inverse,
            inverse_transpose,
        })
    }

    pub fn translation(t: Vec3) -> Self {
        Self::from_forward(Mat4::translation(t)).expect("translation is never singular")
    }

    pub fn scaling(s: Vec3) -> Self {
        Self::from_forward(Mat4::scaling(s)).expect("scaling by zero is the caller's error")
    }

    pub fn rotation(axis: Vec3, degrees: f64) -> Self {
        Self::from_forward(Mat4::rotation(axis, degrees)).expect("rotation is never singular")
    }

    /// Composes `self` followed by `other`, i.e. the result transforms a
    /// point the way `other.transform_point(self.transform_point(p))` would,
    /// matching `transform(transform(P, self), other) == transform(P, other∘self)`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            forward: other.forward * self.forward,
            inverse: self.inverse * other.inverse,
            inverse_transpose: (self.inverse * other.inverse).transpose(),
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Point3) -> Point3 {
        self.forward.transform_point(p)
    }

    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.forward.transform_vector(v)
    }

    #[inline]
    pub fn inverse_transform_point(&self, p: Point3) -> Point3 {
        self.inverse.transform_point(p)
    }

    #[inline]
    pub fn inverse_transform_vector(&self, v: Vec3) -> Vec3 {
        self.inverse.transform_vector(v)
    }

    /// Transforms a surface normal by the inverse-transpose of the linear
    /// part, renormalizing afterward (non-uniform scale otherwise skews
    /// the normal off the surface).
    #[inline]
    pub fn transform_normal(&self, n: Vec3) -> Vec3 {
        self.inverse_transpose.transform_vector(n).normalized()
    }

    pub fn forward_matrix(&self) -> &Mat4 {
        &self.forward
    }
}
