use glam::{Mat4, Vec4};

use crate::error::ProjectionError;

const EPSILON: f32 = 1e-6;

/// Inverse of a standard perspective projection, built from reciprocals of its
/// non-zero terms.
///
/// Accepts matrices of the shape produced by `Mat4::perspective_lh`/`_rh`
/// (column-major, column vectors):
///
/// ```text
/// | xs  0  0  0 |
/// |  0 ys  0  0 |
/// |  0  0  a  b |
/// |  0  0  s  0 |
/// ```
///
/// Anything else (off-centre or orthographic projections) is rejected instead
/// of producing a wrong inverse.
pub fn inverse_perspective(projection: &Mat4) -> Result<Mat4, ProjectionError> {
    let c = projection.to_cols_array_2d();

    let zeros: [(&'static str, f32); 10] = [
        ("m01", c[0][1]),
        ("m02", c[0][2]),
        ("m03", c[0][3]),
        ("m10", c[1][0]),
        ("m12", c[1][2]),
        ("m13", c[1][3]),
        ("m20", c[2][0]),
        ("m21", c[2][1]),
        ("m30", c[3][0]),
        ("m31", c[3][1]),
    ];
    for (name, value) in zeros {
        if value.abs() > EPSILON {
            return Err(ProjectionError::NotPerspective { name, value });
        }
    }
    if c[3][3].abs() > EPSILON {
        return Err(ProjectionError::NotPerspective { name: "m33", value: c[3][3] });
    }

    let xs = c[0][0];
    let ys = c[1][1];
    let a = c[2][2];
    let s = c[2][3];
    let b = c[3][2];

    for (name, value) in [("m00", xs), ("m11", ys), ("m23", s), ("m32", b)] {
        if value.abs() <= EPSILON {
            return Err(ProjectionError::Singular { name });
        }
    }

    Ok(Mat4::from_cols(
        Vec4::new(1.0 / xs, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0 / ys, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.0, 1.0 / b),
        Vec4::new(0.0, 0.0, 1.0 / s, -a / (s * b)),
    ))
}

/// Identifies one distinct projection matrix seen by the renderer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectionVersion(pub u64);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VersionedProjection {
    pub matrix: Mat4,
    pub version: ProjectionVersion,
}

/// Assigns a new version whenever the projection matrix changes.
#[derive(Debug, Default)]
pub struct ProjectionTracker {
    current: Option<VersionedProjection>,
}

impl ProjectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, matrix: Mat4) -> VersionedProjection {
        match self.current {
            Some(current) if current.matrix == matrix => current,
            previous => {
                let version = previous.map_or(1, |p| p.version.0 + 1);
                let next = VersionedProjection { matrix, version: ProjectionVersion(version) };
                if previous.is_some() {
                    log::debug!("projection changed; now version {version}");
                }
                self.current = Some(next);
                next
            }
        }
    }

    pub fn current(&self) -> Option<VersionedProjection> {
        self.current
    }
}
