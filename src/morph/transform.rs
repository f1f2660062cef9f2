//! Rigid transforms applied to child patches during composition.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

/// A rotation followed by a translation: `p' = R p + T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation applied first.
    pub rotation: Rotation3<f64>,
    /// Translation applied after rotating.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Create a transform from its parts.
    pub fn new(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self { rotation, translation }
    }

    /// The transform that leaves every point in place.
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }

    /// The transform applying `self` first and `next` second.
    pub fn then(&self, next: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: next.rotation * self.rotation,
            translation: next.rotation * self.translation + next.translation,
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = self.rotation.inverse();
        RigidTransform {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Least-squares rigid fit taking `source[i]` onto `target[i]` (Kabsch).
    ///
    /// Both slices must have the same length. An empty input gives the
    /// identity; fewer than three points leave the rotation underdetermined
    /// and one of the optimal rotations is returned.
    pub fn best_fit(source: &[Point3<f64>], target: &[Point3<f64>]) -> RigidTransform {
        let n = source.len().min(target.len());
        if n == 0 {
            return RigidTransform::identity();
        }

        let source_centroid = centroid(&source[..n]);
        let target_centroid = centroid(&target[..n]);

        let mut h = Matrix3::zeros();
        for (s, t) in source.iter().zip(target).take(n) {
            h += (s.coords - source_centroid) * (t.coords - target_centroid).transpose();
        }

        let svd = h.svd(true, true);
        let rotation = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => {
                let values = svd.singular_values;
                let largest = values.imax();
                let mut sorted = [values[0], values[1], values[2]];
                sorted.sort_by(|a, b| b.total_cmp(a));

                if sorted[0] <= f64::EPSILON {
                    // All points coincide.
                    Rotation3::identity()
                } else if sorted[1] <= sorted[0] * DEGENERATE_RATIO {
                    // Collinear points only fix the line direction; take the
                    // smallest rotation that maps it.
                    let from = u.column(largest).into_owned();
                    let to = v_t.row(largest).transpose();
                    smallest_rotation(&from, &to)
                } else {
                    let mut r = v_t.transpose() * u.transpose();
                    if r.determinant() < 0.0 {
                        let smallest = values.imin();
                        let mut v_t = v_t;
                        let flipped = -v_t.row(smallest);
                        v_t.set_row(smallest, &flipped);
                        r = v_t.transpose() * u.transpose();
                    }
                    Rotation3::from_matrix_unchecked(r)
                }
            }
            _ => Rotation3::identity(),
        };

        RigidTransform {
            rotation,
            translation: target_centroid - rotation * source_centroid,
        }
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.rotation.matrix().iter().all(|x| x.is_finite()) && self.translation.iter().all(|x| x.is_finite())
    }
}

/// Ratio between singular values below which a point set counts as collinear.
const DEGENERATE_RATIO: f64 = 1e-9;

fn smallest_rotation(from: &Vector3<f64>, to: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::rotation_between(from, to).unwrap_or_else(|| {
        // Opposite directions: half turn about any perpendicular axis.
        let helper = if from.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        Rotation3::from_axis_angle(&Unit::new_normalize(from.cross(&helper)), PI)
    })
}

/// Mean of a non-empty point set, as a vector.
pub(crate) fn centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / points.len() as f64
}
