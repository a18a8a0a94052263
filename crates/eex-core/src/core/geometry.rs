use nalgebra::Point3;

/// Axis-aligned bounds of a simulation box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoxBounds {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Computes the tightest box enclosing all points, or `None` for an empty set.
    pub fn enclosing(points: impl IntoIterator<Item = Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| {
            (
                Point3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        });
        Some(Self { min, max })
    }

    /// Returns `(lo, hi)` for axis 0 (x), 1 (y) or 2 (z).
    pub fn axis(&self, axis: usize) -> (f64, f64) {
        (self.min[axis], self.max[axis])
    }

    pub fn lengths(&self) -> [f64; 3] {
        let d = self.max - self.min;
        [d.x, d.y, d.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_returns_none_for_no_points() {
        assert_eq!(BoxBounds::enclosing(Vec::new()), None);
    }

    #[test]
    fn enclosing_tracks_per_axis_extremes() {
        let bounds = BoxBounds::enclosing(vec![
            Point3::new(1.0, -2.0, 3.0),
            Point3::new(-1.0, 4.0, 0.5),
            Point3::new(0.0, 0.0, 9.0),
        ])
        .unwrap();
        assert_eq!(bounds.axis(0), (-1.0, 1.0));
        assert_eq!(bounds.axis(1), (-2.0, 4.0));
        assert_eq!(bounds.axis(2), (0.5, 9.0));
        assert_eq!(bounds.lengths(), [2.0, 6.0, 8.5]);
    }
}
