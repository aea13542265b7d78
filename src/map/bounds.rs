//! Geographic bounding-box accumulation
//!
//! Folds layer extents into one box before fitting the viewport. Extending
//! with empty or non-finite input is always a no-op, never an error: layers
//! without coordinates simply contribute nothing.

/// Accumulated geographic bounds, invalid until the first extension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    valid: bool,
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl GeoBounds {
    /// An empty accumulator; `is_valid()` is false until something extends it.
    pub fn empty() -> Self {
        Self {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
            valid: false,
        }
    }

    /// Bounds of a single position.
    pub fn of_point(lon: f64, lat: f64) -> Self {
        let mut b = Self::empty();
        b.extend_point(lon, lat);
        b
    }

    /// Fold one position into the box. Non-finite coordinates are ignored.
    pub fn extend_point(&mut self, lon: f64, lat: f64) {
        if !lon.is_finite() || !lat.is_finite() {
            return;
        }
        self.min_lon = self.min_lon.min(lon);
        self.min_lat = self.min_lat.min(lat);
        self.max_lon = self.max_lon.max(lon);
        self.max_lat = self.max_lat.max(lat);
        self.valid = true;
    }

    /// Fold another box into this one. Invalid boxes are ignored.
    pub fn extend(&mut self, other: &GeoBounds) {
        if !other.valid {
            return;
        }
        self.extend_point(other.min_lon, other.min_lat);
        self.extend_point(other.max_lon, other.max_lat);
    }

    /// True iff at least one successful extension occurred.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Geographic center, `None` while invalid.
    pub fn center(&self) -> Option<(f64, f64)> {
        self.valid
            .then(|| ((self.min_lon + self.max_lon) / 2.0, (self.min_lat + self.max_lat) / 2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_invalid() {
        let b = GeoBounds::empty();
        assert!(!b.is_valid());
        assert!(b.center().is_none());
    }

    #[test]
    fn test_extend_point_sets_validity() {
        let mut b = GeoBounds::empty();
        b.extend_point(-5.5, 7.5);
        assert!(b.is_valid());
        assert_eq!(b.center(), Some((-5.5, 7.5)));
    }

    #[test]
    fn test_extend_with_invalid_is_noop() {
        let mut b = GeoBounds::of_point(-5.5, 7.5);
        let before = b;
        b.extend(&GeoBounds::empty());
        assert_eq!(b, before);

        // An empty box never flips validity either
        let mut empty = GeoBounds::empty();
        empty.extend(&GeoBounds::empty());
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_non_finite_points_ignored() {
        let mut b = GeoBounds::empty();
        b.extend_point(f64::NAN, 7.5);
        b.extend_point(-5.5, f64::INFINITY);
        assert!(!b.is_valid());
    }

    #[test]
    fn test_merge_two_boxes() {
        let mut b = GeoBounds::of_point(-5.5, 7.5);
        b.extend(&GeoBounds::of_point(-5.3, 7.7));
        assert_eq!(b.min_lon(), -5.5);
        assert_eq!(b.max_lon(), -5.3);
        assert_eq!(b.min_lat(), 7.5);
        assert_eq!(b.max_lat(), 7.7);
    }
}
