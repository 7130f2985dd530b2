use serde::{Deserialize, Serialize};

/// Errors constructing a [`BBox`] from untrusted coordinate lists.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BBoxError {
    #[error("bbox requires 4 coordinates, got {0}")]
    WrongArity(usize),
    #[error("bbox coordinate {0} is NaN or infinite")]
    NonFinite(usize),
}

/// An axis-aligned box `[x1, y1, x2, y2]`.
///
/// Construction normalizes its input: inverted corners are sorted so that
/// `x1 <= x2` and `y1 <= y2`, and negative coordinates clamp to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (x1, x2) = if x1 > x2 { (x2, x1) } else { (x1, x2) };
        let (y1, y2) = if y1 > y2 { (y2, y1) } else { (y1, y2) };
        Self {
            x1: x1.max(0.0),
            y1: y1.max(0.0),
            x2: x2.max(0.0),
            y2: y2.max(0.0),
        }
    }

    /// Builds a box from a `[x1, y1, x2, y2]` slice, rejecting wrong arity
    /// and non-finite values before normalization.
    pub fn from_list(coords: &[f64]) -> Result<Self, BBoxError> {
        if coords.len() != 4 {
            return Err(BBoxError::WrongArity(coords.len()));
        }
        for (i, c) in coords.iter().enumerate() {
            if !c.is_finite() {
                return Err(BBoxError::NonFinite(i));
            }
        }
        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }

    pub fn to_list(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Integer corners for pixel indexing, rounded to nearest.
    pub fn to_tuple(&self) -> (i64, i64, i64, i64) {
        (
            self.x1.round() as i64,
            self.y1.round() as i64,
            self.x2.round() as i64,
            self.y2.round() as i64,
        )
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_sorts_inverted_corners() {
        let b = BBox::new(90.0, 80.0, 10.0, 20.0);
        assert_eq!(b.to_list(), [10.0, 20.0, 90.0, 80.0]);
    }

    #[test]
    fn construction_clamps_negatives() {
        let b = BBox::new(-5.0, -3.0, 10.0, 10.0);
        assert_eq!(b.to_list(), [0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn from_list_round_trips_valid_input() {
        let coords = [1.5, 2.5, 30.0, 40.0];
        let b = BBox::from_list(&coords).unwrap();
        assert_eq!(b.to_list(), coords);
    }

    #[test]
    fn from_list_rejects_wrong_arity() {
        assert_eq!(
            BBox::from_list(&[1.0, 2.0, 3.0]),
            Err(BBoxError::WrongArity(3))
        );
        assert_eq!(BBox::from_list(&[]), Err(BBoxError::WrongArity(0)));
    }

    #[test]
    fn from_list_rejects_nan_and_inf() {
        assert_eq!(
            BBox::from_list(&[f64::NAN, 0.0, 1.0, 1.0]),
            Err(BBoxError::NonFinite(0))
        );
        assert_eq!(
            BBox::from_list(&[0.0, 0.0, 1.0, f64::INFINITY]),
            Err(BBoxError::NonFinite(3))
        );
    }

    #[test]
    fn to_tuple_rounds_to_nearest() {
        let b = BBox::new(1.4, 1.6, 10.5, 10.4);
        assert_eq!(b.to_tuple(), (1, 2, 11, 10));
    }

    #[test]
    fn degenerate_box_is_invalid() {
        assert!(!BBox::new(5.0, 5.0, 5.0, 9.0).is_valid());
        assert!(BBox::new(5.0, 5.0, 6.0, 9.0).is_valid());
    }
}
