//! Utilities for numerics.

use std::cmp::Ordering;

/// An `f32` that implements [`Ord`] according to the IEEE 754 totalOrder predicate.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Applies the standard sigmoid/logistic function to the input.
///
/// The networks output raw logits for their confidence values, which this maps to range 0.0 to
/// 1.0.
#[inline]
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sigmoid_range() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_relative_eq!(sigmoid(100.0), 1.0);
        assert_relative_eq!(sigmoid(-100.0), 0.0);
        assert!(sigmoid(1.0) > sigmoid(0.5));
    }

    #[test]
    fn total_order() {
        let mut values = [3.0, -1.0, f32::NAN, 0.5].map(TotalF32);
        values.sort();
        assert_eq!(values[0].0, -1.0);
        assert_eq!(values[2].0, 3.0);
        assert!(values[3].0.is_nan());
    }
}
