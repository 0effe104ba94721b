//! Element-wise comparison of a fused output against its reference.

use std::fmt;

use convfuse::{DType, Tensor};

/// Absolute plus relative closeness bound.
///
/// An element passes when `|expected - actual| <= atol + rtol * max(|expected|, |actual|)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Tolerance {
    pub const DEFAULT_ATOL: f64 = 1e-5;

    pub fn new(atol: f64, rtol: f64) -> Self {
        Tolerance { atol, rtol }
    }

    /// Bitwise value equality, used for hand-computed cases.
    pub fn exact() -> Self {
        Tolerance::new(0.0, 0.0)
    }

    /// `1e-5` absolute for every dtype; half precision additionally allows one f16
    /// epsilon of relative error, since its spacing exceeds `1e-5` above `2^-7`.
    pub fn for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::F16 => Tolerance::new(Self::DEFAULT_ATOL, DType::F16.epsilon()),
            DType::F32 | DType::F64 => Tolerance::new(Self::DEFAULT_ATOL, 0.0),
        }
    }

    #[inline]
    pub fn threshold(&self, expected: f64, actual: f64) -> f64 {
        self.atol + self.rtol * expected.abs().max(actual.abs())
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atol={:e} rtol={:e}", self.atol, self.rtol)
    }
}

/// First element outside the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: f64,
    pub actual: f64,
    pub diff: f64,
    pub thresh: f64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value mismatch at index {}: expected {}, actual {}, diff {}, thresh {}",
            self.index, self.expected, self.actual, self.diff, self.thresh
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Shapes and dtypes match and every element is within tolerance.
    pub equal: bool,
    /// Largest element difference; infinite when shapes differ or a NaN is unmatched.
    pub max_abs_diff: f64,
    pub shape_match: bool,
    pub dtype_match: bool,
    /// Number of elements outside the tolerance.
    pub mismatched: usize,
    pub first_mismatch: Option<Mismatch>,
}

/// Compares `actual` against `expected`. Dtypes are never coerced: a dtype mismatch makes
/// the result unequal even though values are still compared to report `max_abs_diff`.
pub fn compare(expected: &Tensor, actual: &Tensor, tolerance: Tolerance) -> ComparisonResult {
    let shape_match = expected.shape() == actual.shape();
    let dtype_match = expected.dtype() == actual.dtype();
    if !shape_match {
        return ComparisonResult {
            equal: false,
            max_abs_diff: f64::INFINITY,
            shape_match,
            dtype_match,
            mismatched: expected.len().max(actual.len()),
            first_mismatch: None,
        };
    }

    let expected_values = expected.to_f64_vec();
    let actual_values = actual.to_f64_vec();
    let mut max_abs_diff = 0.0f64;
    let mut mismatched = 0usize;
    let mut first_mismatch = None;
    for (index, (&e, &a)) in expected_values.iter().zip(&actual_values).enumerate() {
        let diff = element_diff(e, a);
        max_abs_diff = max_abs_diff.max(diff);
        let thresh = tolerance.threshold(e, a);
        if diff > thresh || diff.is_infinite() {
            mismatched += 1;
            if first_mismatch.is_none() {
                first_mismatch = Some(Mismatch {
                    index,
                    expected: e,
                    actual: a,
                    diff,
                    thresh,
                });
            }
        }
    }

    ComparisonResult {
        equal: dtype_match && mismatched == 0,
        max_abs_diff,
        shape_match,
        dtype_match,
        mismatched,
        first_mismatch,
    }
}

fn element_diff(expected: f64, actual: f64) -> f64 {
    if expected == actual || (expected.is_nan() && actual.is_nan()) {
        0.0
    } else {
        let diff = (expected - actual).abs();
        if diff.is_nan() {
            f64::INFINITY
        } else {
            diff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_infinities_and_nans_count_as_equal() {
        assert_eq!(element_diff(f64::INFINITY, f64::INFINITY), 0.0);
        assert_eq!(element_diff(f64::NAN, f64::NAN), 0.0);
        assert_eq!(element_diff(f64::NAN, 1.0), f64::INFINITY);
        assert_eq!(element_diff(f64::INFINITY, f64::NEG_INFINITY), f64::INFINITY);
    }

    #[test]
    fn half_tolerance_scales_with_magnitude() {
        let tol = Tolerance::for_dtype(DType::F16);
        assert!(tol.threshold(1000.0, 1000.5) > 0.5);
        assert_eq!(Tolerance::for_dtype(DType::F32).threshold(1e6, 1e6), 1e-5);
    }
}
