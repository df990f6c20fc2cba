//! Test support for field-engine and field-compare.
//!
//! Generators build small deterministic grids, time axes and in-memory
//! sources; fixtures hold the fixed cycle, named boxes and a source wrapper
//! that fails on demand; paths locate bundle files under `testdata/`.
//! Everything is re-exported at the root, so tests import straight from
//! `test_utils`:
//!
//! ```ignore
//! use test_utils::{ensemble_source, regular_grid, six_hourly_axis};
//!
//! let source = ensemble_source("fc", regular_grid(2, 2, 0.0, 0.0, 1.0), six_hourly_axis(1, vec![0]), 3, "field");
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Path of a bundle under `testdata/`, or an early `return` from the
/// calling test with a `SKIPPED` note on stderr.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!("SKIPPED: bundle {} not in testdata/ (or TEST_DATA_DIR)", $name);
                return;
            }
        }
    }};
}

/// Asserts `|left - right| <= epsilon` after widening both sides to `f64`.
///
/// Field values are `f32` while expectations are often written as `f64`
/// literals, so the operands may differ in type. An optional trailing
/// label names the quantity in the failure message.
///
/// ```ignore
/// assert_approx_eq!(slice.values()[0], 281.0 - 273.15, 1e-3);
/// assert_approx_eq!(lo, -1.0, 1e-3, "difference minimum");
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {
        $crate::assert_approx_eq!($left, $right, $epsilon, "value")
    };
    ($left:expr, $right:expr, $epsilon:expr, $label:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        let diff = (left - right).abs();
        // NaN on either side never compares close.
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: {} {:?} differs from {:?} by {:?} (epsilon {:?})",
                $label, left, right, diff, epsilon
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_close_values_pass() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(-5.5_f32, -5.500001_f64, 0.0001);
        assert_approx_eq!(7.85_f32, 7.85, 1e-6, "converted temperature");
    }

    #[test]
    #[should_panic(expected = "assertion failed: value 1.1")]
    fn test_distant_values_fail() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed: missing point")]
    fn test_missing_value_never_close() {
        assert_approx_eq!(f32::NAN, 0.0, 1.0, "missing point");
    }
}
