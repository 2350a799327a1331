//! Money arithmetic helpers.
//!
//! All monetary amounts are carried as integer minor units (e.g. pence) as soon
//! as they enter the system. Major-unit values only exist at the API edge.

/// Number of minor units in one major unit for supported currencies.
pub const MINOR_UNITS_PER_MAJOR: f64 = 100.0;

/// Converts a major-unit amount to integer minor units, rounding half up.
///
/// Negative inputs are clamped to zero; fares cannot be negative.
pub fn to_minor(major: f64) -> i64 {
    if !major.is_finite() || major <= 0.0 {
        return 0;
    }
    (major * MINOR_UNITS_PER_MAJOR).round() as i64
}

/// Clamps `n` into the inclusive range `[lo, hi]`.
pub fn clamp(n: i64, lo: i64, hi: i64) -> i64 {
    debug_assert!(lo <= hi, "clamp range inverted");
    n.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_whole_amounts() {
        assert_eq!(to_minor(12.0), 1200);
        assert_eq!(to_minor(0.0), 0);
        assert_eq!(to_minor(1.0), 100);
    }

    #[test]
    fn test_to_minor_rounds_half_up() {
        assert_eq!(to_minor(0.005), 1);
        assert_eq!(to_minor(10.555), 1056);
        assert_eq!(to_minor(10.554), 1055);
    }

    #[test]
    fn test_to_minor_negative_clamped() {
        assert_eq!(to_minor(-5.0), 0);
    }

    #[test]
    fn test_to_minor_non_finite() {
        assert_eq!(to_minor(f64::NAN), 0);
        assert_eq!(to_minor(f64::INFINITY), 0);
    }

    #[test]
    fn test_clamp_within_range() {
        assert_eq!(clamp(5, 0, 10), 5);
    }

    #[test]
    fn test_clamp_below() {
        assert_eq!(clamp(-3, 0, 10), 0);
    }

    #[test]
    fn test_clamp_above() {
        assert_eq!(clamp(42, 0, 10), 10);
    }

    #[test]
    fn test_clamp_boundaries() {
        assert_eq!(clamp(0, 0, 10), 0);
        assert_eq!(clamp(10, 0, 10), 10);
    }
}
