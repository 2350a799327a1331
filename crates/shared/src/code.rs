//! Check-in code generation.
//!
//! Codes gate the in-person check-in and the booker role handoff, so they are
//! drawn from the operating system RNG rather than a seedable generator.

use rand::rngs::OsRng;
use rand::Rng;

/// Default length of a check-in code.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Generates a zero-padded random numeric code of the given length.
///
/// Lengths outside 4..=10 are snapped to the default of 6.
pub fn generate_code(length: usize) -> String {
    let length = if (4..=10).contains(&length) {
        length
    } else {
        DEFAULT_CODE_LENGTH
    };

    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_default_length() {
        let code = generate_code(DEFAULT_CODE_LENGTH);
        assert_eq!(code.len(), 6);
    }

    #[test]
    fn test_generate_code_all_digits() {
        let code = generate_code(6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_code_custom_length() {
        assert_eq!(generate_code(4).len(), 4);
        assert_eq!(generate_code(8).len(), 8);
    }

    #[test]
    fn test_generate_code_invalid_length_snaps_to_default() {
        assert_eq!(generate_code(0).len(), DEFAULT_CODE_LENGTH);
        assert_eq!(generate_code(64).len(), DEFAULT_CODE_LENGTH);
    }

    #[test]
    fn test_generate_code_preserves_leading_zeros() {
        // Generate enough codes that at least one should start with a zero;
        // the point is that the length never shrinks.
        for _ in 0..200 {
            assert_eq!(generate_code(6).len(), 6);
        }
    }

    #[test]
    fn test_generate_code_varies() {
        let codes: std::collections::HashSet<_> = (0..100).map(|_| generate_code(6)).collect();
        assert!(codes.len() > 90, "codes should be close to unique");
    }
}
