//! Human-readable size strings ("500KB", "1.5GB") to byte counts.

/// Unit suffixes, longest first so "B" never shadows "KB".
const UNITS: &[(&str, u64)] = &[
    ("TB", 1024 * 1024 * 1024 * 1024),
    ("GB", 1024 * 1024 * 1024),
    ("MB", 1024 * 1024),
    ("KB", 1024),
    ("B", 1),
];

/// Parse a size string into bytes.
///
/// Suffixes are matched case-insensitively. With a suffix the number may be
/// fractional (`"1.5GB"`); the result is truncated to whole bytes. Without a
/// suffix the input must be a plain integer byte count.
///
/// Returns None for malformed input. Callers treat that as "constraint not
/// applied" rather than a hard failure.
pub fn parse_size(s: &str) -> Option<u64> {
    let normalized = s.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    for (suffix, multiplier) in UNITS {
        if let Some(number) = normalized.strip_suffix(suffix) {
            let number = number.trim();
            if number.is_empty() {
                return None;
            }
            let value: f64 = number.parse().ok()?;
            if !value.is_finite() || value < 0.0 {
                return None;
            }
            return Some((value * *multiplier as f64) as u64);
        }
    }

    normalized.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("10B"), Some(10));
        assert_eq!(parse_size("1KB"), Some(1024));
        assert_eq!(parse_size("2MB"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("1TB"), Some(1024u64.pow(4)));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        assert_eq!(parse_size(" 500kb "), Some(500 * 1024));
        assert_eq!(parse_size("3 mb"), Some(3 * 1024 * 1024));
    }

    #[test]
    fn test_parse_fractional_with_suffix() {
        assert_eq!(parse_size("1.5GB"), Some(1536 * 1024 * 1024));
        assert_eq!(parse_size("0.5KB"), Some(512));
    }

    #[test]
    fn test_parse_raw_bytes() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("1.5"), None, "raw byte counts must be integers");
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("MB"), None);
        assert_eq!(parse_size("abcMB"), None);
        assert_eq!(parse_size("-1KB"), None);
        assert_eq!(parse_size("12XB"), None);
    }
}
