//! Name and field rules for NIS map records.

use regex::Regex;
use std::sync::LazyLock;

static LEGAL_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("LEGAL_NAME_CHARS is a valid regex pattern")
});

/// Check an account or group name for use as a map key.
///
/// Returns a description of the problem, or `None` if the name is legal.
pub fn illegal_name(name: &str, max_len: usize) -> Option<String> {
    if name.is_empty() {
        return Some("empty name".to_string());
    }
    if name.chars().count() > max_len {
        return Some(format!("too long ({})", name));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Some(format!("must start with a character ({})", name));
    }
    if !LEGAL_NAME_CHARS.is_match(name) {
        return Some(format!("contains illegal characters ({})", name));
    }
    None
}

/// Check a field value that ends up between `:` separators.
pub fn illegal_field(value: &str) -> Option<String> {
    if value.contains(':') {
        return Some(format!("separator ':' present in '{}'", value));
    }
    if value.contains(['\n', '\r', '\0']) {
        return Some(format!("control character present in '{}'", value.escape_debug()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_names() {
        assert_eq!(illegal_name("jdoe", 8), None);
        assert_eq!(illegal_name("a-b_c9", 8), None);
    }

    #[test]
    fn test_too_long() {
        assert_eq!(illegal_name("abcdefghi", 8), Some("too long (abcdefghi)".to_string()));
        assert_eq!(illegal_name("abcdefghi", 16), None);
    }

    #[test]
    fn test_bad_first_character() {
        assert!(illegal_name("9lives", 8).unwrap().starts_with("must start"));
        assert!(illegal_name("_x", 8).is_some());
    }

    #[test]
    fn test_illegal_characters() {
        assert!(illegal_name("jo.doe", 8).unwrap().starts_with("contains illegal"));
        assert!(illegal_name("bjørn", 8).is_some());
        assert!(illegal_name("", 8).is_some());
    }

    #[test]
    fn test_illegal_field() {
        assert_eq!(illegal_field("Jane Doe"), None);
        assert!(illegal_field("a:b").is_some());
        assert!(illegal_field("a\nb").is_some());
    }
}
