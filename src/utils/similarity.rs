//! Title similarity helpers.

/// Remove everything that is not a word character or whitespace.
pub fn strip_punctuation(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect()
}

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    strip_punctuation(&s.to_lowercase())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized character similarity in `[0.0, 1.0]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Case-insensitive, punctuation-insensitive similarity test.
pub fn are_similar(a: &str, b: &str, threshold: f64) -> bool {
    ratio(&normalize_title(a), &normalize_title(b)) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Marvel's  Agents: of S.H.I.E.L.D. "), "marvels agents of shield");
    }

    #[test]
    fn test_are_similar() {
        assert!(are_similar("The Office", "the office", 0.9));
        assert!(are_similar("Mr. Robot", "Mr Robot", 0.9));
        assert!(are_similar("The Expanse", "The Expanses", 0.9));
        assert!(!are_similar("Dark", "Dark Matter", 0.8));
    }

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(ratio("abc", "abc"), 1.0);
        assert_eq!(ratio("", ""), 1.0);
        assert!(ratio("abc", "xyz") < 0.1);
    }
}
