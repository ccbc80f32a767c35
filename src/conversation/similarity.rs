//! Token-set similarity used for approximate context lookup.

use std::collections::HashSet;

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard similarity of the lowercase whitespace token sets of `a` and `b`.
///
/// Two empty inputs are identical (1.0); exactly one empty input scores 0.0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left = tokens(a);
    let right = tokens(b);
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard_similarity("Hello World", "world hello"), 1.0);
        assert_eq!(jaccard_similarity("a b c", "a b d"), 0.5);
        assert_eq!(jaccard_similarity("a a a", "a"), 1.0);
        assert_eq!(jaccard_similarity("", "   "), 1.0);
        assert_eq!(jaccard_similarity("", "x"), 0.0);
        assert_eq!(jaccard_similarity("x", ""), 0.0);
        assert_eq!(jaccard_similarity("x", "y"), 0.0);
    }
}
