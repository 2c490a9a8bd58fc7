/// Edit-distance based similarity used by the fraud engine to catch
/// near-duplicate mobile-money references (one character retyped, a digit
/// appended, etc).

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row rolling matrix.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity in [0, 1]: `1 - distance / max_len`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64) / (max_len as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn test_similarity_identical_and_disjoint() {
        assert_eq!(similarity("ABC123", "ABC123"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("AAAA", "ZZZZ"), 0.0);
    }

    #[test]
    fn test_single_char_change_on_ten_char_reference() {
        // One edit on a 10-char reference: similarity 0.9, above the 0.8
        // rejection threshold.
        let s = similarity("AB12CD34EF", "AB12CD34EG");
        assert!((s - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_references_pass_threshold() {
        let s = similarity("QJ72KD91XR", "MB05TZ48LW");
        assert!(s < 0.8);
    }
}
