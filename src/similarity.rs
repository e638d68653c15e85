//! String similarity metrics on a 0-100 scale.
//!
//! All metrics are built on the normalized indel similarity
//! `100 * 2 * lcs / (len_a + len_b)`, where `lcs` is the length of the longest
//! common subsequence. The token variants first normalize both strings with
//! [`default_process`] and then compare them token-wise, so word order and
//! punctuation do not affect the result.

use std::collections::BTreeSet;

/// Lowercase, replace every non-alphanumeric character with a space and trim
pub fn default_process(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalized indel similarity of two strings
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }

    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Length of the longest common subsequence, single-row dynamic programming
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

fn tokens(s: &str) -> Vec<String> {
    default_process(s)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Similarity after sorting the whitespace tokens of both strings
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let mut tokens_a = tokens(a);
    let mut tokens_b = tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    tokens_a.sort();
    tokens_b.sort();
    ratio(&tokens_a.join(" "), &tokens_b.join(" "))
}

/// Similarity based on the shared and differing token sets.
///
/// Scores 100 whenever one token set contains the other, which makes it
/// tolerant of titles padded with brand and size words.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<String> = tokens(a).into_iter().collect();
    let set_b: BTreeSet<String> = tokens(b).into_iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = set_a.intersection(&set_b).map(String::as_str).collect();
    let diff_ab: Vec<&str> = set_a.difference(&set_b).map(String::as_str).collect();
    let diff_ba: Vec<&str> = set_b.difference(&set_a).map(String::as_str).collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let combined_ab = join_nonempty(&sect, &diff_ab.join(" "));
    let combined_ba = join_nonempty(&sect, &diff_ba.join(" "));

    let mut best = ratio(&combined_ab, &combined_ba);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_ab))
            .max(ratio(&sect, &combined_ba));
    }
    best
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

/// Maximum of [`token_sort_ratio`] and [`token_set_ratio`]
pub fn token_ratio(a: &str, b: &str) -> f64 {
    token_sort_ratio(a, b).max(token_set_ratio(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.01,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_process() {
        assert_eq!(default_process("  Great Value 2% Milk, 1 Gal "), "great value 2  milk  1 gal");
        assert_eq!(default_process("xyz_nonexistent_item"), "xyz nonexistent item");
        assert_eq!(default_process("!!!"), "");
    }

    #[test]
    fn test_ratio() {
        approx(ratio("abc", "abc"), 100.0);
        approx(ratio("abc", "xyz"), 0.0);
        approx(ratio("milk", "almond milk"), 800.0 / 15.0);
        approx(ratio("", ""), 100.0);
        approx(ratio("", "abc"), 0.0);
    }

    #[test]
    fn test_token_sort_ignores_order_and_case() {
        approx(token_sort_ratio("New York Mets", "mets new york"), 100.0);
        approx(token_sort_ratio("fuzzy wuzzy was a bear", "wuzzy fuzzy was a bear"), 100.0);
    }

    #[test]
    fn test_token_sort_penalizes_padding() {
        // "2 milk" against "1 2 gal great milk value"
        approx(token_sort_ratio("2% milk", "Great Value 2% Milk, 1 Gal"), 40.0);
    }

    #[test]
    fn test_token_set_tolerates_padding() {
        approx(token_set_ratio("2% milk", "Great Value 2% Milk, 1 Gal"), 100.0);
        approx(token_set_ratio("milk", "2% Milk"), 100.0);
        // best of "milk" against "milk 2"
        approx(token_set_ratio("2% milk", "Almond Milk"), 80.0);
    }

    #[test]
    fn test_token_set_without_overlap() {
        let score = token_set_ratio("xyz_nonexistent_item", "Bananas");
        assert!(score < 30.0, "unexpected score {score}");
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        approx(token_sort_ratio("", "Bananas"), 0.0);
        approx(token_sort_ratio("   ", "Bananas"), 0.0);
        approx(token_set_ratio("", "Bananas"), 0.0);
        approx(token_ratio("%%", "Bananas"), 0.0);
    }

    #[test]
    fn test_token_ratio_is_max() {
        let a = "2% milk";
        let b = "Great Value 2% Milk, 1 Gal";
        approx(
            token_ratio(a, b),
            token_sort_ratio(a, b).max(token_set_ratio(a, b)),
        );
    }
}
