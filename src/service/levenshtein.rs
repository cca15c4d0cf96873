//! Edit distance helpers for fuzzy name matching.

/// Levenshtein distance, case-insensitive and ignoring surrounding whitespace.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // single rolling row
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag
            } else {
                1 + diag.min(above).min(row[j])
            };
            diag = above;
        }
    }
    row[b.len()]
}

/// Typo budget by length: ≤3 chars exact only, ≤5 one edit, else two.
pub fn adaptive_max_distance(s: &str) -> usize {
    match s.trim().chars().count() {
        0..=3 => 0,
        4..=5 => 1,
        _ => 2,
    }
}

/// `round((max_len - distance) / max_len * 100)`; 100 for two empty strings.
pub fn similarity(a: &str, b: &str) -> u32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }
    let d = distance(a, b).min(max_len);
    ((max_len - d) as f64 / max_len as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        assert_eq!(distance("sarah", "sara"), 1);
        assert_eq!(distance("john", "jhon"), 2);
        assert_eq!(distance("Sarah", "sarah "), 0);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("kitten", "sitting"), 3);
    }

    #[test]
    fn similarity_percentages() {
        assert_eq!(similarity("sarah", "sara"), 80);
        assert_eq!(similarity("", ""), 100);
        assert_eq!(similarity("abc", "xyz"), 0);
    }

    #[test]
    fn adaptive_budget() {
        assert_eq!(adaptive_max_distance("Jo"), 0);
        assert_eq!(adaptive_max_distance("John"), 1);
        assert_eq!(adaptive_max_distance("Elizabeth"), 2);
    }
}
