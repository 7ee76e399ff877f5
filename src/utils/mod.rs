use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn count_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d+\)\s*$").expect("static regex"))
}

/// Removes the ` (123)` hint appended to autocomplete values.
pub fn strip_count_suffix(value: &str) -> String {
    count_suffix_regex().replace(value, "").trim().to_string()
}

/// Splits a comma separated list, trimming items and dropping empty ones.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn split_csv_lowercase(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for item in split_csv(value) {
        let key = item.to_lowercase();
        if seen.insert(key.clone()) {
            out.push(key);
        }
    }
    out
}

pub fn parse_i64_list_csv(value: &str) -> Result<Vec<i64>, String> {
    let mut out: Vec<i64> = Vec::new();
    for item in split_csv(value) {
        let parsed = item
            .parse::<i64>()
            .map_err(|_| format!("invalid id '{item}'"))?;
        if parsed <= 0 {
            return Err(format!("invalid id '{item}', expected positive integer"));
        }
        if !out.contains(&parsed) {
            out.push(parsed);
        }
    }
    Ok(out)
}

pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Keeps the first word when a label is longer than `max_chars`.
pub fn shorten_label(value: &str, max_chars: usize) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() > max_chars {
        trimmed.split(' ').next().unwrap_or_default().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_suffix_is_removed_only_at_the_end() {
        assert_eq!(strip_count_suffix("Technologie (12)"), "Technologie");
        assert_eq!(strip_count_suffix("  Santé  (3)  "), "Santé");
        assert_eq!(strip_count_suffix("Lot (2) nord"), "Lot (2) nord");
        assert_eq!(strip_count_suffix("Web (abc)"), "Web (abc)");
    }

    #[test]
    fn csv_items_are_trimmed_and_empties_dropped() {
        assert_eq!(split_csv(" a, ,b ,,c"), vec!["a", "b", "c"]);
        assert!(split_csv(" , ").is_empty());
    }

    #[test]
    fn id_lists_reject_garbage() {
        assert_eq!(parse_i64_list_csv("3, 1,3").unwrap(), vec![3, 1]);
        assert!(parse_i64_list_csv("1,x").is_err());
        assert!(parse_i64_list_csv("0").is_err());
    }

    #[test]
    fn long_labels_keep_first_word() {
        assert_eq!(shorten_label("Technologie", 16), "Technologie");
        assert_eq!(
            shorten_label("Bâtiment et travaux publics", 16),
            "Bâtiment"
        );
    }
}
