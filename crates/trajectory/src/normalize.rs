//! Text normalization shared by the data model, the store and the retriever.

use uuid::Uuid;

/// Lowercase, trim, and collapse internal whitespace runs to single spaces.
pub fn normalize_text(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased alphanumeric runs of the input, in order.
pub fn tokenize(value: &str) -> Vec<String> {
    let normalized = normalize_text(value);
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in normalized.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Reduce a site value or full URL to its bare domain: no scheme, no path.
pub fn domain_from_site_or_url(value: &str) -> String {
    let mut v = value.trim().to_lowercase();
    if let Some(idx) = v.find("://") {
        v = v[idx + 3..].to_string();
    }
    if let Some(idx) = v.find('/') {
        v.truncate(idx);
    }
    v
}

/// Short random identifier, optionally prefixed (`run_1a2b3c4d`).
pub fn short_id(prefix: &str) -> String {
    let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    if prefix.is_empty() {
        id
    } else {
        format!("{prefix}_{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_whitespace() {
        assert_eq!(normalize_text("  Find   a\tWidget  "), "find a widget");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn tokenize_extracts_alnum_runs() {
        assert_eq!(tokenize("Find a widget, NOW!"), vec!["find", "a", "widget", "now"]);
        assert_eq!(tokenize("v2.5-beta"), vec!["v2", "5", "beta"]);
        assert!(tokenize("!!!").is_empty());
    }

    #[test]
    fn domain_strips_scheme_and_path() {
        assert_eq!(domain_from_site_or_url("https://Example.com/a/b?q=1"), "example.com");
        assert_eq!(domain_from_site_or_url("example.com/path"), "example.com");
        assert_eq!(domain_from_site_or_url("  example.com  "), "example.com");
        assert_eq!(domain_from_site_or_url("example.com"), "example.com");
    }

    #[test]
    fn short_id_has_prefix_and_length() {
        let id = short_id("run");
        assert!(id.starts_with("run_"));
        assert_eq!(id.len(), 12);
        assert_ne!(short_id(""), short_id(""));
    }
}
