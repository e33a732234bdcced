//! Name normalization used for identity matching.
//!
//! Two names refer to the same entity when their normalized forms are
//! equal. Normalization keeps letters, ASCII digits and a few symbols that
//! carry meaning in titles (`+`, `!`, and their full-width forms), and
//! lowercases the rest away.

/// Normalize a series, person, genre or tag name for matching.
///
/// # Examples
///
/// ```
/// use folio_parser::normalize::normalize;
///
/// assert_eq!(normalize("Jane Doe"), "janedoe");
/// assert_eq!(normalize("K-On!"), "kon!");
/// assert_eq!(normalize("  "), "");
/// ```
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphabetic() || c.is_ascii_digit() || matches!(c, '+' | '!' | '＊' | '！' | '＋'))
        .flat_map(char::to_lowercase)
        .collect()
}

const SORT_PREFIXES: &[&str] = &["the", "a", "an"];

/// Remove a leading English article so "The Promised Neverland" sorts under P.
///
/// A name that is nothing but the article is returned unchanged.
pub fn strip_sort_prefix(name: &str) -> String {
    let trimmed = name.trim();
    for prefix in SORT_PREFIXES {
        let (Some(head), Some(tail)) = (trimmed.get(..prefix.len()), trimmed.get(prefix.len()..))
        else {
            continue;
        };
        if head.eq_ignore_ascii_case(prefix) && tail.starts_with(char::is_whitespace) {
            let rest = tail.trim_start();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    trimmed.to_string()
}

/// Drop leading zeroes from a numeric token: `"007"` becomes `"7"`, `"00"`
/// becomes `"0"`. Decimal parts are untouched so `"1.0"` stays distinct from
/// `"1"`. Each side of a range is handled separately.
pub fn remove_leading_zeroes(token: &str) -> String {
    fn strip(part: &str) -> &str {
        let stripped = part.trim_start_matches('0');
        if stripped.is_empty() || stripped.starts_with('.') {
            // keep one zero before a decimal point or for an all-zero token
            &part[part.len() - stripped.len() - 1..]
        } else {
            stripped
        }
    }

    if token.is_empty() || token.starts_with('-') {
        return token.to_string();
    }
    token.split('-').map(strip).collect::<Vec<_>>().join("-")
}

/// Split a comma separated metadata list into trimmed, non-empty entries,
/// dropping later duplicates (by normalized form).
pub fn split_list(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(normalize(s)))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ignores_case_space_and_punctuation() {
        assert_eq!(normalize("Attack on Titan"), normalize("attack-on_titan"));
        assert_eq!(normalize("Ｆate＋"), "ｆate＋");
        assert_eq!(normalize("Re:Zero"), "rezero");
    }

    #[test]
    fn sort_prefix() {
        assert_eq!(strip_sort_prefix("The Promised Neverland"), "Promised Neverland");
        assert_eq!(strip_sort_prefix("An Archdemon's Dilemma"), "Archdemon's Dilemma");
        assert_eq!(strip_sort_prefix("Theater"), "Theater");
        assert_eq!(strip_sort_prefix("The"), "The");
        assert_eq!(strip_sort_prefix("éa"), "éa");
    }

    #[test]
    fn leading_zeroes() {
        assert_eq!(remove_leading_zeroes("001"), "1");
        assert_eq!(remove_leading_zeroes("01.5"), "1.5");
        assert_eq!(remove_leading_zeroes("1.0"), "1.0");
        assert_eq!(remove_leading_zeroes("000"), "0");
        assert_eq!(remove_leading_zeroes("0.5"), "0.5");
        assert_eq!(remove_leading_zeroes("01-05"), "1-5");
        assert_eq!(remove_leading_zeroes("-100000"), "-100000");
    }

    #[test]
    fn split_list_dedupes() {
        assert_eq!(
            split_list("Jane Doe, John Roe,jane doe, ,"),
            vec!["Jane Doe".to_string(), "John Roe".to_string()]
        );
    }
}
