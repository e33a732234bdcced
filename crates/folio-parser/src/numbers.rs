//! Volume and chapter number tokens.

/// Volume token for chapters that do not belong to any volume.
pub const LOOSE_LEAF_VOLUME: &str = "-100000";
/// Numeric value of [`LOOSE_LEAF_VOLUME`].
pub const LOOSE_LEAF_VOLUME_NUMBER: f64 = -100_000.0;
/// Chapter token for files that are a whole volume.
pub const DEFAULT_CHAPTER: &str = "-100000";
/// Numeric value of [`DEFAULT_CHAPTER`].
pub const DEFAULT_CHAPTER_NUMBER: f64 = -100_000.0;
/// Volume token that holds specials.
pub const SPECIAL_VOLUME: &str = "100000";
/// Numeric value of [`SPECIAL_VOLUME`].
pub const SPECIAL_VOLUME_NUMBER: f64 = 100_000.0;

/// Parse a single number, tolerating surrounding whitespace and commas used
/// as decimal separators.
fn parse_number(token: &str) -> Option<f64> {
    token.trim().replace(',', ".").parse::<f64>().ok()
}

/// Split `"1-5"` into `("1", "5")`. Negative sentinels are not ranges.
fn split_range(range: &str) -> Option<(&str, &str)> {
    let range = range.trim();
    if range.starts_with('-') {
        return None;
    }
    range.split_once('-')
}

/// Lower bound of a chapter or volume range. Unparseable tokens yield `0`.
///
/// # Examples
///
/// ```
/// use folio_parser::numbers::min_number_from_range;
///
/// assert_eq!(min_number_from_range("3"), 3.0);
/// assert_eq!(min_number_from_range("1-5"), 1.0);
/// assert_eq!(min_number_from_range("-100000"), -100000.0);
/// assert_eq!(min_number_from_range("Special"), 0.0);
/// ```
pub fn min_number_from_range(range: &str) -> f64 {
    if let Some(n) = parse_number(range) {
        return n;
    }
    match split_range(range) {
        Some((lo, hi)) => match (parse_number(lo), parse_number(hi)) {
            (Some(lo), Some(hi)) => lo.min(hi),
            _ => 0.0,
        },
        None => 0.0,
    }
}

/// Upper bound of a chapter or volume range. Unparseable tokens yield `0`.
pub fn max_number_from_range(range: &str) -> f64 {
    if let Some(n) = parse_number(range) {
        return n;
    }
    match split_range(range) {
        Some((lo, hi)) => match (parse_number(lo), parse_number(hi)) {
            (Some(lo), Some(hi)) => lo.max(hi),
            _ => 0.0,
        },
        None => 0.0,
    }
}

/// Whether a volume token is the loose-leaf sentinel.
pub fn is_loose_leaf_volume(token: &str) -> bool {
    token == LOOSE_LEAF_VOLUME
}

/// Whether a volume token is the specials sentinel.
pub fn is_special_volume(token: &str) -> bool {
    token == SPECIAL_VOLUME
}

/// Whether a chapter token is the whole-volume sentinel.
pub fn is_default_chapter(token: &str) -> bool {
    token == DEFAULT_CHAPTER
}

/// Display name for a volume token: sentinels get a word, numbers lose
/// trailing fractional zeroes (`"1.0"` shows as `"1"`).
pub fn volume_display_name(token: &str) -> String {
    if is_loose_leaf_volume(token) {
        return "Loose Leaf".to_string();
    }
    if is_special_volume(token) {
        return "Specials".to_string();
    }
    match parse_number(token) {
        Some(n) if n.fract() == 0.0 => format!("{}", n as i64),
        Some(n) => format!("{n}"),
        None => token.to_string(),
    }
}
