//! Cell coercion. None of these functions fail: an unusable cell is `None`.

use chrono::NaiveDate;

const NULL_TOKENS: [&str; 9] = ["n/a", "na", "nan", "null", "none", "-", "--", "inf", "-inf"];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Parse a numeric cell.
///
/// Accepts thousands separators, currency and percent signs, accounting
/// negatives (`(12.5)`) and `K`/`M`/`B`/`T` magnitude suffixes. Percent
/// values stay in percent units (`"12%"` → `12.0`).
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '_' | ' '))
        .collect();

    let (digits, multiplier) = match cleaned.chars().last() {
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1e3),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('B') | Some('b') => (&cleaned[..cleaned.len() - 1], 1e9),
        Some('T') | Some('t') => (&cleaned[..cleaned.len() - 1], 1e12),
        _ => (cleaned.as_str(), 1.0),
    };

    let value = digits.parse::<f64>().ok()? * multiplier;
    let value = if negative { -value } else { value };
    value.is_finite().then_some(value)
}

/// Parse a date cell.
///
/// ISO dates are tried first, then day-first forms (`05/01/2024` is
/// 5 January). A datetime suffix after the date (space or `T`) is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let head = match (trimmed.get(..10), trimmed.as_bytes().get(10)) {
        (Some(head), Some(b' ' | b'T')) => head,
        _ => trimmed,
    };

    if head.len() == 8 && head.bytes().all(|b| b.is_ascii_digit()) {
        let year = head[..4].parse().ok()?;
        let month = head[4..6].parse().ok()?;
        let day = head[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(head, format).ok())
}

/// Parse a split ratio: `2`, `2:1`, `2/1`, `2-for-1`, `3 for 2`.
///
/// The result is new shares per old share; non-positive ratios are `None`.
pub fn parse_ratio(raw: &str) -> Option<f64> {
    let lower = raw.trim().to_ascii_lowercase();
    for separator in [":", "/", "-for-", " for "] {
        if let Some((new, old)) = lower.split_once(separator) {
            let new = parse_number(new)?;
            let old = parse_number(old)?;
            if old == 0.0 {
                return None;
            }
            let ratio = new / old;
            return (ratio.is_finite() && ratio > 0.0).then_some(ratio);
        }
    }
    parse_number(&lower).filter(|ratio| *ratio > 0.0)
}

/// Parse a free-text label; blank and `N/A`-style cells are `None`.
pub fn parse_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}
