use std::sync::LazyLock;

use corpenrich_core::fields::format_phone_digits;
use corpenrich_core::text::{digits_only, normalize_text};
use regex::Regex;

use super::labels::mentions_fax;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\+81[\s-]?(?:\(0\))?[\s-]?|\(?0)\d{1,4}\)?[\s-]?\(?\d{1,4}\)?[\s-]?\d{3,4}",
    )
    .expect("valid regex")
});
static GROUPED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0\d{1,4}-\d{1,4}-\d{3,4}$").expect("valid regex"));

/// Characters of text before a match inspected for a FAX label.
const FAX_WINDOW_CHARS: usize = 8;

/// Normalize one phone-number string.
///
/// Accepts 9 to 12 digits with a leading `0` once `+81` is folded back to
/// `0`. Existing hyphen groups are kept; bare digits are hyphenated where
/// the layout is known.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut s: String = normalize_text(raw)
        .chars()
        .map(|c| if matches!(c, '(' | ')' | ' ') { '-' } else { c })
        .collect();
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    let mut s = s.trim_matches('-').to_string();
    if let Some(rest) = s.strip_prefix("+81") {
        s = format!("0{}", rest.trim_start_matches(['-', '0']));
    }

    let digits = digits_only(&s);
    if !(9..=12).contains(&digits.len()) || !digits.starts_with('0') {
        return None;
    }
    if GROUPED_RE.is_match(&s) {
        return Some(s);
    }
    Some(format_phone_digits(&digits).unwrap_or(digits))
}

fn window_before(text: &str, start: usize, floor: usize) -> &str {
    let head = &text[floor..start];
    let skip = head.chars().count().saturating_sub(FAX_WINDOW_CHARS);
    match head.char_indices().nth(skip) {
        Some((idx, _)) => &head[idx..],
        None => head,
    }
}

/// Phone numbers in already-normalized `text`, with the byte offset of each
/// match. FAX-labelled numbers are dropped.
pub(crate) fn find_phones(text: &str) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    let mut prev_end = 0;
    for m in PHONE_RE.find_iter(text) {
        let glued_before = text[..m.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit());
        let glued_after = text[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());
        let window = window_before(text, m.start(), prev_end);
        prev_end = m.end();
        if glued_before || glued_after || mentions_fax(window) {
            continue;
        }
        if let Some(phone) = normalize_phone(m.as_str()) {
            out.push((phone, m.start()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_layouts() {
        assert_eq!(normalize_phone("0312345678").as_deref(), Some("03-1234-5678"));
        assert_eq!(normalize_phone("03(1234)5678").as_deref(), Some("03-1234-5678"));
        assert_eq!(normalize_phone("+81-3-1234-5678").as_deref(), Some("03-1234-5678"));
        assert_eq!(normalize_phone("+81(0)6-1234-5678").as_deref(), Some("06-1234-5678"));
        assert_eq!(normalize_phone("０４５‐３８３‐１６１１").as_deref(), Some("045-383-1611"));
    }

    #[test]
    fn rejects_short_or_non_zero_prefixed() {
        assert_eq!(normalize_phone("03-123-456"), None);
        assert_eq!(normalize_phone("1234567890"), None);
    }

    #[test]
    fn fax_numbers_are_dropped() {
        let found = find_phones("TEL:03-1234-5678 FAX:03-1111-2222");
        let phones: Vec<_> = found.into_iter().map(|(p, _)| p).collect();
        assert_eq!(phones, vec!["03-1234-5678".to_string()]);

        let found = find_phones("FAX 03-1111-2222 TEL 03-1234-5678");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "03-1234-5678");
    }

    #[test]
    fn numbers_inside_longer_digit_runs_are_ignored() {
        assert!(find_phones("法人番号 1234567890123").is_empty());
        assert!(find_phones("営業時間: 9:00-18:00").is_empty());
    }
}
