use std::sync::LazyLock;

use corpenrich_core::fields::{is_json_fragment, looks_like_address, normalize_address};
use corpenrich_core::prefecture::{has_city, PREFECTURES};
use regex::Regex;

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"〒?\s*(\d{3})-(\d{4})").expect("valid regex"));
static ZIP_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^〒?\s*\d{3}-\d{4}$").expect("valid regex"));
static PREFECTURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?:{})", PREFECTURES.join("|"))).expect("valid regex")
});
static CITY_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\s\d:：、,]{1,6}?(?:市|区|郡)").expect("valid regex")
});
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\s*(?:丁目|番地|番|号)|\d+-\d+|\d{1,5}$").expect("valid regex")
});

fn has_block(s: &str) -> bool {
    BLOCK_RE.is_match(s)
}

/// A `NNN-NNNN` run that is really the tail of a phone number or a longer
/// digit sequence.
fn inside_number(line: &str, start: usize, end: usize) -> bool {
    let before = line[..start].chars().next_back();
    let after = line[end..].chars().next();
    before.is_some_and(|c| c.is_ascii_digit() || c == '-')
        || after.is_some_and(|c| c.is_ascii_digit() || c == '-')
}

fn zip_address(line: &str, start: usize, end: usize, zip: &str) -> Option<String> {
    let rest = normalize_address(&line[end..]);
    if rest.is_empty() {
        return None;
    }
    let candidate = format!("〒{zip} {rest}");
    if is_json_fragment(&line[start..]) || !looks_like_address(&candidate) {
        return None;
    }
    Some(candidate)
}

/// Addresses in one normalized line of text.
///
/// A postal code followed by address text always qualifies. Without a
/// postal code the text must name a prefecture, a municipality and a block
/// number; `labelled` relaxes the prefecture requirement for values that
/// sit right under an address label.
pub(crate) fn find_addresses_in_line(line: &str, labelled: bool) -> Vec<String> {
    if is_json_fragment(line) {
        return Vec::new();
    }

    let zips: Vec<_> = ZIP_RE
        .captures_iter(line)
        .filter(|caps| caps.get(0).is_some_and(|m| !inside_number(line, m.start(), m.end())))
        .collect();
    if !zips.is_empty() {
        let mut out = Vec::new();
        for (i, caps) in zips.iter().enumerate() {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let next_start = zips
                .get(i + 1)
                .and_then(|c| c.get(0))
                .map_or(line.len(), |m| m.start());
            let zip = format!("{}-{}", &caps[1], &caps[2]);
            if let Some(addr) = zip_address(&line[..next_start], whole.start(), whole.end(), &zip)
            {
                out.push(addr);
            }
        }
        return out;
    }

    let start = match PREFECTURE_RE.find(line) {
        Some(m) => Some(m.start()),
        None if labelled => CITY_START_RE.find(line).map(|m| m.start()),
        None => None,
    };
    let Some(start) = start else {
        return Vec::new();
    };
    let candidate = normalize_address(&line[start..]);
    if has_city(&candidate) && has_block(&candidate) && looks_like_address(&candidate) {
        vec![candidate]
    } else {
        Vec::new()
    }
}

/// Addresses across every line of normalized `text`. A line holding only
/// a postal code is joined with the line after it.
pub(crate) fn find_addresses(text: &str, labelled: bool) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if ZIP_ONLY_RE.is_match(line.trim()) && i + 1 < lines.len() {
            out.extend(find_addresses_in_line(&format!("{line} {}", lines[i + 1]), labelled));
            i += 2;
            continue;
        }
        out.extend(find_addresses_in_line(line, labelled));
        i += 1;
    }
    out
}
