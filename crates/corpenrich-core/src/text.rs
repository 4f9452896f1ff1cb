//! Width folding and whitespace helpers for Japanese web text.
//!
//! Pages mix fullwidth digits, halfwidth katakana, a dozen dash glyphs and
//! CJK radical code points that look identical to ordinary kanji. Every
//! matcher downstream runs on text that has been through [`normalize_text`].

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid regex"));
static DIGIT_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)\s*[ーｰ]\s*(\d)").expect("valid regex"));

/// Halfwidth katakana U+FF66..=U+FF9D in code point order.
const HALFWIDTH_KANA: &str =
    "ヲァィゥェォャュョッーアイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワン";

/// Radical and compatibility code points that render as common kanji.
const RADICAL_FOLDS: &[(char, char)] = &[
    ('⻑', '長'),
    ('⾕', '谷'),
    ('⾼', '高'),
    ('⽥', '田'),
    ('⼭', '山'),
    ('⽊', '木'),
    ('⼤', '大'),
    ('⼩', '小'),
    ('⼝', '口'),
    ('⼈', '人'),
    ('⽔', '水'),
    ('⾦', '金'),
    ('⽇', '日'),
    ('⽉', '月'),
    ('⼀', '一'),
    ('⼆', '二'),
    ('⼟', '土'),
    ('⽯', '石'),
    ('⽵', '竹'),
    ('⽷', '糸'),
    ('⾨', '門'),
    ('⾥', '里'),
    ('⾞', '車'),
    ('⻄', '西'),
    ('⻘', '青'),
    ('⾺', '馬'),
    ('⿃', '鳥'),
    ('⿊', '黒'),
    ('⻩', '黄'),
    ('⻯', '竜'),
    ('⻫', '斉'),
    ('⻭', '歯'),
    ('⻲', '亀'),
    ('⼦', '子'),
    ('⼥', '女'),
    ('⼿', '手'),
    ('⽣', '生'),
    ('⾃', '自'),
    ('⾔', '言'),
];

/// Returns `true` for the dash-like glyphs that appear interchangeably in
/// phone numbers, postal codes and block numbers.
#[must_use]
pub fn is_dash(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{2010}'
            | '\u{2011}'
            | '\u{2012}'
            | '\u{2013}'
            | '\u{2014}'
            | '\u{2015}'
            | '\u{2212}'
            | '\u{FE63}'
            | '\u{FF0D}'
    )
}

fn compose_voiced(base: char, mark: char) -> Option<char> {
    let code = u32::from(base);
    let dakuten_ok = matches!(base, 'カ'..='ト' | 'ハ'..='ホ');
    match mark {
        '\u{FF9E}' if base == 'ウ' => Some('ヴ'),
        '\u{FF9E}' if dakuten_ok => {
            // ッ sits inside the カ..ト range but never takes a mark.
            if base == 'ッ' {
                None
            } else {
                char::from_u32(code + 1)
            }
        }
        '\u{FF9F}' if matches!(base, 'ハ'..='ホ') => {
            // Only the five ハ-row bases (every third code point) take ﾟ.
            if (code - u32::from('ハ')) % 3 == 0 {
                char::from_u32(code + 2)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// NFKC-style fold covering what Japanese company pages actually contain:
/// fullwidth ASCII, the ideographic space, halfwidth katakana (with voiced
/// marks), dash variants and radical code points.
#[must_use]
pub fn fold_width(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let code = u32::from(c);
        if (0xFF66..=0xFF9D).contains(&code) {
            let idx = (code - 0xFF66) as usize;
            if let Some(kana) = HALFWIDTH_KANA.chars().nth(idx) {
                out.push(kana);
            }
            continue;
        }
        if c == '\u{FF9E}' || c == '\u{FF9F}' {
            if let Some(prev) = out.pop() {
                match compose_voiced(prev, c) {
                    Some(voiced) => out.push(voiced),
                    None => out.push(prev),
                }
            }
            continue;
        }
        if c == '\u{FF65}' {
            out.push('・');
            continue;
        }
        if is_dash(c) {
            out.push('-');
            continue;
        }
        if (0xFF01..=0xFF5E).contains(&code) {
            if let Some(ascii) = char::from_u32(code - 0xFEE0) {
                out.push(ascii);
            }
            continue;
        }
        if c == '\u{3000}' || c == '\u{00A0}' {
            out.push(' ');
            continue;
        }
        if let Some((_, to)) = RADICAL_FOLDS.iter().find(|(from, _)| *from == c) {
            out.push(*to);
            continue;
        }
        out.push(c);
    }
    out
}

/// Collapse every whitespace run to one ASCII space and trim.
#[must_use]
pub fn collapse_ws(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace katakana prolonged-sound marks used as dashes between digits.
#[must_use]
pub fn normalize_digit_dashes(input: &str) -> String {
    // Applied twice so overlapping runs like 1ー2ー3 are fully covered.
    let once = DIGIT_DASH_RE.replace_all(input, "$1-$2");
    DIGIT_DASH_RE.replace_all(&once, "$1-$2").into_owned()
}

/// Full normalization pipeline: width fold, digit dashes, whitespace.
#[must_use]
pub fn normalize_text(input: &str) -> String {
    collapse_ws(&normalize_digit_dashes(&fold_width(input)))
}

/// Like [`normalize_text`] but keeps line breaks, collapsing spaces within
/// each line and dropping empty lines.
#[must_use]
pub fn normalize_lines(input: &str) -> String {
    let folded = normalize_digit_dashes(&fold_width(input));
    folded
        .lines()
        .map(collapse_ws)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove HTML tags, leaving a space where each tag was.
#[must_use]
pub fn strip_tags(input: &str) -> String {
    TAG_RE.replace_all(input, " ").into_owned()
}

/// Decode the handful of entities that survive into scraped text.
#[must_use]
pub fn unescape_html(input: &str) -> String {
    let named = input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");
    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures<'_>| {
        let body = &caps[1];
        let code = if let Some(hex) = body.strip_prefix('x') {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map_or_else(String::new, |c| c.to_string())
    });
    numeric.replace("&amp;", "&")
}

/// Digits only, after width folding.
#[must_use]
pub fn digits_only(input: &str) -> String {
    fold_width(input).chars().filter(char::is_ascii_digit).collect()
}

/// Returns `true` when the text contains replacement characters or the
/// typical Shift-JIS-as-Latin-1 debris.
#[must_use]
pub fn looks_mojibake(input: &str) -> bool {
    input.contains('\u{FFFD}')
        || input.contains("ã\u{81}")
        || input.chars().filter(|c| matches!(c, 'Ã' | 'â' | 'ã')).count() >= 3
}
