//! Storage-side field validators.
//!
//! Every value written to a company row passes through one of these. A
//! validator returns `None` when the input is not a plausible value for the
//! field; callers store that as blank rather than keeping the raw text.

use std::sync::LazyLock;

use regex::Regex;

use crate::prefecture::{find_prefecture, has_city, has_zip};
use crate::text::{digits_only, looks_mojibake, normalize_text, strip_tags, unescape_html};

pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MAX_CHARS: usize = 200;
pub const LISTING_MAX_CHARS: usize = 15;
pub const AMOUNT_MAX_CHARS: usize = 40;

const DUMMY_PHONES: [&str; 3] = ["81112345678", "0123456789", "0000000000"];

static PHONE_GROUPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0\d{1,4})[^\d]+?(\d{1,4})[^\d]+?(\d{3,4})").expect("valid regex")
});
static ADDRESS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:本社|本店)?(?:所在地|住所)\s*[:：]?\s*").expect("valid regex")
});
static ADDRESS_FORM_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"住所検索|都道府県を選択|都道府県\s*$|市区町村\s*$|マンション・?ビル名|郵便番号\s*半角")
        .expect("valid regex")
});
static ADDRESS_CUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*(?:tel\b|tel[.:]|電話|☎|℡|fax|ファックス|ファクス|メール|e-?mail|代表番号|代表電話|地図アプリ|地図で見る|google\s*マップ|google|マップ|アクセス|ルート|route|directions|行き方|→|⇒|従業員数|営業時間|代表者|代表取締役|資本金|設立|許可|免許|事業内容|お問い合わせ|お問合せ|採用)",
    )
    .expect("valid regex")
});
static ZIP_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"〒?\s*\d{3}-\d{4}").expect("valid regex"));
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\s*(?:丁目|番地|番|号)|\d+-\d+").expect("valid regex")
});
static JSON_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\\"|"\s*:\s*"|[{}]|postalcode|addresslocality|streetaddress|addressregion|"@type""#,
    )
    .expect("valid regex")
});

static DESCRIPTION_DIRECTORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"データベース|詳細ページ|登録企業|掲載企業|企業一覧|企業情報サイト|口コミ|求人情報サイト")
        .expect("valid regex")
});
static DESCRIPTION_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)https?://|www\.|@|tel|電話|住所|〒|お問い合わせ|お問合せ|アクセス|採用|求人|予約|営業時間|こちら",
    )
    .expect("valid regex")
});
static DESCRIPTION_PHILOSOPHY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"理念|ビジョン|ご挨拶|ごあいさつ|メッセージ|ポリシー|方針").expect("valid regex")
});
static DESCRIPTION_BUSINESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"事業|製造|販売|提供|開発|運営|施工|設計|工事|建設|卸|輸入|輸出|運送|物流|加工|取り扱|取扱|サービス|専門|手掛け|手がけ|営む|展開",
    )
    .expect("valid regex")
});

const LISTING_KEYWORDS: [&str; 16] = [
    "上場",
    "未上場",
    "非上場",
    "東証",
    "名証",
    "札証",
    "福証",
    "JASDAQ",
    "TOKYO PRO",
    "マザーズ",
    "グロース",
    "スタンダード",
    "プライム",
    "NASDAQ",
    "NYSE",
    "一部",
];
static LISTING_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

static HEADCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"従業員|社員数|職員数|\d+\s*(?:名|人)").expect("valid regex")
});
static PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|（[^）]*）").expect("valid regex"));
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\d[\d,.]*(?:兆|億|万|千))*\d[\d,.]*(?:兆|億|万|千)?円").expect("valid regex")
});

static QUARTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bQ([1-4])\b|第([1-4])四半期").expect("valid regex"));
static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])(1[0-2]|0?[1-9])(?:[^0-9]|$)").expect("valid regex")
});
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:18|19|20)\d{2}").expect("valid regex"));

// ---------------------------------------------------------------------------
// Phone
// ---------------------------------------------------------------------------

/// Hyphenate a bare Japanese phone number.
///
/// Free-dial and navi-dial numbers split 4-3-3; Tokyo and Osaka 2-4-4;
/// other ten-digit landlines 3-3-4; eleven-digit numbers 3-4-4 (mobile,
/// IP) or 4-3-4 for `0800`.
#[must_use]
pub fn format_phone_digits(digits: &str) -> Option<String> {
    if !digits.starts_with('0') || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let split = |a: usize, b: usize| {
        format!("{}-{}-{}", &digits[..a], &digits[a..a + b], &digits[a + b..])
    };
    match digits.len() {
        11 if digits.starts_with("0800") => Some(split(4, 3)),
        11 => Some(split(3, 4)),
        10 if digits.starts_with("0120") || digits.starts_with("0570") => Some(split(4, 3)),
        10 if digits.starts_with("03") || digits.starts_with("06") => Some(split(2, 4)),
        10 => Some(split(3, 3)),
        _ => None,
    }
}

/// Normalize a stored phone number to hyphenated form.
#[must_use]
pub fn clean_phone(raw: &str) -> Option<String> {
    let s = normalize_text(raw);
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = PHONE_GROUPS_RE.captures(&s) {
        let joined = format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
        let digits = digits_only(&joined);
        if (10..=11).contains(&digits.len()) && !DUMMY_PHONES.contains(&digits.as_str()) {
            return Some(joined);
        }
    }

    let mut digits = digits_only(&s);
    if digits.starts_with("81") && digits.len() >= 11 {
        digits = format!("0{}", &digits[2..]);
    }
    if DUMMY_PHONES.contains(&digits.as_str()) {
        return None;
    }
    format_phone_digits(&digits)
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// `true` when the text looks like leaked JSON rather than prose.
#[must_use]
pub fn is_json_fragment(s: &str) -> bool {
    JSON_NOISE_RE.is_match(s)
}

/// Coarse shape test: a postal code, prefecture, municipality or block
/// number, in some combination of at least two.
#[must_use]
pub fn looks_like_address(raw: &str) -> bool {
    let s = normalize_text(raw);
    if s.is_empty() || is_json_fragment(&s) {
        return false;
    }
    let zip = has_zip(&s);
    let pref = find_prefecture(&s).is_some();
    let city = has_city(&s);
    let block = BLOCK_RE.is_match(&s);
    (zip && (pref || city || block)) || (pref && (city || block)) || (city && block)
}

/// Cut trailing contact details, map instructions and neighbouring
/// profile labels off an address string.
#[must_use]
pub fn normalize_address(raw: &str) -> String {
    let s = normalize_text(raw);
    let cut = match ADDRESS_CUT_RE.find(&s) {
        Some(m) if m.start() > 0 => &s[..m.start()],
        Some(_) => "",
        None => s.as_str(),
    };
    trim_address_punct(cut)
}

fn trim_address_punct(s: &str) -> String {
    s.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | '、' | '。' | '・' | ':' | ';' | '/' | '|' | '-' | '(')
    })
    .to_string()
}

/// Validate an address for storage.
#[must_use]
pub fn clean_address(raw: &str) -> Option<String> {
    let decoded = unescape_html(raw);
    let stripped: String = strip_tags(&decoded)
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    let mut s = normalize_text(&stripped);
    if ADDRESS_FORM_NOISE_RE.is_match(&s) {
        return None;
    }
    for _ in 0..3 {
        let next = ADDRESS_LABEL_RE.replace(&s, "").into_owned();
        if next == s {
            break;
        }
        s = next;
    }
    if s.contains("郵便番号") && !has_zip(&s) {
        return None;
    }
    let cleaned = normalize_address(&s);
    if cleaned.is_empty() || looks_mojibake(&cleaned) || is_json_fragment(&cleaned) {
        return None;
    }
    Some(cleaned)
}

/// Sanitize an imported address: keep only the first postal block, drop
/// trailing noise, and reject values that are not addresses at all.
#[must_use]
pub fn sanitize_input_address(raw: &str) -> String {
    let s = normalize_text(raw);
    let mut zips = ZIP_MARK_RE.find_iter(&s);
    let first_block = match (zips.next(), zips.next()) {
        (Some(_), Some(second)) => s[..second.start()].to_string(),
        _ => s.clone(),
    };
    let cleaned = normalize_address(&first_block);
    if looks_like_address(&cleaned) {
        cleaned
    } else {
        String::new()
    }
}

// ---------------------------------------------------------------------------
// Free-text profile fields
// ---------------------------------------------------------------------------

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// First business-describing sentence of a description, or `None`.
#[must_use]
pub fn clean_description(raw: &str) -> Option<String> {
    let s = normalize_text(&strip_tags(&unescape_html(raw)));
    if s.is_empty() || DESCRIPTION_DIRECTORY_RE.is_match(&s) {
        return None;
    }
    s.split(['。', '!', '?', '\n'])
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() >= DESCRIPTION_MIN_CHARS)
        .filter(|sentence| !DESCRIPTION_NOISE_RE.is_match(sentence))
        .filter(|sentence| !DESCRIPTION_PHILOSOPHY_RE.is_match(sentence))
        .find(|sentence| DESCRIPTION_BUSINESS_RE.is_match(sentence))
        .map(|sentence| truncate_chars(sentence, DESCRIPTION_MAX_CHARS))
}

/// Short listing-status label (market name, or a bare securities code).
#[must_use]
pub fn clean_listing(raw: &str) -> Option<String> {
    let s = normalize_text(raw);
    if s.is_empty() || s.chars().count() > LISTING_MAX_CHARS {
        return None;
    }
    if s.contains(['。', '、', ',', '.', '!', '?']) {
        return None;
    }
    let upper = s.to_uppercase();
    if LISTING_KEYWORDS.iter().any(|k| upper.contains(k)) || LISTING_CODE_RE.is_match(&s) {
        Some(s)
    } else {
        None
    }
}

/// Monetary amount with a yen unit (`3,000万円`, `1.2億円`).
#[must_use]
pub fn clean_amount(raw: &str) -> Option<String> {
    let s = normalize_text(raw);
    if s.is_empty() || HEADCOUNT_RE.is_match(&s) {
        return None;
    }
    let without_parens = PAREN_RE.replace_all(&s, "");
    let compact: String = without_parens.chars().filter(|c| !c.is_whitespace()).collect();
    AMOUNT_RE
        .find(&compact)
        .map(|m| truncate_chars(m.as_str(), AMOUNT_MAX_CHARS))
}

/// Fiscal closing month as `N月`.
#[must_use]
pub fn clean_fiscal_month(raw: &str) -> Option<String> {
    let s = normalize_text(raw).replace(['期', '末'], "月");
    if s.is_empty() {
        return None;
    }
    if let Some(caps) = QUARTER_RE.captures(&s) {
        let q = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let month = match q {
            "1" => 3,
            "2" => 6,
            "3" => 9,
            _ => 12,
        };
        return Some(format!("{month}月"));
    }
    let caps = MONTH_RE.captures(&s)?;
    let month: u32 = caps[1].parse().ok()?;
    Some(format!("{month}月"))
}

/// Four-digit founding year.
#[must_use]
pub fn clean_founded_year(raw: &str) -> Option<String> {
    let s = normalize_text(raw);
    YEAR_RE.find(&s).map(|m| m.as_str().to_string())
}

#[cfg(test)]
#[path = "fields_test.rs"]
mod tests;
