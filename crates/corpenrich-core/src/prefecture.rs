//! Prefecture lookup and coarse address-shape checks.

use std::sync::LazyLock;

use regex::Regex;

pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県", "茨城県", "栃木県",
    "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県", "新潟県", "富山県", "石川県", "福井県",
    "山梨県", "長野県", "岐阜県", "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府",
    "兵庫県", "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県", "徳島県",
    "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県",
    "鹿児島県", "沖縄県",
];

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3}-\d{4}").expect("valid regex"));
static CITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\s\d]{1,8}?(市|区|町|村|郡)").expect("valid regex"));

/// Returns the prefecture that appears earliest in `address`, if any.
#[must_use]
pub fn find_prefecture(address: &str) -> Option<&'static str> {
    PREFECTURES
        .iter()
        .filter_map(|p| address.find(p).map(|idx| (idx, *p)))
        .min_by_key(|(idx, _)| *idx)
        .map(|(_, p)| p)
}

/// `true` when the (normalized) address carries a `NNN-NNNN` postal code.
#[must_use]
pub fn has_zip(address: &str) -> bool {
    ZIP_RE.is_match(address)
}

/// `true` when the address names a city, ward, town, village or district.
#[must_use]
pub fn has_city(address: &str) -> bool {
    CITY_RE.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_prefecture_anywhere_in_address() {
        assert_eq!(find_prefecture("〒530-0001 大阪府大阪市北区1-1-1"), Some("大阪府"));
        assert_eq!(find_prefecture("京都府京都市下京区"), Some("京都府"));
        assert_eq!(find_prefecture("東京都中央区"), Some("東京都"));
        assert_eq!(find_prefecture("〒210-0002 川崎市川崎区榎町5番14号"), None);
    }

    #[test]
    fn zip_and_city_detection() {
        assert!(has_zip("〒100-0001 東京都千代田区"));
        assert!(!has_zip("東京都中央区1-1-1"));
        assert!(has_city("東京都中央区1-1-1"));
        assert!(!has_city("1-1-1"));
    }
}
