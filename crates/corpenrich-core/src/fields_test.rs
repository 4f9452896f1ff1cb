use super::*;

// ---------------------------------------------------------------------------
// Phone
// ---------------------------------------------------------------------------

#[test]
fn format_phone_digits_by_area_code() {
    assert_eq!(format_phone_digits("0312345678").as_deref(), Some("03-1234-5678"));
    assert_eq!(format_phone_digits("0453831611").as_deref(), Some("045-383-1611"));
    assert_eq!(format_phone_digits("09012345678").as_deref(), Some("090-1234-5678"));
    assert_eq!(format_phone_digits("0120123456").as_deref(), Some("0120-123-456"));
    assert_eq!(format_phone_digits("312345678"), None);
}

#[test]
fn clean_phone_keeps_existing_grouping() {
    assert_eq!(clean_phone("TEL：０３－６６６７－５８００").as_deref(), Some("03-6667-5800"));
    assert_eq!(
        clean_phone("TEL:03-1234-5678 FAX:03-1111-2222").as_deref(),
        Some("03-1234-5678")
    );
}

#[test]
fn clean_phone_folds_country_code() {
    assert_eq!(clean_phone("+81 3 1234 5678").as_deref(), Some("03-1234-5678"));
}

#[test]
fn clean_phone_rejects_dummies_and_short_numbers() {
    assert_eq!(clean_phone("0123456789"), None);
    assert_eq!(clean_phone("1234-5678"), None);
    assert_eq!(clean_phone(""), None);
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

#[test]
fn normalize_address_strips_contact_info() {
    let raw = "〒747-0054 東京都大田区羽田空港1-2-3 SKYビル TEL:03-1234-5678 FAX.03-9876-5432";
    assert_eq!(normalize_address(raw), "〒747-0054 東京都大田区羽田空港1-2-3 SKYビル");
}

#[test]
fn normalize_address_cuts_map_instructions() {
    let raw = "〒100-0001 東京都千代田区1-1-1 ビルディング → JR東京駅より徒歩5分 アクセスマップはこちら";
    assert_eq!(normalize_address(raw), "〒100-0001 東京都千代田区1-1-1 ビルディング");
}

#[test]
fn looks_like_address_accepts_block_number_without_chome() {
    assert!(looks_like_address("京都市下京区和気町21-1"));
    assert!(looks_like_address("〒150-0001 東京都渋谷区神宮前1-2-3"));
}

#[test]
fn looks_like_address_rejects_labels_and_json() {
    assert!(!looks_like_address("会社概要"));
    assert!(!looks_like_address(
        r#"〒633-2164 \"businessPostalCode\":\"633-2164\""#
    ));
}

#[test]
fn clean_address_removes_labels_and_form_noise() {
    assert_eq!(
        clean_address("本社所在地：〒100-0001 東京都千代田区千代田1-1").as_deref(),
        Some("〒100-0001 東京都千代田区千代田1-1")
    );
    assert_eq!(clean_address("郵便番号 半角で入力"), None);
    assert_eq!(clean_address("住所検索"), None);
}

#[test]
fn sanitize_input_address_keeps_first_postal_block() {
    let raw = "〒104-8147 東京都中央区銀座2-12-16 A棟 〒104-8148 東京都中央区銀座2-12-18 B棟";
    let out = sanitize_input_address(raw);
    assert!(out.contains("〒104-8147"));
    assert!(!out.contains("〒104-8148"));
}

#[test]
fn sanitize_input_address_cuts_trailing_noise() {
    assert_eq!(
        sanitize_input_address("〒381-2281 長野県長野市市場3-48 代表番号"),
        "〒381-2281 長野県長野市市場3-48"
    );
    assert_eq!(
        sanitize_input_address("〒581-0000 大阪府八尾市恩智1447番地 Google"),
        "〒581-0000 大阪府八尾市恩智1447番地"
    );
}

#[test]
fn sanitize_input_address_rejects_non_address() {
    assert_eq!(sanitize_input_address("執行役員 田中 太郎"), "");
}

// ---------------------------------------------------------------------------
// Profile fields
// ---------------------------------------------------------------------------

#[test]
fn description_rejects_directory_blurb() {
    let raw = "【ドラエバーしようぜ！】運送・物流企業の総合データベースサイト、ドラマッチ、登録企業詳細ページです。";
    assert_eq!(clean_description(raw), None);
}

#[test]
fn description_picks_first_business_sentence() {
    let raw = "配送・運送事業を中心にサービスを提供しています。採用情報はこちら。";
    assert_eq!(
        clean_description(raw).as_deref(),
        Some("配送・運送事業を中心にサービスを提供しています")
    );
}

#[test]
fn description_skips_philosophy_sentences() {
    let raw = "私たちの経営理念は誠実な事業運営です。当社は精密部品の製造と販売を行っています。";
    assert_eq!(
        clean_description(raw).as_deref(),
        Some("当社は精密部品の製造と販売を行っています")
    );
}

#[test]
fn listing_accepts_market_names_and_codes() {
    assert_eq!(clean_listing("東証プライム").as_deref(), Some("東証プライム"));
    assert_eq!(clean_listing("7203").as_deref(), Some("7203"));
    assert_eq!(clean_listing("上場（東証）です。"), None);
    assert_eq!(clean_listing("お問い合わせ"), None);
}

#[test]
fn amount_requires_unit_and_rejects_headcount() {
    assert_eq!(clean_amount("従業員200名"), None);
    assert_eq!(clean_amount("1.2億円（2024年）").as_deref(), Some("1.2億円"));
    assert_eq!(clean_amount("3,000万円").as_deref(), Some("3,000万円"));
    assert_eq!(clean_amount("1億2000万円").as_deref(), Some("1億2000万円"));
    assert_eq!(clean_amount("非公開"), None);
}

#[test]
fn fiscal_month_handles_quarters_and_suffixes() {
    assert_eq!(clean_fiscal_month("Q4").as_deref(), Some("12月"));
    assert_eq!(clean_fiscal_month("3月期").as_deref(), Some("3月"));
    assert_eq!(clean_fiscal_month("毎年09月末").as_deref(), Some("9月"));
    assert_eq!(clean_fiscal_month("未定"), None);
}

#[test]
fn founded_year_extracts_four_digits() {
    assert_eq!(clean_founded_year("創業: 1998年").as_deref(), Some("1998"));
    assert_eq!(clean_founded_year("昭和34年"), None);
}
