//! Representative-name cleaning.

use std::sync::LazyLock;

use corpenrich_core::prefecture::find_prefecture;
use corpenrich_core::text::{collapse_ws, fold_width};
use regex::Regex;

static ROLE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:代表取締役(?:社長|会長|副社長|専務|常務)?(?:兼\S{1,6})?|取締役社長|代表執行役(?:社長)?|代表社員|代表理事(?:長)?|理事長|代表者(?:名|氏名)?|代表|社長|会長|院長|学長|園長|所長|会頭|組合長|CEO|President)\s*(?::\s*)?",
    )
    .expect("valid regex")
});
static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)コンテンツ|キーワード|検索|メッセージ|message|あいさつ|挨拶|こちら|受付時間|一覧|文書|従業員|社員数|所在地|住所|電話|設立|資本金|事業内容|売上|お問い合わせ|お問合せ|問い合わせ|会社概要|会社情報|企業情報|ログイン|メニュー|ホーム|トップ|詳しく|詳細|採用|ニュース|理念|ビジョン|沿革|プロフィール|profile|greeting|click|more",
    )
    .expect("valid regex")
});
static ERA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"明治|大正|昭和|平成|令和").expect("valid regex"));
static COMPANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"株式会社|有限会社|合同会社|合資会社|合名会社|\(株\)|\(有\)|㈱|㈲|法人|組合|協会|会社|グループ|ホールディングス")
        .expect("valid regex")
});
static GOV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"庁|役所|役場|省$|局$").expect("valid regex"));
static ROMAJI_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[A-Za-z][A-Za-z.'\s-]*$").expect("valid regex"));
static TITLE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:代表取締役|取締役|常務|専務|社長|会長|副社長|理事長|CEO|氏|様)$").expect("valid regex")
});
static FORBIDDEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d|https?|www\.|@|[、。,.!?！？「」『』【】|｜/()]").expect("valid regex")
});

const MAX_NAME_CHARS: usize = 20;
const MAX_TOKENS: usize = 4;

fn is_kanji(c: char) -> bool {
    matches!(u32::from(c),
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2FFFF)
        || c == '々'
}

fn is_hiragana(c: char) -> bool {
    ('\u{3041}'..='\u{309F}').contains(&c)
}

fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c)
}

fn is_name_char(c: char) -> bool {
    is_kanji(c) || is_hiragana(c) || is_katakana(c) || c.is_ascii_alphabetic() || c == ' '
}

fn has_japanese(s: &str) -> bool {
    s.chars().any(|c| is_kanji(c) || is_hiragana(c) || is_katakana(c))
}

fn strip_role_prefix(s: &str) -> String {
    let mut cur = s.to_string();
    for _ in 0..2 {
        let next = ROLE_PREFIX_RE.replace(&cur, "").trim().to_string();
        if next == cur {
            break;
        }
        cur = next;
    }
    cur
}

fn join_single_kanji_tokens(s: &str) -> String {
    let tokens: Vec<&str> = s.split(' ').collect();
    let single_kanji = |t: &&str| {
        let mut chars = t.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if is_kanji(c))
    };
    if tokens.len() >= 3 && tokens.iter().all(single_kanji) {
        tokens.concat()
    } else {
        s.to_string()
    }
}

/// Clean a representative-name candidate, or reject it.
///
/// Strips a leading role label, a trailing short title and a trailing
/// romaji transliteration. Rejects labels, headings, call-to-action text,
/// era dates, company and government office names, and anything that is
/// not made of name characters.
#[must_use]
pub fn clean_rep_name(raw: &str) -> Option<String> {
    let s = collapse_ws(&fold_width(raw));
    if s.is_empty() || NOISE_RE.is_match(&s) {
        return None;
    }

    let mut name = strip_role_prefix(&s);
    if name.is_empty() || NOISE_RE.is_match(&name) {
        return None;
    }
    if has_japanese(&name) {
        name = ROMAJI_TAIL_RE.replace(&name, "").trim().to_string();
    }
    let without_title = TITLE_SUFFIX_RE.replace(&name, "").trim().to_string();
    if without_title.chars().filter(|c| *c != ' ').count() >= 2 {
        name = without_title;
    }

    if ERA_RE.is_match(&name)
        || COMPANY_RE.is_match(&name)
        || GOV_RE.is_match(&name)
        || find_prefecture(&name).is_some()
        || FORBIDDEN_RE.is_match(&name)
    {
        return None;
    }
    if !name.chars().all(|c| is_name_char(c) || c == '・' || c == 'ー') {
        return None;
    }
    let katakana_only = name
        .chars()
        .filter(|c| *c != ' ')
        .all(|c| is_katakana(c) || c == 'ー');
    if katakana_only && !name.contains('・') {
        return None;
    }

    let name = join_single_kanji_tokens(&name);
    let char_count = name.chars().filter(|c| *c != ' ').count();
    if !(2..=MAX_NAME_CHARS).contains(&char_count) || name.split(' ').count() > MAX_TOKENS {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_role_and_folds_radicals() {
        assert_eq!(clean_rep_name("社⻑：熊⾕ 弘司").as_deref(), Some("熊谷 弘司"));
        assert_eq!(
            clean_rep_name("代表取締役社長 山田 太郎").as_deref(),
            Some("山田 太郎")
        );
    }

    #[test]
    fn strips_romaji_tail_and_short_title() {
        assert_eq!(
            clean_rep_name("代表取締役社長 蕪竹 理江 Rie Kabutake").as_deref(),
            Some("蕪竹 理江")
        );
        assert_eq!(clean_rep_name("黒滝 寛 常務").as_deref(), Some("黒滝 寛"));
    }

    #[test]
    fn joins_names_written_one_kanji_per_space() {
        assert_eq!(clean_rep_name("喜 納 秀 智").as_deref(), Some("喜納秀智"));
        assert_eq!(clean_rep_name("鶴 篤").as_deref(), Some("鶴 篤"));
    }

    #[test]
    fn accepts_real_names() {
        for name in [
            "室田 博夫",
            "𠮷住 大樹",
            "佐々木太郎",
            "やまだ たろう",
            "やまだ・たろう",
            "ジョン・スミス",
        ] {
            assert_eq!(clean_rep_name(name).as_deref(), Some(name), "{name}");
        }
    }

    #[test]
    fn rejects_labels_headings_and_cta() {
        for raw in [
            "代表者",
            "代表者あいさつ",
            "代表ごあいさつはこちらへ",
            "代表ご挨拶はこちら",
            "代表メッセージはこちら",
            "トップメッセージ",
            "TOP MESSAGE",
            "トップﾒｯｾｰｼﾞ",
            "従業員数",
            "コンテンツ",
            "コンテンツ キーワード",
            "キーワード: 検索",
            "キーワード：検索",
            "検索",
            "受付時間 月",
            "ビジネス文書一覧",
            "ビジネス文書一覧｜株式会社サンプル",
        ] {
            assert_eq!(clean_rep_name(raw), None, "{raw}");
        }
    }

    #[test]
    fn rejects_era_dates_offices_and_companies() {
        for raw in [
            "昭和34年10月",
            "令和5年",
            "平成",
            "千葉県庁",
            "東京都庁",
            "渋谷区役所",
            "株式会社宝輪",
            "ヤマダ タロウ",
            "信頼を、ひとのなかへ。",
            "03-1234-5678",
        ] {
            assert_eq!(clean_rep_name(raw), None, "{raw}");
        }
    }
}
