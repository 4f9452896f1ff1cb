//! Label lexicons shared by extraction and page classification.

use std::sync::LazyLock;

use regex::Regex;

use crate::candidate::ContextTag;

static REP_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:代表者(?:名|氏名)?|代表取締役(?:社長|会長)?|代表社員|代表理事(?:長)?|理事長|代表|社長|CEO|院長|学長|園長|会頭|組合長)$")
        .expect("valid regex")
});
static ADDRESS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"所在地|住所|本社|本店|所在|アクセス|支店|営業所|工場|事業所|拠点").expect("valid regex")
});
static PHONE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tel|電話|代表番号|連絡先").expect("valid regex")
});
static FAX_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)fax|ファックス|ファクス").expect("valid regex"));
static PROFILE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:会社名|商号|社名|名称|設立|創業|創立|資本金|従業員数?|社員数|事業内容|営業品目|売上高?|年商|決算(?:期|月)?|取引銀行|主要取引先|許可|免許|URL|ホームページ|E-?mail|メール|営業時間|定休日|役員|沿革|所在地|本社所在地|本店所在地|住所|本社|本店|TEL|電話番号|電話|FAX|FAX番号)$")
        .expect("valid regex")
});

const HQ_WORDS: [&str; 5] = ["本社", "本店", "本部", "代表電話", "代表番号"];
const BRANCH_WORDS: [&str; 7] = ["支店", "営業所", "工場", "店舗", "事業所", "出張所", "センター"];

fn trim_label(label: &str) -> &str {
    label.trim().trim_end_matches([':', '：']).trim()
}

/// A whole label naming the representative (`代表者`, `代表取締役社長`).
pub(crate) fn is_rep_label(label: &str) -> bool {
    REP_LABEL_RE.is_match(trim_label(label))
}

pub(crate) fn is_address_label(label: &str) -> bool {
    let l = trim_label(label);
    !is_phone_label(l) && ADDRESS_LABEL_RE.is_match(l)
}

pub(crate) fn is_phone_label(label: &str) -> bool {
    PHONE_LABEL_RE.is_match(trim_label(label))
}

/// FAX without any TEL wording alongside it.
pub(crate) fn is_fax_only_label(label: &str) -> bool {
    let l = trim_label(label);
    FAX_LABEL_RE.is_match(l) && !PHONE_LABEL_RE.is_match(l)
}

pub(crate) fn mentions_fax(s: &str) -> bool {
    FAX_LABEL_RE.is_match(s)
}

/// Any company-profile field label, used to stop a bare label from
/// swallowing the next label as its value.
pub(crate) fn is_profile_label(line: &str) -> bool {
    let l = trim_label(line);
    PROFILE_LABEL_RE.is_match(l) || is_rep_label(l)
}

/// Context tags implied by a label or the text just before a value.
pub(crate) fn context_tags(label: &str) -> Vec<ContextTag> {
    let mut tags = Vec::new();
    if HQ_WORDS.iter().any(|w| label.contains(w)) {
        tags.push(ContextTag::Hq);
    }
    let rep_word = label
        .replace("代表電話", "")
        .replace("代表番号", "")
        .contains("代表");
    if rep_word {
        tags.push(ContextTag::Rep);
    }
    if BRANCH_WORDS.iter().any(|w| label.contains(w)) {
        tags.push(ContextTag::Branch);
    }
    if label.contains("経理") {
        tags.push(ContextTag::Keiri);
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tags_from_labels() {
        assert_eq!(context_tags("本社 代表電話: "), vec![ContextTag::Hq]);
        assert_eq!(context_tags("代表"), vec![ContextTag::Rep]);
        assert_eq!(context_tags("大阪営業所"), vec![ContextTag::Branch]);
        assert_eq!(context_tags("経理部"), vec![ContextTag::Keiri]);
        assert!(context_tags("電話番号").is_empty());
    }

    #[test]
    fn label_lexicons() {
        assert!(is_rep_label("代表者"));
        assert!(is_rep_label("代表取締役:"));
        assert!(!is_rep_label("代表者あいさつ"));
        assert!(is_address_label("本社所在地"));
        assert!(!is_address_label("本社TEL"));
        assert!(is_phone_label("TEL/FAX"));
        assert!(is_fax_only_label("FAX番号"));
        assert!(!is_fax_only_label("TEL/FAX"));
        assert!(is_profile_label("従業員数"));
        assert!(!is_profile_label("鶴 篤"));
    }
}
