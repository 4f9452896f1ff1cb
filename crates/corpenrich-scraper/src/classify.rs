//! Page-type classification.
//!
//! Checks run in priority order and the first hit wins:
//! a profile table, main-body profile label lines, a list of branch
//! addresses, contact intent, and finally `OTHER`.

use std::sync::LazyLock;

use corpenrich_core::text::normalize_lines;
use corpenrich_core::PageType;
use regex::Regex;

use crate::candidate::Field;
use crate::extract::{
    apply_rule, find_addresses, find_phones, is_address_label, is_phone_label, is_rep_label, Rule,
    RuleInput,
};
use crate::html::{analyze_html, HtmlFacts};

static BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"営業所|支店|工場|事業所|店舗|拠点|センター|出張所").expect("valid regex")
});
static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"〒?\s*\d{3}-\d{4}").expect("valid regex"));
static CONTACT_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)お問い合わせ|お問合せ|お問い合せ|問い合わせ|contact|inquiry|アクセス|交通案内|地図|ご来店")
        .expect("valid regex")
});
static CONTACT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)contact|inquiry|enquiry|toiawase|otoiawase|access|/form|/map").expect("valid regex")
});

const MIN_BASES_ITEMS: usize = 3;

fn profile_table(facts: &HtmlFacts) -> bool {
    let mut address = false;
    let mut rep = false;
    let mut phone = false;
    for row in &facts.table_rows {
        address |= is_address_label(&row.label);
        rep |= is_rep_label(&row.label);
        phone |= is_phone_label(&row.label);
    }
    [address, rep, phone].iter().filter(|hit| **hit).count() >= 2
}

fn profile_label_lines(main_text: &str) -> bool {
    let input = RuleInput {
        text: main_text,
        html: None,
        facts: None,
    };
    let hits = apply_rule(Rule::LabelLines, &input);
    let has = |field| hits.iter().any(|c| c.field == field);
    has(Field::RepName) && (has(Field::Address) || has(Field::Phone))
}

fn bases_list(facts: &HtmlFacts) -> bool {
    facts
        .list_items
        .iter()
        .filter(|item| BRANCH_RE.is_match(item) && ZIP_RE.is_match(item))
        .count()
        >= MIN_BASES_ITEMS
}

fn contact_intent(url: &str, main_text: &str, all_text: &str, facts: Option<&HtmlFacts>) -> bool {
    if let Some(f) = facts {
        if CONTACT_WORDS_RE.is_match(&f.title)
            || f.headings.iter().any(|h| CONTACT_WORDS_RE.is_match(h))
            || f.has_form
        {
            return true;
        }
    }
    let path = url::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string());
    CONTACT_WORDS_RE.is_match(main_text)
        || CONTACT_PATH_RE.is_match(&path)
        || !find_phones(all_text).is_empty()
        || !find_addresses(all_text, false).is_empty()
}

/// Classify an already analyzed page.
#[must_use]
pub fn classify_facts(url: &str, text: &str, facts: Option<&HtmlFacts>) -> PageType {
    let given = normalize_lines(text);
    let main_text = match facts {
        Some(f) if given.is_empty() => f.main_text.clone(),
        _ => given.clone(),
    };
    let all_text = match facts {
        Some(f) if given.is_empty() => f.full_text.clone(),
        Some(f) => format!("{given}\n{}", f.full_text),
        None => given,
    };

    if facts.is_some_and(profile_table) || profile_label_lines(&main_text) {
        return PageType::CompanyProfile;
    }
    if facts.is_some_and(bases_list) {
        return PageType::BasesList;
    }
    if contact_intent(url, &main_text, &all_text, facts) {
        return PageType::AccessContact;
    }
    PageType::Other
}

/// Classify one page from its URL, visible text and optional HTML.
#[must_use]
pub fn classify(url: &str, text: &str, html: Option<&str>) -> PageType {
    let facts = html.filter(|h| !h.trim().is_empty()).map(analyze_html);
    let page_type = classify_facts(url, text, facts.as_ref());
    tracing::debug!(url, page_type = %page_type, "classified page");
    page_type
}
