//! Candidate extraction as an ordered list of named rules.
//!
//! Rules run in [`Rule::ALL`] order. When two rules produce the same value
//! for the same field, the earlier rule's provenance is kept.

mod address;
mod labels;
mod phone;
mod rep;

use std::collections::HashSet;
use std::sync::LazyLock;

use corpenrich_core::fields::{looks_like_address, normalize_address};
use corpenrich_core::text::normalize_lines;
use corpenrich_core::PageType;
use regex::Regex;
use serde::Serialize;

use crate::candidate::{Candidate, ContextTag, Field, Provenance, SourceTag};
use crate::html::{analyze_html, clean_text_from_facts, HtmlFacts};
use crate::jsonld::extract_organizations;

pub use phone::normalize_phone;
pub use rep::clean_rep_name;

pub(crate) use address::find_addresses;
pub(crate) use labels::{
    context_tags, is_address_label, is_phone_label, is_profile_label, is_rep_label,
};
pub(crate) use phone::find_phones;

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:代表取締役(?:社長|会長)?|代表執行役(?:社長)?|代表社員|代表理事(?:長)?|理事長|代表者|取締役社長)[ \t]*[:：]?[ \t]*([^\n]{1,40})",
    )
    .expect("valid regex")
});
static NEXT_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s(?:所在地|住所|本社|本店|TEL|電話|FAX|設立|創業|資本金|従業員|事業内容|売上|〒|URL|E-?mail)")
        .expect("valid regex")
});
static INLINE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s:：]{1,12}?)(?:\s*[:：]\s*|\s+)(.+)$").expect("valid regex")
});

/// Characters of text before a phone match used for context tags.
const CONTEXT_WINDOW_CHARS: usize = 16;
/// Longest raw text kept as address evidence.
const EVIDENCE_MAX_CHARS: usize = 120;

/// One extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    JsonLd,
    TelHref,
    Table,
    LabelLines,
    Footer,
    TextPhone,
    TextAddress,
    RoleRep,
}

impl Rule {
    pub const ALL: [Rule; 8] = [
        Rule::JsonLd,
        Rule::TelHref,
        Rule::Table,
        Rule::LabelLines,
        Rule::Footer,
        Rule::TextPhone,
        Rule::TextAddress,
        Rule::RoleRep,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Rule::JsonLd => "jsonld",
            Rule::TelHref => "tel_href",
            Rule::Table => "table",
            Rule::LabelLines => "label_lines",
            Rule::Footer => "footer",
            Rule::TextPhone => "text_phone",
            Rule::TextAddress => "text_address",
            Rule::RoleRep => "role_rep",
        }
    }
}

/// What one page offers to the rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    /// Normalized, line-structured page text.
    pub text: &'a str,
    pub html: Option<&'a str>,
    pub facts: Option<&'a HtmlFacts>,
}

/// Per-field candidate lists in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedCandidates {
    pub phones: Vec<Candidate>,
    pub addresses: Vec<Candidate>,
    pub rep_names: Vec<Candidate>,
}

impl ExtractedCandidates {
    #[must_use]
    pub fn len(&self) -> usize {
        self.phones.len() + self.addresses.len() + self.rep_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tag every candidate with the page it came from.
    #[must_use]
    pub fn with_page(self, url: &str, page_type: PageType) -> Self {
        let tag = |list: Vec<Candidate>| {
            list.into_iter()
                .map(|c| c.with_page(url, page_type))
                .collect()
        };
        Self {
            phones: tag(self.phones),
            addresses: tag(self.addresses),
            rep_names: tag(self.rep_names),
        }
    }

    /// Append another page's candidates.
    pub fn extend(&mut self, other: ExtractedCandidates) {
        self.phones.extend(other.phones);
        self.addresses.extend(other.addresses);
        self.rep_names.extend(other.rep_names);
    }

    fn push(&mut self, seen: &mut HashSet<(Field, String)>, candidate: Candidate) {
        if candidate.value.trim().is_empty()
            || !seen.insert((candidate.field, candidate.value.clone()))
        {
            return;
        }
        match candidate.field {
            Field::Phone => self.phones.push(candidate),
            Field::Address => self.addresses.push(candidate),
            Field::RepName => self.rep_names.push(candidate),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn context_before(line: &str, offset: usize) -> Vec<ContextTag> {
    let head = &line[..offset];
    let skip = head.chars().count().saturating_sub(CONTEXT_WINDOW_CHARS);
    let window = head.char_indices().nth(skip).map_or(head, |(i, _)| &head[i..]);
    context_tags(window)
}

fn phone_candidates(line: &str, source: SourceTag, extra: &[ContextTag]) -> Vec<Candidate> {
    find_phones(line)
        .into_iter()
        .map(|(phone, offset)| {
            let mut ctx = extra.to_vec();
            for tag in context_before(line, offset) {
                if !ctx.contains(&tag) {
                    ctx.push(tag);
                }
            }
            Candidate::new(Field::Phone, phone, Provenance::new(source, ctx))
        })
        .collect()
}

/// Raw label and value text, capped at [`EVIDENCE_MAX_CHARS`].
fn raw_evidence(label: &str, value: &str) -> String {
    let joined = if label.is_empty() {
        value.trim().to_string()
    } else {
        format!("{} {}", label.trim(), value.trim())
    };
    joined.chars().take(EVIDENCE_MAX_CHARS).collect()
}

/// Address candidates found in `text`. Each carries `label` and the raw
/// `text` as evidence, before any zip or spacing normalization.
fn address_candidates(
    label: &str,
    text: &str,
    source: SourceTag,
    ctx: &[ContextTag],
    labelled: bool,
) -> Vec<Candidate> {
    let evidence = raw_evidence(label, text);
    find_addresses(text, labelled)
        .into_iter()
        .map(|a| {
            Candidate::new(Field::Address, a, Provenance::new(source, ctx.to_vec()))
                .with_evidence(evidence.as_str())
        })
        .collect()
}

fn rep_candidate(raw: &str, source: SourceTag) -> Option<Candidate> {
    clean_rep_name(raw)
        .map(|name| Candidate::new(Field::RepName, name, Provenance::new(source, Vec::new())))
}

fn apply_jsonld(input: &RuleInput<'_>) -> Vec<Candidate> {
    let Some(html) = input.html else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for org in extract_organizations(html) {
        for tel in &org.telephones {
            if let Some(phone) = normalize_phone(tel) {
                out.push(Candidate::new(
                    Field::Phone,
                    phone,
                    Provenance::new(SourceTag::JsonLd, Vec::new()),
                ));
            }
        }
        for addr in &org.addresses {
            let cleaned = normalize_address(addr);
            if looks_like_address(&cleaned) {
                out.push(
                    Candidate::new(
                        Field::Address,
                        cleaned,
                        Provenance::new(SourceTag::JsonLd, Vec::new()),
                    )
                    .with_evidence(raw_evidence("", addr)),
                );
            }
        }
        out.extend(
            org.founders
                .iter()
                .filter_map(|f| rep_candidate(f, SourceTag::JsonLd)),
        );
    }
    out
}

fn apply_tel_href(input: &RuleInput<'_>) -> Vec<Candidate> {
    input
        .facts
        .map(|f| {
            f.tel_hrefs
                .iter()
                .filter_map(|href| normalize_phone(href))
                .map(|p| {
                    Candidate::new(Field::Phone, p, Provenance::new(SourceTag::TelHref, Vec::new()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn apply_table(input: &RuleInput<'_>) -> Vec<Candidate> {
    let Some(facts) = input.facts else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for row in &facts.table_rows {
        let ctx = context_tags(&row.label);
        if !labels::is_fax_only_label(&row.label) {
            out.extend(phone_candidates(&row.value, SourceTag::Table, &ctx));
        }
        let address_label = is_address_label(&row.label);
        if address_label || row.value.contains('〒') {
            out.extend(address_candidates(
                &row.label,
                &row.value,
                SourceTag::Table,
                &ctx,
                address_label,
            ));
        }
        if is_rep_label(&row.label) {
            out.extend(rep_candidate(&row.value, SourceTag::Table));
        }
    }
    out
}

fn label_value<'t>(lines: &[&'t str], i: usize) -> Option<(&'t str, String)> {
    let line = lines[i];
    let bare = line.trim().trim_end_matches([':', '：']);
    if is_profile_label(bare) {
        let next = lines.get(i + 1)?;
        if is_profile_label(next) {
            return None;
        }
        return Some((bare, (*next).to_string()));
    }
    let caps = INLINE_LABEL_RE.captures(line)?;
    let label = caps.get(1)?.as_str();
    let value = caps.get(2)?.as_str();
    if is_rep_label(label) || is_address_label(label) || is_phone_label(label) {
        Some((label, value.to_string()))
    } else {
        None
    }
}

fn apply_label_lines(input: &RuleInput<'_>) -> Vec<Candidate> {
    let lines: Vec<&str> = input.text.lines().collect();
    let mut out = Vec::new();
    for i in 0..lines.len() {
        let Some((label, value)) = label_value(&lines, i) else {
            continue;
        };
        let ctx = context_tags(label);
        if is_rep_label(label) {
            let value = NEXT_LABEL_RE
                .find(&value)
                .map_or(value.as_str(), |m| &value[..m.start()]);
            out.extend(rep_candidate(value, SourceTag::Label));
        } else if is_phone_label(label) {
            if !labels::is_fax_only_label(label) {
                out.extend(phone_candidates(&value, SourceTag::Label, &ctx));
            }
        } else if is_address_label(label) {
            out.extend(address_candidates(label, &value, SourceTag::Label, &ctx, true));
        }
    }
    out
}

fn apply_footer(input: &RuleInput<'_>) -> Vec<Candidate> {
    let Some(facts) = input.facts else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for line in facts.footer_text.lines() {
        out.extend(phone_candidates(line, SourceTag::Footer, &[]));
        let ctx = context_tags(line);
        out.extend(address_candidates("", line, SourceTag::Footer, &ctx, false));
    }
    out
}

fn apply_text_phone(input: &RuleInput<'_>) -> Vec<Candidate> {
    input
        .text
        .lines()
        .flat_map(|line| phone_candidates(line, SourceTag::Text, &[]))
        .collect()
}

fn apply_text_address(input: &RuleInput<'_>) -> Vec<Candidate> {
    let mut out = Vec::new();
    for line in input.text.lines() {
        let ctx = context_tags(line);
        out.extend(address_candidates("", line, SourceTag::Text, &ctx, false));
    }
    out
}

fn apply_role_rep(input: &RuleInput<'_>) -> Vec<Candidate> {
    let mut out = Vec::new();
    for caps in ROLE_RE.captures_iter(input.text) {
        let Some(tail) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let value = NEXT_LABEL_RE
            .find(tail)
            .map_or(tail, |m| &tail[..m.start()]);
        out.extend(rep_candidate(value, SourceTag::Role));
    }
    out
}

/// Run one rule over a page.
#[must_use]
pub fn apply_rule(rule: Rule, input: &RuleInput<'_>) -> Vec<Candidate> {
    let found = match rule {
        Rule::JsonLd => apply_jsonld(input),
        Rule::TelHref => apply_tel_href(input),
        Rule::Table => apply_table(input),
        Rule::LabelLines => apply_label_lines(input),
        Rule::Footer => apply_footer(input),
        Rule::TextPhone => apply_text_phone(input),
        Rule::TextAddress => apply_text_address(input),
        Rule::RoleRep => apply_role_rep(input),
    };
    if !found.is_empty() {
        tracing::debug!(rule = rule.name(), hits = found.len(), "extraction rule matched");
    }
    found
}

/// Page text for extraction: the caller's text when given, else the
/// cleaned body text followed by navigation text.
fn extraction_text(text: &str, facts: Option<&HtmlFacts>) -> String {
    let given = normalize_lines(text);
    if !given.is_empty() {
        return given;
    }
    let Some(facts) = facts else {
        return String::new();
    };
    let body = clean_text_from_facts(facts);
    if facts.chrome_text.is_empty() {
        body
    } else {
        format!("{body}\n{}", facts.chrome_text)
    }
}

/// Extract tagged candidates from an already analyzed page.
#[must_use]
pub fn extract_from_facts(
    text: &str,
    html: Option<&str>,
    facts: Option<&HtmlFacts>,
    page_type_hint: Option<PageType>,
) -> ExtractedCandidates {
    let text = extraction_text(text, facts);
    let input = RuleInput {
        text: &text,
        html,
        facts,
    };

    let mut out = ExtractedCandidates::default();
    let mut seen = HashSet::new();
    for rule in Rule::ALL {
        for candidate in apply_rule(rule, &input) {
            out.push(&mut seen, candidate);
        }
    }

    if page_type_hint == Some(PageType::AccessContact) {
        out.rep_names
            .retain(|c| c.provenance.is_structured(Field::RepName));
    }
    out
}

/// Extract tagged phone, address and representative candidates from one
/// page's text and optional HTML.
#[must_use]
pub fn extract(
    text: &str,
    html: Option<&str>,
    page_type_hint: Option<PageType>,
) -> ExtractedCandidates {
    let facts = html.filter(|h| !h.trim().is_empty()).map(analyze_html);
    extract_from_facts(text, html, facts.as_ref(), page_type_hint)
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
