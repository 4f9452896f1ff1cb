//! Company-name signals from a page's title, headings and meta tags.

use std::sync::LazyLock;

use corpenrich_core::text::{collapse_ws, fold_width};
use regex::Regex;
use serde::Serialize;
use strsim::normalized_levenshtein;

use crate::html::HtmlFacts;

/// Legal-entity markers removed before names are compared.
const CORP_MARKERS: [&str; 22] = [
    "特定非営利活動法人",
    "一般社団法人",
    "一般財団法人",
    "公益社団法人",
    "公益財団法人",
    "社会福祉法人",
    "独立行政法人",
    "株式会社",
    "有限会社",
    "合同会社",
    "合資会社",
    "合名会社",
    "医療法人",
    "学校法人",
    "宗教法人",
    "NPO法人",
    "(株)",
    "(有)",
    "(同)",
    "㈱",
    "㈲",
    "Co.,Ltd.",
];

static TITLE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?://|\||｜|/| - |:|：)\s*").expect("valid regex"));
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\s\-‐―–—|｜/:：,，.。・･…()（）\[\]【】<>＜＞「」]+").expect("valid regex")
});

/// Partial containment alone never scores above this.
pub const PARTIAL_ONLY_CAP: f64 = 0.69;
/// Cap for partial matches of very short company names.
const SHORT_NAME_CAP: f64 = 0.4;
const SHORT_NAME_CHARS: usize = 2;
const MIN_PARTIAL_CHARS: usize = 3;
const BODY_HEAD_CHARS: usize = 240;

/// Company name with legal-entity markers, whitespace and punctuation removed.
#[must_use]
pub fn normalize_company_name(name: &str) -> String {
    let mut s = fold_width(name);
    for marker in CORP_MARKERS {
        s = s.replace(marker, "");
    }
    PUNCT_RE.replace_all(&s, "").into_owned()
}

/// Where a name signal was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Title,
    H1,
    OgSiteName,
    OgTitle,
    AppName,
    BodyHead,
}

/// Name-bearing strings of one page.
#[derive(Debug, Clone, Default)]
pub struct NameSignals {
    pub signals: Vec<(SignalSource, String)>,
}

impl NameSignals {
    #[must_use]
    pub fn from_facts(facts: &HtmlFacts) -> Self {
        let mut signals = Vec::new();
        for (source, raw) in [
            (SignalSource::Title, &facts.title),
            (SignalSource::H1, &facts.h1),
            (SignalSource::OgSiteName, &facts.og_site_name),
            (SignalSource::OgTitle, &facts.og_title),
            (SignalSource::AppName, &facts.app_name),
        ] {
            if !raw.trim().is_empty() {
                signals.push((source, raw.trim().to_string()));
            }
        }
        let head: String = collapse_ws(&facts.main_text)
            .chars()
            .take(BODY_HEAD_CHARS)
            .collect();
        if !head.is_empty() {
            signals.push((SignalSource::BodyHead, head));
        }
        Self { signals }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameMatch {
    pub ratio: f64,
    pub exact: bool,
    pub partial_only: bool,
    pub source: Option<SignalSource>,
    pub candidate: String,
}

fn split_title_like(raw: &str) -> Vec<String> {
    let folded = fold_width(raw);
    let parts: Vec<String> = TITLE_SPLIT_RE
        .split(folded.trim())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if parts.is_empty() {
        vec![folded.trim().to_string()]
    } else {
        parts
    }
}

/// Best similarity between the company name and any signal part.
#[must_use]
pub fn score_name_match(company_name: &str, signals: &NameSignals) -> NameMatch {
    let company = normalize_company_name(company_name);
    let company_len = company.chars().count();
    let mut best = NameMatch {
        ratio: 0.0,
        exact: false,
        partial_only: false,
        source: None,
        candidate: String::new(),
    };
    if company.is_empty() {
        return best;
    }

    for (source, raw) in &signals.signals {
        for part in split_title_like(raw) {
            let cand = normalize_company_name(&part);
            if cand.is_empty() {
                continue;
            }
            let exact = cand == company;
            let partial = !exact && (cand.contains(&company) || company.contains(&cand));
            let mut ratio = normalized_levenshtein(&company, &cand);
            if partial && company_len >= MIN_PARTIAL_CHARS && cand.chars().count() >= MIN_PARTIAL_CHARS
            {
                ratio = ratio.min(PARTIAL_ONLY_CAP);
            }
            if exact {
                ratio = 1.0;
            }
            if ratio > best.ratio {
                best = NameMatch {
                    ratio,
                    exact,
                    partial_only: partial,
                    source: Some(*source),
                    candidate: part,
                };
            }
        }
    }

    if company_len <= SHORT_NAME_CHARS && best.partial_only {
        best.ratio = best.ratio.min(SHORT_NAME_CAP);
    }
    best
}
