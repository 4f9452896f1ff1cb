//! Ranking same-site links worth following from a homepage.
//!
//! Every link gets four category scores (profile, contact, access and
//! message pages) from its anchor text and path. A focus weights those
//! categories; several focuses add their weights up.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::html::Anchor;
use crate::officiality::registrable_domain;

/// What the caller still needs from the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkFocus {
    Profile,
    Contact,
    Phone,
    Address,
    Rep,
}

impl LinkFocus {
    /// Weights for (profile, contact, access, message) pages.
    fn weights(self) -> [f64; 4] {
        match self {
            LinkFocus::Profile => [1.0, 0.0, 0.2, 0.2],
            LinkFocus::Contact => [0.0, 1.0, 0.3, 0.0],
            LinkFocus::Phone => [0.6, 1.0, 0.5, 0.0],
            LinkFocus::Address => [0.6, 0.3, 1.0, 0.0],
            LinkFocus::Rep => [1.0, 0.0, 0.0, 0.7],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedLink {
    pub url: String,
    pub score: f64,
}

struct Lexicon {
    text: &'static [(&'static str, f64)],
    path_tokens: &'static [&'static str],
    path_points: f64,
}

const PROFILE: Lexicon = Lexicon {
    text: &[
        ("会社概要", 12.0),
        ("企業概要", 12.0),
        ("会社情報", 8.0),
        ("企業情報", 8.0),
        ("会社案内", 8.0),
        ("法人概要", 8.0),
        ("about", 6.0),
        ("company", 6.0),
        ("corporate", 6.0),
    ],
    path_tokens: &[
        "company", "corporate", "about", "outline", "profile", "overview", "summary", "gaiyou",
        "gaiyo", "kaisya", "kaisha", "corp",
    ],
    path_points: 5.0,
};
const CONTACT: Lexicon = Lexicon {
    text: &[
        ("お問い合わせ", 10.0),
        ("お問合せ", 10.0),
        ("お問い合せ", 10.0),
        ("問い合わせ", 10.0),
        ("contact", 10.0),
        ("inquiry", 10.0),
    ],
    path_tokens: &["contact", "inquiry", "enquiry", "toiawase", "otoiawase", "form"],
    path_points: 5.0,
};
const ACCESS: Lexicon = Lexicon {
    text: &[
        ("アクセス", 10.0),
        ("交通案内", 10.0),
        ("所在地", 10.0),
        ("地図", 8.0),
        ("access", 10.0),
    ],
    path_tokens: &["access", "map", "location"],
    path_points: 5.0,
};
const MESSAGE: Lexicon = Lexicon {
    text: &[
        ("ごあいさつ", 6.0),
        ("ご挨拶", 6.0),
        ("挨拶", 6.0),
        ("メッセージ", 6.0),
        ("代表者", 6.0),
        ("message", 6.0),
        ("greeting", 6.0),
    ],
    path_tokens: &["message", "greeting", "aisatsu", "president", "ceo"],
    path_points: 3.0,
};

static PENALTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)recruit|career|採用|求人|entry|privacy|policy|sitemap|login|cart|news|blog")
        .expect("valid regex")
});
static SKIP_EXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:pdf|jpe?g|png|gif|svg|webp|zip|docx?|xlsx?|pptx?|mp4|mp3)$")
        .expect("valid regex")
});

const PENALTY: f64 = 10.0;

fn path_tokens(path: &str) -> Vec<String> {
    path.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn lexicon_score(lexicon: &Lexicon, text: &str, tokens: &[String]) -> f64 {
    let lower = text.to_lowercase();
    let text_points = lexicon
        .text
        .iter()
        .filter(|(word, _)| lower.contains(word))
        .map(|(_, points)| *points)
        .fold(0.0, f64::max);
    let path_hit = tokens
        .iter()
        .any(|t| lexicon.path_tokens.contains(&t.as_str()));
    text_points + if path_hit { lexicon.path_points } else { 0.0 }
}

fn same_site(base: &Url, link: &Url) -> bool {
    match (base.host_str(), link.host_str()) {
        (Some(a), Some(b)) => registrable_domain(a) == registrable_domain(b),
        _ => false,
    }
}

fn score_link(text: &str, url: &Url, focus: &[LinkFocus]) -> f64 {
    let tokens = path_tokens(url.path());
    let categories = [
        lexicon_score(&PROFILE, text, &tokens),
        lexicon_score(&CONTACT, text, &tokens),
        lexicon_score(&ACCESS, text, &tokens),
        lexicon_score(&MESSAGE, text, &tokens),
    ];
    let mut score: f64 = focus
        .iter()
        .map(|f| {
            f.weights()
                .iter()
                .zip(categories.iter())
                .map(|(w, c)| w * c)
                .sum::<f64>()
        })
        .sum();
    if PENALTY_RE.is_match(text) || PENALTY_RE.is_match(url.path()) {
        score -= PENALTY;
    }
    score
}

/// Rank same-site anchors for `focus`, best first. Links that score
/// nothing are dropped; a URL that appears more than once keeps its best
/// score.
#[must_use]
pub fn rank_anchors(base_url: &str, anchors: &[Anchor], focus: &[LinkFocus]) -> Vec<RankedLink> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let mut ranked: Vec<RankedLink> = Vec::new();
    for anchor in anchors {
        let href = anchor.href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(mut url) = base.join(href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") || !same_site(&base, &url) {
            continue;
        }
        if SKIP_EXT_RE.is_match(url.path()) {
            continue;
        }
        url.set_fragment(None);
        let score = score_link(&anchor.text, &url, focus);
        if score <= 0.0 {
            continue;
        }
        let url = url.to_string();
        match ranked.iter_mut().find(|r| r.url == url) {
            Some(existing) => existing.score = existing.score.max(score),
            None => ranked.push(RankedLink { url, score }),
        }
    }
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
