//! Host and path heuristics for a homepage candidate.

use corpenrich_core::text::fold_width;
use url::Url;

use super::exclude::is_soft_suspect;

/// Second-level labels under `.jp` that form one public suffix with it.
const JP_COMPOUND_SUFFIXES: [&str; 8] = ["co", "or", "ne", "ac", "go", "lg", "ed", "gr"];

/// Host tokens shorter than this never count as a name match.
const MIN_TOKEN_LEN: usize = 3;

/// Path depth at or below which a URL counts as a site root.
const SHALLOW_PATH_DEPTH: usize = 1;
/// Path depth above which a URL looks like a detail page.
const DEEP_PATH_DEPTH: usize = 3;

/// Lower-cased host without a leading `www.`.
#[must_use]
pub fn bare_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map_or(host.clone(), str::to_string)
}

/// Registrable domain of `host`: the label in front of the public suffix
/// plus the suffix itself, e.g. `example.co.jp` for `www.shop.example.co.jp`.
#[must_use]
pub fn registrable_domain(host: &str) -> String {
    let host = bare_host(host);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let n = labels.len();
    let keep = if n >= 3 && labels[n - 1] == "jp" && JP_COMPOUND_SUFFIXES.contains(&labels[n - 2])
    {
        3
    } else {
        2
    };
    labels[n.saturating_sub(keep)..].join(".")
}

/// `true` for hosts under one of the compound `.jp` suffixes.
#[must_use]
pub fn is_jp_compound(host: &str) -> bool {
    let reg = registrable_domain(host);
    JP_COMPOUND_SUFFIXES
        .iter()
        .any(|s| reg.ends_with(&format!(".{s}.jp")))
}

/// ASCII tokens of the host's non-suffix labels, split on `-` and digits.
#[must_use]
pub fn host_tokens(host: &str) -> Vec<String> {
    let host = bare_host(host);
    let reg = registrable_domain(&host);
    let suffix_labels = reg.split('.').count() - 1;
    let labels: Vec<&str> = host.split('.').collect();
    let keep = labels.len().saturating_sub(suffix_labels);
    labels[..keep]
        .iter()
        .flat_map(|l| l.split(|c: char| c == '-' || c.is_ascii_digit()))
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Lower-cased ASCII words of a company name, e.g. `abc` and `systems`
/// for `ABC Systems株式会社`.
#[must_use]
pub fn company_ascii_tokens(company_name: &str) -> Vec<String> {
    fold_width(company_name)
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && t.chars().any(|c| c.is_ascii_alphabetic()))
        .map(str::to_string)
        .collect()
}

/// `true` when a host token and an ASCII word of the company name
/// contain one another.
#[must_use]
pub fn host_token_match(host: &str, company_name: &str) -> bool {
    let name_tokens = company_ascii_tokens(company_name);
    if name_tokens.is_empty() {
        return false;
    }
    let joined = name_tokens.concat();
    host_tokens(host).iter().any(|h| {
        name_tokens
            .iter()
            .any(|n| h.contains(n.as_str()) || n.contains(h.as_str()))
            || (h.len() > MIN_TOKEN_LEN && joined.contains(h.as_str()))
    })
}

fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map_or(0, |segs| segs.filter(|s| !s.is_empty()).count())
}

/// Heuristic score for how much a URL looks like a company's own site.
///
/// Compound `.jp` suffixes add 2 and other `.jp` hosts 1; a host token
/// matching the company name adds 3; a root-level path adds 1 and a deep
/// path subtracts 1; free-hosting and blog hosts subtract 3.
#[must_use]
pub fn domain_score(url: &Url, company_name: &str) -> i32 {
    let Some(host) = url.host_str() else {
        return 0;
    };
    let mut score = 0;
    if is_jp_compound(host) {
        score += 2;
    } else if bare_host(host).ends_with(".jp") {
        score += 1;
    }
    if host_token_match(host, company_name) {
        score += 3;
    }
    let depth = path_depth(url);
    if depth <= SHALLOW_PATH_DEPTH {
        score += 1;
    } else if depth > DEEP_PATH_DEPTH {
        score -= 1;
    }
    if is_soft_suspect(host) {
        score -= 3;
    }
    score
}
