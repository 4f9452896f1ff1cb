//! Choosing one value per field from candidates merged across pages.

use std::fmt;
use std::sync::LazyLock;

use corpenrich_core::fields::{is_json_fragment, looks_like_address, normalize_address};
use corpenrich_core::prefecture::find_prefecture;
use corpenrich_core::{PageType, SelectorConfig};
use regex::Regex;
use serde::Serialize;

use crate::candidate::{Candidate, ContextTag, Field, Provenance};
use crate::extract::{clean_rep_name, normalize_phone};

static CONTACT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:contact|inquiry|enquiry|toiawase|otoiawase|form)(?:[/._-]|$)")
        .expect("valid regex")
});
static GREETING_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:message|greeting|aisatsu|top-?message|president)(?:[/._-]|$)")
        .expect("valid regex")
});

/// The chosen value for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub value: String,
    pub source_url: Option<String>,
    pub page_type: Option<PageType>,
    pub provenance: Provenance,
    /// Raw page text the chosen candidate was read from.
    pub evidence: Option<String>,
    /// Only set for addresses: the value names a prefecture other than
    /// the expected one.
    pub prefecture_mismatch: bool,
}

struct Valid<'a> {
    index: usize,
    value: String,
    candidate: &'a Candidate,
}

impl Valid<'_> {
    fn prov(&self) -> &Provenance {
        &self.candidate.provenance
    }

    fn rank_key(&self) -> (bool, bool, u8, usize) {
        let prov = self.prov();
        (
            !prov.is_primary(),
            prov.has(ContextTag::Branch),
            prov.source.map_or(u8::MAX, |s| s.rank()),
            self.index,
        )
    }
}

fn validate(field: Field, candidate: &Candidate) -> Option<String> {
    let raw = candidate.value.trim();
    match field {
        Field::Phone => normalize_phone(raw),
        Field::Address => {
            if is_json_fragment(raw) {
                return None;
            }
            let value = normalize_address(raw);
            looks_like_address(&value).then_some(value)
        }
        Field::RepName => {
            if candidate.page_type == Some(PageType::AccessContact)
                && !candidate.provenance.is_structured(Field::RepName)
            {
                return None;
            }
            clean_rep_name(raw)
        }
    }
}

/// Pick the best value for `field`.
///
/// Structured sources outrank free text unless every structured value is
/// branch context and a free-text value carries head-office or
/// representative context. For addresses, values in `expected_prefecture`
/// (a prefecture name or any address text naming one) are preferred; when
/// none match the best remaining value is still returned, flagged as a
/// mismatch.
#[must_use]
pub fn select(
    field: Field,
    candidates: &[Candidate],
    expected_prefecture: Option<&str>,
) -> Option<Selection> {
    let mut pool: Vec<Valid<'_>> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.field == field)
        .filter_map(|(index, candidate)| {
            validate(field, candidate).map(|value| Valid {
                index,
                value,
                candidate,
            })
        })
        .collect();

    if pool.iter().any(|v| v.prov().is_tagged()) {
        pool.retain(|v| v.prov().is_tagged() || v.candidate.page_type != Some(PageType::Other));
    }

    let expected = expected_prefecture.and_then(find_prefecture);
    if field == Field::Address {
        if let Some(pref) = expected {
            if pool.iter().any(|v| find_prefecture(&v.value) == Some(pref)) {
                pool.retain(|v| find_prefecture(&v.value) == Some(pref));
            }
        }
    }

    let (structured, free): (Vec<_>, Vec<_>) =
        pool.into_iter().partition(|v| v.prov().is_structured(field));
    let tier = if structured.is_empty() {
        free
    } else if structured.iter().all(|v| v.prov().has(ContextTag::Branch))
        && free.iter().any(|v| v.prov().is_primary())
    {
        free.into_iter().filter(|v| v.prov().is_primary()).collect()
    } else {
        structured
    };

    let best = tier.into_iter().min_by_key(Valid::rank_key)?;
    let prefecture_mismatch = field == Field::Address
        && expected.is_some_and(|pref| find_prefecture(&best.value).is_some_and(|p| p != pref));

    tracing::debug!(
        field = ?field,
        value = %best.value,
        provenance = %best.prov(),
        prefecture_mismatch,
        "selected candidate"
    );
    Some(Selection {
        value: best.value,
        source_url: best.candidate.source_url.clone(),
        page_type: best.candidate.page_type,
        provenance: best.candidate.provenance.clone(),
        evidence: best.candidate.evidence.clone(),
        prefecture_mismatch,
    })
}

// ---------------------------------------------------------------------------
// Representative gate
// ---------------------------------------------------------------------------

/// Why a selected representative name was not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepRejectReason {
    ContactForbidden,
    ContactLikeUrl,
    GreetingNotPaired,
    NotStructuredSource,
}

impl RepRejectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RepRejectReason::ContactForbidden => "contact_forbidden",
            RepRejectReason::ContactLikeUrl => "contact_like_url",
            RepRejectReason::GreetingNotPaired => "greeting_not_paired",
            RepRejectReason::NotStructuredSource => "not_structured_source",
        }
    }
}

impl fmt::Display for RepRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final gate on a chosen representative name and the page it came from.
///
/// # Errors
///
/// Returns the first reason the name must be dropped.
pub fn rep_candidate_ok(
    chosen: &str,
    candidates: &[Candidate],
    page_type: Option<PageType>,
    source_url: &str,
    config: &SelectorConfig,
) -> Result<(), RepRejectReason> {
    let backing: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.field == Field::RepName)
        .filter(|c| c.value == chosen || clean_rep_name(&c.value).as_deref() == Some(chosen))
        .collect();
    let structured = backing
        .iter()
        .any(|c| c.provenance.is_structured(Field::RepName));
    let tagged = backing.iter().any(|c| c.provenance.is_tagged());
    let path = url::Url::parse(source_url)
        .map_or_else(|_| source_url.to_string(), |u| u.path().to_string());

    if page_type == Some(PageType::AccessContact) && !structured {
        return Err(RepRejectReason::ContactForbidden);
    }
    if CONTACT_URL_RE.is_match(&path) {
        return Err(RepRejectReason::ContactLikeUrl);
    }
    if GREETING_URL_RE.is_match(&path) && !tagged {
        return Err(RepRejectReason::GreetingNotPaired);
    }
    if config.rep_require_structured_source && !structured {
        return Err(RepRejectReason::NotStructuredSource);
    }
    Ok(())
}

#[cfg(test)]
#[path = "select_test.rs"]
mod tests;
