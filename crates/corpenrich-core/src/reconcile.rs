//! Merge one enrichment cycle into the stored company row.
//!
//! [`reconcile`] is pure: it never touches the database. It produces the
//! complete set of column values for the release `UPDATE` plus the status the
//! row ends in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::app_config::ReconcileConfig;
use crate::fields::{
    clean_address, clean_amount, clean_description, clean_fiscal_month, clean_founded_year,
    clean_listing, clean_phone,
};
use crate::page_type::PageType;
use crate::prefecture::{find_prefecture, has_city, has_zip};
use crate::record::{CompanyRecord, CompanyStatus, FieldValue, HomepageDecision};

pub const CONFLICT_PREF_MISMATCH: &str = "pref_mismatch";
pub const CONFLICT_PREF_MISMATCH_OVERWRITTEN: &str = "pref_mismatch_overwritten";
pub const REVIEW_PREF_MISMATCH: &str = "pref_mismatch_no_strong_hq_evidence";

const EVIDENCE_MAX_CHARS: usize = 200;
const HQ_MARKERS: [&str; 4] = ["本社所在地", "本店所在地", "本社", "本店"];
const PROFILE_PATHS: [&str; 5] = ["/company", "/about", "/profile", "/overview", "/corporate"];
const CONTACT_PATHS: [&str; 6] = [
    "/contact",
    "/inquiry",
    "/toiawase",
    "お問い合わせ",
    "お問合せ",
    "問合せ",
];

// ---------------------------------------------------------------------------
// Cycle result
// ---------------------------------------------------------------------------

/// A selected phone or representative name with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundValue {
    pub value: String,
    pub source_url: Option<String>,
    /// Extraction provenance, e.g. `rule` or `ai`.
    pub source: String,
}

/// How an address was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    /// Extraction rules over fetched pages.
    Rule,
    /// Structured data published by the official site itself.
    Official,
    /// Generative-AI extraction.
    Ai,
}

impl AddressSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AddressSource::Rule => "rule",
            AddressSource::Official => "official",
            AddressSource::Ai => "ai",
        }
    }
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundAddress {
    pub value: String,
    pub source_url: Option<String>,
    pub source: AddressSource,
    pub confidence: Option<f64>,
    /// Text surrounding the address on the source page.
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiUsage {
    pub confidence: Option<f64>,
    pub reason: String,
}

/// Everything one pipeline cycle learned about a company.
///
/// Fields left `Unknown` (for instance because the row budget ran out) keep
/// their stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    /// `None` when homepage resolution did not run to completion.
    pub homepage: Option<HomepageDecision>,
    pub provisional_homepage: Option<String>,
    pub provisional_reason: Option<String>,

    pub phone: FieldValue<FoundValue>,
    pub address: FieldValue<FoundAddress>,
    pub rep_name: FieldValue<FoundValue>,

    pub description: FieldValue<String>,
    pub listing: FieldValue<String>,
    pub revenue: FieldValue<String>,
    pub profit: FieldValue<String>,
    pub capital: FieldValue<String>,
    pub fiscal_month: FieldValue<String>,
    pub founded_year: FieldValue<String>,

    pub page_types: Vec<(String, PageType)>,
    pub extracted_candidates_count: usize,
    pub drop_reasons: Vec<String>,
    pub ai: Option<AiUsage>,
    pub timeout_stage: Option<String>,
    /// Status proposed by the pipeline before address checks.
    pub status: CompanyStatus,
}

impl Default for EnrichmentResult {
    fn default() -> Self {
        Self {
            homepage: None,
            provisional_homepage: None,
            provisional_reason: None,
            phone: FieldValue::Unknown,
            address: FieldValue::Unknown,
            rep_name: FieldValue::Unknown,
            description: FieldValue::Unknown,
            listing: FieldValue::Unknown,
            revenue: FieldValue::Unknown,
            profit: FieldValue::Unknown,
            capital: FieldValue::Unknown,
            fiscal_month: FieldValue::Unknown,
            founded_year: FieldValue::Unknown,
            page_types: Vec::new(),
            extracted_candidates_count: 0,
            drop_reasons: Vec::new(),
            ai: None,
            timeout_stage: None,
            status: CompanyStatus::Done,
        }
    }
}

// ---------------------------------------------------------------------------
// Write payload
// ---------------------------------------------------------------------------

/// Column values for the release `UPDATE` of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyUpdate {
    pub status: CompanyStatus,
    pub address: Option<String>,

    pub homepage: Option<String>,
    pub homepage_official_flag: bool,
    pub homepage_official_source: Option<String>,
    pub homepage_official_score: Option<f64>,
    pub final_homepage: Option<String>,
    pub provisional_homepage: Option<String>,
    pub provisional_reason: Option<String>,

    pub phone: Option<String>,
    pub phone_source: Option<String>,
    pub source_url_phone: Option<String>,
    pub found_address: Option<String>,
    pub address_source: Option<String>,
    pub source_url_address: Option<String>,
    pub address_confidence: Option<f64>,
    pub address_evidence: Option<String>,
    pub address_conflict_level: Option<String>,
    pub address_review_reason: Option<String>,
    pub rep_name: Option<String>,
    pub source_url_rep: Option<String>,

    pub description: Option<String>,
    pub listing: Option<String>,
    pub revenue: Option<String>,
    pub profit: Option<String>,
    pub capital: Option<String>,
    pub fiscal_month: Option<String>,
    pub founded_year: Option<String>,

    /// JSON object mapping each visited URL to its page type.
    pub page_type_per_url: serde_json::Value,
    pub extracted_candidates_count: i32,
    /// JSON array of reasons candidates or homepages were dropped.
    pub drop_reasons: serde_json::Value,
    pub ai_used: bool,
    pub ai_confidence: Option<f64>,
    pub ai_reason: Option<String>,
    pub error_code: Option<String>,
    pub timeout_stage: Option<String>,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Merge `result` over `stored` and compute the row's next status.
#[must_use]
pub fn reconcile(
    stored: &CompanyRecord,
    result: &EnrichmentResult,
    cfg: &ReconcileConfig,
) -> CompanyUpdate {
    let homepage = merge_homepage(stored, result.homepage.as_ref());
    let strong_official = homepage.official_flag
        && homepage.official_score.unwrap_or(0.0) >= cfg.strong_official_score;

    let (phone, phone_source, source_url_phone) = merge_found(
        &result.phone,
        stored.phone.as_deref(),
        stored.phone_source.as_deref(),
        stored.source_url_phone.as_deref(),
    );
    let phone = phone.as_deref().and_then(clean_phone);
    let (phone_source, source_url_phone) = if phone.is_some() {
        (phone_source, source_url_phone)
    } else {
        (None, None)
    };

    let (rep_name, _, source_url_rep) = merge_found(
        &result.rep_name,
        stored.rep_name.as_deref(),
        None,
        stored.source_url_rep.as_deref(),
    );
    let source_url_rep = rep_name.as_ref().and(source_url_rep);

    let address = merge_address(
        stored,
        &result.address,
        phone.as_deref(),
        source_url_phone.as_deref(),
        strong_official,
        cfg,
    );

    let mut status = result.status;
    if address.needs_review && status == CompanyStatus::Done {
        status = CompanyStatus::Review;
    }

    let page_type_per_url = serde_json::Value::Object(
        result
            .page_types
            .iter()
            .map(|(url, pt)| (url.clone(), serde_json::Value::from(pt.as_str())))
            .collect(),
    );

    CompanyUpdate {
        status,
        address: address.address,

        homepage: homepage.homepage,
        homepage_official_flag: homepage.official_flag,
        homepage_official_source: homepage.official_source,
        homepage_official_score: homepage.official_score,
        final_homepage: homepage.final_homepage,
        provisional_homepage: non_empty(result.provisional_homepage.as_deref()),
        provisional_reason: non_empty(result.provisional_reason.as_deref()),

        phone,
        phone_source,
        source_url_phone,
        found_address: address.found_address,
        address_source: address.source,
        source_url_address: address.source_url,
        address_confidence: address.confidence,
        address_evidence: address.evidence,
        address_conflict_level: address.conflict_level,
        address_review_reason: address.review_reason,
        rep_name,
        source_url_rep,

        description: merge_clean(
            &result.description,
            stored.description.as_deref(),
            clean_description,
        ),
        listing: merge_clean(&result.listing, stored.listing.as_deref(), clean_listing),
        revenue: merge_clean(&result.revenue, stored.revenue.as_deref(), clean_amount),
        profit: merge_clean(&result.profit, stored.profit.as_deref(), clean_amount),
        capital: merge_clean(&result.capital, stored.capital.as_deref(), clean_amount),
        fiscal_month: merge_clean(
            &result.fiscal_month,
            stored.fiscal_month.as_deref(),
            clean_fiscal_month,
        ),
        founded_year: merge_clean(
            &result.founded_year,
            stored.founded_year.as_deref(),
            clean_founded_year,
        ),

        page_type_per_url,
        extracted_candidates_count: i32::try_from(result.extracted_candidates_count)
            .unwrap_or(i32::MAX),
        drop_reasons: serde_json::Value::from(result.drop_reasons.clone()),
        ai_used: result.ai.is_some(),
        ai_confidence: result.ai.as_ref().and_then(|a| a.confidence),
        ai_reason: result.ai.as_ref().and_then(|a| non_empty(Some(&a.reason))),
        error_code: None,
        timeout_stage: non_empty(result.timeout_stage.as_deref()),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Merge a plain text field and re-validate whatever ends up stored.
fn merge_clean(
    value: &FieldValue<String>,
    stored: Option<&str>,
    clean: fn(&str) -> Option<String>,
) -> Option<String> {
    value.merge_over(stored).as_deref().and_then(clean)
}

fn merge_found(
    value: &FieldValue<FoundValue>,
    stored: Option<&str>,
    stored_source: Option<&str>,
    stored_url: Option<&str>,
) -> (Option<String>, Option<String>, Option<String>) {
    match value {
        FieldValue::Unknown => (
            non_empty(stored),
            non_empty(stored_source),
            non_empty(stored_url),
        ),
        FieldValue::Blank => (None, None, None),
        FieldValue::Value(found) => match non_empty(Some(&found.value)) {
            Some(v) => (
                Some(v),
                non_empty(Some(&found.source)),
                non_empty(found.source_url.as_deref()),
            ),
            None => (None, None, None),
        },
    }
}

struct MergedHomepage {
    homepage: Option<String>,
    official_flag: bool,
    official_source: Option<String>,
    official_score: Option<f64>,
    final_homepage: Option<String>,
}

fn merge_homepage(stored: &CompanyRecord, decision: Option<&HomepageDecision>) -> MergedHomepage {
    match decision {
        None => MergedHomepage {
            homepage: non_empty(stored.homepage.as_deref()),
            official_flag: stored.homepage_official_flag,
            official_source: non_empty(stored.homepage_official_source.as_deref()),
            official_score: stored.homepage_official_score,
            final_homepage: non_empty(stored.final_homepage.as_deref()),
        },
        Some(d) => {
            let homepage = non_empty(Some(&d.homepage));
            MergedHomepage {
                final_homepage: homepage.clone(),
                official_flag: homepage.is_some() && d.official_flag,
                official_source: non_empty(Some(&d.official_source)),
                official_score: Some(d.official_score),
                homepage,
            }
        }
    }
}

struct MergedAddress {
    address: Option<String>,
    found_address: Option<String>,
    source: Option<String>,
    source_url: Option<String>,
    confidence: Option<f64>,
    evidence: Option<String>,
    conflict_level: Option<String>,
    review_reason: Option<String>,
    needs_review: bool,
}

/// `false` for contact or inquiry pages that are not also profile pages.
fn page_type_ok(url: Option<&str>) -> bool {
    let Some(url) = url else { return true };
    let low = url.to_lowercase();
    if low.is_empty() {
        return true;
    }
    let contact = CONTACT_PATHS.iter().any(|p| low.contains(p));
    let profile = PROFILE_PATHS.iter().any(|p| low.contains(p));
    !contact || profile
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[allow(clippy::too_many_lines)]
fn merge_address(
    stored: &CompanyRecord,
    found: &FieldValue<FoundAddress>,
    phone: Option<&str>,
    phone_url: Option<&str>,
    strong_official: bool,
    cfg: &ReconcileConfig,
) -> MergedAddress {
    let current = non_empty(stored.address.as_deref());
    let found = match found {
        FieldValue::Unknown => {
            return MergedAddress {
                address: current,
                found_address: non_empty(stored.found_address.as_deref()),
                source: non_empty(stored.address_source.as_deref()),
                source_url: non_empty(stored.source_url_address.as_deref()),
                confidence: stored.address_confidence,
                evidence: non_empty(stored.address_evidence.as_deref()),
                conflict_level: non_empty(stored.address_conflict_level.as_deref()),
                review_reason: non_empty(stored.address_review_reason.as_deref()),
                needs_review: false,
            };
        }
        FieldValue::Blank => None,
        FieldValue::Value(found) => clean_address(&found.value).map(|value| (value, found)),
    };

    let Some((found_value, found)) = found else {
        return MergedAddress {
            address: current,
            found_address: None,
            source: None,
            source_url: None,
            confidence: None,
            evidence: None,
            conflict_level: None,
            review_reason: None,
            needs_review: false,
        };
    };

    let baseline = stored.baseline_address().unwrap_or_default();
    let source_url = non_empty(found.source_url.as_deref());
    let evidence = found
        .evidence
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| truncate_chars(e, EVIDENCE_MAX_CHARS));
    let has_hq_evidence = evidence
        .as_deref()
        .is_some_and(|e| HQ_MARKERS.iter().any(|m| e.contains(m)));
    let phone_same_page = phone.is_some()
        && source_url.is_some()
        && phone_url.is_some()
        && source_url.as_deref() == phone_url;
    let page_ok = page_type_ok(source_url.as_deref());
    let ai_confident = found.source == AddressSource::Ai
        && found
            .confidence
            .is_some_and(|c| c >= cfg.address_hq_confidence_min);
    let structured_source = matches!(found.source, AddressSource::Rule | AddressSource::Official);

    let baseline_pref = find_prefecture(baseline);
    let found_pref = find_prefecture(&found_value);
    let pref_mismatch = matches!((baseline_pref, found_pref), (Some(a), Some(b)) if a != b);

    let found_complete = has_zip(&found_value) && has_city(&found_value);
    let baseline_weak = !has_zip(baseline) || !has_city(baseline);

    let mut conflict_level = None;
    let mut review_reason = None;
    let mut needs_review = false;
    let overwrite;

    if pref_mismatch {
        let strict =
            strong_official && ai_confident && has_hq_evidence && phone_same_page && page_ok;
        let weak_baseline_rescue = strong_official
            && page_ok
            && baseline_weak
            && found_complete
            && (phone_same_page || has_hq_evidence || structured_source || ai_confident);
        let opt_in = cfg.allow_pref_mismatch_overwrite
            && strong_official
            && page_ok
            && found_complete
            && (phone_same_page || structured_source)
            && (baseline_weak || found_value.chars().count() >= baseline.chars().count() + 6);
        overwrite = strict || weak_baseline_rescue || opt_in;
        if overwrite {
            conflict_level = Some(CONFLICT_PREF_MISMATCH_OVERWRITTEN.to_string());
        } else {
            conflict_level = Some(CONFLICT_PREF_MISMATCH.to_string());
            review_reason = Some(REVIEW_PREF_MISMATCH.to_string());
            needs_review = true;
        }
    } else if strong_official || structured_source {
        // Same prefecture, or the found address names none.
        let more_specific = baseline.is_empty()
            || found_value.chars().count() > baseline.chars().count()
            || (has_zip(&found_value) && !has_zip(baseline))
            || (has_city(&found_value) && !has_city(baseline));
        let loses_prefecture = baseline_pref.is_some() && found_pref.is_none();
        overwrite = more_specific && !loses_prefecture;
    } else {
        overwrite = false;
    }

    tracing::debug!(
        company_id = stored.id,
        pref_mismatch,
        strong_official,
        has_hq_evidence,
        phone_same_page,
        page_ok,
        overwrite,
        needs_review,
        "address merge decided"
    );

    MergedAddress {
        address: if overwrite {
            Some(found_value.clone())
        } else {
            current
        },
        found_address: Some(found_value),
        source: Some(found.source.as_str().to_string()),
        source_url,
        confidence: found.confidence,
        evidence,
        conflict_level,
        review_reason,
        needs_review,
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
