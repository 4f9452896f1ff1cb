//! Deciding whether a fetched site is a company's official homepage.
//!
//! Hard-excluded hosts and directory pages are never official. Otherwise
//! the decision combines the domain score, company-name signals on the
//! page, address agreement, profile-page evidence and an optional AI
//! verdict. Sites that fall short become provisional and go through
//! [`apply_provisional_homepage_policy`].

mod domain;
mod exclude;
mod name_match;
mod provisional;

pub use domain::{
    bare_host, company_ascii_tokens, domain_score, host_token_match, host_tokens,
    registrable_domain,
};
pub use exclude::{
    detect_directory_like, is_excluded_url, is_hard_excluded, is_soft_suspect,
    HARD_EXCLUDE_HOSTS, SOFT_SUSPECT_HOSTS,
};
pub use name_match::{normalize_company_name, score_name_match, NameMatch, NameSignals};
pub use provisional::{
    ai_official_hint, apply_provisional_homepage_policy, PolicyOutcome, ProvisionalEvidence,
};

use corpenrich_core::prefecture::find_prefecture;
use corpenrich_core::{HomepageDecision, OfficialityConfig};
use url::Url;

use crate::html::HtmlFacts;
use crate::judge::{JudgeVerdict, Verdict};

const NAME_EXACT_POINTS: i32 = 5;
const NAME_PRESENT_POINTS: i32 = 3;
const HOST_TOKEN_POINTS: i32 = 3;
const ADDRESS_POINTS: i32 = 2;
const PROFILE_POINTS: i32 = 2;
const DOMAIN_POINTS: i32 = 2;
/// Evidence needed for a rule-based official decision.
const OFFICIAL_EVIDENCE_MIN: i32 = 5;
const MAX_OFFICIAL_SCORE: i32 = 10;

/// Everything known about one homepage candidate.
#[derive(Debug, Clone, Copy)]
pub struct OfficialityContext<'a> {
    pub company_name: &'a str,
    /// The stored or input address of the company.
    pub expected_address: Option<&'a str>,
    pub url: &'a str,
    pub text: &'a str,
    pub html: &'a str,
    pub facts: Option<&'a HtmlFacts>,
    /// An address extracted from the site.
    pub found_address: Option<&'a str>,
    /// A company-profile page was found on the site.
    pub profile_hit: bool,
    pub verdict: Option<&'a JudgeVerdict>,
}

/// Why a candidate ended up with its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    InvalidUrl,
    HardExcluded,
    DirectoryLike,
    AiRejected,
    Rule,
    Ai,
    Provisional,
}

impl Basis {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Basis::InvalidUrl => "invalid_url",
            Basis::HardExcluded => "hard_exclude",
            Basis::DirectoryLike => "directory_like",
            Basis::AiRejected => "ai_not_official",
            Basis::Rule => "rule",
            Basis::Ai => "ai",
            Basis::Provisional => "provisional",
        }
    }

    /// A rule-level rejection that should be cached against the URL.
    #[must_use]
    pub fn is_rule_negative(self) -> bool {
        matches!(
            self,
            Basis::InvalidUrl | Basis::HardExcluded | Basis::DirectoryLike
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub decision: HomepageDecision,
    pub basis: Basis,
    pub evidence: ProvisionalEvidence,
    /// A provisional homepage was dropped by the policy.
    pub dropped: bool,
}

impl Resolution {
    fn rejected(basis: Basis) -> Self {
        Self {
            decision: HomepageDecision::dropped(),
            basis,
            evidence: ProvisionalEvidence::default(),
            dropped: false,
        }
    }
}

fn address_agrees(expected: Option<&str>, found: Option<&str>, text: &str) -> bool {
    let Some(pref) = expected.and_then(find_prefecture) else {
        return false;
    };
    match found.and_then(find_prefecture) {
        Some(found_pref) => found_pref == pref,
        None => text.contains(pref),
    }
}

#[derive(Debug, Clone)]
pub struct OfficialityResolver {
    config: OfficialityConfig,
    hint_min_confidence: f64,
}

impl OfficialityResolver {
    #[must_use]
    pub fn new(config: OfficialityConfig, hint_min_confidence: f64) -> Self {
        Self {
            config,
            hint_min_confidence,
        }
    }

    /// Decide officiality for one candidate homepage.
    #[must_use]
    pub fn resolve(&self, ctx: &OfficialityContext<'_>) -> Resolution {
        let Ok(url) = Url::parse(ctx.url) else {
            return Resolution::rejected(Basis::InvalidUrl);
        };
        let Some(host) = url.host_str() else {
            return Resolution::rejected(Basis::InvalidUrl);
        };
        if is_hard_excluded(host) {
            return Resolution::rejected(Basis::HardExcluded);
        }
        if detect_directory_like(ctx.url, ctx.text, ctx.html) {
            return Resolution::rejected(Basis::DirectoryLike);
        }

        let domain = domain_score(&url, ctx.company_name);
        let host_token = host_token_match(host, ctx.company_name);
        let name = ctx.facts.map_or_else(
            || score_name_match(ctx.company_name, &NameSignals::default()),
            |f| score_name_match(ctx.company_name, &NameSignals::from_facts(f)),
        );
        let name_present = name.exact || name.ratio >= self.config.name_match_min_ratio;
        let address_ok = address_agrees(ctx.expected_address, ctx.found_address, ctx.text);
        let ai_hint = ctx
            .verdict
            .is_some_and(|v| ai_official_hint(v, self.hint_min_confidence));
        let ai_negative = ctx.verdict.is_some_and(|v| {
            v.verdict == Verdict::No && v.confidence >= self.hint_min_confidence
        });

        let mut evidence_score = 0;
        if name.exact {
            evidence_score += NAME_EXACT_POINTS;
        } else if name_present {
            evidence_score += NAME_PRESENT_POINTS;
        }
        if host_token {
            evidence_score += HOST_TOKEN_POINTS;
        }
        if address_ok {
            evidence_score += ADDRESS_POINTS;
        }
        if ctx.profile_hit {
            evidence_score += PROFILE_POINTS;
        }
        if domain >= self.config.official_domain_score {
            evidence_score += DOMAIN_POINTS;
        }
        let evidence = ProvisionalEvidence {
            host_token,
            name_present,
            address_ok,
            ai_hint,
            profile_hit: ctx.profile_hit,
            evidence_score,
        };

        tracing::debug!(
            url = ctx.url,
            domain_score = domain,
            name_ratio = name.ratio,
            host_token,
            address_ok,
            evidence_score,
            "officiality evidence"
        );

        if ai_negative && !name.exact {
            return Resolution {
                evidence,
                ..Resolution::rejected(Basis::AiRejected)
            };
        }

        let rule_official = evidence_score >= OFFICIAL_EVIDENCE_MIN && (name_present || host_token);
        let ai_official = ai_hint && (name_present || host_token || domain >= 3);
        let score = f64::from(evidence_score.min(MAX_OFFICIAL_SCORE));
        if rule_official || ai_official {
            let basis = if rule_official { Basis::Rule } else { Basis::Ai };
            return Resolution {
                decision: HomepageDecision {
                    homepage: ctx.url.to_string(),
                    official_flag: true,
                    official_source: basis.as_str().to_string(),
                    official_score: score,
                    domain_score: domain,
                },
                basis,
                evidence,
                dropped: false,
            };
        }

        let source = if is_soft_suspect(host) {
            "provisional_freehost"
        } else if ctx.verdict.is_some() {
            "ai_provisional"
        } else {
            "provisional"
        };
        let provisional = HomepageDecision {
            homepage: ctx.url.to_string(),
            official_flag: false,
            official_source: source.to_string(),
            official_score: score,
            domain_score: domain,
        };
        let outcome =
            apply_provisional_homepage_policy(provisional, &evidence, &self.config.provisional);
        Resolution {
            decision: outcome.decision,
            basis: Basis::Provisional,
            evidence,
            dropped: outcome.dropped,
        }
    }
}
