//! Keep-or-drop policy for non-official ("provisional") homepages.

use corpenrich_core::{HomepageDecision, ProvisionalThresholds};

use crate::judge::{JudgeVerdict, Verdict};

/// Facts gathered about a provisional homepage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionalEvidence {
    pub host_token: bool,
    pub name_present: bool,
    pub address_ok: bool,
    pub ai_hint: bool,
    pub profile_hit: bool,
    pub evidence_score: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    pub decision: HomepageDecision,
    pub dropped: bool,
}

fn is_provisional_source(source: &str) -> bool {
    source.starts_with("provisional") || source.starts_with("ai_provisional")
}

/// Drop provisional homepages whose evidence is too weak to keep.
///
/// Only decisions with the official flag unset and a `provisional*` or
/// `ai_provisional*` source are considered; everything else passes through
/// unchanged. A dropped decision is fully cleared.
#[must_use]
pub fn apply_provisional_homepage_policy(
    decision: HomepageDecision,
    evidence: &ProvisionalEvidence,
    thresholds: &ProvisionalThresholds,
) -> PolicyOutcome {
    let source = decision.official_source.trim();
    if decision.is_empty() || decision.official_flag || !is_provisional_source(source) {
        return PolicyOutcome {
            decision,
            dropped: false,
        };
    }

    let score = decision.domain_score;
    let strong = score >= thresholds.strong_domain_score
        || (evidence.host_token && score >= thresholds.host_token_domain_score)
        || (evidence.name_present && score >= thresholds.name_present_domain_score)
        || (evidence.address_ok && score >= thresholds.address_ok_domain_score)
        || evidence.ai_hint
        || evidence.profile_hit
        || evidence.evidence_score >= thresholds.strong_evidence_score;

    if strong {
        return PolicyOutcome {
            decision,
            dropped: false,
        };
    }
    tracing::debug!(
        homepage = %decision.homepage,
        source = %decision.official_source,
        domain_score = score,
        "dropping weak provisional homepage"
    );
    PolicyOutcome {
        decision: HomepageDecision::dropped(),
        dropped: true,
    }
}

/// An AI verdict strong enough to vouch for a provisional homepage.
#[must_use]
pub fn ai_official_hint(verdict: &JudgeVerdict, min_confidence: f64) -> bool {
    verdict.verdict == Verdict::Yes && verdict.confidence >= min_confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisional(source: &str, domain_score: i32) -> HomepageDecision {
        HomepageDecision {
            homepage: "https://example.com/".to_string(),
            official_flag: false,
            official_source: source.to_string(),
            official_score: 0.0,
            domain_score,
        }
    }

    fn apply(source: &str, domain_score: i32, evidence: ProvisionalEvidence) -> PolicyOutcome {
        apply_provisional_homepage_policy(
            provisional(source, domain_score),
            &evidence,
            &ProvisionalThresholds::default(),
        )
    }

    fn verdict(verdict: Verdict, confidence: f64) -> JudgeVerdict {
        JudgeVerdict {
            verdict,
            confidence,
            reason: String::new(),
            address: None,
        }
    }

    #[test]
    fn weak_provisional_is_cleared() {
        let out = apply("provisional_freehost", 3, ProvisionalEvidence::default());
        assert!(out.dropped);
        assert_eq!(out.decision.homepage, "");
        assert!(!out.decision.official_flag);
        assert_eq!(out.decision.official_source, "");
        assert!(out.decision.official_score.abs() < f64::EPSILON);
        assert_eq!(out.decision.domain_score, 0);
    }

    #[test]
    fn strong_domain_score_keeps_provisional() {
        let out = apply("provisional", 4, ProvisionalEvidence::default());
        assert!(!out.dropped);
        assert_eq!(out.decision.homepage, "https://example.com/");
        assert_eq!(out.decision.official_source, "provisional");
        assert_eq!(out.decision.domain_score, 4);
    }

    #[test]
    fn non_provisional_sources_pass_through() {
        let out = apply("ai_review", 1, ProvisionalEvidence::default());
        assert!(!out.dropped);
        assert_eq!(out.decision.homepage, "https://example.com/");
    }

    #[test]
    fn ai_provisional_is_subject_to_the_policy() {
        assert!(apply("ai_provisional", 1, ProvisionalEvidence::default()).dropped);
    }

    #[test]
    fn any_single_signal_is_enough() {
        let host = ProvisionalEvidence {
            host_token: true,
            ..ProvisionalEvidence::default()
        };
        assert!(!apply("provisional", 3, host).dropped);
        assert!(apply("provisional", 2, host).dropped);

        let address = ProvisionalEvidence {
            address_ok: true,
            ..ProvisionalEvidence::default()
        };
        assert!(apply("provisional", 3, address).dropped);

        let evidence = ProvisionalEvidence {
            evidence_score: 8,
            ..ProvisionalEvidence::default()
        };
        assert!(!apply("provisional", 0, evidence).dropped);

        let ai = ProvisionalEvidence {
            ai_hint: true,
            ..ProvisionalEvidence::default()
        };
        assert!(!apply("ai_provisional", 0, ai).dropped);
    }

    #[test]
    fn thresholds_are_configurable() {
        let lenient = ProvisionalThresholds {
            strong_domain_score: 2,
            ..ProvisionalThresholds::default()
        };
        let out = apply_provisional_homepage_policy(
            provisional("provisional", 2),
            &ProvisionalEvidence::default(),
            &lenient,
        );
        assert!(!out.dropped);
    }

    #[test]
    fn ai_hint_needs_confident_yes() {
        assert!(ai_official_hint(&verdict(Verdict::Yes, 0.9), 0.65));
        assert!(!ai_official_hint(&verdict(Verdict::Yes, 0.5), 0.65));
        assert!(!ai_official_hint(&verdict(Verdict::No, 0.9), 0.65));
    }
}
