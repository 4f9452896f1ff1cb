pub mod cache;
pub mod candidate;
pub mod classify;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod html;
pub mod jsonld;
pub mod judge;
pub mod links;
pub mod officiality;
pub mod profile;
pub(crate) mod rate_limit;
pub mod search;
pub mod select;

pub use cache::{cache_key, CachedPage, PageCache};
pub use candidate::{Candidate, ContextTag, Field, Provenance, SourceTag};
pub use classify::{classify, classify_facts};
pub use error::ScraperError;
pub use extract::{
    apply_rule, clean_rep_name, extract, extract_from_facts, normalize_phone,
    ExtractedCandidates, Rule, RuleInput,
};
pub use fetch::{FetchFailure, FetchedPage, Fetcher, HttpFetcher};
pub use html::{analyze_html, clean_text_from_html, Anchor, HtmlFacts, LabeledRow};
pub use judge::{judge_with_timeout, AiJudge, HttpAiJudge, JudgeEvidence, JudgeVerdict, Verdict};
pub use links::{rank_anchors, LinkFocus, RankedLink};
pub use officiality::{
    ai_official_hint, apply_provisional_homepage_policy, detect_directory_like, Basis,
    OfficialityContext, OfficialityResolver, ProvisionalEvidence, Resolution,
};
pub use profile::{extract_profile_fields, ProfileFields};
pub use search::{DuckDuckGoSearch, HomepageSearch};
pub use select::{rep_candidate_ok, select, RepRejectReason, Selection};
