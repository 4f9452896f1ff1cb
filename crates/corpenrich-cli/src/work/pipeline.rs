//! One company's enrichment cycle: search, fetch, classify, extract, select
//! and resolve officiality.
//!
//! Every await runs against the row deadline. When it passes, the stage
//! that was running is recorded and whatever was gathered so far is still
//! turned into an [`EnrichmentResult`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corpenrich_core::{
    should_skip_by_url_flag, AddressSource, AiUsage, AppConfig, CompanyRecord, CompanyStatus,
    EnrichmentResult, FieldValue, FoundAddress, FoundValue, HomepageDecision, JudgeSource,
    PageType, SelectorConfig, UrlFlag,
};
use corpenrich_scraper::{
    analyze_html, classify_facts, extract_from_facts, extract_profile_fields, judge_with_timeout,
    rank_anchors, rep_candidate_ok, select, AiJudge, Anchor, Basis, ExtractedCandidates,
    FetchFailure, FetchedPage, Fetcher, Field, HomepageSearch, HtmlFacts, JudgeEvidence,
    JudgeVerdict, LinkFocus, OfficialityContext, OfficialityResolver, ProfileFields, Resolution,
    SourceTag,
};
use tokio::time::Instant;

/// Homepage candidates tried per company.
const MAX_HOMEPAGE_CANDIDATES: usize = 3;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Cached officiality verdicts.
#[async_trait]
pub(crate) trait FlagStore: Send + Sync {
    async fn get(&self, url: &str) -> anyhow::Result<Option<UrlFlag>>;
    async fn put(&self, flag: &UrlFlag) -> anyhow::Result<()>;
}

/// `url_flags` table behind a pool.
pub(crate) struct PgFlagStore {
    pub pool: sqlx::PgPool,
}

#[async_trait]
impl FlagStore for PgFlagStore {
    async fn get(&self, url: &str) -> anyhow::Result<Option<UrlFlag>> {
        Ok(corpenrich_db::get_url_flag(&self.pool, url).await?)
    }

    async fn put(&self, flag: &UrlFlag) -> anyhow::Result<()> {
        Ok(corpenrich_db::upsert_url_flag(&self.pool, flag).await?)
    }
}

pub(crate) struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub search: Arc<dyn HomepageSearch>,
    pub judge: Option<Arc<dyn AiJudge>>,
    pub flags: Arc<dyn FlagStore>,
}

#[derive(Debug, Clone)]
pub(crate) struct PipelineSettings {
    pub row_budget: Duration,
    pub max_pages: usize,
    pub judge_timeout: Duration,
    pub url_flag_ai_skip_confidence: f64,
    pub selector: SelectorConfig,
}

impl PipelineSettings {
    pub(crate) fn from_app_config(config: &AppConfig) -> Self {
        Self {
            row_budget: Duration::from_secs(config.worker.row_budget_secs),
            max_pages: config.worker.max_pages_per_company.max(1),
            judge_timeout: Duration::from_secs(config.judge.timeout_secs),
            url_flag_ai_skip_confidence: config.officiality.url_flag_ai_skip_confidence,
            selector: config.selector,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Search,
    Fetch,
    Judge,
    Links,
}

impl Stage {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Stage::Search => "search",
            Stage::Fetch => "fetch",
            Stage::Judge => "judge",
            Stage::Links => "links",
        }
    }
}

/// The row deadline passed while `Stage` was running.
struct StageTimeout(Stage);

/// A page that contributed candidates.
struct VisitedPage {
    url: String,
    page_type: PageType,
}

struct RowRun<'a> {
    record: &'a CompanyRecord,
    deps: &'a Collaborators,
    settings: &'a PipelineSettings,
    resolver: &'a OfficialityResolver,
    deadline: Instant,

    homepage: Option<HomepageDecision>,
    provisional: Option<(String, String)>,
    candidates: ExtractedCandidates,
    pages: Vec<VisitedPage>,
    visited: HashSet<String>,
    profile: ProfileFields,
    verdict: Option<JudgeVerdict>,
    drop_reasons: Vec<String>,
}

/// Run the whole cycle for `record`. Never fails: fetch and judge problems
/// become drop reasons, and running out of time becomes `timeout_stage`.
pub(crate) async fn process_company(
    record: &CompanyRecord,
    deps: &Collaborators,
    settings: &PipelineSettings,
    resolver: &OfficialityResolver,
) -> EnrichmentResult {
    let mut run = RowRun {
        record,
        deps,
        settings,
        resolver,
        deadline: Instant::now() + settings.row_budget,
        homepage: None,
        provisional: None,
        candidates: ExtractedCandidates::default(),
        pages: Vec::new(),
        visited: HashSet::new(),
        profile: ProfileFields::default(),
        verdict: None,
        drop_reasons: Vec::new(),
    };

    let timeout_stage = match run.run().await {
        Ok(()) => None,
        Err(StageTimeout(stage)) => {
            tracing::warn!(
                company_id = record.id,
                stage = stage.as_str(),
                "row budget exhausted"
            );
            Some(stage)
        }
    };
    run.finish(timeout_stage)
}

impl RowRun<'_> {
    async fn within<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = T>,
    ) -> Result<T, StageTimeout> {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| StageTimeout(stage))
    }

    fn drop_reason(&mut self, reason: String) {
        tracing::debug!(company_id = self.record.id, reason = %reason, "dropped");
        self.drop_reasons.push(reason);
    }

    async fn run(&mut self) -> Result<(), StageTimeout> {
        let urls = self.homepage_candidates().await?;
        if urls.is_empty() {
            self.drop_reason("no_homepage_candidates".to_string());
            self.homepage = Some(HomepageDecision::dropped());
            return Ok(());
        }

        for url in urls.iter().take(MAX_HOMEPAGE_CANDIDATES) {
            if self.skipped_by_flag(url).await {
                continue;
            }
            let Some(page) = self.fetch_page(url, Stage::Fetch).await? else {
                continue;
            };
            let facts = analyze_html(&page.html);
            let page_type = classify_facts(&page.final_url, &page.text, Some(&facts));
            let extracted = extract_from_facts(
                &page.text,
                Some(&page.html),
                Some(&facts),
                Some(page_type),
            )
            .with_page(&page.final_url, page_type);

            let verdict = self.ask_judge(&page, &facts, &extracted).await?;
            let found_address = select(
                Field::Address,
                &extracted.addresses,
                self.record.baseline_address(),
            )
            .map(|s| s.value);
            let resolution = self.resolver.resolve(&OfficialityContext {
                company_name: &self.record.company_name,
                expected_address: self.record.baseline_address(),
                url: &page.final_url,
                text: &page.text,
                html: &page.html,
                facts: Some(&facts),
                found_address: found_address.as_deref(),
                profile_hit: page_type == PageType::CompanyProfile,
                verdict: verdict.as_ref(),
            });
            self.remember_flag(url, &resolution, verdict.as_ref()).await;
            if verdict.is_some() {
                self.verdict = verdict;
            }

            if resolution.decision.is_empty() {
                self.drop_reason(format!("homepage_{}:{url}", resolution.basis.as_str()));
                if resolution.dropped && self.provisional.is_none() {
                    self.provisional = Some((url.clone(), "weak_provisional".to_string()));
                }
                continue;
            }

            tracing::info!(
                company_id = self.record.id,
                url = %page.final_url,
                basis = resolution.basis.as_str(),
                official = resolution.decision.official_flag,
                "homepage resolved"
            );
            self.homepage = Some(resolution.decision);
            let anchors = facts.anchors.clone();
            let base = page.final_url.clone();
            self.add_page(&page, &facts, page_type, extracted);
            return self.follow_links(&base, &anchors).await;
        }

        self.homepage = Some(HomepageDecision::dropped());
        Ok(())
    }

    /// The stored homepage first, then search results.
    async fn homepage_candidates(&mut self) -> Result<Vec<String>, StageTimeout> {
        let mut urls: Vec<String> = self
            .record
            .homepage
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        let address = self.record.baseline_address().unwrap_or_default();
        let searched = self
            .within(
                Stage::Search,
                self.deps.search.search(&self.record.company_name, address),
            )
            .await?;
        match searched {
            Ok(results) => {
                for url in results {
                    if !urls.contains(&url) {
                        urls.push(url);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(company_id = self.record.id, error = %e, "search failed");
                self.drop_reason("search_failed".to_string());
            }
        }
        Ok(urls)
    }

    async fn skipped_by_flag(&mut self, url: &str) -> bool {
        match self.deps.flags.get(url).await {
            Ok(Some(flag))
                if should_skip_by_url_flag(&flag, self.settings.url_flag_ai_skip_confidence) =>
            {
                self.drop_reason(format!("url_flag_{}:{url}", flag.reason));
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(url, error = %e, "url flag lookup failed");
                false
            }
        }
    }

    async fn remember_flag(
        &self,
        url: &str,
        resolution: &Resolution,
        verdict: Option<&JudgeVerdict>,
    ) {
        let flag = match resolution.basis {
            basis if basis.is_rule_negative() => UrlFlag {
                url_key: url.to_string(),
                is_official: false,
                judge_source: JudgeSource::Rule,
                confidence: None,
                reason: basis.as_str().to_string(),
            },
            Basis::AiRejected => UrlFlag {
                url_key: url.to_string(),
                is_official: false,
                judge_source: JudgeSource::Ai,
                confidence: verdict.map(|v| v.confidence),
                reason: verdict.map_or_else(String::new, |v| v.reason.clone()),
            },
            Basis::Rule | Basis::Ai => UrlFlag {
                url_key: url.to_string(),
                is_official: true,
                judge_source: if resolution.basis == Basis::Ai {
                    JudgeSource::Ai
                } else {
                    JudgeSource::Rule
                },
                confidence: verdict.map(|v| v.confidence),
                reason: resolution.basis.as_str().to_string(),
            },
            _ => return,
        };
        if let Err(e) = self.deps.flags.put(&flag).await {
            tracing::warn!(url, error = %e, "url flag write failed");
        }
    }

    async fn fetch_page(
        &mut self,
        url: &str,
        stage: Stage,
    ) -> Result<Option<FetchedPage>, StageTimeout> {
        if !self.visited.insert(url.to_string()) {
            return Ok(None);
        }
        match self.within(stage, self.deps.fetcher.fetch(url)).await? {
            Ok(page) => {
                self.visited.insert(page.final_url.clone());
                Ok(Some(page))
            }
            Err(e) => {
                self.drop_reason(format!("fetch_{}:{url}", failure_kind(&e)));
                Ok(None)
            }
        }
    }

    async fn ask_judge(
        &self,
        page: &FetchedPage,
        facts: &HtmlFacts,
        extracted: &ExtractedCandidates,
    ) -> Result<Option<JudgeVerdict>, StageTimeout> {
        let Some(judge) = &self.deps.judge else {
            return Ok(None);
        };
        let evidence = JudgeEvidence {
            company_name: self.record.company_name.clone(),
            expected_address: self.record.baseline_address().map(str::to_string),
            url: page.final_url.clone(),
            title: facts.title.clone(),
            text: String::new(),
            phone: select(Field::Phone, &extracted.phones, None).map(|s| s.value),
            address: select(
                Field::Address,
                &extracted.addresses,
                self.record.baseline_address(),
            )
            .map(|s| s.value),
            rep_name: select(Field::RepName, &extracted.rep_names, None).map(|s| s.value),
        }
        .with_text(&page.text);
        let verdict = self
            .within(
                Stage::Judge,
                judge_with_timeout(judge.as_ref(), &evidence, self.settings.judge_timeout),
            )
            .await?;
        Ok(Some(verdict))
    }

    fn add_page(
        &mut self,
        page: &FetchedPage,
        facts: &HtmlFacts,
        page_type: PageType,
        extracted: ExtractedCandidates,
    ) {
        tracing::debug!(
            company_id = self.record.id,
            url = %page.final_url,
            page_type = page_type.as_str(),
            candidates = extracted.len(),
            "page extracted"
        );
        self.candidates.extend(extracted);
        self.profile.merge(extract_profile_fields(facts));
        self.pages.push(VisitedPage {
            url: page.final_url.clone(),
            page_type,
        });
    }

    /// What the site still owes us.
    fn link_focus(&self) -> Vec<LinkFocus> {
        let mut focus = vec![LinkFocus::Profile];
        if self.candidates.phones.is_empty() {
            focus.push(LinkFocus::Phone);
        }
        if self.candidates.addresses.is_empty() {
            focus.push(LinkFocus::Address);
        }
        if self.candidates.rep_names.is_empty() {
            focus.push(LinkFocus::Rep);
        }
        focus
    }

    async fn follow_links(&mut self, base: &str, anchors: &[Anchor]) -> Result<(), StageTimeout> {
        let focus = self.link_focus();
        let links: Vec<String> = rank_anchors(base, anchors, &focus)
            .into_iter()
            .map(|r| r.url)
            .filter(|u| !self.visited.contains(u))
            .take(self.settings.max_pages.saturating_sub(1))
            .collect();

        for link in links {
            let Some(page) = self.fetch_page(&link, Stage::Links).await? else {
                continue;
            };
            let facts = analyze_html(&page.html);
            let page_type = classify_facts(&page.final_url, &page.text, Some(&facts));
            let extracted = extract_from_facts(
                &page.text,
                Some(&page.html),
                Some(&facts),
                Some(page_type),
            )
            .with_page(&page.final_url, page_type);
            self.add_page(&page, &facts, page_type, extracted);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    fn selected_address(&self) -> Option<FoundAddress> {
        let expected = self.record.baseline_address();
        if let Some(sel) = select(Field::Address, &self.candidates.addresses, expected) {
            let source = if sel.provenance.source == Some(SourceTag::JsonLd) {
                AddressSource::Official
            } else {
                AddressSource::Rule
            };
            return Some(FoundAddress {
                value: sel.value,
                source_url: sel.source_url,
                source,
                confidence: None,
                evidence: sel.evidence,
            });
        }
        let verdict = self.verdict.as_ref()?;
        let address = verdict.address.clone()?;
        Some(FoundAddress {
            value: address,
            source_url: self.pages.first().map(|p| p.url.clone()),
            source: AddressSource::Ai,
            confidence: Some(verdict.confidence),
            evidence: Some(verdict.reason.clone()).filter(|r| !r.is_empty()),
        })
    }

    fn selected_rep(&mut self) -> Option<FoundValue> {
        let sel = select(Field::RepName, &self.candidates.rep_names, None)?;
        let gate = rep_candidate_ok(
            &sel.value,
            &self.candidates.rep_names,
            sel.page_type,
            sel.source_url.as_deref().unwrap_or_default(),
            &self.settings.selector,
        );
        match gate {
            Ok(()) => Some(FoundValue {
                value: sel.value,
                source_url: sel.source_url,
                source: "rule".to_string(),
            }),
            Err(reason) => {
                self.drop_reason(format!("rep_{reason}"));
                None
            }
        }
    }

    fn finish(mut self, timeout_stage: Option<Stage>) -> EnrichmentResult {
        let phone = select(Field::Phone, &self.candidates.phones, None).map(|s| FoundValue {
            value: s.value,
            source_url: s.source_url,
            source: "rule".to_string(),
        });
        let address = self.selected_address();
        let rep_name = self.selected_rep();

        let status = match &self.homepage {
            Some(decision) if !decision.is_empty() => CompanyStatus::Done,
            Some(_) => CompanyStatus::NoHomepage,
            None => CompanyStatus::Review,
        };
        let ai = self.verdict.as_ref().map(|v| AiUsage {
            confidence: Some(v.confidence),
            reason: v.reason.clone(),
        });
        let (provisional_homepage, provisional_reason) = self.provisional.take().unzip();
        let profile = std::mem::take(&mut self.profile);

        EnrichmentResult {
            homepage: self.homepage.take(),
            provisional_homepage,
            provisional_reason,
            phone: FieldValue::found(phone),
            address: FieldValue::found(address),
            rep_name: FieldValue::found(rep_name),
            description: FieldValue::found(profile.description),
            listing: FieldValue::found(profile.listing),
            revenue: FieldValue::found(profile.revenue),
            profit: FieldValue::found(profile.profit),
            capital: FieldValue::found(profile.capital),
            fiscal_month: FieldValue::found(profile.fiscal_month),
            founded_year: FieldValue::found(profile.founded_year),
            page_types: self
                .pages
                .iter()
                .map(|p| (p.url.clone(), p.page_type))
                .collect(),
            extracted_candidates_count: self.candidates.len(),
            drop_reasons: std::mem::take(&mut self.drop_reasons),
            ai,
            timeout_stage: timeout_stage.map(|s| s.as_str().to_string()),
            status,
        }
    }
}

fn failure_kind(failure: &FetchFailure) -> &'static str {
    match failure {
        FetchFailure::Timeout => "timeout",
        FetchFailure::Failed(_) => "failed",
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
