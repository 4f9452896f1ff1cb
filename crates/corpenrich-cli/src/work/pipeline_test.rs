use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use corpenrich_core::{normalize_flag_key, OfficialityConfig};
use corpenrich_scraper::{ScraperError, Verdict};

use super::*;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeFetcher {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.pages.get(url) {
            Some(html) => Ok(FetchedPage::from_html(url, url, html.clone())),
            None => Err(FetchFailure::Failed(format!("no fixture for {url}"))),
        }
    }
}

struct FakeSearch {
    results: Result<Vec<String>, u16>,
}

#[async_trait]
impl HomepageSearch for FakeSearch {
    async fn search(&self, _name: &str, _address: &str) -> Result<Vec<String>, ScraperError> {
        match &self.results {
            Ok(urls) => Ok(urls.clone()),
            Err(status) => Err(ScraperError::UnexpectedStatus {
                status: *status,
                url: "https://search.test/html".to_string(),
            }),
        }
    }
}

struct FakeJudge {
    verdict: JudgeVerdict,
}

#[async_trait]
impl AiJudge for FakeJudge {
    async fn judge(&self, _evidence: &JudgeEvidence) -> Result<JudgeVerdict, ScraperError> {
        Ok(self.verdict.clone())
    }
}

#[derive(Default)]
struct MemoryFlags {
    flags: Mutex<HashMap<String, UrlFlag>>,
}

impl MemoryFlags {
    fn stored(&self, url: &str) -> Option<UrlFlag> {
        self.flags
            .lock()
            .unwrap()
            .get(&normalize_flag_key(url))
            .cloned()
    }
}

#[async_trait]
impl FlagStore for MemoryFlags {
    async fn get(&self, url: &str) -> anyhow::Result<Option<UrlFlag>> {
        Ok(self.stored(url))
    }

    async fn put(&self, flag: &UrlFlag) -> anyhow::Result<()> {
        self.flags
            .lock()
            .unwrap()
            .insert(normalize_flag_key(&flag.url_key), flag.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const HOME: &str = "https://www.test-seiki.co.jp/";
const PROFILE: &str = "https://www.test-seiki.co.jp/company/";
const OTHER: &str = "https://www.other-kogyo.co.jp/";

const HOME_HTML: &str = r#"<html><head><title>株式会社テスト精機 | トップ</title></head>
<body>
  <nav><a href="/company/">会社概要</a><a href="/products/">製品情報</a></nav>
  <h1>株式会社テスト精機</h1>
  <p>精密部品の加工を行っています。</p>
</body></html>"#;

const PROFILE_HTML: &str = r#"<html><head><title>会社概要 | 株式会社テスト精機</title></head>
<body>
  <h1>会社概要</h1>
  <table>
    <tr><th>会社名</th><td>株式会社テスト精機</td></tr>
    <tr><th>代表者</th><td>代表取締役 山田 太郎</td></tr>
    <tr><th>本社所在地</th><td>〒100-0001 東京都千代田区千代田1-1-1</td></tr>
    <tr><th>電話番号</th><td>03-1234-5678</td></tr>
    <tr><th>資本金</th><td>3,000万円</td></tr>
    <tr><th>設立</th><td>1987年4月</td></tr>
  </table>
</body></html>"#;

const OTHER_HTML: &str = r#"<html><head><title>アザー工業 | 公式サイト</title></head>
<body><h1>アザー工業</h1><p>金属加工の専門会社です。</p></body></html>"#;

fn record(homepage: Option<&str>) -> CompanyRecord {
    CompanyRecord {
        id: 7,
        company_name: "株式会社テスト精機".into(),
        address: Some("東京都千代田区千代田1-1-1".into()),
        homepage: homepage.map(str::to_string),
        status: Some("running".into()),
        locked_by: Some("w1".into()),
        ..CompanyRecord::default()
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        row_budget: Duration::from_secs(10),
        max_pages: 4,
        judge_timeout: Duration::from_secs(1),
        url_flag_ai_skip_confidence: 0.9,
        selector: SelectorConfig::default(),
    }
}

fn resolver() -> OfficialityResolver {
    OfficialityResolver::new(OfficialityConfig::default(), 0.65)
}

fn deps(
    fetcher: Arc<FakeFetcher>,
    search: Result<Vec<String>, u16>,
    judge: Option<JudgeVerdict>,
    flags: Arc<MemoryFlags>,
) -> Collaborators {
    Collaborators {
        fetcher,
        search: Arc::new(FakeSearch { results: search }),
        judge: judge.map(|verdict| Arc::new(FakeJudge { verdict }) as Arc<dyn AiJudge>),
        flags,
    }
}

// ---------------------------------------------------------------------------
// Test 1 – official homepage plus followed profile page
// ---------------------------------------------------------------------------

#[tokio::test]
async fn official_homepage_and_profile_page_fill_contact_fields() {
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with_page(HOME, HOME_HTML)
            .with_page(PROFILE, PROFILE_HTML),
    );
    let flags = Arc::new(MemoryFlags::default());
    let deps = deps(fetcher, Ok(vec![HOME.to_string()]), None, Arc::clone(&flags));

    let result = process_company(&record(None), &deps, &settings(), &resolver()).await;

    assert_eq!(result.status, CompanyStatus::Done);
    let homepage = result.homepage.as_ref().expect("homepage decided");
    assert_eq!(homepage.homepage, HOME);
    assert!(homepage.official_flag);
    assert_eq!(homepage.official_source, "rule");

    let FieldValue::Value(phone) = &result.phone else {
        panic!("phone missing: {:?}", result.phone);
    };
    assert_eq!(phone.value, "03-1234-5678");
    assert_eq!(phone.source_url.as_deref(), Some(PROFILE));

    let FieldValue::Value(address) = &result.address else {
        panic!("address missing: {:?}", result.address);
    };
    assert!(address.value.contains("東京都千代田区千代田1-1-1"), "{}", address.value);
    assert!(address.evidence.is_some());

    let FieldValue::Value(rep) = &result.rep_name else {
        panic!("rep missing: {:?}", result.rep_name);
    };
    assert!(rep.value.contains("山田"), "{}", rep.value);

    let FieldValue::Value(capital) = &result.capital else {
        panic!("capital missing");
    };
    assert_eq!(capital, "3,000万円");

    assert_eq!(result.page_types.len(), 2);
    assert!(result.timeout_stage.is_none());

    let flag = flags.stored(HOME).expect("flag remembered");
    assert!(flag.is_official);
    assert_eq!(flag.judge_source, JudgeSource::Rule);
}

// ---------------------------------------------------------------------------
// Test 2 – excluded stored homepage falls through to search results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hard_excluded_homepage_is_flagged_and_next_candidate_used() {
    let social = "https://www.facebook.com/test-seiki";
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with_page(social, "<html><title>株式会社テスト精機</title></html>")
            .with_page(HOME, HOME_HTML)
            .with_page(PROFILE, PROFILE_HTML),
    );
    let flags = Arc::new(MemoryFlags::default());
    let deps = deps(fetcher, Ok(vec![HOME.to_string()]), None, Arc::clone(&flags));

    let result = process_company(&record(Some(social)), &deps, &settings(), &resolver()).await;

    assert_eq!(result.status, CompanyStatus::Done);
    assert_eq!(result.homepage.as_ref().unwrap().homepage, HOME);
    assert!(result
        .drop_reasons
        .iter()
        .any(|r| r.starts_with("homepage_hard_exclude:")));

    let flag = flags.stored(social).expect("negative flag");
    assert!(!flag.is_official);
    assert_eq!(flag.judge_source, JudgeSource::Rule);
}

// ---------------------------------------------------------------------------
// Test 3 – AI rejection is cached and skips the fetch next time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ai_rejection_is_remembered_and_skipped_on_the_next_row() {
    let fetcher = Arc::new(FakeFetcher::default().with_page(OTHER, OTHER_HTML));
    let flags = Arc::new(MemoryFlags::default());
    let rejection = JudgeVerdict {
        verdict: Verdict::No,
        confidence: 0.95,
        reason: "different_company".to_string(),
        address: None,
    };
    let deps = deps(
        Arc::clone(&fetcher),
        Ok(vec![OTHER.to_string()]),
        Some(rejection),
        Arc::clone(&flags),
    );

    let first = process_company(&record(None), &deps, &settings(), &resolver()).await;
    assert_eq!(first.status, CompanyStatus::NoHomepage);
    assert!(first.ai.is_some());
    let flag = flags.stored(OTHER).expect("ai flag");
    assert!(!flag.is_official);
    assert_eq!(flag.judge_source, JudgeSource::Ai);
    assert_eq!(flag.confidence, Some(0.95));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let second = process_company(&record(None), &deps, &settings(), &resolver()).await;
    assert_eq!(second.status, CompanyStatus::NoHomepage);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1, "flagged URL refetched");
    assert!(second
        .drop_reasons
        .iter()
        .any(|r| r.starts_with("url_flag_different_company")));
}

// ---------------------------------------------------------------------------
// Test 4 – no candidates at all
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_candidates_means_no_homepage() {
    let fetcher = Arc::new(FakeFetcher::default());
    let deps = deps(
        Arc::clone(&fetcher),
        Ok(Vec::new()),
        None,
        Arc::new(MemoryFlags::default()),
    );

    let result = process_company(&record(None), &deps, &settings(), &resolver()).await;

    assert_eq!(result.status, CompanyStatus::NoHomepage);
    assert!(result.homepage.as_ref().is_some_and(HomepageDecision::is_empty));
    assert_eq!(result.drop_reasons, vec!["no_homepage_candidates".to_string()]);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn search_failure_is_a_drop_reason_not_an_error() {
    let deps = deps(
        Arc::new(FakeFetcher::default()),
        Err(503),
        None,
        Arc::new(MemoryFlags::default()),
    );

    let result = process_company(&record(None), &deps, &settings(), &resolver()).await;

    assert_eq!(result.status, CompanyStatus::NoHomepage);
    assert_eq!(
        result.drop_reasons,
        vec![
            "search_failed".to_string(),
            "no_homepage_candidates".to_string()
        ]
    );
}

// ---------------------------------------------------------------------------
// Test 5 – row budget runs out mid-fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn budget_exhausted_during_fetch_records_stage_and_needs_review() {
    let fetcher = Arc::new(FakeFetcher {
        delay: Some(Duration::from_secs(2)),
        ..FakeFetcher::default().with_page(HOME, HOME_HTML)
    });
    let deps = deps(
        fetcher,
        Ok(vec![HOME.to_string()]),
        None,
        Arc::new(MemoryFlags::default()),
    );
    let settings = PipelineSettings {
        row_budget: Duration::from_millis(50),
        ..settings()
    };

    let result = process_company(&record(None), &deps, &settings, &resolver()).await;

    assert_eq!(result.timeout_stage.as_deref(), Some("fetch"));
    assert_eq!(result.status, CompanyStatus::Review);
    assert!(result.homepage.is_none());
    assert!(matches!(result.phone, FieldValue::Unknown));
}

// ---------------------------------------------------------------------------
// Address evidence across postal-code layouts
// ---------------------------------------------------------------------------

async fn address_from_profile_row(row_value: &str) -> FoundAddress {
    let profile_html = PROFILE_HTML.replace("〒100-0001 東京都千代田区千代田1-1-1", row_value);
    let fetcher = Arc::new(
        FakeFetcher::default()
            .with_page(HOME, HOME_HTML)
            .with_page(PROFILE, &profile_html),
    );
    let deps = deps(
        fetcher,
        Ok(vec![HOME.to_string()]),
        None,
        Arc::new(MemoryFlags::default()),
    );

    let result = process_company(&record(None), &deps, &settings(), &resolver()).await;
    let FieldValue::Value(address) = result.address else {
        panic!("address missing: {:?}", result.address);
    };
    address
}

#[tokio::test]
async fn evidence_survives_postal_mark_glued_to_address() {
    let address = address_from_profile_row("〒100-0001東京都千代田区千代田1-1-1").await;

    assert!(address.value.contains("東京都千代田区千代田1-1-1"), "{}", address.value);
    let evidence = address.evidence.expect("evidence recorded");
    assert!(evidence.contains("本社所在地"), "{evidence}");
    assert!(evidence.contains("〒100-0001東京都千代田区千代田1-1-1"), "{evidence}");
}

#[tokio::test]
async fn evidence_survives_missing_postal_mark() {
    let address = address_from_profile_row("100-0001 東京都千代田区千代田1-1-1").await;

    assert!(address.value.contains("東京都千代田区千代田1-1-1"), "{}", address.value);
    let evidence = address.evidence.expect("evidence recorded");
    assert!(evidence.contains("本社所在地"), "{evidence}");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[test]
fn fetch_failure_kinds() {
    assert_eq!(failure_kind(&FetchFailure::Timeout), "timeout");
    assert_eq!(failure_kind(&FetchFailure::Failed("x".into())), "failed");
}
