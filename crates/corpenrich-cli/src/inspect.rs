//! `inspect`: run one page through classification and extraction without
//! touching the backlog.

use corpenrich_core::{AppConfig, PageType};
use corpenrich_scraper::{
    analyze_html, classify_facts, extract_from_facts, extract_profile_fields, FetchedPage,
    Fetcher, HttpFetcher, OfficialityContext, OfficialityResolver,
};
use serde_json::{json, Value};

/// Fetch `url` and print what the pipeline would see, as JSON.
///
/// With `company_name`, the officiality decision for that company is
/// included as well (rule evidence only; the AI judge is not consulted).
///
/// # Errors
///
/// Returns an error if the fetcher cannot be built or the page cannot be
/// fetched.
pub(crate) async fn run_inspect(
    config: &AppConfig,
    url: &str,
    company_name: Option<&str>,
) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let page = fetcher
        .fetch(url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to fetch {url}: {e}"))?;

    let report = inspect_page(config, &page, company_name);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) fn inspect_page(
    config: &AppConfig,
    page: &FetchedPage,
    company_name: Option<&str>,
) -> Value {
    let facts = analyze_html(&page.html);
    let page_type = classify_facts(&page.final_url, &page.text, Some(&facts));
    let candidates = extract_from_facts(
        &page.text,
        Some(&page.html),
        Some(&facts),
        Some(page_type),
    )
    .with_page(&page.final_url, page_type);
    let profile = extract_profile_fields(&facts);

    let officiality = company_name.map(|name| {
        let resolver = OfficialityResolver::new(
            config.officiality.clone(),
            config.judge.hint_min_confidence,
        );
        let resolution = resolver.resolve(&OfficialityContext {
            company_name: name,
            expected_address: None,
            url: &page.final_url,
            text: &page.text,
            html: &page.html,
            facts: Some(&facts),
            found_address: None,
            profile_hit: page_type == PageType::CompanyProfile,
            verdict: None,
        });
        json!({
            "basis": resolution.basis.as_str(),
            "decision": resolution.decision,
            "evidence_score": resolution.evidence.evidence_score,
            "dropped": resolution.dropped,
        })
    });

    json!({
        "url": page.url,
        "final_url": page.final_url,
        "title": facts.title,
        "page_type": page_type,
        "candidates": candidates,
        "profile": profile,
        "officiality": officiality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpenrich_core::{
        Environment, FetchConfig, JudgeConfig, OfficialityConfig, ReconcileConfig, SearchConfig,
        SelectorConfig, WorkerConfig,
    };

    fn config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            env: Environment::Test,
            log_level: "info".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            db_acquire_timeout_secs: 1,
            worker: WorkerConfig::default(),
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
            judge: JudgeConfig::default(),
            officiality: OfficialityConfig::default(),
            reconcile: ReconcileConfig::default(),
            selector: SelectorConfig::default(),
        }
    }

    #[test]
    fn profile_page_report() {
        let page = FetchedPage::from_html(
            "https://www.test-seiki.co.jp/company/",
            "https://www.test-seiki.co.jp/company/",
            r"<html><head><title>会社概要 | 株式会社テスト精機</title></head><body>
              <table>
                <tr><th>代表者</th><td>山田 太郎</td></tr>
                <tr><th>所在地</th><td>〒100-0001 東京都千代田区千代田1-1-1</td></tr>
                <tr><th>TEL</th><td>03-1234-5678</td></tr>
                <tr><th>資本金</th><td>3,000万円</td></tr>
              </table></body></html>"
                .to_string(),
        );

        let report = inspect_page(&config(), &page, Some("株式会社テスト精機"));

        assert_eq!(report["page_type"], "COMPANY_PROFILE");
        assert_eq!(report["candidates"]["phones"][0]["value"], "03-1234-5678");
        assert_eq!(report["profile"]["capital"], "3,000万円");
        assert_eq!(report["officiality"]["basis"], "rule");
    }

    #[test]
    fn officiality_is_null_without_a_name() {
        let page = FetchedPage::from_html(
            "https://example.co.jp/",
            "https://example.co.jp/",
            "<html><body><p>hello</p></body></html>".to_string(),
        );
        let report = inspect_page(&config(), &page, None);
        assert!(report["officiality"].is_null());
        assert_eq!(report["page_type"], "OTHER");
    }
}
