//! Integration tests for the HTTP-backed collaborators: `HttpFetcher`,
//! `DuckDuckGoSearch` and `HttpAiJudge`.
//!
//! Each test stands up its own `wiremock` server so no real network
//! traffic is made.

use std::time::Duration;

use corpenrich_core::{FetchConfig, SearchConfig};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use corpenrich_scraper::{
    judge_with_timeout, AiJudge, DuckDuckGoSearch, FetchFailure, Fetcher, HomepageSearch,
    HttpAiJudge, HttpFetcher, JudgeEvidence, ScraperError, Verdict,
};

const PROFILE_HTML: &str = r#"<html><head><title>会社概要 | 株式会社テスト</title></head>
<body>
  <nav><a href="/">ホーム</a><a href="/contact/">お問い合わせ</a></nav>
  <main>
    <h1>会社概要</h1>
    <table>
      <tr><th>本社所在地</th><td>〒100-0001 東京都千代田区千代田1-1-1</td></tr>
      <tr><th>電話番号</th><td>03-1234-5678</td></tr>
    </table>
  </main>
</body></html>"#;

/// Fetcher with an in-memory cache, no retries and a short timeout.
fn test_fetcher(max_retries: u32) -> HttpFetcher {
    let config = FetchConfig {
        timeout_secs: 5,
        user_agent: "corpenrich-test/0.1".to_string(),
        max_retries,
        backoff_base_secs: 0,
        cache_dir: None,
    };
    HttpFetcher::new(&config).expect("failed to build test HttpFetcher")
}

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn evidence(url: &str) -> JudgeEvidence {
    JudgeEvidence {
        company_name: "株式会社テスト".to_string(),
        expected_address: Some("東京都千代田区千代田1-1-1".to_string()),
        url: url.to_string(),
        title: "会社概要 | 株式会社テスト".to_string(),
        ..JudgeEvidence::default()
    }
    .with_text("本社所在地 東京都千代田区千代田1-1-1 電話番号 03-1234-5678")
}

// ---------------------------------------------------------------------------
// Test 1 – fetch returns html and cleaned text
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_returns_html_and_visible_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/company/"))
        .respond_with(html_response(PROFILE_HTML))
        .mount(&server)
        .await;

    let url = format!("{}/company/", server.uri());
    let page = test_fetcher(0).fetch(&url).await.expect("fetch succeeds");

    assert_eq!(page.url, url);
    assert_eq!(page.final_url, url);
    assert!(page.html.contains("<table>"));
    assert!(page.text.contains("03-1234-5678"), "text was: {}", page.text);
    assert!(page.screenshot.is_none());
}

// ---------------------------------------------------------------------------
// Test 2 – 404 is a plain failure and is not retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_maps_not_found_to_failure_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let result = test_fetcher(3).fetch(&url).await;

    assert!(
        matches!(result, Err(FetchFailure::Failed(_))),
        "expected Failed, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Test 3 – transient 503 is retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(PROFILE_HTML))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    let page = test_fetcher(1).fetch(&url).await.expect("retry succeeds");
    assert!(page.text.contains("株式会社テスト"));
}

// ---------------------------------------------------------------------------
// Test 4 – a second fetch of the same URL is served from the cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_fetch_hits_the_page_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/company/"))
        .respond_with(html_response(PROFILE_HTML))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = test_fetcher(0);
    let url = format!("{}/company/", server.uri());
    let first = fetcher.fetch(&url).await.expect("first fetch");
    let second = fetcher.fetch(&url).await.expect("cached fetch");

    assert_eq!(first.html, second.html);
    assert_eq!(first.text, second.text);
}

// ---------------------------------------------------------------------------
// Test 5 – non-html content is rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_rejects_binary_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46]),
        )
        .mount(&server)
        .await;

    let url = format!("{}/profile.pdf", server.uri());
    let result = test_fetcher(0).fetch(&url).await;
    assert!(matches!(result, Err(FetchFailure::Failed(_))));
}

// ---------------------------------------------------------------------------
// Test 6 – search parses, unwraps and filters results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_returns_filtered_result_urls() {
    let server = MockServer::start().await;

    let body = r#"<html><body>
      <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.test-corp.co.jp%2F&rut=x">株式会社テスト</a></div>
      <div class="result"><a class="result__a" href="https://www.facebook.com/testcorp">Facebook</a></div>
      <div class="result"><a class="result__a" href="https://www.test-corp.co.jp/company/">会社概要</a></div>
    </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/html"))
        .and(query_param("q", "株式会社テスト 東京都千代田区"))
        .respond_with(html_response(body))
        .mount(&server)
        .await;

    let config = SearchConfig {
        endpoint: format!("{}/html", server.uri()),
        max_results: 5,
    };
    let search =
        DuckDuckGoSearch::new(&config, "corpenrich-test/0.1", 5, 0, 0).expect("build search");
    let results = search
        .search("株式会社テスト", "東京都千代田区")
        .await
        .expect("search succeeds");

    assert_eq!(
        results,
        vec![
            "https://www.test-corp.co.jp/".to_string(),
            "https://www.test-corp.co.jp/company/".to_string(),
        ]
    );
}

#[tokio::test]
async fn search_surfaces_rate_limiting() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let config = SearchConfig {
        endpoint: format!("{}/html", server.uri()),
        max_results: 5,
    };
    let search =
        DuckDuckGoSearch::new(&config, "corpenrich-test/0.1", 5, 0, 0).expect("build search");
    let result = search.search("株式会社テスト", "").await;

    assert!(
        matches!(result, Err(ScraperError::RateLimited { .. })),
        "expected RateLimited, got: {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Test 7 – judge verdicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn judge_parses_verdict_and_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/judge"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "verdict": "yes",
            "confidence": 0.82,
            "reason": "company profile of the named company",
            "address": "  東京都千代田区千代田1-1-1  "
        })))
        .expect(1)
        .mount(&server)
        .await;

    let judge = HttpAiJudge::new(
        &format!("{}/judge", server.uri()),
        Some("secret".to_string()),
        5,
    )
    .expect("build judge");
    let verdict = judge
        .judge(&evidence("https://www.test-corp.co.jp/"))
        .await
        .expect("judge answers");

    assert_eq!(verdict.verdict, Verdict::Yes);
    assert!((verdict.confidence - 0.82).abs() < f64::EPSILON);
    assert_eq!(verdict.address.as_deref(), Some("東京都千代田区千代田1-1-1"));
}

#[tokio::test]
async fn judge_rejects_out_of_range_confidence() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/judge"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"verdict": "no", "confidence": 7.0})),
        )
        .mount(&server)
        .await;

    let judge = HttpAiJudge::new(&format!("{}/judge", server.uri()), None, 5).expect("build");
    let result = judge.judge(&evidence("https://www.test-corp.co.jp/")).await;
    assert!(matches!(result, Err(ScraperError::Judge(_))));
}

#[tokio::test]
async fn judge_server_error_becomes_unsure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/judge"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let judge = HttpAiJudge::new(&format!("{}/judge", server.uri()), None, 5).expect("build");
    let ev = evidence("https://www.test-corp.co.jp/");

    let direct = judge.judge(&ev).await;
    assert!(matches!(
        direct,
        Err(ScraperError::UnexpectedStatus { status: 500, .. })
    ));

    let verdict = judge_with_timeout(&judge, &ev, Duration::from_secs(5)).await;
    assert_eq!(verdict.verdict, Verdict::Unsure);
    assert_eq!(verdict.reason, "judge_error");
}
