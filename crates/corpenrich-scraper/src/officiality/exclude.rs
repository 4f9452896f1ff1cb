//! Host exclusion lists and directory-page detection.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::domain::bare_host;

/// Hosts that are never a company's own homepage: social networks, maps,
/// job boards and company directories. Matching covers subdomains.
pub const HARD_EXCLUDE_HOSTS: &[&str] = &[
    "facebook.com",
    "www.facebook.com",
    "twitter.com",
    "www.twitter.com",
    "x.com",
    "instagram.com",
    "www.instagram.com",
    "youtube.com",
    "linkedin.com",
    "tiktok.com",
    "line.me",
    "maps.google.com",
    "google.com",
    "google.co.jp",
    "wikipedia.org",
    "24u.jp",
    "www.24u.jp",
    "korps.jp",
    "korps.co.jp",
    "baseconnect.in",
    "houjin.jp",
    "houjin-bangou.nta.go.jp",
    "info.gbiz.go.jp",
    "mapion.co.jp",
    "navitime.co.jp",
    "itp.ne.jp",
    "ekiten.jp",
    "tabelog.com",
    "hotpepper.jp",
    "indeed.com",
    "jp.indeed.com",
    "townwork.net",
    "rikunabi.com",
    "mynavi.jp",
    "doda.jp",
    "en-japan.com",
    "baitoru.com",
    "hellowork.mhlw.go.jp",
    "openwork.jp",
    "en-hyouban.com",
    "kaisharesearch.com",
    "salesnow.jp",
    "alarmbox.jp",
    "nikkei.com",
    "prtimes.jp",
];

/// Free hosting and blog platforms. Sites here can be official but lower
/// the domain score.
pub const SOFT_SUSPECT_HOSTS: &[&str] = &[
    "wixsite.com",
    "jimdofree.com",
    "jimdo.com",
    "jimdosite.com",
    "fc2.com",
    "blogspot.com",
    "ameblo.jp",
    "hatenablog.com",
    "hatenablog.jp",
    "livedoor.jp",
    "goo.ne.jp",
    "weebly.com",
    "wordpress.com",
    "studio.site",
    "peraichi.com",
    "crayonsite.net",
    "note.com",
    "sakura.ne.jp",
    "xsrv.jp",
];

static NUMERIC_DETAIL_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:corporations?|company|companies|kaisha|detail|details|corp|houjin|c|id)/\d{4,}|/\d{6,}(?:/|\.html?|$)")
        .expect("valid regex")
});
static DIRECTORY_WORDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"企業データベース|法人番号|企業情報データベース|掲載企業|登録企業|企業一覧|会社一覧|口コミ|評判|求人情報|企業検索|法人検索")
        .expect("valid regex")
});

/// Distinct directory words that flag a page even without a detail path.
const WORDING_ONLY_MIN_HITS: usize = 3;

fn host_listed(host: &str, list: &[&str]) -> bool {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let bare = bare_host(&host);
    list.iter().any(|entry| {
        host == *entry || bare == *entry || host.ends_with(&format!(".{entry}"))
    })
}

#[must_use]
pub fn is_hard_excluded(host: &str) -> bool {
    host_listed(host, HARD_EXCLUDE_HOSTS)
}

#[must_use]
pub fn is_soft_suspect(host: &str) -> bool {
    host_listed(host, SOFT_SUSPECT_HOSTS)
}

/// `true` for a URL whose host is hard-excluded. Unparseable URLs count
/// as excluded.
#[must_use]
pub fn is_excluded_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(is_hard_excluded))
        .unwrap_or(true)
}

/// A company-directory detail page rather than the company's own site: a
/// numeric detail path together with database wording, or heavy database
/// wording alone.
#[must_use]
pub fn detect_directory_like(url: &str, text: &str, html: &str) -> bool {
    let path = Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string());
    let mut words: Vec<&str> = DIRECTORY_WORDING_RE
        .find_iter(text)
        .chain(DIRECTORY_WORDING_RE.find_iter(html))
        .map(|m| m.as_str())
        .collect();
    words.sort_unstable();
    words.dedup();

    let numeric_path = NUMERIC_DETAIL_PATH_RE.is_match(&path);
    (numeric_path && !words.is_empty()) || words.len() >= WORDING_ONLY_MIN_HITS
}
