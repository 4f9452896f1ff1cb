//! One-pass HTML analysis into a plain, `Send` snapshot.
//!
//! `scraper::Html` is not `Send`, so every page is parsed synchronously
//! into [`HtmlFacts`] and the DOM is dropped before any await point.

use std::sync::LazyLock;

use corpenrich_core::text::{collapse_ws, normalize_lines, normalize_text};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static COOKIE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cookie|クッキー|プライバシー|privacy|個人情報保護方針").expect("valid regex")
});

const SKIP_TAGS: [&str; 10] = [
    "head", "title", "script", "style", "noscript", "template", "svg", "iframe", "select",
    "button",
];
const BLOCK_TAGS: [&str; 24] = [
    "p", "div", "br", "li", "ul", "ol", "tr", "td", "th", "dt", "dd", "dl", "table", "h1", "h2",
    "h3", "h4", "h5", "h6", "section", "article", "address", "main", "form",
];
const CHROME_CLASS_TOKENS: [&str; 7] =
    ["nav", "gnav", "globalnav", "global-nav", "menu", "breadcrumb", "header"];

/// One `<a href>` on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    /// Inside `<nav>`, `<header>` or `<footer>`.
    pub in_nav: bool,
}

/// A label/value pair from `th`/`td` or `dt`/`dd` markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRow {
    pub label: String,
    pub value: String,
}

/// Everything downstream needs from a page's markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlFacts {
    pub title: String,
    pub h1: String,
    pub og_site_name: String,
    pub og_title: String,
    pub app_name: String,
    pub headings: Vec<String>,
    pub table_rows: Vec<LabeledRow>,
    pub list_items: Vec<String>,
    pub has_form: bool,
    /// Visible text outside navigation, header, footer and cookie banners.
    pub main_text: String,
    pub footer_text: String,
    /// Navigation and header text.
    pub chrome_text: String,
    pub full_text: String,
    /// `tel:` link targets with the scheme stripped.
    pub tel_hrefs: Vec<String>,
    pub anchors: Vec<Anchor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Main,
    Chrome,
    Footer,
    Skip,
}

#[derive(Default)]
struct TextBuffers {
    main: String,
    chrome: String,
    footer: String,
}

impl TextBuffers {
    fn buffer(&mut self, region: Region) -> Option<&mut String> {
        match region {
            Region::Main => Some(&mut self.main),
            Region::Chrome => Some(&mut self.chrome),
            Region::Footer => Some(&mut self.footer),
            Region::Skip => None,
        }
    }

    fn push_text(&mut self, region: Region, text: &str) {
        if let Some(buf) = self.buffer(region) {
            buf.push_str(text);
        }
    }

    fn break_line(&mut self, region: Region) {
        if let Some(buf) = self.buffer(region) {
            if !buf.ends_with('\n') {
                buf.push('\n');
            }
        }
    }
}

fn sel(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn class_tokens(el: ElementRef<'_>) -> Vec<String> {
    let mut out: Vec<String> = el.value().classes().map(str::to_ascii_lowercase).collect();
    if let Some(id) = el.value().id() {
        out.push(id.to_ascii_lowercase());
    }
    out
}

fn region_for(el: ElementRef<'_>, parent: Region) -> Region {
    if parent == Region::Skip {
        return Region::Skip;
    }
    let name = el.value().name();
    if SKIP_TAGS.contains(&name) {
        return Region::Skip;
    }
    let tokens = class_tokens(el);
    if tokens
        .iter()
        .any(|t| t.contains("cookie") || t.contains("consent") || t.contains("gdpr"))
    {
        return Region::Skip;
    }
    if parent == Region::Footer {
        return Region::Footer;
    }
    if name == "footer" || tokens.iter().any(|t| t.contains("footer")) {
        return Region::Footer;
    }
    if name == "nav"
        || name == "header"
        || tokens
            .iter()
            .any(|t| CHROME_CLASS_TOKENS.contains(&t.as_str()))
    {
        return Region::Chrome;
    }
    parent
}

fn walk(el: ElementRef<'_>, region: Region, bufs: &mut TextBuffers) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => bufs.push_text(region, text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let child_region = region_for(child_el, region);
                let block = BLOCK_TAGS.contains(&child_el.value().name());
                if block {
                    bufs.break_line(child_region);
                }
                walk(child_el, child_region, bufs);
                if block {
                    bufs.break_line(child_region);
                } else {
                    bufs.push_text(child_region, " ");
                }
            }
            _ => {}
        }
    }
}

fn meta_content(doc: &Html, css: &str) -> String {
    sel(css)
        .and_then(|s| {
            doc.select(&s)
                .find_map(|m| m.value().attr("content").map(collapse_ws))
        })
        .unwrap_or_default()
}

fn first_text(doc: &Html, css: &str) -> String {
    sel(css)
        .and_then(|s| doc.select(&s).map(element_text).find(|t| !t.is_empty()))
        .unwrap_or_default()
}

fn in_chrome(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "nav" | "header" | "footer"))
}

fn collect_table_rows(doc: &Html) -> Vec<LabeledRow> {
    let mut rows = Vec::new();
    if let (Some(tr), Some(th), Some(td)) = (sel("tr"), sel("th"), sel("td")) {
        for row in doc.select(&tr) {
            let labels: Vec<String> = row.select(&th).map(element_text).collect();
            let cells: Vec<String> = row.select(&td).map(element_text).collect();
            if let Some(label) = labels.first() {
                let value = cells.join(" ");
                if !label.is_empty() && !value.is_empty() {
                    rows.push(LabeledRow {
                        label: label.clone(),
                        value,
                    });
                }
            } else if cells.len() >= 2 {
                rows.push(LabeledRow {
                    label: cells[0].clone(),
                    value: cells[1..].join(" "),
                });
            }
        }
    }
    if let Some(dl) = sel("dl") {
        for list in doc.select(&dl) {
            let mut label: Option<String> = None;
            for child in list.children().filter_map(ElementRef::wrap) {
                match child.value().name() {
                    "dt" => label = Some(element_text(child)),
                    "dd" => {
                        let value = element_text(child);
                        if let Some(l) = label.as_ref().filter(|l| !l.is_empty()) {
                            if !value.is_empty() {
                                rows.push(LabeledRow {
                                    label: l.clone(),
                                    value,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    rows
}

fn detect_form(doc: &Html) -> bool {
    sel("form textarea, form input[type='email'], form input[type='tel']")
        .is_some_and(|s| doc.select(&s).next().is_some())
}

/// Parse `html` and pull out the facts every later stage consumes.
#[must_use]
pub fn analyze_html(html: &str) -> HtmlFacts {
    let doc = Html::parse_document(html);

    let mut bufs = TextBuffers::default();
    walk(doc.root_element(), Region::Main, &mut bufs);
    let main_text = normalize_lines(&bufs.main);

    let headings = sel("h1, h2, h3")
        .map(|s| {
            doc.select(&s)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let list_items = sel("li")
        .map(|s| {
            doc.select(&s)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut tel_hrefs = Vec::new();
    let mut anchors = Vec::new();
    if let Some(a) = sel("a[href]") {
        for link in doc.select(&a) {
            let Some(href) = link.value().attr("href").map(str::trim) else {
                continue;
            };
            if let Some(number) = href
                .strip_prefix("tel:")
                .or_else(|| href.strip_prefix("TEL:"))
            {
                tel_hrefs.push(number.trim().to_string());
            }
            anchors.push(Anchor {
                href: href.to_string(),
                text: element_text(link),
                in_nav: in_chrome(link),
            });
        }
    }

    let footer_text = normalize_lines(&bufs.footer);
    let chrome_text = normalize_lines(&bufs.chrome);
    let full_text = [chrome_text.as_str(), main_text.as_str(), footer_text.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    HtmlFacts {
        h1: first_text(&doc, "h1"),
        og_site_name: meta_content(&doc, "meta[property='og:site_name']"),
        og_title: meta_content(&doc, "meta[property='og:title']"),
        app_name: meta_content(&doc, "meta[name='application-name']"),
        title: first_text(&doc, "title"),
        headings,
        table_rows: collect_table_rows(&doc),
        list_items,
        has_form: detect_form(&doc),
        main_text,
        footer_text,
        chrome_text,
        full_text,
        tel_hrefs,
        anchors,
    }
}

/// Visible page text for extraction: main body plus footer, without
/// navigation, cookie banners or privacy boilerplate lines.
#[must_use]
pub fn clean_text_from_html(html: &str) -> String {
    let facts = analyze_html(html);
    clean_text_from_facts(&facts)
}

/// [`clean_text_from_html`] over an already analyzed page.
#[must_use]
pub fn clean_text_from_facts(facts: &HtmlFacts) -> String {
    facts
        .main_text
        .lines()
        .chain(facts.footer_text.lines())
        .filter(|l| !COOKIE_LINE_RE.is_match(l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_drops_nav_and_cookie_lines() {
        let html = r#"
        <html>
          <head><title>テスト</title></head>
          <body>
            <nav>ホーム / 会社概要 / お問い合わせ</nav>
            <div id="cookie-banner">当サイトはCookieを使用します。プライバシーポリシー</div>
            <main>
              <p>〒113-0033 東京都文京区本郷3-35</p>
              <p>TEL: 03-1111-2222</p>
            </main>
            <footer>Cookie Policy</footer>
          </body>
        </html>"#;
        let text = clean_text_from_html(html);
        assert!(text.contains("〒113-0033 東京都文京区本郷3-35"));
        assert!(text.contains("03-1111-2222"));
        assert!(!text.contains("Cookie"));
        assert!(!text.contains("プライバシー"));
        assert!(!text.contains("会社概要"));
    }

    #[test]
    fn collects_table_and_definition_rows() {
        let html = r"
        <table>
          <tr><th>代表者</th><td>岡田 彰</td></tr>
          <tr><td>設立</td><td>1998年</td></tr>
        </table>
        <dl><dt>所在地</dt><dd>〒221-0863 横浜市神奈川区羽沢町55</dd></dl>";
        let facts = analyze_html(html);
        assert_eq!(
            facts.table_rows,
            vec![
                LabeledRow {
                    label: "代表者".into(),
                    value: "岡田 彰".into()
                },
                LabeledRow {
                    label: "設立".into(),
                    value: "1998年".into()
                },
                LabeledRow {
                    label: "所在地".into(),
                    value: "〒221-0863 横浜市神奈川区羽沢町55".into()
                },
            ]
        );
    }

    #[test]
    fn separates_chrome_footer_and_main_text() {
        let html = r#"
        <html><head><title>店舗情報</title>
        <meta property="og:site_name" content="テスト商事">
        </head><body>
          <header><nav>お問い合わせ TEL: 03-1234-5678</nav></header>
          <main><h1>店舗情報</h1><p>営業時間: 9:00-18:00</p></main>
          <footer><a href="tel:0312345678">電話</a></footer>
        </body></html>"#;
        let facts = analyze_html(html);
        assert_eq!(facts.title, "店舗情報");
        assert_eq!(facts.h1, "店舗情報");
        assert_eq!(facts.og_site_name, "テスト商事");
        assert!(facts.chrome_text.contains("03-1234-5678"));
        assert!(!facts.main_text.contains("03-1234-5678"));
        assert!(facts.main_text.contains("営業時間"));
        assert!(facts.full_text.contains("03-1234-5678"));
        assert_eq!(facts.tel_hrefs, vec!["0312345678".to_string()]);
        assert!(facts.anchors.iter().all(|a| a.in_nav));
    }

    #[test]
    fn contact_form_is_detected() {
        let html = r#"<form><input type="text" name="q"><textarea name="body"></textarea></form>"#;
        assert!(analyze_html(html).has_form);
        let search = r#"<form><input type="search" name="q"></form>"#;
        assert!(!analyze_html(search).has_form);
    }
}
