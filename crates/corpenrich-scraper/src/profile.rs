//! Company-profile table fields beyond contact data.
//!
//! Values are returned raw; the reconciler cleans them before storage.

use serde::Serialize;

use crate::html::HtmlFacts;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileFields {
    pub description: Option<String>,
    pub listing: Option<String>,
    pub revenue: Option<String>,
    pub profit: Option<String>,
    pub capital: Option<String>,
    pub fiscal_month: Option<String>,
    pub founded_year: Option<String>,
}

impl ProfileFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill gaps from another page; values already found win.
    pub fn merge(&mut self, other: ProfileFields) {
        fn keep(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        keep(&mut self.description, other.description);
        keep(&mut self.listing, other.listing);
        keep(&mut self.revenue, other.revenue);
        keep(&mut self.profit, other.profit);
        keep(&mut self.capital, other.capital);
        keep(&mut self.fiscal_month, other.fiscal_month);
        keep(&mut self.founded_year, other.founded_year);
    }
}

const DESCRIPTION_LABELS: &[&str] = &["事業内容", "事業概要", "業務内容", "営業品目"];
const LISTING_LABELS: &[&str] = &["上場市場", "上場区分", "上場", "証券コード"];
const REVENUE_LABELS: &[&str] = &["売上高", "売上", "年商"];
const PROFIT_LABELS: &[&str] = &["経常利益", "営業利益", "当期純利益", "利益"];
const CAPITAL_LABELS: &[&str] = &["資本金"];
const FISCAL_LABELS: &[&str] = &["決算期", "決算月", "決算"];
const FOUNDED_LABELS: &[&str] = &["設立", "創業", "創立"];

fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '　' | '：' | ':' | '・'))
        .collect()
}

fn lookup(facts: &HtmlFacts, labels: &[&str]) -> Option<String> {
    labels.iter().find_map(|wanted| {
        facts
            .table_rows
            .iter()
            .find(|row| label_key(&row.label).starts_with(wanted))
            .map(|row| row.value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Read profile fields from label/value rows.
#[must_use]
pub fn extract_profile_fields(facts: &HtmlFacts) -> ProfileFields {
    ProfileFields {
        description: lookup(facts, DESCRIPTION_LABELS),
        listing: lookup(facts, LISTING_LABELS),
        revenue: lookup(facts, REVENUE_LABELS),
        profit: lookup(facts, PROFIT_LABELS),
        capital: lookup(facts, CAPITAL_LABELS),
        fiscal_month: lookup(facts, FISCAL_LABELS),
        founded_year: lookup(facts, FOUNDED_LABELS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::analyze_html;

    #[test]
    fn reads_profile_table() {
        let facts = analyze_html(
            r"<table>
              <tr><th>設　立</th><td>1987年4月1日</td></tr>
              <tr><th>資本金</th><td>3,000万円</td></tr>
              <tr><th>売上高</th><td>12億円（2023年3月期）</td></tr>
              <tr><th>決算期</th><td>3月</td></tr>
              <tr><th>事業内容</th><td>産業用機械の設計・製造・販売</td></tr>
            </table>",
        );
        let fields = extract_profile_fields(&facts);
        assert_eq!(fields.founded_year.as_deref(), Some("1987年4月1日"));
        assert_eq!(fields.capital.as_deref(), Some("3,000万円"));
        assert_eq!(fields.revenue.as_deref(), Some("12億円(2023年3月期)"));
        assert_eq!(fields.fiscal_month.as_deref(), Some("3月"));
        assert_eq!(
            fields.description.as_deref(),
            Some("産業用機械の設計・製造・販売")
        );
        assert!(fields.listing.is_none());
    }

    #[test]
    fn merge_keeps_first_value() {
        let mut first = ProfileFields {
            capital: Some("1,000万円".to_string()),
            ..ProfileFields::default()
        };
        first.merge(ProfileFields {
            capital: Some("5,000万円".to_string()),
            founded_year: Some("2001年".to_string()),
            ..ProfileFields::default()
        });
        assert_eq!(first.capital.as_deref(), Some("1,000万円"));
        assert_eq!(first.founded_year.as_deref(), Some("2001年"));
        assert!(!first.is_empty());
    }
}
