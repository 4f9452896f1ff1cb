//! Typed company record and its lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Row lifecycle: `pending → running → {done, review, error, no_homepage}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Pending,
    Running,
    Done,
    Review,
    Error,
    NoHomepage,
}

impl CompanyStatus {
    pub const ALL: [CompanyStatus; 6] = [
        CompanyStatus::Pending,
        CompanyStatus::Running,
        CompanyStatus::Done,
        CompanyStatus::Review,
        CompanyStatus::Error,
        CompanyStatus::NoHomepage,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompanyStatus::Pending => "pending",
            CompanyStatus::Running => "running",
            CompanyStatus::Done => "done",
            CompanyStatus::Review => "review",
            CompanyStatus::Error => "error",
            CompanyStatus::NoHomepage => "no_homepage",
        }
    }

    /// Statuses a worker may publish when it releases a row.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, CompanyStatus::Pending | CompanyStatus::Running)
    }
}

impl fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompanyStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

/// A field's state within one enrichment cycle.
///
/// `Unknown` leaves the stored value untouched; `Blank` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue<T> {
    #[default]
    Unknown,
    Blank,
    Value(T),
}

impl<T> FieldValue<T> {
    /// `Value` for `Some`, `Unknown` for `None`.
    pub fn found(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldValue::Value(v),
            None => FieldValue::Unknown,
        }
    }
}

impl FieldValue<String> {
    /// Merge over a stored value: unknown keeps it, blank clears it.
    #[must_use]
    pub fn merge_over(&self, stored: Option<&str>) -> Option<String> {
        match self {
            FieldValue::Unknown => stored.map(str::to_string),
            FieldValue::Blank => None,
            FieldValue::Value(v) if v.trim().is_empty() => None,
            FieldValue::Value(v) => Some(v.clone()),
        }
    }
}

/// Officiality outcome for the chosen homepage of one company.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HomepageDecision {
    pub homepage: String,
    pub official_flag: bool,
    pub official_source: String,
    pub official_score: f64,
    pub domain_score: i32,
}

impl HomepageDecision {
    /// The cleared decision: no homepage, not official, no source, zero score.
    #[must_use]
    pub fn dropped() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.homepage.trim().is_empty()
    }
}

/// One company row as the pipeline sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: i64,
    pub company_name: String,
    /// The stored address the reconciler protects.
    pub address: Option<String>,
    /// Address as imported; never written by the pipeline.
    pub csv_address: Option<String>,
    pub employee_count: Option<i32>,
    pub status: Option<String>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,

    pub homepage: Option<String>,
    pub homepage_official_flag: bool,
    pub homepage_official_source: Option<String>,
    pub homepage_official_score: Option<f64>,
    pub final_homepage: Option<String>,
    pub provisional_homepage: Option<String>,
    pub provisional_reason: Option<String>,

    pub phone: Option<String>,
    pub found_address: Option<String>,
    pub rep_name: Option<String>,
    pub source_url_phone: Option<String>,
    pub source_url_address: Option<String>,
    pub source_url_rep: Option<String>,
    pub phone_source: Option<String>,
    pub address_source: Option<String>,
    pub address_confidence: Option<f64>,
    pub address_evidence: Option<String>,
    pub address_conflict_level: Option<String>,
    pub address_review_reason: Option<String>,

    pub description: Option<String>,
    pub listing: Option<String>,
    pub revenue: Option<String>,
    pub profit: Option<String>,
    pub capital: Option<String>,
    pub fiscal_month: Option<String>,
    pub founded_year: Option<String>,

    pub error_code: Option<String>,
    pub timeout_stage: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl CompanyRecord {
    /// The address reconciliation compares against: the imported address
    /// when present, else the stored one.
    #[must_use]
    pub fn baseline_address(&self) -> Option<&str> {
        self.csv_address
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.address.as_deref().filter(|s| !s.trim().is_empty()))
    }

    #[must_use]
    pub fn parsed_status(&self) -> Option<CompanyStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for st in CompanyStatus::ALL {
            assert_eq!(st.as_str().parse::<CompanyStatus>().unwrap(), st);
        }
        assert!("finished".parse::<CompanyStatus>().is_err());
    }

    #[test]
    fn only_pending_and_running_are_not_terminal() {
        assert!(!CompanyStatus::Pending.is_terminal());
        assert!(!CompanyStatus::Running.is_terminal());
        assert!(CompanyStatus::Review.is_terminal());
        assert!(CompanyStatus::NoHomepage.is_terminal());
    }

    #[test]
    fn field_value_merge_semantics() {
        let stored = Some("03-1111-2222");
        assert_eq!(
            FieldValue::<String>::Unknown.merge_over(stored),
            Some("03-1111-2222".to_string())
        );
        assert_eq!(FieldValue::<String>::Blank.merge_over(stored), None);
        assert_eq!(
            FieldValue::Value("06-1234-5678".to_string()).merge_over(stored),
            Some("06-1234-5678".to_string())
        );
        assert_eq!(FieldValue::Value("  ".to_string()).merge_over(stored), None);
    }

    #[test]
    fn baseline_prefers_csv_address() {
        let rec = CompanyRecord {
            address: Some("大阪府大阪市北区1-1-1".into()),
            csv_address: Some("東京都中央区1-1-1".into()),
            ..CompanyRecord::default()
        };
        assert_eq!(rec.baseline_address(), Some("東京都中央区1-1-1"));

        let rec = CompanyRecord {
            address: Some("東京都中央区1-1-1".into()),
            csv_address: Some(String::new()),
            ..CompanyRecord::default()
        };
        assert_eq!(rec.baseline_address(), Some("東京都中央区1-1-1"));
    }
}
