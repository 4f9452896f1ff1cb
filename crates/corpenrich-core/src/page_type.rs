use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Coarse role of a fetched page within a company site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageType {
    CompanyProfile,
    AccessContact,
    BasesList,
    Other,
}

impl PageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::CompanyProfile => "COMPANY_PROFILE",
            PageType::AccessContact => "ACCESS_CONTACT",
            PageType::BasesList => "BASES_LIST",
            PageType::Other => "OTHER",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPANY_PROFILE" => Ok(PageType::CompanyProfile),
            "ACCESS_CONTACT" => Ok(PageType::AccessContact),
            "BASES_LIST" => Ok(PageType::BasesList),
            "OTHER" => Ok(PageType::Other),
            other => Err(CoreError::InvalidPageType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_type_string_forms_match_serde() {
        for pt in [
            PageType::CompanyProfile,
            PageType::AccessContact,
            PageType::BasesList,
            PageType::Other,
        ] {
            let json = serde_json::to_string(&pt).unwrap();
            assert_eq!(json, format!("\"{}\"", pt.as_str()));
            assert_eq!(pt.as_str().parse::<PageType>().unwrap(), pt);
        }
    }

    #[test]
    fn unknown_page_type_is_rejected() {
        assert!("PROFILE".parse::<PageType>().is_err());
    }
}
