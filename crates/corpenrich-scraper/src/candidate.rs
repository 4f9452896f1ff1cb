//! Tagged candidate values and their textual `[SOURCE][CTX]value` form.

use std::fmt;

use corpenrich_core::PageType;
use serde::{Deserialize, Serialize};

/// The three fields extraction produces candidates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Phone,
    Address,
    RepName,
}

/// Where on the page a value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTag {
    Table,
    Label,
    Footer,
    JsonLd,
    TelHref,
    Text,
    Role,
}

impl SourceTag {
    pub const ALL: [SourceTag; 7] = [
        SourceTag::Table,
        SourceTag::Label,
        SourceTag::Footer,
        SourceTag::JsonLd,
        SourceTag::TelHref,
        SourceTag::Text,
        SourceTag::Role,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Table => "TABLE",
            SourceTag::Label => "LABEL",
            SourceTag::Footer => "FOOTER",
            SourceTag::JsonLd => "JSONLD",
            SourceTag::TelHref => "TELHREF",
            SourceTag::Text => "TEXT",
            SourceTag::Role => "ROLE",
        }
    }

    /// Structured sources outrank free text. `ROLE` only counts for names.
    #[must_use]
    pub fn is_structured(self, field: Field) -> bool {
        match self {
            SourceTag::Table | SourceTag::Label | SourceTag::JsonLd | SourceTag::TelHref => true,
            SourceTag::Role => field == Field::RepName,
            SourceTag::Footer | SourceTag::Text => false,
        }
    }

    /// Tie-break order within a tier; lower wins.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            SourceTag::Table => 0,
            SourceTag::Label => 1,
            SourceTag::JsonLd => 2,
            SourceTag::TelHref => 3,
            SourceTag::Role => 4,
            SourceTag::Footer => 5,
            SourceTag::Text => 6,
        }
    }
}

/// What the surrounding label or text says about a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextTag {
    Hq,
    Rep,
    Branch,
    Keiri,
}

impl ContextTag {
    pub const ALL: [ContextTag; 4] = [
        ContextTag::Hq,
        ContextTag::Rep,
        ContextTag::Branch,
        ContextTag::Keiri,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContextTag::Hq => "HQ",
            ContextTag::Rep => "REP",
            ContextTag::Branch => "BRANCH",
            ContextTag::Keiri => "KEIRI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub source: Option<SourceTag>,
    pub context: Vec<ContextTag>,
}

impl Provenance {
    #[must_use]
    pub fn new(source: SourceTag, context: Vec<ContextTag>) -> Self {
        Self {
            source: Some(source),
            context,
        }
    }

    #[must_use]
    pub fn has(&self, tag: ContextTag) -> bool {
        self.context.contains(&tag)
    }

    /// Head-office or representative context.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.has(ContextTag::Hq) || self.has(ContextTag::Rep)
    }

    #[must_use]
    pub fn is_tagged(&self) -> bool {
        self.source.is_some() || !self.context.is_empty()
    }

    #[must_use]
    pub fn is_structured(&self, field: Field) -> bool {
        self.source.is_some_and(|s| s.is_structured(field))
    }

    /// Split leading `[TAG]` markers off `s`. Unknown bracketed text is
    /// left as part of the value.
    #[must_use]
    pub fn parse_prefix(s: &str) -> (Self, &str) {
        let mut prov = Provenance::default();
        let mut rest = s.trim_start();
        while let Some(inner) = rest.strip_prefix('[') {
            let Some(end) = inner.find(']') else {
                break;
            };
            let tag = &inner[..end];
            if let Some(src) = SourceTag::ALL.into_iter().find(|t| t.as_str() == tag) {
                if prov.source.is_none() {
                    prov.source = Some(src);
                }
            } else if let Some(ctx) = ContextTag::ALL.into_iter().find(|t| t.as_str() == tag) {
                if !prov.context.contains(&ctx) {
                    prov.context.push(ctx);
                }
            } else {
                break;
            }
            rest = &inner[end + 1..];
        }
        (prov, rest.trim())
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(src) = self.source {
            write!(f, "[{}]", src.as_str())?;
        }
        for ctx in &self.context {
            write!(f, "[{}]", ctx.as_str())?;
        }
        Ok(())
    }
}

/// One extracted value with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub field: Field,
    pub value: String,
    pub provenance: Provenance,
    pub source_url: Option<String>,
    pub page_type: Option<PageType>,
    /// The raw label and text the value was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Candidate {
    #[must_use]
    pub fn new(field: Field, value: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            field,
            value: value.into(),
            provenance,
            source_url: None,
            page_type: None,
            evidence: None,
        }
    }

    /// Parse the textual `[SOURCE][CTX]value` form.
    #[must_use]
    pub fn from_tagged(field: Field, tagged: &str) -> Self {
        let (provenance, value) = Provenance::parse_prefix(tagged);
        Self::new(field, value, provenance)
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        let evidence = evidence.into();
        let trimmed = evidence.trim();
        self.evidence = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    #[must_use]
    pub fn with_page(mut self, url: &str, page_type: PageType) -> Self {
        self.source_url = Some(url.to_string());
        self.page_type = Some(page_type);
        self
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.provenance, self.value)
    }
}
