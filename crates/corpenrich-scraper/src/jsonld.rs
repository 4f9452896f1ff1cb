//! schema.org JSON-LD organization facts.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

/// Contact facts published by one JSON-LD organization node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonLdOrganization {
    pub name: Option<String>,
    pub telephones: Vec<String>,
    /// `〒{postalCode} {region}{locality}{street}` compositions.
    pub addresses: Vec<String>,
    pub founders: Vec<String>,
}

impl JsonLdOrganization {
    fn is_empty(&self) -> bool {
        self.telephones.is_empty() && self.addresses.is_empty() && self.founders.is_empty()
    }
}

/// Every JSON-LD node on the page, with top-level arrays and `@graph`
/// containers flattened.
fn jsonld_nodes(html: &str) -> Vec<Value> {
    let mut nodes = Vec::new();
    for cap in SCRIPT_RE.captures_iter(html) {
        let Some(body) = cap.get(1) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) else {
            continue;
        };

        let mut candidates = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        let mut expanded = Vec::new();
        for item in &candidates {
            if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                expanded.extend(graph.iter().cloned());
            }
        }
        candidates.extend(expanded);
        nodes.extend(candidates);
    }
    nodes
}

fn str_values(node: Option<&Value>) -> Vec<String> {
    match node {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items.iter().flat_map(|i| str_values(Some(i))).collect(),
        Some(Value::Number(n)) => vec![n.to_string()],
        _ => Vec::new(),
    }
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect()
}

fn field_str(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn compose_address(node: &Value) -> Option<String> {
    match node {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(_) => {
            let zip = field_str(node, "postalCode");
            let body = format!(
                "{}{}{}",
                field_str(node, "addressRegion"),
                field_str(node, "addressLocality"),
                field_str(node, "streetAddress"),
            );
            match (zip.is_empty(), body.is_empty()) {
                (_, true) => None,
                (true, false) => Some(body),
                (false, false) => Some(format!("〒{} {body}", zip.trim_start_matches('〒'))),
            }
        }
        _ => None,
    }
}

fn person_names(node: Option<&Value>) -> Vec<String> {
    match node {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items.iter().flat_map(|i| person_names(Some(i))).collect(),
        Some(obj @ Value::Object(_)) => {
            let name = field_str(obj, "name");
            if name.is_empty() {
                Vec::new()
            } else {
                vec![name]
            }
        }
        _ => Vec::new(),
    }
}

fn node_to_organization(node: &Value) -> Option<JsonLdOrganization> {
    if !node.is_object() {
        return None;
    }
    let mut addresses = Vec::new();
    match node.get("address") {
        Some(Value::Array(items)) => addresses.extend(items.iter().filter_map(compose_address)),
        Some(addr) => addresses.extend(compose_address(addr)),
        None => {}
    }
    let mut telephones = str_values(node.get("telephone"));
    if let Some(points) = node.get("contactPoint") {
        let points = match points {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        for point in &points {
            telephones.extend(str_values(point.get("telephone")));
        }
    }
    let org = JsonLdOrganization {
        name: Some(field_str(node, "name")).filter(|n| !n.is_empty()),
        telephones,
        addresses,
        founders: person_names(node.get("founder")),
    };
    (!org.is_empty()).then_some(org)
}

/// Organization-like JSON-LD nodes that carry a phone, address or founder.
#[must_use]
pub fn extract_organizations(html: &str) -> Vec<JsonLdOrganization> {
    jsonld_nodes(html)
        .iter()
        .filter_map(node_to_organization)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_with_postal_address() {
        let html = r#"
        <script type="application/ld+json">
        {
          "@context": "https://schema.org",
          "@type": "Organization",
          "name": "Example",
          "telephone": "03-1234-5678",
          "founder": {"@type": "Person", "name": "山田 太郎"},
          "address": {
            "@type": "PostalAddress",
            "addressRegion": "東京都",
            "addressLocality": "渋谷区",
            "streetAddress": "神宮前1-2-3",
            "postalCode": "150-0001"
          }
        }
        </script>"#;
        let orgs = extract_organizations(html);
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].name.as_deref(), Some("Example"));
        assert_eq!(orgs[0].telephones, vec!["03-1234-5678".to_string()]);
        assert_eq!(
            orgs[0].addresses,
            vec!["〒150-0001 東京都渋谷区神宮前1-2-3".to_string()]
        );
        assert_eq!(orgs[0].founders, vec!["山田 太郎".to_string()]);
    }

    #[test]
    fn graph_container_and_contact_points_are_expanded() {
        let html = r#"<script type='application/ld+json'>
        {"@graph": [
          {"@type": "WebSite", "name": "site"},
          {"@type": "Corporation", "contactPoint": [{"telephone": "+81-6-1234-5678"}]}
        ]}
        </script>"#;
        let orgs = extract_organizations(html);
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].telephones, vec!["+81-6-1234-5678".to_string()]);
    }

    #[test]
    fn broken_json_is_skipped() {
        let html = r#"<script type="application/ld+json">{"telephone": </script>"#;
        assert!(extract_organizations(html).is_empty());
    }
}
