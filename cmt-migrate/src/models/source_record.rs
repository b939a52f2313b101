//! Source catalog records
//!
//! A [`SourceRecord`] is read-only input to the engine. It is deserialized
//! from the source export and shared with every worker behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One item exported from the source catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable identifier in the source system; key into the migration state
    pub id: String,
    /// Display name as the supplier wrote it
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Unit cost from the supplier
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub weight_grams: Option<f64>,
    /// Free-form spec text (materials, dimensions)
    #[serde(default)]
    pub specs: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Binary sub-resources (images) to attach to the target record
    #[serde(default)]
    pub images: Vec<SubResourceRef>,
}

/// Pointer to a sub-resource in the source system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResourceRef {
    /// `http(s)://` URL or filesystem path
    pub location: String,
    #[serde(default)]
    pub alt_text: Option<String>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sku: None,
            cost: None,
            stock: None,
            weight_grams: None,
            specs: None,
            vendor: None,
            attributes: BTreeMap::new(),
            images: Vec::new(),
        }
    }

    /// Stable external reference used to find an already-created target record
    ///
    /// The SKU when present, otherwise the source identifier.
    pub fn external_reference(&self) -> &str {
        self.sku
            .as_deref()
            .filter(|sku| !sku.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

impl SubResourceRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            alt_text: None,
        }
    }

    /// True when the location should be fetched over HTTP
    pub fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_reference_prefers_sku() {
        let mut record = SourceRecord::new("src-1", "Glass Bubbler");
        assert_eq!(record.external_reference(), "src-1");

        record.sku = Some("YHS-204".to_string());
        assert_eq!(record.external_reference(), "YHS-204");

        record.sku = Some("  ".to_string());
        assert_eq!(record.external_reference(), "src-1");
    }

    #[test]
    fn test_minimal_json_deserializes() {
        let record: SourceRecord =
            serde_json::from_str(r#"{"id": "7", "name": "Dab Tool"}"#).unwrap();
        assert_eq!(record.id, "7");
        assert!(record.images.is_empty());
        assert!(record.cost.is_none());
    }

    #[test]
    fn test_sub_resource_remote_detection() {
        assert!(SubResourceRef::new("https://cdn.example.com/a.jpg").is_remote());
        assert!(!SubResourceRef::new("images/a.jpg").is_remote());
    }
}
