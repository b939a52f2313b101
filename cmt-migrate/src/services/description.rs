//! Description collaborator
//!
//! [`DescriptionRenderer`] is pure and infallible. [`TemplateDescription`]
//! renders a sanitized title, an HTML body, a product type and taxonomy tags
//! from keyword tables.

use crate::models::SourceRecord;
use crate::services::pricing::Pricing;
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

/// Display content for one target record
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub title: String,
    pub body_html: String,
    pub product_type: String,
    pub tags: Vec<String>,
}

pub trait DescriptionRenderer: Send + Sync {
    fn render(&self, record: &SourceRecord, pricing: &Pricing) -> Description;
}

/// (name keyword, product type, family tags)
const PRODUCT_TYPES: &[(&str, &str, &[&str])] = &[
    ("water pipe", "Water Pipes", &["family:glass-bong", "use:flower-smoking"]),
    ("bong", "Water Pipes", &["family:glass-bong", "use:flower-smoking"]),
    ("hand pipe", "Hand Pipes", &["family:spoon-pipe", "use:flower-smoking"]),
    ("bubbler", "Bubblers", &["family:bubbler", "use:flower-smoking"]),
    ("nectar collector", "Nectar Collectors", &["family:nectar-collector", "use:dabbing"]),
    ("dab tool", "Dab Tools / Dabbers", &["family:dab-tool", "use:dabbing"]),
    ("battery", "Batteries & Devices", &["family:vape-battery", "use:vaping"]),
    ("bowl", "Bowls & Slides", &["family:flower-bowl", "use:flower-smoking"]),
    ("ashtray", "Ashtrays", &["family:storage-accessory", "use:storage"]),
    ("jar", "Storage Jars", &["family:storage-accessory", "use:storage"]),
    ("clip", "Accessories", &["family:dab-tool", "use:flower-smoking"]),
];

const DEFAULT_PRODUCT_TYPE: &str = "Smoke Shop Products";

const MATERIALS: &[&str] = &["pvc", "glass", "silicone", "plastic", "ceramic", "metal"];

static DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?[xX*]\d+(?:\.\d+)?(?:[xX*]\d+(?:\.\d+)?)?(?:mm|cm|in)?)")
        .expect("dimension pattern is valid")
});

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d+[\d.,]*\s*").expect("dollar pattern is valid"));

static DANGLING_DASHES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s\-\x{2013}\x{2014}]+|[\s\-\x{2013}\x{2014}]+$").expect("dash pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern is valid"));

/// Keyword-table renderer
#[derive(Debug, Clone, Default)]
pub struct TemplateDescription {
    /// Used when a record carries no vendor of its own
    pub default_vendor: String,
    /// Case-insensitive whole-word term and its replacement
    replacements: Vec<(Regex, String)>,
}

impl TemplateDescription {
    /// Terms that do not compile to a pattern are logged and ignored
    pub fn new(default_vendor: impl Into<String>, replacements: BTreeMap<String, String>) -> Self {
        let replacements = replacements
            .into_iter()
            .filter(|(term, _)| !term.trim().is_empty())
            .filter_map(|(term, replacement)| {
                match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term.trim()))) {
                    Ok(pattern) => Some((pattern, replacement)),
                    Err(e) => {
                        warn!(term = %term, error = %e, "Ignoring title replacement");
                        None
                    }
                }
            })
            .collect();

        Self {
            default_vendor: default_vendor.into(),
            replacements,
        }
    }

    /// Trademark-safe title: replacements, no dollar amounts, tidy whitespace
    pub fn sanitize_title(&self, title: &str) -> String {
        let mut cleaned = title.to_string();
        for (pattern, replacement) in &self.replacements {
            cleaned = pattern
                .replace_all(&cleaned, NoExpand(replacement))
                .into_owned();
        }
        clean_title(&cleaned)
    }

    fn vendor<'a>(&'a self, record: &'a SourceRecord) -> &'a str {
        record
            .vendor
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.default_vendor)
    }
}

impl DescriptionRenderer for TemplateDescription {
    fn render(&self, record: &SourceRecord, pricing: &Pricing) -> Description {
        let title = self.sanitize_title(&record.name);
        let product_type = classify_product_type(&record.name);
        let materials = detect_materials(record);
        let dimensions = record.specs.as_deref().and_then(extract_dimensions);
        let vendor = self.vendor(record);

        let material_text = if materials.is_empty() {
            "quality materials".to_string()
        } else {
            materials.join(" and ")
        };

        let mut body = format!(
            "<p>The {} is a {} built from {}, made to hold up to everyday use \
             and to look good doing it. A dependable piece for any collection.</p>\n",
            escape_html(&title),
            product_type.to_lowercase(),
            material_text
        );

        body.push_str("<h2>Specs</h2>\n<ul>\n");
        body.push_str(&format!(
            "<li>Reference SKU: {}</li>\n",
            escape_html(record.external_reference())
        ));
        body.push_str(&format!("<li>Vendor: {}</li>\n", escape_html(vendor)));
        body.push_str(&format!("<li>Materials: {}</li>\n", material_text));
        if let Some(dimensions) = &dimensions {
            body.push_str(&format!("<li>Dimensions: {}</li>\n", dimensions));
        }
        if let Some(grams) = record.weight_grams {
            body.push_str(&format!("<li>Weight: {}g</li>\n", grams));
        }
        body.push_str(&format!("<li>Type: {}</li>\n", product_type));
        for (name, value) in &record.attributes {
            body.push_str(&format!("<li>{}: {}</li>\n", escape_html(name), escape_html(value)));
        }
        body.push_str("</ul>\n");

        if let Some(specs) = record.specs.as_deref().filter(|s| !s.trim().is_empty()) {
            body.push_str(&format!("<p>{}</p>\n", escape_html(specs.trim())));
        }

        tracing::trace!(
            source_id = %record.id,
            retail = pricing.retail,
            "Description rendered"
        );

        Description {
            title,
            body_html: body,
            product_type: product_type.to_string(),
            tags: build_tags(record, vendor, &materials),
        }
    }
}

/// Product type by the first matching keyword in the name
pub fn classify_product_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    PRODUCT_TYPES
        .iter()
        .find(|(keyword, _, _)| lower.contains(keyword))
        .map(|(_, product_type, _)| *product_type)
        .unwrap_or(DEFAULT_PRODUCT_TYPE)
}

fn detect_materials(record: &SourceRecord) -> Vec<&'static str> {
    let haystack = format!(
        "{} {}",
        record.name.to_lowercase(),
        record.specs.as_deref().unwrap_or_default().to_lowercase()
    );
    MATERIALS
        .iter()
        .copied()
        .filter(|m| haystack.contains(m))
        .collect()
}

fn build_tags(record: &SourceRecord, vendor: &str, materials: &[&str]) -> Vec<String> {
    let mut tags = vec![
        format!("vendor:{}", vendor),
        format!("sku:{}", record.external_reference()),
    ];
    tags.extend(materials.iter().map(|m| format!("material:{}", m)));

    let lower = record.name.to_lowercase();
    if let Some((_, _, family)) = PRODUCT_TYPES.iter().find(|(k, _, _)| lower.contains(k)) {
        tags.extend(family.iter().map(|t| t.to_string()));
    }
    tags
}

/// First `LxW` or `LxWxH` group in free text (`x` or `*` separated, optional unit)
///
/// ```
/// use cmt_migrate::services::description::extract_dimensions;
/// assert_eq!(extract_dimensions("Size: 120*45*30mm glass"), Some("120*45*30mm".to_string()));
/// assert_eq!(extract_dimensions("no numbers here"), None);
/// ```
pub fn extract_dimensions(text: &str) -> Option<String> {
    DIMENSIONS
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Drop dollar amounts, trim dangling dashes, collapse whitespace runs
fn clean_title(title: &str) -> String {
    let stripped = DOLLAR_AMOUNT.replace_all(title, "");
    let trimmed = DANGLING_DASHES.replace_all(stripped.trim(), "");
    WHITESPACE_RUN.replace_all(&trimmed, " ").into_owned()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
