//! Typed target platform operations
//!
//! Builds requests for create-record, upload-sub-resource,
//! update-record-status and lookup-by-reference, sends them through a
//! [`RateLimitedClient`], and extracts what the pipeline needs from the
//! responses. Beyond "create returns an identifier", the payload shapes are
//! the platform's concern.

use crate::error::PlatformError;
use crate::models::{PublishStatus, SourceRecord};
use crate::services::platform_transport::PlatformRequest;
use crate::services::rate_limited_client::RateLimitedClient;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Everything needed to create a draft target record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDraft {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub tags: Vec<String>,
    /// Stable handle derived from the external reference
    pub handle: String,
    pub sku: String,
    pub price: f64,
    pub cost: f64,
    pub stock: Option<i64>,
    pub weight_grams: Option<f64>,
}

impl ProductDraft {
    fn to_payload(&self) -> Value {
        let mut variant = json!({
            "price": format!("{:.2}", self.price),
            "sku": self.sku,
            "cost": format!("{:.2}", self.cost),
        });
        if let Some(stock) = self.stock {
            variant["inventory_management"] = json!("shopify");
            variant["inventory_quantity"] = json!(stock);
        }
        if let Some(grams) = self.weight_grams {
            variant["weight"] = json!(grams);
            variant["weight_unit"] = json!("g");
        }

        json!({
            "product": {
                "title": self.title,
                "body_html": self.body_html,
                "vendor": self.vendor,
                "product_type": self.product_type,
                "tags": self.tags.join(", "),
                "handle": self.handle,
                "status": PublishStatus::Draft.as_str(),
                "variants": [variant],
            }
        })
    }
}

/// Create the target record in draft state; returns its identifier
pub async fn create_record(
    client: &mut RateLimitedClient,
    draft: &ProductDraft,
) -> Result<String, PlatformError> {
    let request = PlatformRequest::post("products.json", draft.to_payload());
    let response = client.call(&request).await?;

    id_field(&response.body["product"]["id"])
        .ok_or_else(|| PlatformError::InvalidResponse("create returned no product id".to_string()))
}

/// Upload one sub-resource (image bytes) to an existing target record
pub async fn upload_sub_resource(
    client: &mut RateLimitedClient,
    target_id: &str,
    bytes: &[u8],
    position: usize,
    alt_text: &str,
    timeout: Duration,
) -> Result<(), PlatformError> {
    let attachment = base64::engine::general_purpose::STANDARD.encode(bytes);
    let request = PlatformRequest::post(
        format!("products/{}/images.json", target_id),
        json!({
            "image": {
                "attachment": attachment,
                "position": position,
                "alt": alt_text,
            }
        }),
    )
    .with_timeout(timeout);

    client.call(&request).await.map(|_| ())
}

/// Change the visibility of a target record
pub async fn update_status(
    client: &mut RateLimitedClient,
    target_id: &str,
    status: PublishStatus,
) -> Result<(), PlatformError> {
    let request = PlatformRequest::put(
        format!("products/{}.json", target_id),
        json!({
            "product": {
                "id": target_id,
                "status": status.as_str(),
            }
        }),
    );

    client.call(&request).await.map(|_| ())
}

/// A target record already carrying this record's external reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRecord {
    pub target_id: String,
    /// Images already attached on the platform
    pub sub_resource_count: usize,
}

/// Find a target record previously created for this handle and SKU
///
/// Used before create so that a record created but never checkpointed is
/// adopted on resume instead of duplicated. A product holding the handle
/// under a different SKU is a conflict, never a match.
pub async fn find_by_reference(
    client: &mut RateLimitedClient,
    handle: &str,
    sku: &str,
) -> Result<Option<ExistingRecord>, PlatformError> {
    let request = PlatformRequest::get(format!(
        "products.json?handle={}&fields=id,handle,variants,images",
        handle
    ));
    let response = client.call(&request).await?;

    let products = match response.body.get("products").and_then(Value::as_array) {
        Some(products) => products,
        None => {
            return Err(PlatformError::InvalidResponse(
                "lookup returned no products array".to_string(),
            ))
        }
    };

    let same_handle = products
        .iter()
        .filter(|p| p.get("handle").and_then(Value::as_str).map_or(true, |h| h == handle));

    let mut conflict = None;
    for product in same_handle {
        let Some(target_id) = id_field(&product["id"]) else {
            continue;
        };
        if carries_sku(product, sku) {
            let sub_resource_count = product
                .get("images")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            return Ok(Some(ExistingRecord {
                target_id,
                sub_resource_count,
            }));
        }
        conflict.get_or_insert(target_id);
    }

    match conflict {
        Some(target_id) => Err(PlatformError::ReferenceConflict {
            handle: handle.to_string(),
            target_id,
        }),
        None => Ok(None),
    }
}

fn carries_sku(product: &Value, sku: &str) -> bool {
    product
        .get("variants")
        .and_then(Value::as_array)
        .is_some_and(|variants| {
            variants
                .iter()
                .any(|v| v.get("sku").and_then(Value::as_str) == Some(sku))
        })
}

/// Vendor used for a record: its own, else the default
pub fn vendor_for<'a>(record: &'a SourceRecord, default_vendor: &'a str) -> &'a str {
    record
        .vendor
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default_vendor)
}

/// Handle the pipeline creates a record under
pub fn record_handle(record: &SourceRecord, default_vendor: &str) -> String {
    handle_for(vendor_for(record, default_vendor), record.external_reference())
}

/// Build a URL-safe handle from vendor and external reference
///
/// Lowercase ASCII alphanumerics; every other run of characters becomes a
/// single `-`.
pub fn handle_for(vendor: &str, reference: &str) -> String {
    let mut handle = String::new();
    let mut pending_dash = false;

    for c in format!("{} {}", vendor, reference).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !handle.is_empty() {
                handle.push('-');
            }
            pending_dash = false;
            handle.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    handle
}

fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
