//! Test Helper Utilities
//!
//! In-memory fake platform, fixture records and pipeline builders shared by
//! the cmt-migrate integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cmt_migrate::error::TransportError;
use cmt_migrate::models::{SourceRecord, SubResourceRef};
use cmt_migrate::services::description::TemplateDescription;
use cmt_migrate::services::fetcher::{FetchError, SubResourceFetcher};
use cmt_migrate::services::item_pipeline::{ItemPipeline, PipelineOptions};
use cmt_migrate::services::platform_transport::{
    HttpMethod, PlatformRequest, PlatformResponse, PlatformTransport,
};
use cmt_migrate::services::pricing::MarkupPricing;
use cmt_migrate::services::qa_checker::QaRules;
use cmt_migrate::services::rate_limited_client::RetryPolicy;
use cmt_migrate::services::worker_pool::{Checkpoint, PoolConfig};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const VENDOR: &str = "Cloud YHS";

/// One request as the fake platform saw it
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub at: Instant,
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// Product held by the fake platform
#[derive(Debug, Clone)]
struct FakeProduct {
    id: String,
    sku: String,
    images: usize,
}

/// In-memory target platform
///
/// Products are keyed by handle so lookups after a create find them.
pub struct FakePlatform {
    sent: Mutex<Vec<SentRequest>>,
    products: Mutex<HashMap<String, FakeProduct>>,
    next_id: AtomicUsize,
    published: Mutex<Vec<String>>,
    /// SKUs whose create is rejected with 422
    reject_skus: HashSet<String>,
    /// Answer this many requests with 429 before serving anything
    throttle_first: AtomicUsize,
    throttle_wait: Option<Duration>,
    reject_uploads: bool,
    latency: Duration,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            products: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1000),
            published: Mutex::new(Vec::new()),
            reject_skus: HashSet::new(),
            throttle_first: AtomicUsize::new(0),
            throttle_wait: None,
            reject_uploads: false,
            latency: Duration::ZERO,
        }
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_sku(mut self, sku: &str) -> Self {
        self.reject_skus.insert(sku.to_string());
        self
    }

    pub fn throttling_first(self, count: usize, wait: Option<Duration>) -> Self {
        self.throttle_first.store(count, Ordering::SeqCst);
        Self {
            throttle_wait: wait,
            ..self
        }
    }

    pub fn rejecting_uploads(self) -> Self {
        Self {
            reject_uploads: true,
            ..self
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    /// Pretend a product with this handle, SKU and image count already exists
    pub fn with_existing(self, handle: &str, id: &str, sku: &str, images: usize) -> Self {
        self.products.lock().unwrap().insert(
            handle.to_string(),
            FakeProduct {
                id: id.to_string(),
                sku: sku.to_string(),
                images,
            },
        );
        self
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, method: HttpMethod, path_prefix: &str) -> usize {
        self.sent()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .count()
    }

    /// Successful and rejected create attempts
    pub fn create_calls(&self) -> usize {
        self.sent()
            .iter()
            .filter(|r| r.method == HttpMethod::Post && r.path == "products.json")
            .count()
    }

    pub fn lookup_calls(&self) -> usize {
        self.count(HttpMethod::Get, "products.json?handle=")
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub fn product_count(&self) -> usize {
        self.products.lock().unwrap().len()
    }

    /// Images the platform holds for a product id
    pub fn images_of(&self, id: &str) -> usize {
        self.products
            .lock()
            .unwrap()
            .values()
            .find(|p| p.id == id)
            .map_or(0, |p| p.images)
    }

    /// Image uploads sent for a product id, accepted or not
    pub fn upload_calls(&self, id: &str) -> usize {
        let path = format!("products/{}/images.json", id);
        self.sent()
            .iter()
            .filter(|r| r.method == HttpMethod::Post && r.path == path)
            .count()
    }

    fn lookup(&self, path: &str) -> PlatformResponse {
        let handle = path
            .split_once("handle=")
            .map(|(_, rest)| rest.split('&').next().unwrap_or_default())
            .unwrap_or_default();
        let products = self.products.lock().unwrap();
        let found: Vec<Value> = products
            .get(handle)
            .map(|p| {
                vec![json!({
                    "id": p.id.parse::<u64>().unwrap(),
                    "handle": handle,
                    "variants": [{"sku": p.sku}],
                    "images": (1..=p.images).map(|n| json!({"id": n})).collect::<Vec<_>>(),
                })]
            })
            .unwrap_or_default();
        PlatformResponse::new(200, json!({ "products": found }))
    }

    fn create(&self, body: &Value) -> PlatformResponse {
        let product = &body["product"];
        let sku = product["variants"][0]["sku"].as_str().unwrap_or_default();
        if self.reject_skus.contains(sku) {
            return PlatformResponse::new(
                422,
                json!({"errors": {"title": [format!("{} is not allowed", sku)]}}),
            );
        }

        let handle = product["handle"].as_str().unwrap_or_default().to_string();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.products.lock().unwrap().insert(
            handle,
            FakeProduct {
                id: id.clone(),
                sku: sku.to_string(),
                images: 0,
            },
        );
        PlatformResponse::new(201, json!({"product": {"id": id.parse::<u64>().unwrap()}}))
    }

    fn upload(&self, path: &str) -> PlatformResponse {
        let id = path
            .trim_start_matches("products/")
            .trim_end_matches("/images.json");
        let mut products = self.products.lock().unwrap();
        match products.values_mut().find(|p| p.id == id) {
            Some(product) => {
                product.images += 1;
                PlatformResponse::new(200, json!({"image": {"id": product.images}}))
            }
            None => PlatformResponse::new(404, json!({"errors": "Not Found"})),
        }
    }
}

#[async_trait]
impl PlatformTransport for FakePlatform {
    async fn send(&self, request: &PlatformRequest) -> Result<PlatformResponse, TransportError> {
        self.sent.lock().unwrap().push(SentRequest {
            at: Instant::now(),
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let throttled = self
            .throttle_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Ok(PlatformResponse::throttled(self.throttle_wait));
        }

        let response = match (request.method, request.path.as_str()) {
            (HttpMethod::Get, path) => self.lookup(path),
            (HttpMethod::Post, "products.json") => {
                self.create(request.body.as_ref().unwrap_or(&Value::Null))
            }
            (HttpMethod::Post, _) if self.reject_uploads => {
                PlatformResponse::new(422, json!({"errors": "image could not be processed"}))
            }
            (HttpMethod::Post, path) => self.upload(path),
            (HttpMethod::Put, path) => {
                let id = path
                    .trim_start_matches("products/")
                    .trim_end_matches(".json")
                    .to_string();
                self.published.lock().unwrap().push(id.clone());
                PlatformResponse::new(200, json!({"product": {"id": id}}))
            }
        };
        Ok(response)
    }
}

/// Serves fixed bytes; locations containing "missing" fail
pub struct StaticFetcher;

#[async_trait]
impl SubResourceFetcher for StaticFetcher {
    async fn fetch(&self, sub_resource: &SubResourceRef) -> Result<Vec<u8>, FetchError> {
        if sub_resource.location.contains("missing") {
            Err(FetchError::Empty(sub_resource.location.clone()))
        } else {
            Ok(b"\x89PNG fake image".to_vec())
        }
    }
}

/// Records "1".."n", each priced, described and with one image
pub fn records(n: usize) -> Vec<SourceRecord> {
    (1..=n).map(record).collect()
}

pub fn record(i: usize) -> SourceRecord {
    let mut record = SourceRecord::new(i.to_string(), format!("Mystery Hound Water Pipe No. {}", i));
    record.sku = Some(format!("SKU-{}", i));
    record.cost = Some(10.0 + i as f64);
    record.specs = Some("Glass. 200*80*80mm".to_string());
    record.images = vec![SubResourceRef::new(format!("img-{}.jpg", i))];
    record
}

pub fn records_arc(n: usize) -> Arc<[SourceRecord]> {
    records(n).into()
}

/// Handle the pipeline derives for `record(i)`
pub fn handle_of(i: usize) -> String {
    cmt_migrate::services::platform_ops::handle_for(VENDOR, &format!("SKU-{}", i))
}

pub fn pipeline(auto_publish: bool, dedupe_by_reference: bool) -> Arc<ItemPipeline> {
    Arc::new(ItemPipeline::new(
        Arc::new(MarkupPricing::default()),
        Arc::new(TemplateDescription::new(VENDOR, BTreeMap::new())),
        Arc::new(StaticFetcher),
        QaRules::default(),
        PipelineOptions {
            auto_publish,
            dedupe_by_reference,
            vendor: VENDOR.to_string(),
            upload_timeout: Duration::from_secs(60),
        },
    ))
}

pub fn pool_config(workers: usize, checkpoint: Checkpoint, min_interval: Duration) -> PoolConfig {
    PoolConfig {
        workers,
        min_request_interval: min_interval,
        retry: RetryPolicy::default(),
        checkpoint,
        progress_interval: Duration::from_secs(10),
    }
}
