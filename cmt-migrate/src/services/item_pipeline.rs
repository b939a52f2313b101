//! Per-record migration pipeline
//!
//! Pending → Priced → Described → Created → SubResourcesAttached →
//! QaChecked → {Published | KeptAsDraft} → Done, with Failed reachable from
//! any transition up to Created. After the create succeeds the record is
//! never failed: sub-resource and publish problems are logged and counted,
//! and the record completes as draft at worst.

use crate::models::{ItemStage, PublishStatus, QaReport, SourceRecord, WorkerResult};
use crate::services::description::DescriptionRenderer;
use crate::services::fetcher::SubResourceFetcher;
use crate::services::platform_ops::{self, ProductDraft};
use crate::services::pricing::PricingRule;
use crate::services::qa_checker::{QaRules, QaSubject};
use crate::services::rate_limited_client::RateLimitedClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Target record the pipeline works on after Created
struct Target {
    target_id: String,
    adopted_existing: bool,
    /// Sub-resources the platform already holds for an adopted record
    sub_resources_present: usize,
}

/// Operator switches for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Publish records whose QA passes
    pub auto_publish: bool,
    /// Look up an existing target record by handle before creating
    pub dedupe_by_reference: bool,
    /// Vendor for records without one
    pub vendor: String,
    pub upload_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            auto_publish: false,
            dedupe_by_reference: true,
            vendor: "Default Vendor".to_string(),
            upload_timeout: Duration::from_secs(60),
        }
    }
}

/// Collaborators plus options; shared by all workers
pub struct ItemPipeline {
    pricing: Arc<dyn PricingRule>,
    renderer: Arc<dyn DescriptionRenderer>,
    fetcher: Arc<dyn SubResourceFetcher>,
    qa: QaRules,
    options: PipelineOptions,
}

impl ItemPipeline {
    pub fn new(
        pricing: Arc<dyn PricingRule>,
        renderer: Arc<dyn DescriptionRenderer>,
        fetcher: Arc<dyn SubResourceFetcher>,
        qa: QaRules,
        options: PipelineOptions,
    ) -> Self {
        Self {
            pricing,
            renderer,
            fetcher,
            qa,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one record to a terminal stage
    ///
    /// Never returns an error; item-level failures are folded into the
    /// [`WorkerResult`].
    pub async fn run(&self, client: &mut RateLimitedClient, record: &SourceRecord) -> WorkerResult {
        let worker = client.worker();
        let source_id = record.id.as_str();
        transition(source_id, worker, ItemStage::Pending);

        // Pending → Priced
        let pricing = match self.pricing.price(record) {
            Ok(pricing) => pricing,
            Err(e) => return fail(source_id, worker, ItemStage::Pending, e.to_string()),
        };
        transition(source_id, worker, ItemStage::Priced);

        // Priced → Described
        let description = self.renderer.render(record, &pricing);
        transition(source_id, worker, ItemStage::Described);

        // Described → Created
        let vendor = platform_ops::vendor_for(record, &self.options.vendor);
        let draft = ProductDraft {
            title: description.title.clone(),
            body_html: description.body_html.clone(),
            vendor: vendor.to_string(),
            product_type: description.product_type.clone(),
            tags: description.tags.clone(),
            handle: platform_ops::record_handle(record, &self.options.vendor),
            sku: record.external_reference().to_string(),
            price: pricing.retail,
            cost: pricing.cost,
            stock: record.stock,
            weight_grams: record.weight_grams,
        };

        let target = match self.create_or_adopt(client, &draft).await {
            Ok(target) => target,
            Err(message) => return fail(source_id, worker, ItemStage::Described, message),
        };
        let target_id = target.target_id;
        let adopted_existing = target.adopted_existing;
        debug!(
            source_id,
            worker,
            target_id = %target_id,
            adopted_existing,
            stage = ?ItemStage::Created,
            "Stage transition"
        );

        // Created → SubResourcesAttached
        let (attached, failed) = self
            .attach_sub_resources(
                client,
                record,
                &target_id,
                &description.title,
                target.sub_resources_present,
            )
            .await;
        transition(source_id, worker, ItemStage::SubResourcesAttached);

        // SubResourcesAttached → QaChecked
        let qa = self.qa.check(&QaSubject {
            title: &description.title,
            body_html: &description.body_html,
            sub_resources: attached,
            price: pricing.retail,
        });
        transition(source_id, worker, ItemStage::QaChecked);

        // QaChecked → Published | KeptAsDraft
        let status = self.publish_gate(client, source_id, &target_id, &qa).await;
        let stage = match status {
            PublishStatus::Active => ItemStage::Published,
            PublishStatus::Draft => ItemStage::KeptAsDraft,
        };
        transition(source_id, worker, stage);
        transition(source_id, worker, ItemStage::Done);

        info!(
            source_id,
            worker,
            target_id = %target_id,
            status = status.as_str(),
            sub_resources = attached,
            "Record migrated"
        );

        WorkerResult {
            source_id: source_id.to_string(),
            success: true,
            target_id: Some(target_id),
            sub_resources_attached: attached,
            sub_resources_failed: failed,
            status: Some(status),
            qa: Some(qa),
            error: None,
            adopted_existing,
            stage: ItemStage::Done,
            failed_at: None,
        }
    }

    async fn create_or_adopt(
        &self,
        client: &mut RateLimitedClient,
        draft: &ProductDraft,
    ) -> Result<Target, String> {
        if self.options.dedupe_by_reference {
            match platform_ops::find_by_reference(client, &draft.handle, &draft.sku).await {
                Ok(Some(existing)) => {
                    info!(
                        handle = %draft.handle,
                        target_id = %existing.target_id,
                        sub_resources = existing.sub_resource_count,
                        "Adopting existing target record"
                    );
                    return Ok(Target {
                        target_id: existing.target_id,
                        adopted_existing: true,
                        sub_resources_present: existing.sub_resource_count,
                    });
                }
                Ok(None) => {}
                Err(e) => return Err(format!("lookup by reference failed: {}", e)),
            }
        }

        platform_ops::create_record(client, draft)
            .await
            .map(|target_id| Target {
                target_id,
                adopted_existing: false,
                sub_resources_present: 0,
            })
            .map_err(|e| e.to_string())
    }

    /// Fetch and upload sub-resources; returns (attached, failed)
    ///
    /// The first `present` sub-resources are already on the target record
    /// and count as attached without being uploaded again.
    async fn attach_sub_resources(
        &self,
        client: &mut RateLimitedClient,
        record: &SourceRecord,
        target_id: &str,
        title: &str,
        present: usize,
    ) -> (usize, usize) {
        let mut attached = present;
        let mut failed = 0;
        if present > 0 {
            debug!(source_id = %record.id, target_id, present, "Sub-resources already attached");
        }

        for (index, sub_resource) in record.images.iter().enumerate().skip(present) {
            let bytes = match self.fetcher.fetch(sub_resource).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(source_id = %record.id, location = %sub_resource.location, error = %e, "Sub-resource fetch failed");
                    failed += 1;
                    continue;
                }
            };

            let alt_text = sub_resource.alt_text.as_deref().unwrap_or(title);
            match platform_ops::upload_sub_resource(
                client,
                target_id,
                &bytes,
                attached + 1,
                alt_text,
                self.options.upload_timeout,
            )
            .await
            {
                Ok(()) => attached += 1,
                Err(e) => {
                    warn!(
                        source_id = %record.id,
                        target_id,
                        index,
                        error = %e,
                        "Sub-resource upload failed"
                    );
                    failed += 1;
                }
            }
        }

        (attached, failed)
    }

    /// Publish when allowed; any failure leaves the record as draft
    async fn publish_gate(
        &self,
        client: &mut RateLimitedClient,
        source_id: &str,
        target_id: &str,
        qa: &QaReport,
    ) -> PublishStatus {
        if !qa.passed {
            warn!(source_id, target_id, issues = ?qa.issues, "QA failed, keeping as draft");
            return PublishStatus::Draft;
        }
        if !self.options.auto_publish {
            return PublishStatus::Draft;
        }

        match platform_ops::update_status(client, target_id, PublishStatus::Active).await {
            Ok(()) => PublishStatus::Active,
            Err(e) => {
                warn!(source_id, target_id, error = %e, "Publish failed, keeping as draft");
                PublishStatus::Draft
            }
        }
    }
}

fn transition(source_id: &str, worker: usize, stage: ItemStage) {
    debug!(source_id, worker, stage = ?stage, "Stage transition");
}

fn fail(source_id: &str, worker: usize, failed_at: ItemStage, message: String) -> WorkerResult {
    error!(source_id, worker, failed_at = ?failed_at, error = %message, "Record failed");
    WorkerResult::failed(source_id, failed_at, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::models::SubResourceRef;
    use crate::services::description::TemplateDescription;
    use crate::services::fetcher::FetchError;
    use crate::services::platform_transport::{
        HttpMethod, PlatformRequest, PlatformResponse, PlatformTransport,
    };
    use crate::services::pricing::MarkupPricing;
    use crate::services::rate_limited_client::RetryPolicy;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Answers lookups with "not found", creates with id 900, images per flag
    struct StubPlatform {
        requests: Mutex<Vec<PlatformRequest>>,
        /// (handle, sku, images) of a product that already exists
        existing: Option<(String, String, usize)>,
        reject_create: bool,
        reject_uploads: bool,
        reject_publish: bool,
    }

    impl StubPlatform {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                existing: None,
                reject_create: false,
                reject_uploads: false,
                reject_publish: false,
            }
        }

        fn paths(&self) -> Vec<(HttpMethod, String)> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| (r.method, r.path.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl PlatformTransport for StubPlatform {
        async fn send(&self, request: &PlatformRequest) -> Result<PlatformResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            let rejected = PlatformResponse::new(422, json!({"errors": "invalid"}));
            let response = match request.method {
                HttpMethod::Get => match &self.existing {
                    Some((handle, sku, images)) => PlatformResponse::new(
                        200,
                        json!({"products": [{
                            "id": 555,
                            "handle": handle,
                            "variants": [{"sku": sku}],
                            "images": vec![json!({"id": 1}); *images],
                        }]}),
                    ),
                    None => PlatformResponse::new(200, json!({"products": []})),
                },
                HttpMethod::Post if request.path == "products.json" => {
                    if self.reject_create {
                        rejected
                    } else {
                        PlatformResponse::new(201, json!({"product": {"id": 900}}))
                    }
                }
                HttpMethod::Post if self.reject_uploads => rejected,
                HttpMethod::Post => PlatformResponse::new(200, json!({"image": {"id": 1}})),
                HttpMethod::Put if self.reject_publish => rejected,
                HttpMethod::Put => PlatformResponse::new(200, json!({"product": {"id": 900}})),
            };
            Ok(response)
        }
    }

    struct BytesFetcher;

    #[async_trait]
    impl SubResourceFetcher for BytesFetcher {
        async fn fetch(&self, sub_resource: &SubResourceRef) -> Result<Vec<u8>, FetchError> {
            if sub_resource.location.contains("broken") {
                Err(FetchError::Empty(sub_resource.location.clone()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn pipeline(auto_publish: bool) -> ItemPipeline {
        ItemPipeline::new(
            Arc::new(MarkupPricing::default()),
            Arc::new(TemplateDescription::new("Cloud YHS", BTreeMap::new())),
            Arc::new(BytesFetcher),
            QaRules::default(),
            PipelineOptions {
                auto_publish,
                vendor: "Cloud YHS".to_string(),
                ..PipelineOptions::default()
            },
        )
    }

    fn record(images: &[&str]) -> SourceRecord {
        let mut record = SourceRecord::new("yhs-1", "Mystery Hound Glass Water Pipe");
        record.sku = Some("YHS-1".to_string());
        record.cost = Some(12.0);
        record.images = images.iter().map(|l| SubResourceRef::new(*l)).collect();
        record
    }

    fn client(platform: Arc<StubPlatform>) -> RateLimitedClient {
        RateLimitedClient::new(platform, Duration::ZERO, RetryPolicy::default(), 0)
    }

    #[tokio::test]
    async fn test_happy_path_publishes() {
        let platform = Arc::new(StubPlatform::new());
        let mut client = client(platform.clone());

        let result = pipeline(true).run(&mut client, &record(&["a.jpg", "b.jpg"])).await;

        assert!(result.success);
        assert_eq!(result.target_id.as_deref(), Some("900"));
        assert_eq!(result.sub_resources_attached, 2);
        assert_eq!(result.status, Some(PublishStatus::Active));
        assert_eq!(result.stage, ItemStage::Done);
        assert!(!result.adopted_existing);

        let paths = platform.paths();
        assert_eq!(paths[0].0, HttpMethod::Get);
        assert_eq!(paths[1], (HttpMethod::Post, "products.json".to_string()));
        assert_eq!(paths[2], (HttpMethod::Post, "products/900/images.json".to_string()));
        assert_eq!(paths[4], (HttpMethod::Put, "products/900.json".to_string()));
    }

    #[tokio::test]
    async fn test_without_auto_publish_stays_draft() {
        let platform = Arc::new(StubPlatform::new());
        let result = pipeline(false)
            .run(&mut client(platform.clone()), &record(&["a.jpg"]))
            .await;

        assert_eq!(result.status, Some(PublishStatus::Draft));
        assert!(result.qa.unwrap().passed);
        assert!(platform.paths().iter().all(|(m, _)| *m != HttpMethod::Put));
    }

    #[tokio::test]
    async fn test_zero_sub_resources_never_published() {
        let platform = Arc::new(StubPlatform::new());
        let result = pipeline(true)
            .run(&mut client(platform.clone()), &record(&["broken.jpg"]))
            .await;

        assert!(result.success);
        assert_eq!(result.sub_resources_attached, 0);
        assert_eq!(result.sub_resources_failed, 1);
        assert_eq!(result.status, Some(PublishStatus::Draft));
        assert!(result
            .qa
            .unwrap()
            .issues
            .contains(&"no sub-resources attached".to_string()));
    }

    #[tokio::test]
    async fn test_upload_failures_are_counted_not_fatal() {
        let platform = Arc::new(StubPlatform {
            reject_uploads: true,
            ..StubPlatform::new()
        });
        let result = pipeline(true)
            .run(&mut client(platform), &record(&["a.jpg", "b.jpg"]))
            .await;

        assert!(result.success);
        assert_eq!(result.sub_resources_failed, 2);
        assert_eq!(result.status, Some(PublishStatus::Draft));
    }

    #[tokio::test]
    async fn test_create_rejection_fails_record() {
        let platform = Arc::new(StubPlatform {
            reject_create: true,
            ..StubPlatform::new()
        });
        let result = pipeline(true)
            .run(&mut client(platform.clone()), &record(&["a.jpg"]))
            .await;

        assert!(!result.success);
        assert_eq!(result.failed_at, Some(ItemStage::Described));
        assert!(result.error.unwrap().contains("HTTP 422"));
        // no uploads after a failed create
        assert_eq!(platform.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_pricing_failure_makes_no_calls() {
        let platform = Arc::new(StubPlatform::new());
        let mut no_cost = record(&["a.jpg"]);
        no_cost.cost = None;

        let result = pipeline(true).run(&mut client(platform.clone()), &no_cost).await;

        assert!(!result.success);
        assert_eq!(result.failed_at, Some(ItemStage::Pending));
        assert!(platform.paths().is_empty());
    }

    #[tokio::test]
    async fn test_existing_reference_is_adopted_without_reupload() {
        let platform = Arc::new(StubPlatform {
            existing: Some(("cloud-yhs-yhs-1".to_string(), "YHS-1".to_string(), 1)),
            ..StubPlatform::new()
        });
        let result = pipeline(false)
            .run(&mut client(platform.clone()), &record(&["a.jpg"]))
            .await;

        assert!(result.adopted_existing);
        assert_eq!(result.target_id.as_deref(), Some("555"));
        assert_eq!(result.sub_resources_attached, 1);
        let paths = platform.paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].0, HttpMethod::Get);
    }

    #[tokio::test]
    async fn test_adopted_record_uploads_only_missing_images() {
        let platform = Arc::new(StubPlatform {
            existing: Some(("cloud-yhs-yhs-1".to_string(), "YHS-1".to_string(), 1)),
            ..StubPlatform::new()
        });
        let result = pipeline(false)
            .run(&mut client(platform.clone()), &record(&["a.jpg", "b.jpg", "c.jpg"]))
            .await;

        assert_eq!(result.sub_resources_attached, 3);
        let uploads: Vec<_> = platform
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == "products/555/images.json")
            .map(|r| r.body.as_ref().unwrap()["image"]["position"].clone())
            .collect();
        assert_eq!(uploads, vec![json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_handle_held_by_other_sku_fails_record() {
        let platform = Arc::new(StubPlatform {
            existing: Some(("cloud-yhs-yhs-1".to_string(), "YHS.1".to_string(), 0)),
            ..StubPlatform::new()
        });
        let result = pipeline(false)
            .run(&mut client(platform.clone()), &record(&["a.jpg"]))
            .await;

        assert!(!result.success);
        assert_eq!(result.failed_at, Some(ItemStage::Described));
        assert!(result.error.unwrap().contains("different SKU"));
        assert_eq!(platform.paths().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_draft() {
        let platform = Arc::new(StubPlatform {
            reject_publish: true,
            ..StubPlatform::new()
        });
        let result = pipeline(true)
            .run(&mut client(platform), &record(&["a.jpg"]))
            .await;

        assert!(result.success);
        assert_eq!(result.status, Some(PublishStatus::Draft));
        assert_eq!(result.stage, ItemStage::Done);
    }
}
