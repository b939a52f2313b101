//! Migration services

pub mod description;
pub mod fetcher;
pub mod item_pipeline;
pub mod platform_ops;
pub mod platform_transport;
pub mod pricing;
pub mod qa_checker;
pub mod rate_limited_client;
pub mod source_catalog;
pub mod spreadsheet_catalog;
pub mod state_store;
pub mod wholesale;
pub mod work_distributor;
pub mod worker_pool;

pub use description::{Description, DescriptionRenderer, TemplateDescription};
pub use fetcher::{FetchError, HttpSubResourceFetcher, SubResourceFetcher};
pub use item_pipeline::{ItemPipeline, PipelineOptions};
pub use platform_transport::{
    PlatformRequest, PlatformResponse, PlatformTransport, ShopifyConnection, ShopifyTransport,
};
pub use pricing::{MarkupPricing, Pricing, PricingError, PricingRule};
pub use qa_checker::{QaRules, QaSubject};
pub use rate_limited_client::{RateLimitedClient, RateLimiter, RetryPolicy};
pub use source_catalog::{check_handle_collisions, load_all, JsonFileCatalog, SourceCatalog};
pub use spreadsheet_catalog::SpreadsheetCatalog;
pub use state_store::{JsonFileStateStore, MemoryStateStore, StateStore};
pub use work_distributor::{Assignment, DistributionFilter, WorkDistributor};
pub use worker_pool::{Checkpoint, MigrationSummary, PoolConfig, WorkerPool};
