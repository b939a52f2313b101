//! Source catalog input
//!
//! The source is read page by page and fully enumerated before migration
//! begins. [`JsonFileCatalog`] serves pages from an export file holding
//! either a JSON array or JSON lines.

use crate::models::SourceRecord;
use crate::services::platform_ops::record_handle;
use async_trait::async_trait;
use cmt_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Up to `limit` records starting at `offset`; a short page means the end
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<SourceRecord>>;
}

/// Export file loaded once, then paged from memory
pub struct JsonFileCatalog {
    path: PathBuf,
    records: Vec<SourceRecord>,
}

impl JsonFileCatalog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = tokio::fs::read_to_string(&path).await?;
        let records = parse_export(&text)
            .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), records = records.len(), "Source export parsed");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SourceCatalog for JsonFileCatalog {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<SourceRecord>> {
        Ok(self
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// JSON array, or one JSON object per non-blank line
fn parse_export(text: &str) -> std::result::Result<Vec<SourceRecord>, String> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).map_err(|e| e.to_string());
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| format!("line {}: {}", n + 1, e))
        })
        .collect()
}

/// Enumerate the whole catalog
///
/// Fails with `InvalidInput` when two records share an identifier, since the
/// identifier keys the migration state.
pub async fn load_all(catalog: &dyn SourceCatalog, page_size: usize) -> Result<Vec<SourceRecord>> {
    if page_size == 0 {
        return Err(Error::InvalidInput("page size must be at least 1".to_string()));
    }

    let mut records = Vec::new();
    loop {
        let page = catalog.fetch_page(records.len(), page_size).await?;
        let short_page = page.len() < page_size;
        records.extend(page);
        if short_page {
            break;
        }
    }

    let mut seen = HashSet::new();
    for record in &records {
        if !seen.insert(record.id.as_str()) {
            return Err(Error::InvalidInput(format!(
                "duplicate source record id: {}",
                record.id
            )));
        }
    }

    info!(records = records.len(), "Source catalog loaded");
    Ok(records)
}

/// Fail when two records would be created under the same handle
///
/// Handles fold case and punctuation, so distinct references such as
/// `AB-1` and `AB.1` collide and could not be told apart on the platform.
pub fn check_handle_collisions(records: &[SourceRecord], default_vendor: &str) -> Result<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut collisions = Vec::new();

    for record in records {
        let handle = record_handle(record, default_vendor);
        match owners.get(handle.as_str()) {
            Some(first) => collisions.push(format!("{} and {} -> {}", first, record.id, handle)),
            None => {
                owners.insert(handle, record.id.as_str());
            }
        }
    }

    if collisions.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "source records share a target handle: {}",
            collisions.join("; ")
        )))
    }
}

/// Slice `[start, start + count)` of the loaded records, clamped to bounds
pub fn select_batch(records: Vec<SourceRecord>, start: usize, count: Option<usize>) -> Vec<SourceRecord> {
    let mut batch: Vec<SourceRecord> = records.into_iter().skip(start).collect();
    if let Some(count) = count {
        batch.truncate(count);
    }
    batch
}
