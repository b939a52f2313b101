//! Supplier spreadsheet input
//!
//! The supplier price list is a workbook whose first sheet has three
//! preamble rows, a header row, then one product per row in the columns
//! Product, SKU, Picture, Weight, Specs, Cost, Stock. The SKU doubles as the
//! source identifier.

use crate::models::{SourceRecord, SubResourceRef};
use crate::services::source_catalog::SourceCatalog;
use async_trait::async_trait;
use calamine::{open_workbook_auto, Reader};
use cmt_common::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Preamble plus header
const LEADING_ROWS: usize = 4;

const PRODUCT: usize = 0;
const SKU: usize = 1;
const PICTURE: usize = 2;
const WEIGHT: usize = 3;
const SPECS: usize = 4;
const COST: usize = 5;
const STOCK: usize = 6;

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("digit pattern is valid"));

static WEIGHT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(kg|g)?\b").expect("weight pattern is valid")
});

/// Workbook loaded once, then paged from memory
pub struct SpreadsheetCatalog {
    path: PathBuf,
    records: Vec<SourceRecord>,
}

impl SpreadsheetCatalog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let read_path = path.clone();
        let rows = tokio::task::spawn_blocking(move || read_first_sheet(&read_path))
            .await
            .map_err(|e| Error::Internal(format!("spreadsheet reader task failed: {}", e)))??;

        let records = records_from_rows(&rows);
        debug!(
            path = %path.display(),
            rows = rows.len(),
            records = records.len(),
            "Supplier spreadsheet parsed"
        );
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
impl SourceCatalog for SpreadsheetCatalog {
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

/// Whether a path names a workbook rather than a JSON export
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "xlsx" | "xlsm" | "xlsb" | "xls" | "ods"
            )
        })
}

fn read_first_sheet(path: &Path) -> Result<Vec<Vec<String>>> {
    let invalid = |e: calamine::Error| Error::InvalidInput(format!("{}: {}", path.display(), e));

    let mut workbook = open_workbook_auto(path).map_err(invalid)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::InvalidInput(format!("{}: workbook has no sheets", path.display())))?
        .map_err(invalid)?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect())
        .collect())
}

/// Product rows to records; rows without a product name or SKU are dropped
fn records_from_rows(rows: &[Vec<String>]) -> Vec<SourceRecord> {
    rows.iter()
        .skip(LEADING_ROWS)
        .filter_map(|row| {
            let cell = |i: usize| row.get(i).map(String::as_str).filter(|v| !v.is_empty());

            let name = cell(PRODUCT).filter(|name| *name != "Product")?;
            let sku = cell(SKU)?;

            let mut record = SourceRecord::new(sku, name);
            record.sku = Some(sku.to_string());
            record.cost = cell(COST).and_then(parse_cost);
            record.stock = Some(cell(STOCK).and_then(parse_stock).unwrap_or(0));
            record.weight_grams = cell(WEIGHT).and_then(parse_weight_grams);
            record.specs = cell(SPECS).map(str::to_string);
            record.images = cell(PICTURE).map(SubResourceRef::new).into_iter().collect();
            Some(record)
        })
        .collect()
}

/// `"$1,234.50"` → 1234.5
fn parse_cost(text: &str) -> Option<f64> {
    text.replace(['$', ','], "").trim().parse().ok()
}

/// First digit run, e.g. `"120 in stock"` → 120
fn parse_stock(text: &str) -> Option<i64> {
    DIGITS
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `"12g"`, `"12.5 g"`, `"0.3kg"`, bare numbers as grams
fn parse_weight_grams(text: &str) -> Option<f64> {
    let captures = WEIGHT_VALUE.captures(text)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    match captures.get(2).map(|u| u.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "kg" => Some(value * 1000.0),
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sheet(products: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let mut rows = vec![
            row(&["Cloud YHS Price List"]),
            row(&[]),
            row(&["Updated weekly"]),
            row(&["Product", "SKU", "Picture", "Weight", "Specs", "Cost", "Stock"]),
        ];
        rows.extend(products);
        rows
    }

    #[test]
    fn test_rows_become_records() {
        let rows = sheet(vec![row(&[
            "Mystery Hound Water Pipe",
            "YHS-204",
            "images/yhs-204.jpg",
            "350g",
            "Glass. 200*80*80mm",
            "$1,012.50",
            "12 pcs",
        ])]);

        let records = records_from_rows(&rows);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "YHS-204");
        assert_eq!(record.external_reference(), "YHS-204");
        assert_eq!(record.cost, Some(1012.5));
        assert_eq!(record.stock, Some(12));
        assert_eq!(record.weight_grams, Some(350.0));
        assert_eq!(record.images[0].location, "images/yhs-204.jpg");
    }

    #[test]
    fn test_blank_and_repeated_header_rows_dropped() {
        let rows = sheet(vec![
            row(&["Product", "SKU"]),
            row(&["", "YHS-1"]),
            row(&["Bowl", ""]),
            row(&["Bowl", "YHS-2", "", "", "", "n/a", "sold out"]),
        ]);

        let records = records_from_rows(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "YHS-2");
        assert_eq!(records[0].cost, None);
        assert_eq!(records[0].stock, Some(0));
        assert!(records[0].images.is_empty());
    }

    #[test]
    fn test_weight_units() {
        assert_eq!(parse_weight_grams("12g"), Some(12.0));
        assert_eq!(parse_weight_grams("12.5 G"), Some(12.5));
        assert_eq!(parse_weight_grams("0.3kg"), Some(300.0));
        assert_eq!(parse_weight_grams("80"), Some(80.0));
        assert_eq!(parse_weight_grams("heavy"), None);
    }

    #[test]
    fn test_spreadsheet_detection() {
        assert!(is_spreadsheet(Path::new("price-list.XLSX")));
        assert!(is_spreadsheet(Path::new("a/b.ods")));
        assert!(!is_spreadsheet(Path::new("export.jsonl")));
        assert!(!is_spreadsheet(Path::new("noext")));
    }

    #[tokio::test]
    async fn test_unreadable_workbook_is_invalid_input() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = SpreadsheetCatalog::open(&path).await.err().unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
