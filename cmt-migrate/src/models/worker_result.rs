//! Per-record pipeline stages and results
//!
//! Stage order:
//! PENDING → PRICED → DESCRIBED → CREATED → SUB_RESOURCES_ATTACHED → QA_CHECKED
//! → {PUBLISHED | KEPT_AS_DRAFT} → DONE, with FAILED reachable from any stage.

use crate::models::PublishStatus;
use cmt_common::events::RecordOutcome;
use serde::{Deserialize, Serialize};

/// Item pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStage {
    Pending,
    /// Cost/retail pair computed
    Priced,
    /// Title, body, tags rendered
    Described,
    /// Draft target record exists
    Created,
    SubResourcesAttached,
    QaChecked,
    Published,
    KeptAsDraft,
    Done,
    Failed,
}

impl ItemStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStage::Done | ItemStage::Failed)
    }
}

/// Outcome of the publication gate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReport {
    pub passed: bool,
    /// One entry per violated rule
    pub issues: Vec<String>,
}

impl QaReport {
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }
}

/// What one worker produced for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub source_id: String,
    pub success: bool,
    pub target_id: Option<String>,
    /// Sub-resources uploaded successfully
    pub sub_resources_attached: usize,
    /// Sub-resources that could not be fetched or uploaded
    pub sub_resources_failed: usize,
    /// Final visibility when `success` is true
    pub status: Option<PublishStatus>,
    pub qa: Option<QaReport>,
    pub error: Option<String>,
    /// Target record already existed and was adopted instead of created
    pub adopted_existing: bool,
    /// Last stage reached (`Done` or `Failed`)
    pub stage: ItemStage,
    /// Stage whose transition failed
    pub failed_at: Option<ItemStage>,
}

impl WorkerResult {
    pub fn failed(
        source_id: impl Into<String>,
        failed_at: ItemStage,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            success: false,
            target_id: None,
            sub_resources_attached: 0,
            sub_resources_failed: 0,
            status: None,
            qa: None,
            error: Some(error.into()),
            adopted_existing: false,
            stage: ItemStage::Failed,
            failed_at: Some(failed_at),
        }
    }

    pub fn outcome(&self) -> RecordOutcome {
        match (self.success, self.status) {
            (true, Some(PublishStatus::Active)) => RecordOutcome::Published,
            (true, _) => RecordOutcome::KeptAsDraft,
            (false, _) => RecordOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_report_passes_only_without_issues() {
        assert!(QaReport::from_issues(vec![]).passed);
        assert!(!QaReport::from_issues(vec!["no sub-resources attached".into()]).passed);
    }

    #[test]
    fn test_failed_result_outcome() {
        let result = WorkerResult::failed("5", ItemStage::Described, "HTTP 422");
        assert_eq!(result.outcome(), RecordOutcome::Failed);
        assert_eq!(result.error.as_deref(), Some("HTTP 422"));
        assert_eq!(result.stage, ItemStage::Failed);
        assert_eq!(result.failed_at, Some(ItemStage::Described));
    }

    #[test]
    fn test_stage_serializes_screaming_snake() {
        let json = serde_json::to_string(&ItemStage::SubResourcesAttached).unwrap();
        assert_eq!(json, "\"SUB_RESOURCES_ATTACHED\"");
    }
}
