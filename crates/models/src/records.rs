use serde::{Deserialize, Serialize};

/// Lifecycle of a single translation job. Only the worker moves a record
/// past `Pending`, and the two terminal states are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranslateStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TranslateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Derived batch status. Never persisted; recomputed from the children on
/// every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    PartialFailure,
    Failed,
}

/// Metadata of an ingested source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub upload_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub path: String,
    pub created_at: String,
}

/// Metadata of one translation job, persisted under `translate:{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateRecord {
    pub translate_id: String,
    pub status: TranslateStatus,
    pub upload_id: String,
    pub source_language: String,
    pub target_language: String,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One child of a batch, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub order_index: u32,
    pub upload_id: String,
    pub translate_id: String,
}

/// Persisted batch wrapper. Holds only the child references; child status
/// always comes from the live translate records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub source_language: String,
    pub target_language: String,
    pub images: Vec<BatchEntry>,
    pub created_at: String,
}
