use std::sync::Arc;
use std::time::Duration;

use models::{BatchRecord, TranslateRecord, TranslateStatus, UploadRecord};
use serde::{de::DeserializeOwned, Serialize};

use crate::{KeyedStore, StoreError};

const UPLOAD_PREFIX: &str = "upload:";
const TRANSLATE_PREFIX: &str = "translate:";
const BATCH_PREFIX: &str = "batch:";

/// Outcome of a conditional status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Applied,
    /// The record is already `completed` or `failed`; terminal states are
    /// sticky and the update was discarded.
    AlreadyTerminal(TranslateStatus),
    NotFound,
}

/// Fields a worker may stamp onto a translate record alongside a status
/// transition.
#[derive(Debug, Default, Clone)]
pub struct StatusUpdate {
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

/// Typed access to upload, translate, and batch records. Every write sets
/// the shared data TTL; updates go through `set_keep_ttl` so a record's
/// remaining lifetime is never extended by a status change.
#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KeyedStore>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(kv: Arc<dyn KeyedStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    async fn put<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(record).map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, &json, self.ttl).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(json) = self.kv.get(key).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&json).map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(record))
    }

    pub async fn put_upload(&self, record: &UploadRecord) -> Result<(), StoreError> {
        self.put(&format!("{UPLOAD_PREFIX}{}", record.upload_id), record)
            .await
    }

    pub async fn get_upload(&self, upload_id: &str) -> Result<Option<UploadRecord>, StoreError> {
        self.read(&format!("{UPLOAD_PREFIX}{upload_id}")).await
    }

    pub async fn put_translate(&self, record: &TranslateRecord) -> Result<(), StoreError> {
        self.put(
            &format!("{TRANSLATE_PREFIX}{}", record.translate_id),
            record,
        )
        .await
    }

    pub async fn get_translate(
        &self,
        translate_id: &str,
    ) -> Result<Option<TranslateRecord>, StoreError> {
        self.read(&format!("{TRANSLATE_PREFIX}{translate_id}")).await
    }

    pub async fn put_batch(&self, record: &BatchRecord) -> Result<(), StoreError> {
        self.put(&format!("{BATCH_PREFIX}{}", record.batch_id), record)
            .await
    }

    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchRecord>, StoreError> {
        self.read(&format!("{BATCH_PREFIX}{batch_id}")).await
    }

    /// Transitions a translate record, refusing to move it out of a
    /// terminal state. `completed_at` is stamped on completion; the TTL is
    /// left untouched by the rewrite.
    pub async fn advance_translate(
        &self,
        translate_id: &str,
        next: TranslateStatus,
        update: StatusUpdate,
    ) -> Result<Advance, StoreError> {
        let key = format!("{TRANSLATE_PREFIX}{translate_id}");
        let Some(mut record) = self.read::<TranslateRecord>(&key).await? else {
            return Ok(Advance::NotFound);
        };

        if record.status.is_terminal() {
            return Ok(Advance::AlreadyTerminal(record.status));
        }

        record.status = next;
        if let Some(url) = update.result_url {
            record.result_url = Some(url);
        }
        if let Some(message) = update.error_message {
            record.error_message = Some(message);
        }
        if next == TranslateStatus::Completed {
            record.completed_at = Some(models::utc_now_z());
        }

        let json = serde_json::to_string(&record).map_err(|source| StoreError::Decode {
            key: key.clone(),
            source,
        })?;
        if self.kv.set_keep_ttl(&key, &json).await? {
            Ok(Advance::Applied)
        } else {
            // The record expired between the read and the write.
            Ok(Advance::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, DATA_TTL_SECS};

    fn jobs() -> JobStore {
        JobStore::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(DATA_TTL_SECS),
        )
    }

    fn pending(translate_id: &str) -> TranslateRecord {
        TranslateRecord {
            translate_id: translate_id.to_string(),
            status: TranslateStatus::Pending,
            upload_id: "upload_deadbeef".into(),
            source_language: "ko".into(),
            target_language: "en".into(),
            created_at: models::utc_now_z(),
            completed_at: None,
            original_url: None,
            result_url: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let jobs = jobs();
        assert_eq!(jobs.get_translate("tr_00000000").await.unwrap(), None);
        assert_eq!(jobs.get_upload("upload_00000000").await.unwrap(), None);
        assert_eq!(jobs.get_batch("batch_00000000").await.unwrap(), None);
    }

    #[tokio::test]
    async fn undecodable_payload_is_not_none() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("translate:tr_aaaaaaaa", "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let jobs = JobStore::new(kv, Duration::from_secs(60));
        let err = jobs.get_translate("tr_aaaaaaaa").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn advance_stamps_completion_and_keeps_ttl() {
        let kv = Arc::new(MemoryStore::new());
        let jobs = JobStore::new(kv.clone(), Duration::from_secs(DATA_TTL_SECS));
        let record = pending("tr_00c0ffee");
        jobs.put_translate(&record).await.unwrap();

        jobs.advance_translate("tr_00c0ffee", TranslateStatus::Processing, StatusUpdate::default())
            .await
            .unwrap();
        let outcome = jobs
            .advance_translate(
                "tr_00c0ffee",
                TranslateStatus::Completed,
                StatusUpdate {
                    result_url: Some("/static/result/tr_00c0ffee_result.png".into()),
                    error_message: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, Advance::Applied);

        let stored = jobs.get_translate("tr_00c0ffee").await.unwrap().unwrap();
        assert_eq!(stored.status, TranslateStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(
            stored.result_url.as_deref(),
            Some("/static/result/tr_00c0ffee_result.png")
        );

        let ttl = kv.ttl_of("translate:tr_00c0ffee").await.unwrap().unwrap();
        assert!(ttl > Duration::ZERO);
        assert!(ttl <= Duration::from_secs(DATA_TTL_SECS));
    }

    #[tokio::test]
    async fn terminal_states_are_sticky() {
        let jobs = jobs();
        jobs.put_translate(&pending("tr_deadbeef")).await.unwrap();
        jobs.advance_translate(
            "tr_deadbeef",
            TranslateStatus::Failed,
            StatusUpdate {
                result_url: None,
                error_message: Some("boom".into()),
            },
        )
        .await
        .unwrap();

        let outcome = jobs
            .advance_translate(
                "tr_deadbeef",
                TranslateStatus::Processing,
                StatusUpdate::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Advance::AlreadyTerminal(TranslateStatus::Failed));

        let stored = jobs.get_translate("tr_deadbeef").await.unwrap().unwrap();
        assert_eq!(stored.status, TranslateStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn advance_of_missing_record_reports_not_found() {
        let jobs = jobs();
        let outcome = jobs
            .advance_translate(
                "tr_00000000",
                TranslateStatus::Processing,
                StatusUpdate::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Advance::NotFound);
    }
}
