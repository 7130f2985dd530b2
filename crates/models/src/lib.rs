//! Shared domain types: durable identifiers, persisted records, and the
//! in-flight region types exchanged between pipeline stages.

mod ids;
mod records;
mod region;

pub use ids::{
    is_valid_batch_id, is_valid_translate_id, is_valid_upload_id, new_batch_id, new_translate_id,
    new_upload_id, BATCH_PREFIX, TRANSLATE_PREFIX, UPLOAD_PREFIX,
};
pub use records::{
    BatchEntry, BatchRecord, BatchStatus, TranslateRecord, TranslateStatus, UploadRecord,
};
pub use region::{DetectionOutput, ImageSize, TextRegion, TranslationResult};

/// Current UTC time as ISO-8601 with a literal `Z` suffix.
pub fn utc_now_z() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_carry_a_literal_z() {
        let ts = utc_now_z();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(!ts.contains("+00:00"), "{ts}");
    }
}
