use std::sync::LazyLock;

use regex::Regex;

pub const UPLOAD_PREFIX: &str = "upload_";
pub const TRANSLATE_PREFIX: &str = "tr_";
pub const BATCH_PREFIX: &str = "batch_";

static UPLOAD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^upload_[0-9a-f]{8}$").unwrap());
static TRANSLATE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tr_[a-f0-9]{8}$").unwrap());
static BATCH_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^batch_[a-f0-9]{8}$").unwrap());

fn short_hex() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}

pub fn new_upload_id() -> String {
    format!("{UPLOAD_PREFIX}{}", short_hex())
}

pub fn new_translate_id() -> String {
    format!("{TRANSLATE_PREFIX}{}", short_hex())
}

pub fn new_batch_id() -> String {
    format!("{BATCH_PREFIX}{}", short_hex())
}

pub fn is_valid_upload_id(id: &str) -> bool {
    UPLOAD_ID.is_match(id)
}

/// Strict format check, used as a path-traversal defense before any
/// identifier is embedded in a filesystem path or store key.
pub fn is_valid_translate_id(id: &str) -> bool {
    TRANSLATE_ID.is_match(id)
}

pub fn is_valid_batch_id(id: &str) -> bool {
    BATCH_ID.is_match(id)
}
