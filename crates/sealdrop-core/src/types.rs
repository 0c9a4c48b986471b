//! Wire types for the sealdrop HTTP contract.
//!
//! Field names follow the server's JSON exactly (camelCase, plus the one
//! snake_case `default_duration` in `/config`). All binary fields are
//! standard base64 with padding.

use serde::{Deserialize, Serialize};

/// Default MIME type for file items when the caller does not provide one.
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// File size limit assumed when the server does not report one.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 15;

/// `GET /config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Upper bound for file items, in MiB. `None` when the server omits it.
    #[serde(default, rename = "maxFileSizeMB")]
    pub max_file_size_mb: Option<u64>,
    #[serde(default)]
    pub expiration: ExpirationConfig,
}

impl ServerConfig {
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        self.max_file_size_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// The reported limit, or `DEFAULT_MAX_FILE_SIZE_MB`.
    pub fn effective_max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb.unwrap_or(DEFAULT_MAX_FILE_SIZE_MB)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_duration: Option<String>,
}

/// Password-wrapped master key, as stored next to the record.
///
/// `data` = AES-GCM(PBKDF2(password, salt), iv, base64(master key)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordProtection {
    pub data: String,
    pub iv: String,
    pub salt: String,
}

/// `POST /api/store`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInlineRequest {
    pub encrypted_data: String,
    pub iv: String,
    pub salt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_protection: Option<PasswordProtection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_duration: Option<String>,
}

/// `{id}` body returned by both store endpoints. `id` is optional so a
/// missing field can be reported as a protocol error instead of a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// `POST /api/upload/init`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub file_name: String,
    /// Ciphertext length, never the plaintext length.
    pub file_size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    #[serde(default)]
    pub upload_id: Option<String>,
}

/// One multipart chunk request. Self-describing so the server can validate
/// completeness without a session lookup.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub upload_id: String,
    /// 1-based.
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub file_name: String,
    pub file_size: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of one `GET /api/upload/status` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Completed,
    Pending,
    /// 404: the server has no status for this upload yet.
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadStatusResponse {
    #[serde(default)]
    pub completed: bool,
}

/// `POST /api/store/metadata`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetadataRequest {
    pub id: String,
    pub iv: String,
    pub salt: String,
    pub original_filename: String,
    pub content_type: String,
    /// Size of the merged ciphertext blob.
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_protection: Option<PasswordProtection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_duration: Option<String>,
}

/// Explicit payload discriminant on a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Ciphertext is inline in the record (`encryptedData`).
    Text,
    /// Ciphertext is fetched separately from `/api/download/:id`.
    File,
}

/// `GET /api/data/:id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PayloadKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
    #[serde(default)]
    pub iv: String,
    #[serde(default)]
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_protection: Option<PasswordProtection>,
}

impl RecordResponse {
    /// The payload kind: the explicit `kind` field when the server sends one,
    /// else inferred from `originalFilename` (legacy servers).
    ///
    /// Returns `(kind, inferred)`.
    pub fn payload_kind(&self) -> (PayloadKind, bool) {
        match self.kind {
            Some(kind) => (kind, false),
            None if self.original_filename.as_deref().is_some_and(|n| !n.is_empty()) => {
                (PayloadKind::File, true)
            }
            None => (PayloadKind::Text, true),
        }
    }

    pub fn is_password_protected(&self) -> bool {
        self.password_protection.is_some()
    }
}

/// Error body shapes used by the server: `{error}` on data endpoints,
/// `{message}` on upload endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.is_empty())
    }
}
