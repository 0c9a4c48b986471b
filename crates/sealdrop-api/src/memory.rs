//! In-memory backend for tests.
//!
//! Behaves like the real server for the happy path (sessions, ordered chunk
//! acceptance, merge, records, burn) and lets tests script merge status
//! responses and inject failures. Call counters make "no decrypt / no burn"
//! assertions possible.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sealdrop_core::types::{
    ChunkResponse, ChunkUpload, InitUploadRequest, InitUploadResponse, MergeStatus, PayloadKind,
    RecordResponse, ServerConfig, StoreInlineRequest, StoreMetadataRequest, StoreResponse,
};
use sealdrop_core::{ShareError, ShareResult};

use crate::api::ShareApi;

/// One scripted answer for `upload_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedStatus {
    Status(MergeStatus),
    /// Non-success HTTP status other than 404.
    Fail(u16),
}

/// Number of calls made to each operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch_config: u32,
    pub store_inline: u32,
    pub init_upload: u32,
    pub upload_chunk: u32,
    pub upload_status: u32,
    pub store_metadata: u32,
    pub fetch_record: u32,
    pub download: u32,
    pub burn: u32,
}

#[derive(Debug, Default)]
struct Session {
    file_size: u64,
    total_chunks: Option<u32>,
    received: Vec<Vec<u8>>,
    merged: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
struct Item {
    record: RecordResponse,
    blob: Option<Vec<u8>>,
    set_duration: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    config: ServerConfig,
    next_id: u64,
    sessions: HashMap<String, Session>,
    items: HashMap<String, Item>,
    status_script: VecDeque<ScriptedStatus>,
    fail_chunk: Option<u32>,
    fail_metadata: Option<u16>,
    fail_burn: bool,
    omit_response_ids: bool,
    legacy_records: bool,
    calls: CallCounts,
}

impl State {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-process `ShareApi`. Cheap to construct; share it by reference.
#[derive(Debug, Default)]
pub struct MemoryShareApi {
    state: Mutex<State>,
}

impl MemoryShareApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let api = Self::default();
        api.lock().config = config;
        api
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue answers for `upload_status`. Once drained, the status reflects
    /// whether all chunks have arrived.
    pub fn script_status(&self, answers: impl IntoIterator<Item = ScriptedStatus>) {
        self.lock().status_script.extend(answers);
    }

    /// Make the chunk with this 1-based number fail with a 500.
    pub fn fail_chunk(&self, number: u32) {
        self.lock().fail_chunk = Some(number);
    }

    /// Make `store_metadata` fail with this status.
    pub fn fail_metadata(&self, status: u16) {
        self.lock().fail_metadata = Some(status);
    }

    /// Make `burn` fail with a 500 (and keep the record).
    pub fn fail_burn(&self) {
        self.lock().fail_burn = true;
    }

    /// Return `{}` from the store endpoints, as an older server might.
    pub fn omit_response_ids(&self) {
        self.lock().omit_response_ids = true;
    }

    /// Serve records without the `kind` discriminant.
    pub fn serve_legacy_records(&self) {
        self.lock().legacy_records = true;
    }

    /// Insert a record directly, bypassing the store endpoints.
    pub fn insert_record(&self, id: &str, record: RecordResponse, blob: Option<Vec<u8>>) {
        self.lock().items.insert(
            id.to_string(),
            Item {
                record,
                blob,
                set_duration: None,
            },
        );
    }

    pub fn record(&self, id: &str) -> Option<RecordResponse> {
        self.lock().items.get(id).map(|item| item.record.clone())
    }

    pub fn blob(&self, id: &str) -> Option<Vec<u8>> {
        self.lock().items.get(id).and_then(|item| item.blob.clone())
    }

    /// The `setDuration` the item was stored with.
    pub fn set_duration(&self, id: &str) -> Option<String> {
        self.lock()
            .items
            .get(id)
            .and_then(|item| item.set_duration.clone())
    }

    /// Sizes of the chunks received so far for an upload, in arrival order.
    pub fn chunk_sizes(&self, upload_id: &str) -> Vec<usize> {
        self.lock()
            .sessions
            .get(upload_id)
            .map(|s| s.received.iter().map(Vec::len).collect())
            .unwrap_or_default()
    }

    /// The `fileSize` declared at init.
    pub fn declared_size(&self, upload_id: &str) -> Option<u64> {
        self.lock().sessions.get(upload_id).map(|s| s.file_size)
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }
}

#[async_trait]
impl ShareApi for MemoryShareApi {
    async fn fetch_config(&self) -> ShareResult<ServerConfig> {
        let mut state = self.lock();
        state.calls.fetch_config += 1;
        Ok(state.config.clone())
    }

    async fn store_inline(&self, req: &StoreInlineRequest) -> ShareResult<StoreResponse> {
        let mut state = self.lock();
        state.calls.store_inline += 1;

        if req.encrypted_data.is_empty() || req.iv.is_empty() || req.salt.is_empty() {
            return Err(ShareError::network(Some(400), "missing required fields"));
        }

        let id = state.fresh_id("item");
        let record = RecordResponse {
            kind: Some(PayloadKind::Text),
            encrypted_data: Some(req.encrypted_data.clone()),
            iv: req.iv.clone(),
            salt: req.salt.clone(),
            content_type: req.content_type.clone(),
            original_filename: None,
            password_protection: req.password_protection.clone(),
        };
        state.items.insert(
            id.clone(),
            Item {
                record,
                blob: None,
                set_duration: req.set_duration.clone(),
            },
        );

        let id = (!state.omit_response_ids).then_some(id);
        Ok(StoreResponse { id })
    }

    async fn init_upload(&self, req: &InitUploadRequest) -> ShareResult<InitUploadResponse> {
        let mut state = self.lock();
        state.calls.init_upload += 1;

        if req.file_name.is_empty() || req.file_size == 0 {
            return Err(ShareError::network(Some(400), "invalid upload parameters"));
        }

        let upload_id = state.fresh_id("upload");
        state.sessions.insert(
            upload_id.clone(),
            Session {
                file_size: req.file_size,
                ..Default::default()
            },
        );
        Ok(InitUploadResponse {
            upload_id: Some(upload_id),
        })
    }

    async fn upload_chunk(&self, chunk: ChunkUpload) -> ShareResult<ChunkResponse> {
        let mut state = self.lock();
        state.calls.upload_chunk += 1;

        if state.fail_chunk == Some(chunk.chunk_number) {
            return Err(ShareError::network(Some(500), "failed to save chunk"));
        }

        let session = state
            .sessions
            .get_mut(&chunk.upload_id)
            .ok_or_else(|| ShareError::network(Some(404), "upload session not found"))?;

        let expected = session.received.len() as u32 + 1;
        if chunk.chunk_number != expected {
            return Err(ShareError::network(
                Some(400),
                format!("expected chunk {expected}, got {}", chunk.chunk_number),
            ));
        }
        if *session.total_chunks.get_or_insert(chunk.total_chunks) != chunk.total_chunks {
            return Err(ShareError::network(Some(400), "totalChunks changed mid-upload"));
        }

        session.received.push(chunk.bytes);
        Ok(ChunkResponse {
            message: Some(format!("chunk {} received", chunk.chunk_number)),
        })
    }

    async fn upload_status(&self, upload_id: &str) -> ShareResult<MergeStatus> {
        let mut state = self.lock();
        state.calls.upload_status += 1;

        if let Some(answer) = state.status_script.pop_front() {
            return match answer {
                ScriptedStatus::Status(status) => Ok(status),
                ScriptedStatus::Fail(code) => {
                    Err(ShareError::network(Some(code), "status check failed"))
                }
            };
        }

        let Some(session) = state.sessions.get_mut(upload_id) else {
            return Ok(MergeStatus::Unknown);
        };
        if session.merged.is_some() {
            return Ok(MergeStatus::Completed);
        }
        match session.total_chunks {
            Some(total) if session.received.len() as u32 == total => {
                session.merged = Some(session.received.concat());
                Ok(MergeStatus::Completed)
            }
            _ => Ok(MergeStatus::Pending),
        }
    }

    async fn store_metadata(&self, req: &StoreMetadataRequest) -> ShareResult<StoreResponse> {
        let mut state = self.lock();
        state.calls.store_metadata += 1;

        if let Some(status) = state.fail_metadata {
            return Err(ShareError::MetadataStore {
                status,
                message: "failed to store metadata".into(),
            });
        }

        let session = state
            .sessions
            .get_mut(&req.id)
            .ok_or_else(|| ShareError::MetadataStore {
                status: 404,
                message: "upload session not found".into(),
            })?;
        // A scripted status may have reported completion before the merge
        // actually ran; merge now in that case.
        let blob = match session.merged.take() {
            Some(blob) => blob,
            None => session.received.concat(),
        };

        let record = RecordResponse {
            kind: Some(PayloadKind::File),
            encrypted_data: None,
            iv: req.iv.clone(),
            salt: req.salt.clone(),
            content_type: Some(req.content_type.clone()),
            original_filename: Some(req.original_filename.clone()),
            password_protection: req.password_protection.clone(),
        };
        state.items.insert(
            req.id.clone(),
            Item {
                record,
                blob: Some(blob),
                set_duration: req.set_duration.clone(),
            },
        );

        let id = (!state.omit_response_ids).then(|| req.id.clone());
        Ok(StoreResponse { id })
    }

    async fn fetch_record(&self, id: &str) -> ShareResult<RecordResponse> {
        let mut state = self.lock();
        state.calls.fetch_record += 1;

        let mut record = state
            .items
            .get(id)
            .map(|item| item.record.clone())
            .ok_or_else(|| ShareError::NotFound(id.to_string()))?;
        if state.legacy_records {
            record.kind = None;
        }
        Ok(record)
    }

    async fn download(&self, id: &str) -> ShareResult<Vec<u8>> {
        let mut state = self.lock();
        state.calls.download += 1;

        state
            .items
            .get(id)
            .and_then(|item| item.blob.clone())
            .ok_or_else(|| ShareError::NotFound(id.to_string()))
    }

    async fn burn(&self, id: &str) -> ShareResult<()> {
        let mut state = self.lock();
        state.calls.burn += 1;

        if state.fail_burn {
            return Err(ShareError::network(Some(500), "failed to delete data"));
        }
        state.items.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(upload_id: &str, number: u32, total: u32, bytes: &[u8]) -> ChunkUpload {
        ChunkUpload {
            upload_id: upload_id.to_string(),
            chunk_number: number,
            total_chunks: total,
            file_name: "f.bin".into(),
            file_size: 6,
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_chunks_merge_in_order() {
        let api = MemoryShareApi::new();
        let init = api
            .init_upload(&InitUploadRequest {
                file_name: "f.bin".into(),
                file_size: 6,
            })
            .await
            .unwrap();
        let id = init.upload_id.unwrap();

        api.upload_chunk(chunk(&id, 1, 2, b"abc")).await.unwrap();
        assert_eq!(api.upload_status(&id).await.unwrap(), MergeStatus::Pending);
        api.upload_chunk(chunk(&id, 2, 2, b"def")).await.unwrap();
        assert_eq!(api.upload_status(&id).await.unwrap(), MergeStatus::Completed);
        assert_eq!(api.chunk_sizes(&id), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_out_of_order_chunk_rejected() {
        let api = MemoryShareApi::new();
        let id = api
            .init_upload(&InitUploadRequest {
                file_name: "f.bin".into(),
                file_size: 6,
            })
            .await
            .unwrap()
            .upload_id
            .unwrap();

        let err = api.upload_chunk(chunk(&id, 2, 2, b"def")).await.unwrap_err();
        assert!(matches!(err, ShareError::Network { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_unknown_upload_status_is_unknown() {
        let api = MemoryShareApi::new();
        assert_eq!(
            api.upload_status("nope").await.unwrap(),
            MergeStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_burn_removes_record() {
        let api = MemoryShareApi::new();
        api.insert_record("r1", RecordResponse::default(), None);
        api.burn("r1").await.unwrap();

        let err = api.fetch_record("r1").await.unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));
        assert_eq!(api.calls().burn, 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_status() {
        let api = MemoryShareApi::new();
        api.script_status([ScriptedStatus::Fail(503)]);
        let err = api.upload_status("x").await.unwrap_err();
        assert!(matches!(err, ShareError::Network { status: Some(503), .. }));
    }
}
