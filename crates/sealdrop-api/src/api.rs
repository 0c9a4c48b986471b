use async_trait::async_trait;
use sealdrop_core::types::{
    ChunkResponse, ChunkUpload, InitUploadRequest, InitUploadResponse, MergeStatus,
    RecordResponse, ServerConfig, StoreInlineRequest, StoreMetadataRequest, StoreResponse,
};
use sealdrop_core::ShareResult;

/// The backend operations the client depends on.
///
/// Implementations map HTTP outcomes onto `ShareError` kinds:
/// - `fetch_record` / `download`: 404 → `NotFound`
/// - `upload_status`: 404 → `MergeStatus::Unknown`, never an error
/// - `store_metadata`: any non-success → `MetadataStore`
/// - everything else: non-success → `Network { status, message }`
///
/// Response bodies are returned as received; callers decide whether a
/// missing field (`id`, `uploadId`) is fatal.
#[async_trait]
pub trait ShareApi: Send + Sync {
    /// `GET /config`
    async fn fetch_config(&self) -> ShareResult<ServerConfig>;

    /// `POST /api/store`
    async fn store_inline(&self, req: &StoreInlineRequest) -> ShareResult<StoreResponse>;

    /// `POST /api/upload/init`
    async fn init_upload(&self, req: &InitUploadRequest) -> ShareResult<InitUploadResponse>;

    /// `POST /api/upload/chunk` (multipart)
    async fn upload_chunk(&self, chunk: ChunkUpload) -> ShareResult<ChunkResponse>;

    /// `GET /api/upload/status?uploadId=`
    async fn upload_status(&self, upload_id: &str) -> ShareResult<MergeStatus>;

    /// `POST /api/store/metadata`
    async fn store_metadata(&self, req: &StoreMetadataRequest) -> ShareResult<StoreResponse>;

    /// `GET /api/data/:id`
    async fn fetch_record(&self, id: &str) -> ShareResult<RecordResponse>;

    /// `GET /api/download/:id`
    async fn download(&self, id: &str) -> ShareResult<Vec<u8>>;

    /// `POST /api/burn/:id`
    async fn burn(&self, id: &str) -> ShareResult<()>;
}
