//! sealdrop-flow: per-item send and receive state machines
//!
//! Send: encrypt once → `ChunkUploader` → `FinalizeCoordinator` → `ShareLink`
//! (inline text skips the upload session and stores in one request).
//!
//! Receive: `RetrievalController` fetches the record, verifies the optional
//! password against the key in the link fragment, decrypts, then burns.
//!
//! Every item runs in its own context value; nothing here is global.

pub mod chunk;
pub mod clock;
pub mod finalize;
pub mod link;
pub mod retrieve;
pub mod send;
pub mod upload;

pub use chunk::{chunk_plan, ChunkSpan};
pub use clock::{Clock, ManualClock, TokioClock};
pub use finalize::{FinalizeCoordinator, FinalizeState, Finalized};
pub use link::ShareLink;
pub use retrieve::{
    retrieve, retrieve_with_params, Retrieved, RetrievalController, RetrievalState, Revealed,
};
pub use send::{FileOptions, SendSettings, Sender, TextOptions};
pub use upload::{ChunkUploader, UploadState, UploadedBlob};

/// Progress callback: (done, total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Run CPU-bound key stretching on tokio's blocking pool so a PBKDF2 call
/// does not stall the async worker.
pub(crate) async fn run_blocking<T, F>(f: F) -> sealdrop_core::ShareResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        sealdrop_core::ShareError::Other(anyhow::anyhow!("blocking task failed: {e}"))
    })
}
