//! Sequential chunked upload of one ciphertext.
//!
//! ```text
//! Idle → Initialized → Uploading(i of N) → AllChunksSent
//!   └──────────┴──────────────┴────────→ Failed(reason)
//! ```
//!
//! One chunk is in flight at a time, in ascending order from 1. Any failure
//! aborts the whole upload; there is no chunk-level retry or resume.

use sealdrop_api::ShareApi;
use sealdrop_core::types::{ChunkUpload, InitUploadRequest};
use sealdrop_core::{ShareError, ShareResult};
use tracing::{debug, info, warn};

use crate::chunk::chunk_plan;
use crate::ProgressFn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Initialized {
        upload_id: String,
    },
    Uploading {
        upload_id: String,
        /// Chunks accepted so far
        sent: u32,
        total: u32,
    },
    AllChunksSent {
        upload_id: String,
        total: u32,
    },
    Failed(String),
}

/// Outcome of `ChunkUploader::upload_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    pub upload_id: String,
    pub total_chunks: u32,
    /// Ciphertext bytes sent
    pub size: u64,
}

pub struct ChunkUploader<'a> {
    api: &'a dyn ShareApi,
    chunk_size: usize,
    state: UploadState,
}

impl<'a> ChunkUploader<'a> {
    pub fn new(api: &'a dyn ShareApi, chunk_size: usize) -> Self {
        Self {
            api,
            chunk_size,
            state: UploadState::Idle,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Open an upload session sized to the ciphertext.
    pub async fn init(&mut self, file_name: &str, ciphertext_len: u64) -> ShareResult<String> {
        if self.state != UploadState::Idle {
            return Err(ShareError::validation(format!(
                "init called in state {:?}",
                self.state
            )));
        }

        let api = self.api;
        let resp = api
            .init_upload(&InitUploadRequest {
                file_name: file_name.to_string(),
                file_size: ciphertext_len,
            })
            .await
            .map_err(|e| self.fail(e))?;

        let upload_id = match resp.upload_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => return Err(self.fail(ShareError::protocol("init response has no uploadId"))),
        };

        debug!(upload_id = %upload_id, size = ciphertext_len, "upload session opened");
        self.state = UploadState::Initialized {
            upload_id: upload_id.clone(),
        };
        Ok(upload_id)
    }

    /// Send one chunk. It must belong to the open session and be the next in
    /// order; anything else is refused without touching the network.
    pub async fn upload_chunk(&mut self, chunk: ChunkUpload) -> ShareResult<()> {
        let (upload_id, sent) = match &self.state {
            UploadState::Initialized { upload_id } => (upload_id.clone(), 0),
            UploadState::Uploading {
                upload_id,
                sent,
                total,
            } => {
                if *total != chunk.total_chunks {
                    return Err(ShareError::validation(format!(
                        "totalChunks changed from {total} to {}",
                        chunk.total_chunks
                    )));
                }
                (upload_id.clone(), *sent)
            }
            other => {
                return Err(ShareError::validation(format!(
                    "upload_chunk called in state {other:?}"
                )))
            }
        };

        if chunk.upload_id != upload_id {
            return Err(ShareError::validation(format!(
                "chunk targets upload {}, session is {upload_id}",
                chunk.upload_id
            )));
        }
        if chunk.chunk_number != sent + 1 || chunk.chunk_number > chunk.total_chunks {
            return Err(ShareError::validation(format!(
                "chunk {} of {} out of order (next is {})",
                chunk.chunk_number,
                chunk.total_chunks,
                sent + 1
            )));
        }

        let number = chunk.chunk_number;
        let total = chunk.total_chunks;
        let bytes = chunk.bytes.len();
        let api = self.api;
        api.upload_chunk(chunk)
            .await
            .map_err(|e| self.fail(e))?;

        debug!(upload_id = %upload_id, chunk = number, total, bytes, "chunk sent");
        self.state = if number == total {
            UploadState::AllChunksSent { upload_id, total }
        } else {
            UploadState::Uploading {
                upload_id,
                sent: number,
                total,
            }
        };
        Ok(())
    }

    /// Init a session and send all of `ciphertext` in order.
    pub async fn upload_all(
        &mut self,
        file_name: &str,
        ciphertext: &[u8],
        progress: Option<&ProgressFn>,
    ) -> ShareResult<UploadedBlob> {
        let plan = chunk_plan(ciphertext.len(), self.chunk_size)?;
        if plan.is_empty() {
            return Err(ShareError::validation("nothing to upload"));
        }
        let total = plan.len() as u32;
        let size = ciphertext.len() as u64;

        let upload_id = self.init(file_name, size).await?;
        info!(upload_id = %upload_id, chunks = total, bytes = size, "uploading");

        for span in &plan {
            if let Some(cb) = progress {
                cb(
                    span.offset as u64,
                    size,
                    &format!("uploading chunk {}/{total}", span.number),
                );
            }
            self.upload_chunk(ChunkUpload {
                upload_id: upload_id.clone(),
                chunk_number: span.number,
                total_chunks: total,
                file_name: file_name.to_string(),
                file_size: size,
                bytes: ciphertext[span.range()].to_vec(),
            })
            .await?;
        }

        if let Some(cb) = progress {
            cb(size, size, "all chunks sent");
        }
        Ok(UploadedBlob {
            upload_id,
            total_chunks: total,
            size,
        })
    }

    fn fail(&mut self, err: ShareError) -> ShareError {
        warn!(error = %err, state = ?self.state, "upload aborted");
        self.state = UploadState::Failed(err.to_string());
        err
    }
}
