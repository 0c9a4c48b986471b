//! Wait for the server-side merge, then store the item's metadata.
//!
//! ```text
//! AwaitingMerge ─(poll)→ Merged → MetadataStored → Ready
//!       └────────────────→ TimedOut | Failed(reason)
//! ```

use std::time::Duration;

use sealdrop_api::ShareApi;
use sealdrop_core::config::FinalizeConfig;
use sealdrop_core::types::{MergeStatus, StoreMetadataRequest};
use sealdrop_core::{ShareError, ShareResult};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::ProgressFn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeState {
    /// `attempts` status checks made so far
    AwaitingMerge { attempts: u32 },
    Merged { attempts: u32 },
    MetadataStored { record_id: String },
    Ready { record_id: String },
    TimedOut { attempts: u32 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub record_id: String,
    /// Status checks it took for the merge to report completion
    pub attempts: u32,
}

pub struct FinalizeCoordinator<'a> {
    api: &'a dyn ShareApi,
    clock: &'a dyn Clock,
    poll_interval: Duration,
    max_attempts: u32,
    state: FinalizeState,
}

impl<'a> FinalizeCoordinator<'a> {
    pub fn new(
        api: &'a dyn ShareApi,
        clock: &'a dyn Clock,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            api,
            clock,
            poll_interval,
            max_attempts,
            state: FinalizeState::AwaitingMerge { attempts: 0 },
        }
    }

    pub fn from_config(api: &'a dyn ShareApi, clock: &'a dyn Clock, cfg: &FinalizeConfig) -> Self {
        Self::new(api, clock, cfg.poll_interval(), cfg.max_attempts)
    }

    pub fn state(&self) -> &FinalizeState {
        &self.state
    }

    /// Poll until the merge completes. Sleeps one interval before every
    /// check; `404` and `completed: false` keep polling, any other failure is
    /// terminal. Gives up with `Timeout` after `max_attempts` checks.
    pub async fn await_merge(
        &mut self,
        upload_id: &str,
        progress: Option<&ProgressFn>,
    ) -> ShareResult<u32> {
        if self.state != (FinalizeState::AwaitingMerge { attempts: 0 }) {
            return Err(ShareError::validation(format!(
                "await_merge called in state {:?}",
                self.state
            )));
        }

        let api = self.api;
        for attempt in 1..=self.max_attempts {
            self.clock.sleep(self.poll_interval).await;
            self.state = FinalizeState::AwaitingMerge { attempts: attempt };
            if let Some(cb) = progress {
                cb(
                    attempt as u64,
                    self.max_attempts as u64,
                    "waiting for server merge",
                );
            }

            match api.upload_status(upload_id).await {
                Ok(MergeStatus::Completed) => {
                    info!(upload_id, attempt, "merge completed");
                    self.state = FinalizeState::Merged { attempts: attempt };
                    return Ok(attempt);
                }
                Ok(status) => {
                    debug!(upload_id, attempt, ?status, "merge pending");
                }
                Err(e) => {
                    warn!(upload_id, attempt, error = %e, "merge status check failed");
                    self.state = FinalizeState::Failed(e.to_string());
                    return Err(e);
                }
            }
        }

        warn!(upload_id, attempts = self.max_attempts, "merge did not complete");
        self.state = FinalizeState::TimedOut {
            attempts: self.max_attempts,
        };
        Err(ShareError::Timeout {
            attempts: self.max_attempts,
        })
    }

    /// Submit metadata for a merged upload. Returns the record id, which is
    /// the upload id when the server does not echo one. Not retried.
    pub async fn store_metadata(&mut self, req: &StoreMetadataRequest) -> ShareResult<String> {
        if !matches!(self.state, FinalizeState::Merged { .. }) {
            return Err(ShareError::validation(format!(
                "store_metadata called in state {:?}",
                self.state
            )));
        }

        let api = self.api;
        let resp = match api.store_metadata(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(upload_id = %req.id, error = %e, "storing metadata failed");
                self.state = FinalizeState::Failed(e.to_string());
                return Err(e);
            }
        };

        let record_id = match resp.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                debug!(upload_id = %req.id, "metadata response has no id, using upload id");
                req.id.clone()
            }
        };
        self.state = FinalizeState::MetadataStored {
            record_id: record_id.clone(),
        };
        Ok(record_id)
    }

    /// `await_merge` for `req.id`, then `store_metadata`.
    pub async fn finalize(
        &mut self,
        req: &StoreMetadataRequest,
        progress: Option<&ProgressFn>,
    ) -> ShareResult<Finalized> {
        let attempts = self.await_merge(&req.id, progress).await?;
        let record_id = self.store_metadata(req).await?;
        self.state = FinalizeState::Ready {
            record_id: record_id.clone(),
        };
        Ok(Finalized {
            record_id,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use sealdrop_api::memory::ScriptedStatus;
    use sealdrop_api::MemoryShareApi;

    fn pending(n: usize) -> Vec<ScriptedStatus> {
        vec![ScriptedStatus::Status(MergeStatus::Pending); n]
    }

    #[tokio::test]
    async fn test_sleeps_before_first_check() {
        let api = MemoryShareApi::new();
        api.script_status([ScriptedStatus::Status(MergeStatus::Completed)]);
        let clock = ManualClock::new();
        let mut coord = FinalizeCoordinator::new(&api, &clock, Duration::from_secs(3), 20);

        assert_eq!(coord.await_merge("up-1", None).await.unwrap(), 1);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3)]);
        assert_eq!(coord.state(), &FinalizeState::Merged { attempts: 1 });
    }

    #[tokio::test]
    async fn test_unknown_counts_as_pending() {
        let api = MemoryShareApi::new();
        api.script_status([
            ScriptedStatus::Status(MergeStatus::Unknown),
            ScriptedStatus::Status(MergeStatus::Unknown),
            ScriptedStatus::Status(MergeStatus::Completed),
        ]);
        let clock = ManualClock::new();
        let mut coord = FinalizeCoordinator::new(&api, &clock, Duration::from_secs(3), 20);

        assert_eq!(coord.await_merge("up-1", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_terminal() {
        let api = MemoryShareApi::new();
        let mut script = pending(2);
        script.push(ScriptedStatus::Fail(500));
        api.script_status(script);
        let clock = ManualClock::new();
        let mut coord = FinalizeCoordinator::new(&api, &clock, Duration::from_secs(3), 20);

        let err = coord.await_merge("up-1", None).await.unwrap_err();
        assert!(matches!(err, ShareError::Network { status: Some(500), .. }));
        assert!(matches!(coord.state(), FinalizeState::Failed(_)));
        assert_eq!(api.calls().upload_status, 3);
    }

    #[tokio::test]
    async fn test_metadata_before_merge_is_refused() {
        let api = MemoryShareApi::new();
        let clock = ManualClock::new();
        let mut coord = FinalizeCoordinator::new(&api, &clock, Duration::from_secs(3), 20);

        let req = StoreMetadataRequest {
            id: "up-1".into(),
            iv: "iv".into(),
            salt: "salt".into(),
            original_filename: "a".into(),
            content_type: "text/plain".into(),
            file_size: 17,
            password_protection: None,
            set_duration: None,
        };
        let err = coord.store_metadata(&req).await.unwrap_err();
        assert!(matches!(err, ShareError::Validation(_)));
        assert_eq!(api.calls().store_metadata, 0);
    }
}
