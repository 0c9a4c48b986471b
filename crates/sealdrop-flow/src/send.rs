//! Sender: encrypt one item and turn it into a share link.

use std::time::Duration;

use sealdrop_api::ShareApi;
use sealdrop_core::config::SealdropConfig;
use sealdrop_core::types::{
    PasswordProtection, ServerConfig, StoreInlineRequest, StoreMetadataRequest,
    DEFAULT_FILE_CONTENT_TYPE,
};
use sealdrop_core::{ShareError, ShareResult};
use sealdrop_crypto::{
    b64_encode, derive_key, encrypt, generate_master_key, generate_salt, wrap, MasterKey,
    PasswordParams, TAG_SIZE,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::finalize::FinalizeCoordinator;
use crate::link::ShareLink;
use crate::upload::ChunkUploader;
use crate::{run_blocking, ProgressFn};

/// Client-side knobs for sending, usually taken from `SealdropConfig`.
#[derive(Debug, Clone)]
pub struct SendSettings {
    /// Origin + path of the receive page, used as the share link base
    pub share_base: String,
    pub chunk_size: usize,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub password_params: PasswordParams,
}

impl SendSettings {
    pub fn from_config(config: &SealdropConfig) -> Self {
        Self {
            share_base: config.server.share_base(),
            chunk_size: config.upload.chunk_size_bytes,
            poll_interval: config.finalize.poll_interval(),
            max_attempts: config.finalize.max_attempts,
            password_params: PasswordParams::default(),
        }
    }
}

impl Default for SendSettings {
    fn default() -> Self {
        Self::from_config(&SealdropConfig::default())
    }
}

#[derive(Debug, Default)]
pub struct TextOptions {
    pub content_type: Option<String>,
    /// Second factor; at least 6 UTF-16 code units
    pub password: Option<SecretString>,
    /// Requested lifetime, e.g. "24h". Dropped if the server has expiration off.
    pub expire: Option<String>,
}

#[derive(Debug, Default)]
pub struct FileOptions {
    /// Defaults to `application/octet-stream`
    pub content_type: Option<String>,
    pub password: Option<SecretString>,
    pub expire: Option<String>,
}

/// Per-item key material, created fresh for every send.
struct ItemSecrets {
    master: MasterKey,
    salt: [u8; sealdrop_crypto::SALT_SIZE],
    protection: Option<PasswordProtection>,
}

pub struct Sender<'a> {
    api: &'a dyn ShareApi,
    clock: &'a dyn Clock,
    settings: SendSettings,
    progress: Option<ProgressFn>,
}

impl<'a> Sender<'a> {
    pub fn new(api: &'a dyn ShareApi, clock: &'a dyn Clock, settings: SendSettings) -> Self {
        Self {
            api,
            clock,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Encrypt `text` and store it inline in a single request.
    pub async fn send_text(&self, text: &str, opts: TextOptions) -> ShareResult<ShareLink> {
        if text.trim().is_empty() {
            return Err(ShareError::validation("message is empty"));
        }

        let secrets = self.item_secrets(opts.password.as_ref()).await?;
        let server = self.server_config().await;
        let set_duration = resolve_expiration(&server, opts.expire);

        self.report(0, 1, "encrypting");
        let key = derive_key(&secrets.master, &secrets.salt)?;
        let sealed = encrypt(text.as_bytes(), &key)?;

        self.report(0, 1, "storing");
        let api = self.api;
        let resp = api
            .store_inline(&StoreInlineRequest {
                encrypted_data: b64_encode(&sealed.ciphertext),
                iv: b64_encode(&sealed.nonce),
                salt: b64_encode(&secrets.salt),
                content_type: opts.content_type,
                password_protection: secrets.protection,
                set_duration,
            })
            .await?;
        let id = resp
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ShareError::protocol("store response has no id"))?;

        self.report(1, 1, "done");
        info!(id = %id, bytes = text.len(), "text stored");
        ShareLink::new(&self.settings.share_base, id, secrets.master.to_base64())
    }

    /// Encrypt `bytes` once, upload the ciphertext in chunks, wait for the
    /// merge and store the metadata.
    pub async fn send_file(
        &self,
        name: &str,
        bytes: &[u8],
        opts: FileOptions,
    ) -> ShareResult<ShareLink> {
        if name.trim().is_empty() {
            return Err(ShareError::validation("file name is empty"));
        }
        if bytes.is_empty() {
            return Err(ShareError::validation("file is empty"));
        }

        let secrets = self.item_secrets(opts.password.as_ref()).await?;
        let server = self.server_config().await;
        let limit_mb = server.effective_max_file_size_mb();
        if bytes.len() as u64 > limit_mb.saturating_mul(1024 * 1024) {
            return Err(ShareError::validation(format!(
                "file exceeds the {limit_mb} MB limit"
            )));
        }
        let set_duration = resolve_expiration(&server, opts.expire);

        self.report(0, bytes.len() as u64, "encrypting");
        let key = derive_key(&secrets.master, &secrets.salt)?;
        let sealed = encrypt(bytes, &key)?;
        if sealed.ciphertext.len() != bytes.len() + TAG_SIZE {
            return Err(ShareError::Other(anyhow::anyhow!(
                "ciphertext is {} bytes, expected {}",
                sealed.ciphertext.len(),
                bytes.len() + TAG_SIZE
            )));
        }
        let ciphertext_len = sealed.ciphertext.len() as u64;

        let mut uploader = ChunkUploader::new(self.api, self.settings.chunk_size);
        let blob = uploader
            .upload_all(name, &sealed.ciphertext, self.progress.as_ref())
            .await?;

        let mut coordinator = FinalizeCoordinator::new(
            self.api,
            self.clock,
            self.settings.poll_interval,
            self.settings.max_attempts,
        );
        let finalized = coordinator
            .finalize(
                &StoreMetadataRequest {
                    id: blob.upload_id,
                    iv: b64_encode(&sealed.nonce),
                    salt: b64_encode(&secrets.salt),
                    original_filename: name.to_string(),
                    content_type: opts
                        .content_type
                        .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string()),
                    file_size: ciphertext_len,
                    password_protection: secrets.protection,
                    set_duration,
                },
                self.progress.as_ref(),
            )
            .await?;

        info!(
            id = %finalized.record_id,
            chunks = blob.total_chunks,
            bytes = ciphertext_len,
            polls = finalized.attempts,
            "file stored"
        );
        ShareLink::new(
            &self.settings.share_base,
            finalized.record_id,
            secrets.master.to_base64(),
        )
    }

    async fn item_secrets(&self, password: Option<&SecretString>) -> ShareResult<ItemSecrets> {
        let master = generate_master_key();
        let (master, protection) = match password {
            None => (master, None),
            Some(pw) => {
                let pw = SecretString::from(pw.expose_secret().to_owned());
                let params = self.settings.password_params;
                let (master, wrapped) = run_blocking(move || {
                    let wrapped = wrap(&master, &pw, &params);
                    (master, wrapped)
                })
                .await?;
                (master, Some(wrapped?))
            }
        };
        Ok(ItemSecrets {
            master,
            salt: generate_salt(),
            protection,
        })
    }

    /// `GET /config`, falling back to defaults when unreachable.
    async fn server_config(&self) -> ServerConfig {
        match self.api.fetch_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "could not load server config, using defaults");
                ServerConfig::default()
            }
        }
    }

    fn report(&self, done: u64, total: u64, message: &str) {
        if let Some(cb) = &self.progress {
            cb(done, total, message);
        }
    }
}

fn resolve_expiration(server: &ServerConfig, requested: Option<String>) -> Option<String> {
    let requested = requested.filter(|d| !d.trim().is_empty())?;
    if server.expiration.enabled {
        debug!(duration = %requested, "expiration requested");
        Some(requested)
    } else {
        warn!(duration = %requested, "server has expiration disabled, ignoring requested duration");
        None
    }
}
