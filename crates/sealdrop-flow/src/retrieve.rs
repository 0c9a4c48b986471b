//! Receive side: fetch → [password] → derive → decrypt → burn.
//!
//! ```text
//! Fetching → [PasswordRequired ⇄ PasswordVerifying] → KeyDeriving → Decrypting → Burning → Done
//!     └──────────────────────────────────────────────────────────────────────→ Failed(reason)
//! ```
//!
//! A wrong password returns to `PasswordRequired`; how many tries to allow
//! is the caller's business. `decrypt` stops in `Burning` with the record
//! still on the server, so a caller that must store the content can do so
//! before calling `burn`. A failed burn is logged and reported as
//! `burned = false`, never as an error.

use sealdrop_api::ShareApi;
use sealdrop_core::types::{PayloadKind, RecordResponse};
use sealdrop_core::{ShareError, ShareResult};
use sealdrop_crypto::{b64_decode, decrypt, derive_key, verify, MasterKey, PasswordParams};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::link::ShareLink;
use crate::run_blocking;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalState {
    Fetching,
    PasswordRequired,
    PasswordVerifying,
    KeyDeriving,
    Decrypting,
    /// Decrypted; the record is still stored until `burn` runs
    Burning,
    Done,
    Failed(String),
}

/// Decrypted content
#[derive(Clone, PartialEq, Eq)]
pub enum Revealed {
    Text {
        text: String,
        content_type: Option<String>,
    },
    File {
        name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl std::fmt::Debug for Revealed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Revealed::Text { text, content_type } => f
                .debug_struct("Text")
                .field("len", &text.len())
                .field("content_type", content_type)
                .finish(),
            Revealed::File {
                name,
                content_type,
                bytes,
            } => f
                .debug_struct("File")
                .field("name", name)
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub content: Revealed,
    /// Whether the burn request succeeded
    pub burned: bool,
}

pub struct RetrievalController<'a> {
    api: &'a dyn ShareApi,
    link: ShareLink,
    params: PasswordParams,
    state: RetrievalState,
    master: Option<MasterKey>,
    record: Option<RecordResponse>,
}

impl<'a> RetrievalController<'a> {
    pub fn new(api: &'a dyn ShareApi, link: ShareLink) -> Self {
        Self {
            api,
            link,
            params: PasswordParams::default(),
            state: RetrievalState::Fetching,
            master: None,
            record: None,
        }
    }

    pub fn with_password_params(mut self, params: PasswordParams) -> Self {
        self.params = params;
        self
    }

    pub fn state(&self) -> &RetrievalState {
        &self.state
    }

    pub fn link(&self) -> &ShareLink {
        &self.link
    }

    /// Whether the fetched record carries a password wrapper.
    pub fn requires_password(&self) -> bool {
        self.record
            .as_ref()
            .is_some_and(RecordResponse::is_password_protected)
    }

    /// Fetch the record. Moves to `PasswordRequired` or `KeyDeriving`.
    pub async fn fetch(&mut self) -> ShareResult<&RetrievalState> {
        self.expect_state(RetrievalState::Fetching, "fetch")?;

        // A bad fragment fails before anything is requested
        let master = self.link.master_key().map_err(|e| self.fail(e))?;

        let id = self.link.id().to_string();
        let api = self.api;
        let record = api.fetch_record(&id).await.map_err(|e| self.fail(e))?;
        debug!(id = %id, protected = record.is_password_protected(), "record fetched");

        self.master = Some(master);
        self.state = if record.is_password_protected() {
            RetrievalState::PasswordRequired
        } else {
            RetrievalState::KeyDeriving
        };
        self.record = Some(record);
        Ok(&self.state)
    }

    /// Check a password against the record's wrapper and the key from the
    /// link. On `Password` the controller is back in `PasswordRequired`.
    /// Key stretching runs on the blocking pool.
    pub async fn submit_password(&mut self, password: &SecretString) -> ShareResult<()> {
        self.expect_state(RetrievalState::PasswordRequired, "submit_password")?;

        let wrapper = match self.record.as_ref() {
            Some(record) => record.password_protection.clone(),
            None => return Err(self.fail(ShareError::protocol("no record loaded"))),
        };
        let Some(wrapper) = wrapper else {
            return Err(self.fail(ShareError::protocol("record has no password wrapper")));
        };
        let Some(master) = self.master.take() else {
            return Err(self.fail(ShareError::protocol("no key loaded")));
        };
        self.state = RetrievalState::PasswordVerifying;

        let password = SecretString::from(password.expose_secret().to_owned());
        let params = self.params;
        let (verdict, master) = run_blocking(move || {
            let verdict = verify(&wrapper, &password, &master, &params);
            (verdict, master)
        })
        .await
        .map_err(|e| self.fail(e))?;
        self.master = Some(master);

        match verdict {
            Ok(()) => {
                debug!(id = %self.link.id(), "password accepted");
                self.state = RetrievalState::KeyDeriving;
                Ok(())
            }
            Err(ShareError::Password) => {
                self.state = RetrievalState::PasswordRequired;
                Err(ShareError::Password)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Derive the item key and decrypt. Requires `KeyDeriving` and leaves the
    /// controller in `Burning`; nothing is deleted until `burn`.
    pub async fn decrypt(&mut self) -> ShareResult<Revealed> {
        self.expect_state(RetrievalState::KeyDeriving, "decrypt")?;

        let (record, master) = match (self.record.take(), self.master.take()) {
            (Some(record), Some(master)) => (record, master),
            _ => return Err(self.fail(ShareError::protocol("no record loaded"))),
        };
        let id = self.link.id().to_string();

        let salt = b64_decode("salt", &record.salt).map_err(|e| self.fail(e))?;
        let iv = b64_decode("iv", &record.iv).map_err(|e| self.fail(e))?;
        let key = derive_key(&master, &salt).map_err(|e| self.fail(e))?;
        drop(master);

        self.state = RetrievalState::Decrypting;
        let (kind, inferred) = record.payload_kind();
        if inferred {
            debug!(id = %id, ?kind, "record has no kind, inferred from fields");
        }

        let content = match kind {
            PayloadKind::Text => {
                let data = record
                    .encrypted_data
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| ShareError::protocol("text record has no encryptedData"))
                    .map_err(|e| self.fail(e))?;
                let ciphertext = b64_decode("encryptedData", data).map_err(|e| self.fail(e))?;
                let plaintext = decrypt(&ciphertext, &iv, &key).map_err(|e| self.fail(e))?;
                let text = String::from_utf8(plaintext)
                    .map_err(|_| self.fail(ShareError::protocol("decrypted text is not UTF-8")))?;
                Revealed::Text {
                    text,
                    content_type: record.content_type,
                }
            }
            PayloadKind::File => {
                let api = self.api;
                let ciphertext = api.download(&id).await.map_err(|e| self.fail(e))?;
                let bytes = decrypt(&ciphertext, &iv, &key).map_err(|e| self.fail(e))?;
                Revealed::File {
                    name: record
                        .original_filename
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| "download".to_string()),
                    content_type: record.content_type,
                    bytes,
                }
            }
        };

        self.state = RetrievalState::Burning;
        debug!(id = %id, "content decrypted, burn pending");
        Ok(content)
    }

    /// Ask the server to destroy the record. Requires `Burning`. Returns
    /// whether the server confirmed; a failure is only logged.
    pub async fn burn(&mut self) -> ShareResult<bool> {
        self.expect_state(RetrievalState::Burning, "burn")?;

        let id = self.link.id().to_string();
        let api = self.api;
        let burned = match api.burn(&id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %id, error = %e, "burn failed, content may remain on the server");
                false
            }
        };

        self.state = RetrievalState::Done;
        info!(id = %id, burned, "content revealed");
        Ok(burned)
    }

    /// Stop after `decrypt` without burning, e.g. when the content could not
    /// be stored. The record stays on the server and the link keeps working.
    pub fn abandon(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(id = %self.link.id(), reason = %reason, "retrieval abandoned before burn");
        self.state = RetrievalState::Failed(reason);
    }

    /// `decrypt` then `burn`, for callers with nothing to store first.
    pub async fn reveal(&mut self) -> ShareResult<Retrieved> {
        let content = self.decrypt().await?;
        let burned = self.burn().await?;
        Ok(Retrieved { content, burned })
    }

    fn expect_state(&self, expected: RetrievalState, op: &str) -> ShareResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ShareError::validation(format!(
                "{op} called in state {:?}",
                self.state
            )))
        }
    }

    fn fail(&mut self, err: ShareError) -> ShareError {
        warn!(id = %self.link.id(), error = %err, state = ?self.state, "retrieval failed");
        self.state = RetrievalState::Failed(err.to_string());
        err
    }
}

/// Run the whole receive flow. A protected record with no password (or a
/// wrong one) fails with `Password`.
pub async fn retrieve(
    api: &dyn ShareApi,
    link: ShareLink,
    password: Option<&SecretString>,
) -> ShareResult<Retrieved> {
    retrieve_with_params(api, link, password, PasswordParams::default()).await
}

pub async fn retrieve_with_params(
    api: &dyn ShareApi,
    link: ShareLink,
    password: Option<&SecretString>,
    params: PasswordParams,
) -> ShareResult<Retrieved> {
    let mut controller = RetrievalController::new(api, link).with_password_params(params);
    if *controller.fetch().await? == RetrievalState::PasswordRequired {
        match password {
            Some(pw) => controller.submit_password(pw).await?,
            None => {
                debug!("record requires a password, none given");
                return Err(ShareError::Password);
            }
        }
    }
    controller.reveal().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealdrop_api::MemoryShareApi;

    const KEY: &str = "q83vEjRWeJCrze8SNFZ4kKvN7xI0VniQq83vEjRWeJA=";

    fn text_record(encrypted_data: Option<&str>) -> RecordResponse {
        RecordResponse {
            kind: Some(PayloadKind::Text),
            encrypted_data: encrypted_data.map(str::to_string),
            iv: "AAAAAAAAAAAAAAAA".into(),
            salt: "AAAAAAAAAAAAAAAAAAAAAA==".into(),
            content_type: None,
            original_filename: None,
            password_protection: None,
        }
    }

    #[tokio::test]
    async fn test_bad_key_fails_before_fetch() {
        let api = MemoryShareApi::new();
        let link = ShareLink::new("https://x.example/", "abc", "not-a-key").unwrap();
        let mut controller = RetrievalController::new(&api, link);

        let err = controller.fetch().await.unwrap_err();
        assert!(matches!(err, ShareError::KeyDerivation(_)));
        assert!(matches!(controller.state(), RetrievalState::Failed(_)));
        assert_eq!(api.calls().fetch_record, 0);
    }

    #[tokio::test]
    async fn test_text_without_data_is_protocol_error() {
        let api = MemoryShareApi::new();
        api.insert_record("abc", text_record(None), None);
        let link = ShareLink::new("https://x.example/", "abc", KEY).unwrap();

        let err = retrieve(&api, link, None).await.unwrap_err();
        assert!(matches!(err, ShareError::Protocol(_)));
        assert_eq!(api.calls().burn, 0);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_fails_authentication() {
        let api = MemoryShareApi::new();
        // 21 bytes that were never produced under this key
        api.insert_record("abc", text_record(Some("AAAAAAAAAAAAAAAAAAAAAAAAAAAA")), None);
        let link = ShareLink::new("https://x.example/", "abc", KEY).unwrap();
        let mut controller = RetrievalController::new(&api, link);

        controller.fetch().await.unwrap();
        let err = controller.reveal().await.unwrap_err();
        assert!(matches!(err, ShareError::Authentication));
        assert!(matches!(controller.state(), RetrievalState::Failed(_)));
        assert_eq!(api.calls().burn, 0);
    }

    #[test]
    fn test_debug_hides_content() {
        let revealed = Revealed::Text {
            text: "the launch codes".into(),
            content_type: None,
        };
        assert!(!format!("{revealed:?}").contains("launch"));
    }
}
