//! Share links: `base?id=<record id>#<base64 master key>`
//!
//! The fragment carries the key. Browsers never send it, and nothing in this
//! crate puts it in a request either: requests only ever see `id()`.

use std::fmt;

use sealdrop_core::{ShareError, ShareResult};
use sealdrop_crypto::MasterKey;
use url::Url;

#[derive(Clone, PartialEq, Eq)]
pub struct ShareLink {
    base: Url,
    id: String,
    master_key_b64: String,
}

impl ShareLink {
    /// `base` is the origin + path the receiver opens (any query or fragment
    /// on it is dropped).
    pub fn new(
        base: &str,
        id: impl Into<String>,
        master_key_b64: impl Into<String>,
    ) -> ShareResult<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| ShareError::validation(format!("invalid share base {base:?}: {e}")))?;
        base.set_query(None);
        base.set_fragment(None);

        let id = id.into();
        let master_key_b64 = master_key_b64.into();
        if id.is_empty() {
            return Err(ShareError::validation("share link has no id"));
        }
        if master_key_b64.is_empty() {
            return Err(ShareError::validation("share link has no key"));
        }
        Ok(Self {
            base,
            id,
            master_key_b64,
        })
    }

    /// Parse a link as printed by `build`.
    pub fn parse(link: &str) -> ShareResult<Self> {
        let url = Url::parse(link.trim())
            .map_err(|e| ShareError::validation(format!("invalid share link: {e}")))?;

        let id = url
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ShareError::validation("share link has no id"))?;
        let key = url
            .fragment()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ShareError::validation("share link has no key"))?
            .to_string();

        Self::new(url.as_str(), id, key)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn master_key_b64(&self) -> &str {
        &self.master_key_b64
    }

    /// Decode the fragment. `KeyDerivation` if it is not a 32-byte key.
    pub fn master_key(&self) -> ShareResult<MasterKey> {
        MasterKey::from_base64(&self.master_key_b64)
    }

    /// The full link, fragment included.
    pub fn build(&self) -> String {
        let mut url = self.request_safe();
        url.set_fragment(Some(&self.master_key_b64));
        url.to_string()
    }

    /// The link without its fragment.
    pub fn request_safe(&self) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().clear().append_pair("id", &self.id);
        url
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

impl fmt::Debug for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareLink")
            .field("base", &self.base.as_str())
            .field("id", &self.id)
            .field("master_key_b64", &"[REDACTED]")
            .finish()
    }
}
