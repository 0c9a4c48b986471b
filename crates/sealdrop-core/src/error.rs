use thiserror::Error;

pub type ShareResult<T> = Result<T, ShareError>;

#[derive(Debug, Error)]
pub enum ShareError {
    /// Empty or oversized input, short password, out-of-order call.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// AEAD tag verification failed. Carries no detail on purpose.
    #[error("authentication failed: wrong key or corrupted ciphertext")]
    Authentication,

    /// Wrong password. Rendered identically for every root cause.
    #[error("incorrect password")]
    Password,

    #[error(
        "network error{}: {message}",
        .status.map(|s| format!(" ({s})")).unwrap_or_default()
    )]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("server merge did not complete after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// Missing or malformed fields in a server response.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("record not found or already burned: {0}")]
    NotFound(String),

    #[error("storing metadata failed ({status}): {message}")]
    MetadataStore { status: u16, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable, matchable error kind for callers that render or route failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    KeyDerivation,
    Authentication,
    Password,
    Network,
    Timeout,
    Protocol,
    NotFound,
    MetadataStore,
    Config,
    Io,
    Other,
}

impl ShareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShareError::Validation(_) => ErrorKind::Validation,
            ShareError::KeyDerivation(_) => ErrorKind::KeyDerivation,
            ShareError::Authentication => ErrorKind::Authentication,
            ShareError::Password => ErrorKind::Password,
            ShareError::Network { .. } => ErrorKind::Network,
            ShareError::Timeout { .. } => ErrorKind::Timeout,
            ShareError::Protocol(_) => ErrorKind::Protocol,
            ShareError::NotFound(_) => ErrorKind::NotFound,
            ShareError::MetadataStore { .. } => ErrorKind::MetadataStore,
            ShareError::Config(_) => ErrorKind::Config,
            ShareError::Io(_) => ErrorKind::Io,
            ShareError::Other(_) => ErrorKind::Other,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ShareError::Validation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ShareError::Protocol(msg.into())
    }

    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        ShareError::Network {
            status,
            message: message.into(),
        }
    }
}
