//! sealdrop-core: wire types, config schema, and the error taxonomy shared by
//! every sealdrop crate.

pub mod config;
pub mod error;
pub mod types;

pub use error::{ErrorKind, ShareError, ShareResult};
