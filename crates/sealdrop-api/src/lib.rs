//! sealdrop-api: the backend HTTP contract
//!
//! `ShareApi` is the seam between the send/receive state machines and the
//! server. `HttpShareApi` speaks the real contract over reqwest;
//! `MemoryShareApi` is an in-process backend used as a test double.

pub mod api;
pub mod health;
pub mod http;
pub mod memory;

pub use api::ShareApi;
pub use health::{check_health, is_healthy};
pub use http::{build_from_core_config, HttpShareApi};
pub use memory::MemoryShareApi;
