//! Backend health check

use anyhow::Result;
use sealdrop_core::types::ServerConfig;

use crate::api::ShareApi;

/// Verify the backend is reachable by fetching `/config`, the lightest
/// endpoint that exercises the full request path.
pub async fn check_health(api: &dyn ShareApi) -> Result<ServerConfig> {
    api.fetch_config()
        .await
        .map_err(|e| anyhow::anyhow!("backend health check failed: {e}"))
}

/// Returns true if the backend is reachable, false otherwise (non-panicking)
pub async fn is_healthy(api: &dyn ShareApi) -> bool {
    check_health(api).await.is_ok()
}
