//! reqwest-backed `ShareApi`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use sealdrop_core::config::ServerEndpointConfig;
use sealdrop_core::types::{
    ChunkResponse, ChunkUpload, ErrorBody, InitUploadRequest, InitUploadResponse, MergeStatus,
    RecordResponse, ServerConfig, StoreInlineRequest, StoreMetadataRequest, StoreResponse,
    UploadStatusResponse,
};
use sealdrop_core::{ShareError, ShareResult};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::ShareApi;

/// HTTP client for one sealdrop backend.
#[derive(Debug, Clone)]
pub struct HttpShareApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpShareApi {
    /// `base_url` is the backend origin (optionally with a path prefix).
    /// Any fragment on it is discarded.
    pub fn new(base_url: &str, timeout: Duration) -> ShareResult<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ShareError::Config(format!("invalid server URL {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ShareError::Config(format!(
                "server URL {base_url:?} cannot carry a path"
            )));
        }
        base.set_fragment(None);
        base.set_query(None);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShareError::Config(format!("building HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> ShareResult<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments);
        tracing::debug!(method = "POST", url = %url, "request");
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        read_json(resp, segments).await
    }
}

#[async_trait]
impl ShareApi for HttpShareApi {
    async fn fetch_config(&self) -> ShareResult<ServerConfig> {
        let url = self.endpoint(&["config"]);
        tracing::debug!(method = "GET", url = %url, "request");
        let resp = self.client.get(url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        read_json(resp, &["config"]).await
    }

    async fn store_inline(&self, req: &StoreInlineRequest) -> ShareResult<StoreResponse> {
        self.post_json(&["api", "store"], req).await
    }

    async fn init_upload(&self, req: &InitUploadRequest) -> ShareResult<InitUploadResponse> {
        self.post_json(&["api", "upload", "init"], req).await
    }

    async fn upload_chunk(&self, chunk: ChunkUpload) -> ShareResult<ChunkResponse> {
        let url = self.endpoint(&["api", "upload", "chunk"]);
        let number = chunk.chunk_number;
        tracing::debug!(
            method = "POST",
            url = %url,
            chunk = number,
            total = chunk.total_chunks,
            bytes = chunk.bytes.len(),
            "request"
        );

        let part = Part::bytes(chunk.bytes)
            .file_name("blob")
            .mime_str("application/octet-stream")
            .map_err(|e| ShareError::Other(anyhow::anyhow!("building chunk part: {e}")))?;
        let form = Form::new()
            .text("uploadId", chunk.upload_id)
            .text("chunkNumber", chunk.chunk_number.to_string())
            .text("totalChunks", chunk.total_chunks.to_string())
            .text("fileName", chunk.file_name)
            .text("fileSize", chunk.file_size.to_string())
            .part("chunk", part);

        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        // The body is informational only
        match resp.json::<ChunkResponse>().await {
            Ok(body) => Ok(body),
            Err(e) => {
                tracing::debug!(chunk = number, error = %e, "ignoring unreadable chunk response body");
                Ok(ChunkResponse::default())
            }
        }
    }

    async fn upload_status(&self, upload_id: &str) -> ShareResult<MergeStatus> {
        let url = self.endpoint(&["api", "upload", "status"]);
        tracing::debug!(method = "GET", url = %url, upload_id, "request");
        let resp = self
            .client
            .get(url)
            .query(&[("uploadId", upload_id)])
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(MergeStatus::Unknown);
        }
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        let status: UploadStatusResponse = read_json(resp, &["api", "upload", "status"]).await?;
        Ok(if status.completed {
            MergeStatus::Completed
        } else {
            MergeStatus::Pending
        })
    }

    async fn store_metadata(&self, req: &StoreMetadataRequest) -> ShareResult<StoreResponse> {
        let url = self.endpoint(&["api", "store", "metadata"]);
        tracing::debug!(method = "POST", url = %url, upload_id = %req.id, "request");
        let resp = self
            .client
            .post(url)
            .json(req)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            return Err(ShareError::MetadataStore {
                status: status.as_u16(),
                message,
            });
        }
        read_json(resp, &["api", "store", "metadata"]).await
    }

    async fn fetch_record(&self, id: &str) -> ShareResult<RecordResponse> {
        let url = self.endpoint(&["api", "data", id]);
        tracing::debug!(method = "GET", url = %url, "request");
        let resp = self.client.get(url).send().await.map_err(transport_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ShareError::NotFound(id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        read_json(resp, &["api", "data"]).await
    }

    async fn download(&self, id: &str) -> ShareResult<Vec<u8>> {
        let url = self.endpoint(&["api", "download", id]);
        tracing::debug!(method = "GET", url = %url, "request");
        let resp = self.client.get(url).send().await.map_err(transport_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ShareError::NotFound(id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        let bytes = resp.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn burn(&self, id: &str) -> ShareResult<()> {
        let url = self.endpoint(&["api", "burn", id]);
        tracing::debug!(method = "POST", url = %url, "request");
        let resp = self.client.post(url).send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        Ok(())
    }
}

/// Build a client from the `[server]` config section.
///
/// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_from_core_config(server: &ServerEndpointConfig) -> ShareResult<HttpShareApi> {
    if server.base_url.starts_with("http://") {
        if server.enforce_tls {
            return Err(ShareError::Config(format!(
                "server URL uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set server.enforce_tls = false for local development.",
                server.base_url
            )));
        }
        tracing::warn!(
            base_url = %server.base_url,
            "server URL uses plaintext HTTP: ciphertext and metadata travel unprotected in transit. \
             Set server.enforce_tls = true and use HTTPS in production."
        );
    }

    HttpShareApi::new(&server.base_url, server.request_timeout())
}

fn transport_error(e: reqwest::Error) -> ShareError {
    ShareError::network(e.status().map(|s| s.as_u16()), e.to_string())
}

async fn network_error(resp: Response) -> ShareError {
    let status = resp.status().as_u16();
    let message = error_message(resp).await;
    ShareError::network(Some(status), message)
}

/// The server's `error` / `message` field when the body parses, else the
/// reason phrase.
async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_string();
    match resp.text().await {
        Ok(body) => serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response, segments: &[&str]) -> ShareResult<T> {
    resp.json::<T>().await.map_err(|e| {
        ShareError::protocol(format!(
            "malformed response from /{}: {e}",
            segments.join("/")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let api = HttpShareApi::new("https://share.example.com/drop/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            api.endpoint(&["api", "data", "abc"]).as_str(),
            "https://share.example.com/drop/api/data/abc"
        );

        let api = HttpShareApi::new("http://localhost:8080", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.endpoint(&["config"]).as_str(),
            "http://localhost:8080/config"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids_and_drops_fragment() {
        let api =
            HttpShareApi::new("http://localhost:8080/#secret", Duration::from_secs(5)).unwrap();
        let url = api.endpoint(&["api", "burn", "a/b?c"]);
        assert_eq!(url.as_str(), "http://localhost:8080/api/burn/a%2Fb%3Fc");
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = HttpShareApi::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ShareError::Config(_)));
    }

    #[test]
    fn test_build_from_core_config_http_warning() {
        // HTTP endpoint with enforce_tls=false should succeed (but log warning)
        let server = ServerEndpointConfig {
            base_url: "http://localhost:8080".into(),
            enforce_tls: false,
            ..Default::default()
        };
        assert!(build_from_core_config(&server).is_ok());
    }

    #[test]
    fn test_build_from_core_config_http_enforce_tls() {
        let server = ServerEndpointConfig {
            base_url: "http://insecure:8080".into(),
            enforce_tls: true,
            ..Default::default()
        };
        let result = build_from_core_config(&server);
        assert!(result.is_err(), "HTTP + enforce_tls must fail");
        assert!(
            result.unwrap_err().to_string().contains("enforce_tls"),
            "error message should mention enforce_tls"
        );
    }

    #[test]
    fn test_build_from_core_config_https() {
        let server = ServerEndpointConfig {
            base_url: "https://share.example.com".into(),
            enforce_tls: true,
            ..Default::default()
        };
        assert!(build_from_core_config(&server).is_ok());
    }
}
