// Client side of the local backend's HTTP contract.
// - `Backend` is the seam the runner talks to; `HttpBackend` is the real one.
// - JSON replies are `payload | {"error": ...}`; the error form becomes `BackendError::Reported`.
// - Streaming endpoints hand back the raw body as a chunk stream for `FrameBuffer`.
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream::BoxStream};
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::{
    config::Config,
    error::BackendError,
    model::{
        ApiReply, BrowseReply, DebugReport, DebugTestResult, DownloadRequest, InfoResponse,
        Metadata, SetupCheck, StreamInfo,
    },
};

pub const APP_USER_AGENT: &str = concat!("AuraDownloader/", env!("CARGO_PKG_VERSION"));

/// Body of a streaming endpoint, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_info(&self, url: &str) -> Result<Metadata, BackendError>;

    /// Opens `POST /api/download`; the body is a `data:` frame stream.
    async fn open_download(&self, request: &DownloadRequest) -> Result<ByteStream, BackendError>;

    async fn resolve_stream(&self, url: &str) -> Result<StreamInfo, BackendError>;

    async fn setup_check(&self) -> Result<SetupCheck, BackendError>;

    async fn open_install(&self) -> Result<ByteStream, BackendError>;

    async fn browse(&self, path: &str) -> Result<(), BackendError>;

    async fn exit(&self) -> Result<(), BackendError>;

    async fn debug_report(&self) -> Result<DebugReport, BackendError>;

    async fn debug_test(&self, url: &str) -> Result<DebugTestResult, BackendError>;
}

pub struct HttpBackend {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base: config.backend_url.clone(),
            timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base.join(path)?)
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, BackendError> {
        Ok(self.client.get(self.endpoint(path)?).timeout(self.timeout))
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .client
            .post(self.endpoint(path)?)
            .timeout(self.timeout)
            .json(body))
    }

    /// Streaming POST without the per-request timeout.
    async fn open_stream(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ByteStream, BackendError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(match parse_reply::<serde_json::Value>(status, &body) {
                Err(err) => err,
                Ok(_) => BackendError::Status(status),
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(BackendError::from))
            .boxed())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_info(&self, url: &str) -> Result<Metadata, BackendError> {
        debug!("POST /api/info {url}");
        let response = self.post("/api/info", &json!({ "url": url }))?.send().await?;
        let info = read_reply::<InfoResponse>(response).await?;
        Ok(Metadata::from(info))
    }

    async fn open_download(&self, request: &DownloadRequest) -> Result<ByteStream, BackendError> {
        info!(
            "POST /api/download {} ({}, {})",
            request.url,
            request.mode.as_str(),
            request.kind.as_str()
        );
        let body = serde_json::to_value(request)?;
        self.open_stream("/api/download", &body).await
    }

    async fn resolve_stream(&self, url: &str) -> Result<StreamInfo, BackendError> {
        debug!("POST /api/stream {url}");
        let response = self.post("/api/stream", &json!({ "url": url }))?.send().await?;
        read_reply(response).await
    }

    async fn setup_check(&self) -> Result<SetupCheck, BackendError> {
        let response = self.get("/api/setup/check")?.send().await?;
        read_reply(response).await
    }

    async fn open_install(&self) -> Result<ByteStream, BackendError> {
        info!("POST /api/setup/install-sync");
        self.open_stream("/api/setup/install-sync", &json!({})).await
    }

    async fn browse(&self, path: &str) -> Result<(), BackendError> {
        let response = self
            .post("/api/setup/browse", &json!({ "path": path }))?
            .send()
            .await?;
        let reply = read_reply::<BrowseReply>(response).await?;
        if reply.success {
            Ok(())
        } else {
            Err(BackendError::Reported(
                reply.error.unwrap_or_else(|| format!("Could not open {path}")),
            ))
        }
    }

    async fn exit(&self) -> Result<(), BackendError> {
        info!("POST /api/setup/exit");
        self.post("/api/setup/exit", &json!({}))?.send().await?;
        Ok(())
    }

    async fn debug_report(&self) -> Result<DebugReport, BackendError> {
        let response = self.get("/api/debug")?.send().await?;
        read_reply(response).await
    }

    async fn debug_test(&self, url: &str) -> Result<DebugTestResult, BackendError> {
        let response = self
            .post("/api/debug/test", &json!({ "url": url }))?
            .send()
            .await?;
        // this endpoint reports failure in-band with `success: false`
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn read_reply<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;
    parse_reply(status.as_u16(), &body)
}

/// Decodes a `payload | {"error"}` body, preferring the backend's own message over the status.
fn parse_reply<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, BackendError> {
    match serde_json::from_str::<ApiReply<T>>(body) {
        Ok(reply) => reply.into_result().map_err(BackendError::Reported),
        Err(_) if !(200..300).contains(&status) => Err(BackendError::Status(status)),
        Err(err) => Err(err.into()),
    }
}
