use std::time::Duration;

use import_core::ErrorCode;
use import_logging::import_debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{ChannelError, StatusReport, SubmitReceipt, SubmitRequest};

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub auth_token: Option<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelSetupError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// One request/response exchange per call with the import server.
///
/// Implementations never retry on their own.
#[async_trait::async_trait]
pub trait StatusChannel: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReceipt, ChannelError>;

    async fn fetch_status(&self, job_id: &str) -> Result<StatusReport, ChannelError>;

    /// A job the server no longer knows about counts as cancelled.
    async fn cancel(&self, job_id: &str) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone)]
pub struct HttpStatusChannel {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpStatusChannel {
    pub fn new(settings: ChannelSettings) -> Result<Self, ChannelSetupError> {
        let invalid = |reason: String| ChannelSetupError::InvalidBaseUrl {
            url: settings.base_url.clone(),
            reason,
        };
        let base_url = Url::parse(&settings.base_url).map_err(|err| invalid(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("url cannot be a base".to_string()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ChannelSetupError::Client(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            auth_token: settings.auth_token,
        })
    }

    fn endpoint(&self, job_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "imports"]);
            if let Some(job_id) = job_id {
                segments.push(job_id);
            }
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ChannelError> {
        self.authorize(request)
            .send()
            .await
            .map_err(map_reqwest_error)
    }
}

#[async_trait::async_trait]
impl StatusChannel for HttpStatusChannel {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReceipt, ChannelError> {
        let url = self.endpoint(None);
        import_debug!(
            "submit import_type={} source={} has_content={}",
            request.import_type,
            request.source_url,
            request.raw_content.is_some()
        );
        let response = self.send(self.client.post(url).json(request)).await?;
        decode_success(response, ErrorCode::SubmitFailed).await
    }

    async fn fetch_status(&self, job_id: &str) -> Result<StatusReport, ChannelError> {
        let url = self.endpoint(Some(job_id));
        let response = self.send(self.client.get(url)).await?;
        decode_success(response, ErrorCode::StatusFailed).await
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ChannelError> {
        let url = self.endpoint(Some(job_id));
        let response = self.send(self.client.delete(url)).await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(rejection(response, ErrorCode::CancelFailed).await)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn decode_success<T: DeserializeOwned>(
    response: reqwest::Response,
    operation_code: ErrorCode,
) -> Result<T, ChannelError> {
    if !response.status().is_success() {
        return Err(rejection(response, operation_code).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ChannelError::network(format!("invalid response body: {err}")))
}

async fn rejection(response: reqwest::Response, operation_code: ErrorCode) -> ChannelError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

    let (server_code, detail_message) = match parsed.error {
        Some(detail) => (detail.code.as_deref().map(ErrorCode::parse), detail.message),
        None => (None, None),
    };
    let message = detail_message
        .or(parsed.message)
        .unwrap_or_else(|| status.to_string());

    ChannelError::rejected(operation_code, status.as_u16(), server_code, message)
}

fn map_reqwest_error(err: reqwest::Error) -> ChannelError {
    if err.is_timeout() {
        return ChannelError::network(format!("request timed out: {err}"));
    }
    ChannelError::network(err.to_string())
}
