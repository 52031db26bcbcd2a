//! Outbound job callbacks
//!
//! A finished job notifies its caller with a multipart form POST. Success
//! carries the anonymized dataset as JSON bytes; failure carries a machine
//! code, a summary and the raw cause.

use crate::config::{CallbackConfig, SecretString};
use crate::domain::{
    AnonymizationError, CallbackError, Dataset, ProcessId, VeilError, UNKNOWN_ERROR_CODE,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Multipart field holding the anonymized dataset
pub const DATASET_FIELD: &str = "anonymized_dataset";

/// File name of the dataset part
pub const DATASET_FILE_NAME: &str = "anonymized_dataset.bin";

/// `exception_message` sent when a failure has no underlying cause
pub const NO_ADDITIONAL_INFORMATION: &str = "No additional information";

/// Fields of a failure callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub error_code: String,
    pub error_message: String,
    pub exception_message: String,
}

impl FailureReport {
    /// Report for a failure nothing more specific is known about
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            error_code: UNKNOWN_ERROR_CODE.to_string(),
            error_message: message.into(),
            exception_message: NO_ADDITIONAL_INFORMATION.to_string(),
        }
    }
}

impl From<&AnonymizationError> for FailureReport {
    fn from(error: &AnonymizationError) -> Self {
        Self {
            error_code: error.code().to_string(),
            error_message: error.to_string(),
            exception_message: error
                .cause()
                .unwrap_or(NO_ADDITIONAL_INFORMATION)
                .to_string(),
        }
    }
}

/// Destination of job callbacks
#[async_trait]
pub trait CallbackSink: Send + Sync {
    /// Deliver the anonymized dataset
    async fn send_success(&self, url: &Url, dataset: &Dataset) -> Result<(), CallbackError>;

    /// Deliver a failure report
    async fn send_failure(&self, url: &Url, report: &FailureReport) -> Result<(), CallbackError>;
}

/// Callback sink posting multipart forms over HTTP
pub struct HttpCallbackClient {
    client: Client,
    auth_token: Option<SecretString>,
}

impl HttpCallbackClient {
    /// Create a client from the callback configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &CallbackConfig) -> crate::domain::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .build()
            .map_err(|e| VeilError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let auth_token = config
            .auth_token
            .clone()
            .filter(|token| !token.expose_secret().is_empty());

        Ok(Self { client, auth_token })
    }

    async fn post(&self, url: &Url, form: Form) -> Result<(), CallbackError> {
        let mut request = self.client.post(url.clone()).multipart(form);
        if let Some(token) = &self.auth_token {
            let token: &str = token.expose_secret().as_ref();
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| CallbackError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallbackError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CallbackSink for HttpCallbackClient {
    async fn send_success(&self, url: &Url, dataset: &Dataset) -> Result<(), CallbackError> {
        let bytes = dataset
            .to_json_bytes()
            .map_err(|e| CallbackError::Encoding(e.to_string()))?;
        let part = Part::bytes(bytes)
            .file_name(DATASET_FILE_NAME)
            .mime_str("application/octet-stream")
            .map_err(|e| CallbackError::Encoding(e.to_string()))?;
        self.post(url, Form::new().part(DATASET_FIELD, part)).await
    }

    async fn send_failure(&self, url: &Url, report: &FailureReport) -> Result<(), CallbackError> {
        let form = Form::new()
            .text("error_code", report.error_code.clone())
            .text("error_message", report.error_message.clone())
            .text("exception_message", report.exception_message.clone());
        self.post(url, form).await
    }
}

/// Outcome of a job, as delivered to its callback
#[derive(Debug, Clone)]
pub enum CallbackPayload {
    Success(Arc<Dataset>),
    Failure(FailureReport),
}

/// Sends callbacks as detached tasks
///
/// Success callbacks are sent once. Failure callbacks are retried up to
/// `max_retries` times with a fixed delay, then dropped.
#[derive(Clone)]
pub struct CallbackDispatcher {
    sink: Arc<dyn CallbackSink>,
    max_retries: u32,
    retry_delay: Duration,
}

impl CallbackDispatcher {
    pub fn new(sink: Arc<dyn CallbackSink>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            sink,
            max_retries,
            retry_delay,
        }
    }

    /// Dispatcher using the retry settings of `config`
    pub fn from_config(sink: Arc<dyn CallbackSink>, config: &CallbackConfig) -> Self {
        Self::new(
            sink,
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Deliver `payload` without waiting for it
    pub fn dispatch(
        &self,
        process_id: ProcessId,
        url: Url,
        payload: CallbackPayload,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.deliver(&process_id, &url, &payload).await })
    }

    /// Deliver `payload` and wait for the last attempt
    pub async fn deliver(&self, process_id: &ProcessId, url: &Url, payload: &CallbackPayload) {
        match payload {
            CallbackPayload::Success(dataset) => {
                match self.sink.send_success(url, dataset).await {
                    Ok(()) => tracing::info!(
                        process_id = %process_id,
                        url = %url,
                        "Success callback delivered"
                    ),
                    Err(e) => tracing::error!(
                        process_id = %process_id,
                        url = %url,
                        error = %e,
                        "Failed to deliver success callback"
                    ),
                }
            }
            CallbackPayload::Failure(report) => {
                let attempts = self.max_retries + 1;
                for attempt in 1..=attempts {
                    match self.sink.send_failure(url, report).await {
                        Ok(()) => {
                            tracing::info!(
                                process_id = %process_id,
                                url = %url,
                                error_code = %report.error_code,
                                "Failure callback delivered"
                            );
                            return;
                        }
                        Err(e) if attempt < attempts => {
                            crate::log_retry_attempt!(attempt, attempts, e);
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        Err(e) => tracing::error!(
                            process_id = %process_id,
                            url = %url,
                            attempts = attempt,
                            error = %e,
                            "Giving up on failure callback"
                        ),
                    }
                }
            }
        }
    }
}

/// Parse and check a caller-supplied callback URL
///
/// # Errors
///
/// `InvalidCallbackUrl` when the URL doesn't parse or isn't http(s)
pub fn parse_callback_url(raw: &str) -> Result<Url, AnonymizationError> {
    let url = Url::parse(raw).map_err(|e| AnonymizationError::InvalidCallbackUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AnonymizationError::InvalidCallbackUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}', expected http or https"),
        }),
    }
}
