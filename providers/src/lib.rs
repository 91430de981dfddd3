//! Clients for the two external substrates a workload runs on.
//!
//! # Architecture
//!
//! Callers depend on the traits, never on the HTTP clients:
//!
//! - [`WorkflowStatusProvider`] / [`WorkflowLauncher`] - the workflow engine
//!   running the build-and-verify pipeline ([`workflow::WorkflowClient`])
//! - [`ContainerStatusProvider`] / [`RuntimeBackend`] - the container
//!   scheduler running playground tasks ([`scheduler::SchedulerClient`])
//!
//! The traits are dyn-compatible so the engine can hold them as
//! `Arc<dyn ...>` and tests can substitute fakes.
//!
//! # Error Handling
//!
//! Every call returns [`ProviderError`] on failure. The engine decides
//! whether a failure triggers a fallback, becomes an `ERROR` status, or is
//! reported as `success = false`.

pub mod retry;
pub mod scheduler;
pub mod workflow;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sandlot_types::PlacementInfo;
use thiserror::Error;

pub use sandlot_types;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Boxed future returned by every provider call.
pub type ProviderFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("missing configuration: {}", .0.join(", "))]
    Misconfigured(Vec<String>),
}

impl ProviderError {
    pub(crate) fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Status of one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDescription {
    /// Raw engine status, e.g. `RUNNING` or `SUCCEEDED`.
    pub status: String,
    /// Error and cause reported by the engine for a failed execution.
    pub error: Option<String>,
}

/// Status of one container task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescription {
    /// Raw scheduler status, or [`scheduler::TASK_NOT_FOUND`] /
    /// [`scheduler::TASK_FAILED`] when the task could not be described.
    pub status: String,
    pub running: bool,
    pub placement: Option<PlacementInfo>,
    pub stopped_reason: Option<String>,
    /// Reason the scheduler gave for not describing the task.
    pub failure: Option<String>,
}

/// What to launch as a runtime instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub workload_id: String,
    pub workload_name: String,
    pub artifact_ref: String,
}

/// What to start as a verification pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub workload_id: String,
    pub workload_name: String,
}

pub trait WorkflowStatusProvider: Send + Sync {
    fn describe_execution<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, ExecutionDescription>;
}

pub trait WorkflowLauncher: Send + Sync {
    /// Start a pipeline execution and return its handle.
    fn start_execution<'a>(&'a self, request: &'a ExecutionRequest) -> ProviderFut<'a, String>;
}

pub trait ContainerStatusProvider: Send + Sync {
    fn describe_task<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, TaskDescription>;
}

pub trait RuntimeBackend: Send + Sync {
    /// Launch a task and return its handle.
    fn launch<'a>(&'a self, request: &'a LaunchRequest) -> ProviderFut<'a, String>;
    /// Request termination. Returns once the scheduler accepted the request.
    fn stop<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, ()>;
}

/// Shared connection settings for a gateway client.
#[derive(Clone)]
pub struct ClientSettings {
    pub base_url: url::Url,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub allow_insecure_http: bool,
    pub retry: retry::RetryConfig,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientSettings {
    #[must_use]
    pub fn new(base_url: url::Url) -> Self {
        Self {
            base_url,
            api_token: None,
            request_timeout: Duration::from_secs(5),
            allow_insecure_http: false,
            retry: retry::RetryConfig::default(),
        }
    }

    /// Absolute URL for an operation path such as `describe-tasks`.
    pub(crate) fn endpoint(&self, operation: &str) -> Result<url::Url, ProviderError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(operation)
            .map_err(|e| ProviderError::Rejected(format!("invalid gateway URL: {e}")))
    }

    pub(crate) fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn base_client_builder(allow_insecure_http: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(!allow_insecure_http)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(concat!("sandlot/", env!("CARGO_PKG_VERSION")))
}

/// Build a client with a per-request timeout.
pub fn http_client(settings: &ClientSettings) -> Result<reqwest::Client, ProviderError> {
    base_client_builder(settings.allow_insecure_http)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Turn a request outcome into a decoded JSON body or a [`ProviderError`].
pub(crate) async fn decode_outcome<T>(
    outcome: retry::RetryOutcome,
    timeout: Duration,
) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    let response = expect_success(outcome, timeout).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

pub(crate) async fn expect_success(
    outcome: retry::RetryOutcome,
    timeout: Duration,
) -> Result<reqwest::Response, ProviderError> {
    match outcome {
        retry::RetryOutcome::Success(response) => Ok(response),
        retry::RetryOutcome::HttpError(response) => {
            let status = response.status().as_u16();
            let body = read_capped_error_body(response).await;
            Err(ProviderError::Http { status, body })
        }
        retry::RetryOutcome::ConnectionError { attempts, source } => {
            tracing::debug!(attempts, error = %source, "Gateway request failed");
            Err(ProviderError::from_reqwest(&source, timeout))
        }
        retry::RetryOutcome::NonRetryable(source) => {
            Err(ProviderError::from_reqwest(&source, timeout))
        }
    }
}
