//! REST implementation of [`GitHubApi`] backed by `reqwest`.
//!
//! Responses are classified here, close to the wire: terminal statuses keep
//! whatever detail GitHub put in the error body, and network-level failures
//! (timeout, connection reset) become [`TransientError`] so the retry policy
//! can act on them.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use super::{ApiError, GitHubApi, InstallationToken, TransientError};
use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_CALL_TIMEOUT, GITHUB_ACCEPT, GITHUB_API_VERSION,
};
use crate::dispatch::DispatchRequest;
use crate::error::RestClientError;
use log::debug;

/// Configuration for a [`RestClient`].
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL of the GitHub REST API.
    pub api_base: String,
    /// Per-call timeout covering connect, send, and response read.
    pub timeout: std::time::Duration,
    /// `User-Agent` header; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout: DEFAULT_CALL_TIMEOUT,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_owned(),
        }
    }
}

/// [`GitHubApi`] implementation over the GitHub REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: String,
}

/// Body of a successful token exchange response.
#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

/// Error body shape GitHub uses for REST failures.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<serde_json::Value>,
}

impl RestClient {
    /// Creates a client against the default GitHub API base.
    ///
    /// # Errors
    ///
    /// Returns a [`RestClientError`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, RestClientError> {
        Self::with_config(RestClientConfig::default())
    }

    /// Creates a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`RestClientError`] if the API base is not a plain
    /// `http`/`https` URL or the HTTP client cannot be built.
    pub fn with_config(config: RestClientConfig) -> Result<Self, RestClientError> {
        let base = validate_api_base(&config.api_base)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self { http, base })
    }

    async fn classify_failure(response: Response) -> ApiError {
        let status = response.status();
        let message = read_error_message(response).await;
        classify_status(status, message)
    }
}

#[async_trait]
impl GitHubApi for RestClient {
    async fn exchange_token(
        &self,
        assertion: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, ApiError> {
        let url = format!("{}/app/installations/{installation_id}/access_tokens", self.base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(assertion)
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::CREATED {
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| TransientError::Connection(e.to_string()))?;
            debug!(
                "exchanged app assertion for installation token (installation={installation_id}, expires_at={})",
                body.expires_at
            );
            return Ok(InstallationToken::new(
                body.token,
                body.expires_at,
                installation_id,
            ));
        }

        Err(Self::classify_failure(response).await)
    }

    async fn dispatch_workflow(
        &self,
        token: &str,
        request: &DispatchRequest,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/repos/{}/{}/actions/workflows/{}/dispatches",
            self.base,
            request.owner(),
            request.repo(),
            request.workflow_file()
        );

        let mut body = serde_json::json!({ "ref": request.reference() });
        if !request.inputs().is_empty() {
            body["inputs"] = serde_json::to_value(request.inputs())
                .unwrap_or(serde_json::Value::Null);
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NO_CONTENT {
            debug!(
                "workflow dispatch accepted ({}/{} {}@{})",
                request.owner(),
                request.repo(),
                request.workflow_file(),
                request.reference()
            );
            return Ok(());
        }

        Err(Self::classify_failure(response).await)
    }
}

fn validate_api_base(api_base: &str) -> Result<String, RestClientError> {
    let url = Url::parse(api_base)?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(RestClientError::InvalidApiBaseScheme);
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(RestClientError::ApiBaseHasExtras);
    }
    Ok(api_base.trim_end_matches('/').to_owned())
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Transient(TransientError::Timeout);
    }
    ApiError::Transient(TransientError::Connection(err.to_string()))
}

/// Extracts the most useful detail from a GitHub error body.
async fn read_error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    parse_error_message(&text).unwrap_or_else(|| {
        if text.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            text
        }
    })
}

fn parse_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = parsed.message?;
    match parsed.errors {
        Some(errors) if !errors.is_null() => Some(format!("{message} ({errors})")),
        _ => Some(message),
    }
}

fn classify_status(status: StatusCode, message: String) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::Auth {
            status: status.as_u16(),
            message,
        },
        404 => ApiError::NotFound { message },
        422 => ApiError::Validation {
            message: with_dispatch_hint(message),
        },
        429 => ApiError::Transient(TransientError::Status {
            status: 429,
            message,
        }),
        500..=599 => ApiError::Transient(TransientError::Status {
            status: status.as_u16(),
            message,
        }),
        other => ApiError::Validation {
            message: format!("unexpected status {other}: {message}"),
        },
    }
}

/// GitHub's 422 message names the missing trigger when that is the cause;
/// when it does not, point the caller at the usual suspects.
fn with_dispatch_hint(message: String) -> String {
    if message.to_ascii_lowercase().contains("workflow_dispatch") {
        message
    } else {
        format!("{message} (check that the workflow file has a workflow_dispatch trigger and that ref and inputs are valid)")
    }
}
