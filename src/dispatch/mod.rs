//! Workflow dispatch client.
//!
//! [`DispatchClient`] is the caller-facing entry point: it owns the token
//! source and retry policy, performs one API dispatch call per attempt, and
//! returns exactly one terminal outcome per [`DispatchClient::dispatch`]
//! call. No dispatch is ever issued without first holding a token believed
//! valid at call time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::api::{GitHubApi, RestClient, RestClientConfig};
use crate::clock::Clock;
use crate::constants::{DEFAULT_API_BASE, DEFAULT_CALL_TIMEOUT, MAX_WORKFLOW_INPUTS};
use crate::credentials::{AppIdentity, KeyMaterial};
use crate::error::{DispatchError, RestClientError};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::token_source::InstallationTokenSource;

/// Errors validating a [`DispatchRequest`].
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    /// A required field is empty.
    #[error("dispatch request field '{field}' must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The inputs map exceeds the documented API ceiling.
    #[error("too many workflow inputs: {count} (GitHub accepts at most {max})")]
    TooManyInputs {
        /// Number of inputs supplied.
        count: usize,
        /// Maximum the API accepts.
        max: usize,
    },
}

/// A validated `workflow_dispatch` request.
///
/// Identifies the target workflow by owner, repository, workflow file name
/// (e.g. `deploy.yml`), and git reference, plus up to ten string-valued
/// inputs with unique keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    owner: String,
    repo: String,
    workflow_file: String,
    reference: String,
    inputs: BTreeMap<String, String>,
}

impl DispatchRequest {
    /// Creates a request targeting `workflow_file` on `reference` in
    /// `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyField`] if any field is empty.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        workflow_file: impl Into<String>,
        reference: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let request = Self {
            owner: owner.into(),
            repo: repo.into(),
            workflow_file: workflow_file.into(),
            reference: reference.into(),
            inputs: BTreeMap::new(),
        };

        for (field, value) in [
            ("owner", &request.owner),
            ("repo", &request.repo),
            ("workflow_file", &request.workflow_file),
            ("ref", &request.reference),
        ] {
            if value.trim().is_empty() {
                return Err(RequestError::EmptyField { field });
            }
        }

        Ok(request)
    }

    /// Adds a workflow input, replacing any previous value for the key.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::TooManyInputs`] if this would exceed the API
    /// ceiling of ten keys.
    pub fn with_input(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, RequestError> {
        self.inputs.insert(key.into(), value.into());
        if self.inputs.len() > MAX_WORKFLOW_INPUTS {
            return Err(RequestError::TooManyInputs {
                count: self.inputs.len(),
                max: MAX_WORKFLOW_INPUTS,
            });
        }
        Ok(self)
    }

    /// Replaces the inputs map wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::TooManyInputs`] if more than ten unique keys
    /// are supplied.
    pub fn with_inputs<K, V, I>(mut self, inputs: I) -> Result<Self, RequestError>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.inputs = inputs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if self.inputs.len() > MAX_WORKFLOW_INPUTS {
            return Err(RequestError::TooManyInputs {
                count: self.inputs.len(),
                max: MAX_WORKFLOW_INPUTS,
            });
        }
        Ok(self)
    }

    /// Returns the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Returns the workflow file name.
    pub fn workflow_file(&self) -> &str {
        &self.workflow_file
    }

    /// Returns the git reference (branch or tag).
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Returns the workflow inputs.
    pub const fn inputs(&self) -> &BTreeMap<String, String> {
        &self.inputs
    }
}

/// Client for triggering workflow dispatch events as a GitHub App.
///
/// # Examples
///
/// ```no_run
/// use gh_dispatch::{AppIdentity, DispatchClient, DispatchRequest, KeyMaterial};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let identity = AppIdentity::new(123, 456)?;
/// let secret = std::fs::read_to_string("app-key.pem")?;
/// let key = KeyMaterial::from_secret(&secret)?;
///
/// let client = DispatchClient::builder(identity, key).build()?;
///
/// let request = DispatchRequest::new("acme", "svc", "deploy.yml", "main")?
///     .with_input("env", "prod")?;
/// client.dispatch(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct DispatchClient {
    tokens: InstallationTokenSource,
    api: Arc<dyn GitHubApi>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for DispatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchClient")
            .field("tokens", &self.tokens)
            .field("api", &"<GitHubApi>")
            .field("retry", &self.retry)
            .finish()
    }
}

impl DispatchClient {
    /// Creates a builder for configuring a [`DispatchClient`].
    pub fn builder(identity: AppIdentity, key: KeyMaterial) -> DispatchClientBuilder {
        DispatchClientBuilder::new(identity, key)
    }

    /// Returns the token source backing this client.
    pub const fn token_source(&self) -> &InstallationTokenSource {
        &self.tokens
    }

    /// Triggers the workflow dispatch, retrying transient failures per the
    /// configured policy.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] naming the terminal classification; see
    /// the crate error taxonomy.
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        self.dispatch_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Like [`DispatchClient::dispatch`], aborting with
    /// [`DispatchError::Cancelled`] when `cancel` fires.
    ///
    /// Cancellation interrupts in-flight network calls and backoff sleeps;
    /// it never leaves the token cache claiming a token that was not
    /// obtained.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] naming the terminal classification.
    pub async fn dispatch_cancellable(
        &self,
        request: &DispatchRequest,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let mut attempt: u32 = 1;
        loop {
            let err = match self.try_dispatch(request, cancel).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            match self.retry.decide(&err, attempt) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        "dispatch attempt {attempt} failed ({err}); retrying in {delay:?}"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    return Err(match err {
                        DispatchError::Transient(last) => DispatchError::RetriesExhausted {
                            attempts: attempt,
                            last,
                        },
                        other => other,
                    });
                }
            }
        }
    }

    async fn try_dispatch(
        &self,
        request: &DispatchRequest,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let token = self.tokens.get_token(cancel).await?;

        tokio::select! {
            result = self.api.dispatch_workflow(token.value(), request) => {
                result.map_err(DispatchError::from)
            }
            () = cancel.cancelled() => Err(DispatchError::Cancelled),
        }
    }
}

/// Builder for [`DispatchClient`].
// Not derivable: the api and clock fields are trait objects.
pub struct DispatchClientBuilder {
    identity: AppIdentity,
    key: KeyMaterial,
    api_base: String,
    timeout: Duration,
    user_agent: Option<String>,
    retry: RetryPolicy,
    refresh_margin: Option<Duration>,
    clock: Option<Arc<dyn Clock>>,
    api: Option<Arc<dyn GitHubApi>>,
}

impl DispatchClientBuilder {
    fn new(identity: AppIdentity, key: KeyMaterial) -> Self {
        Self {
            identity,
            key,
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout: DEFAULT_CALL_TIMEOUT,
            user_agent: None,
            retry: RetryPolicy::default(),
            refresh_margin: None,
            clock: None,
            api: None,
        }
    }

    /// Sets the API base URL (for GitHub Enterprise Server).
    #[must_use]
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the per-call network timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header sent to GitHub.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the retry policy for transient failures.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the safety margin before token expiry at which the cached
    /// installation token is refreshed.
    #[must_use]
    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = Some(margin);
        self
    }

    /// Replaces the time source. Intended for tests.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replaces the API transport. Intended for tests and custom transports;
    /// when set, `api_base`, `timeout`, and `user_agent` are unused.
    #[must_use]
    pub fn github_api(mut self, api: Arc<dyn GitHubApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns a [`RestClientError`] if the REST transport cannot be
    /// constructed from the configured API base and timeout.
    pub fn build(self) -> Result<DispatchClient, RestClientError> {
        let api: Arc<dyn GitHubApi> = match self.api {
            Some(api) => api,
            None => {
                let mut config = RestClientConfig {
                    api_base: self.api_base,
                    timeout: self.timeout,
                    ..RestClientConfig::default()
                };
                if let Some(user_agent) = self.user_agent {
                    config.user_agent = user_agent;
                }
                Arc::new(RestClient::with_config(config)?)
            }
        };

        let mut tokens = InstallationTokenSource::new(self.identity, self.key, Arc::clone(&api));
        if let Some(clock) = self.clock {
            tokens = tokens.with_clock(clock);
        }
        if let Some(margin) = self.refresh_margin {
            tokens = tokens.with_refresh_margin(margin);
        }

        Ok(DispatchClient {
            tokens,
            api,
            retry: self.retry,
        })
    }
}

impl std::fmt::Debug for DispatchClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchClientBuilder")
            .field("identity", &self.identity)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("refresh_margin", &self.refresh_margin)
            .field("api", &self.api.as_ref().map(|_| "<GitHubApi>"))
            .finish()
    }
}
