//! Error types for the dispatch flow.
//!
//! [`DispatchError`] is the terminal outcome of a failed dispatch call. Its
//! variants mirror the response classification: configuration-class errors
//! (`InvalidKeyFormat`, `Signing`) are never retried, terminal API errors
//! (`Auth`, `NotFound`, `Validation`) are surfaced verbatim with enough
//! detail to act on, and transient failures are absorbed by the retry loop
//! up to its attempt ceiling before surfacing as `RetriesExhausted`.

use thiserror::Error;

use crate::api::{ApiError, TransientError};
use crate::assertion::SigningError;
use crate::credentials::KeyMaterialError;

/// Terminal error returned by a dispatch call.
///
/// A dispatch call produces exactly one outcome: `Ok(())` when GitHub
/// accepted the event (HTTP 204), or one of these variants.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// The supplied secret could not be interpreted as an App private key.
    #[error("invalid key material: {0}")]
    InvalidKeyFormat(#[from] KeyMaterialError),

    /// The App assertion could not be signed with the loaded key.
    #[error("failed to sign app assertion: {0}")]
    Signing(#[from] SigningError),

    /// GitHub rejected the credential (HTTP 401/403).
    ///
    /// Likely causes: wrong App ID, wrong installation ID, a revoked or
    /// rotated private key, or an App missing the `actions: write`
    /// permission on the target repository.
    #[error("github rejected the credential (status {status}): {message}")]
    Auth {
        /// HTTP status returned by GitHub.
        status: u16,
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// The repository, workflow file, or installation was not found (HTTP 404).
    ///
    /// Also returned when the App installation cannot see the repository.
    #[error("not found: {message}")]
    NotFound {
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// GitHub rejected the dispatch payload (HTTP 422).
    ///
    /// The most common cause is a workflow file without a `workflow_dispatch`
    /// trigger; invalid `ref` values and unknown `inputs` keys also land here.
    #[error("dispatch rejected: {message}")]
    Validation {
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// A transient failure (HTTP 429/5xx, timeout, connection error).
    ///
    /// Eligible for retry under the configured [`RetryPolicy`](crate::RetryPolicy).
    #[error("transient failure: {0}")]
    Transient(#[from] TransientError),

    /// The caller cancelled the operation before a response was received.
    #[error("operation cancelled")]
    Cancelled,

    /// The retry budget for transient failures was exhausted.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts performed, including the first.
        attempts: u32,
        /// The transient error observed on the final attempt.
        #[source]
        last: TransientError,
    },
}

impl DispatchError {
    /// Returns `true` for failures that may succeed on retry.
    ///
    /// Only [`DispatchError::Transient`] qualifies; every other variant is
    /// deterministic for the same inputs and retrying it wastes quota.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<ApiError> for DispatchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth { status, message } => Self::Auth { status, message },
            ApiError::NotFound { message } => Self::NotFound { message },
            ApiError::Validation { message } => Self::Validation { message },
            ApiError::Transient(transient) => Self::Transient(transient),
        }
    }
}

/// Errors constructing a [`RestClient`](crate::api::RestClient).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RestClientError {
    /// The API base is not a valid URL.
    #[error("api base is not a valid URL")]
    InvalidApiBase(#[from] url::ParseError),

    /// The API base URL scheme must be `http` or `https`.
    #[error("api base URL scheme must be http or https")]
    InvalidApiBaseScheme,

    /// The API base URL must not include query values or a fragment.
    #[error("api base URL must not include query values or a fragment")]
    ApiBaseHasExtras,

    /// The underlying HTTP client could not be built.
    #[error("failed to build http client")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let err = DispatchError::Transient(TransientError::Timeout);
        assert!(err.is_transient());

        let err = DispatchError::Validation {
            message: "no workflow_dispatch trigger".into(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("workflow_dispatch"));
    }

    #[test]
    fn api_error_maps_onto_dispatch_error() {
        let err: DispatchError = ApiError::Auth {
            status: 401,
            message: "Bad credentials".into(),
        }
        .into();
        assert!(matches!(err, DispatchError::Auth { status: 401, .. }));

        let err: DispatchError = ApiError::Transient(TransientError::Status {
            status: 503,
            message: "unavailable".into(),
        })
        .into();
        assert!(err.is_transient());
    }
}
