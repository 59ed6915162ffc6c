//! Protocol constants for the GitHub App dispatch flow.

use std::time::Duration;

/// Default base URL of the GitHub REST API.
///
/// Override this via [`DispatchClientBuilder::api_base`](crate::DispatchClientBuilder::api_base)
/// when targeting a GitHub Enterprise Server instance.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Media type GitHub expects in the `Accept` header for REST calls.
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// REST API version sent in the `X-GitHub-Api-Version` header.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Maximum assertion lifetime GitHub accepts when exchanging an App JWT.
///
/// Assertions with a longer `exp` window are rejected by the token endpoint.
pub const ASSERTION_CEILING: Duration = Duration::from_secs(10 * 60);

/// Backdate applied to the `iat` claim to tolerate clock drift relative to
/// GitHub's servers.
pub const CLOCK_SKEW_ALLOWANCE: Duration = Duration::from_secs(60);

/// Safety margin before token expiry at which a cached installation token is
/// considered stale and refreshed.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Maximum number of `inputs` keys accepted by the workflow dispatch endpoint.
pub const MAX_WORKFLOW_INPUTS: usize = 10;

/// Default per-call timeout for token exchange and dispatch requests.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
