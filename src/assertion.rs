//! App assertion signing.
//!
//! A GitHub App proves its identity to the token endpoint with a short-lived
//! RS256-signed JWT whose `iss` claim is the numeric App ID. The assertion is
//! minted per exchange, used once, and discarded; its serialized form is
//! zeroized on drop.

use std::fmt;

use jsonwebtoken::{Algorithm, Header};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::constants::{ASSERTION_CEILING, CLOCK_SKEW_ALLOWANCE};
use crate::credentials::{AppIdentity, KeyMaterial};

/// Errors signing an [`AppAssertion`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    /// The key material is not usable for RS256 signing.
    #[error("rs256 signing failed: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

/// A signed, single-use App assertion.
///
/// `expires_at - issued_at` never exceeds the 10 minute ceiling GitHub
/// accepts, and `issued_at` never lies in the future. The `iat` claim inside
/// the token is additionally backdated by the clock-skew allowance so minor
/// drift against GitHub's clock does not invalidate the assertion.
pub struct AppAssertion {
    token: Zeroizing<String>,
    issued_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

#[derive(Serialize)]
struct Claims {
    iat: i64,
    exp: i64,
    iss: String,
}

impl AppAssertion {
    /// Returns the serialized JWT for use as a bearer credential.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the nominal issue instant (the clock reading at signing).
    pub const fn issued_at(&self) -> OffsetDateTime {
        self.issued_at
    }

    /// Returns the expiry instant of the assertion.
    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }
}

impl fmt::Debug for AppAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppAssertion")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Signs an App assertion for `identity` at the instant `now`.
///
/// # Errors
///
/// Returns a [`SigningError`] if the key material cannot produce an RS256
/// signature.
pub fn sign_assertion(
    identity: &AppIdentity,
    key: &KeyMaterial,
    now: OffsetDateTime,
) -> Result<AppAssertion, SigningError> {
    let issued_at = now;
    let expires_at = now + ASSERTION_CEILING;

    let claims = Claims {
        iat: (issued_at - CLOCK_SKEW_ALLOWANCE).unix_timestamp(),
        exp: expires_at.unix_timestamp(),
        iss: identity.app_id().to_string(),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        key.encoding_key(),
    )
    .map_err(SigningError::Sign)?;

    Ok(AppAssertion {
        token: Zeroizing::new(token),
        issued_at,
        expires_at,
    })
}
