use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{debug, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::api::{GitHubApi, InstallationToken};
use crate::assertion::sign_assertion;
use crate::clock::{Clock, SystemClock};
use crate::constants::TOKEN_REFRESH_MARGIN;
use crate::credentials::{AppIdentity, KeyMaterial};
use crate::error::DispatchError;

/// Cached, refresh-coalescing source of [`InstallationToken`]s.
///
/// State machine: empty → (exchange succeeds) → valid → (expiry minus the
/// refresh margin passes) → expiring → (exchange succeeds) → valid. An
/// exchange failure while no still-valid token is held evicts the stale
/// value and surfaces the classified error.
pub struct InstallationTokenSource {
    identity: AppIdentity,
    key: KeyMaterial,
    api: Arc<dyn GitHubApi>,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,

    // Atomically replaced, last-known-good token. Fast-path reads never lock.
    current: ArcSwap<Option<Arc<InstallationToken>>>,
    // Claimed by the single in-flight refresher; waiters queue here.
    refresh_mutex: Mutex<()>,
}

impl InstallationTokenSource {
    /// Creates a source for `identity`, signing with `key` and exchanging
    /// over `api`.
    ///
    /// Uses the system clock and the default refresh margin.
    pub fn new(identity: AppIdentity, key: KeyMaterial, api: Arc<dyn GitHubApi>) -> Self {
        Self {
            identity,
            key,
            api,
            clock: Arc::new(SystemClock),
            refresh_margin: TOKEN_REFRESH_MARGIN,
            current: ArcSwap::from_pointee(None),
            refresh_mutex: Mutex::new(()),
        }
    }

    /// Replaces the time source. Intended for tests and clock injection.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the safety margin before expiry at which a held token is
    /// refreshed rather than returned.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Returns the identity this source mints tokens for.
    pub const fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Returns the currently held token without refreshing, if any.
    ///
    /// The returned token may already be stale; this is a diagnostic
    /// accessor, not a substitute for [`InstallationTokenSource::get_token`].
    pub fn current_token(&self) -> Option<Arc<InstallationToken>> {
        self.current.load().as_ref().as_ref().map(Arc::clone)
    }

    /// Returns a token valid for at least the refresh margin, exchanging a
    /// fresh App assertion when the held one is absent or expiring.
    ///
    /// Callable concurrently: a fresh held token is returned without locking
    /// or network traffic, and concurrent callers during a refresh wait for
    /// the single in-flight exchange instead of issuing duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Signing`] if the assertion cannot be signed,
    /// a classified API error if the exchange fails, or
    /// [`DispatchError::Cancelled`] if `cancel` fires first. Cancellation
    /// leaves the held value untouched.
    pub async fn get_token(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<InstallationToken>, DispatchError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _guard = tokio::select! {
            guard = self.refresh_mutex.lock() => guard,
            () = cancel.cancelled() => return Err(DispatchError::Cancelled),
        };

        // A concurrent refresher may have finished while we waited.
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let assertion = sign_assertion(&self.identity, &self.key, self.clock.now())?;

        let exchanged = tokio::select! {
            result = self
                .api
                .exchange_token(assertion.token(), self.identity.installation_id()) => result,
            () = cancel.cancelled() => return Err(DispatchError::Cancelled),
        };

        match exchanged {
            Ok(token) => {
                debug!(
                    "installation token refreshed for {} (expires_at={})",
                    self.identity,
                    token.expires_at()
                );
                let token = Arc::new(token);
                self.current.store(Arc::new(Some(Arc::clone(&token))));
                Ok(token)
            }
            Err(err) => {
                warn!("token exchange failed for {}: {err}", self.identity);
                // The held value (if any) is already stale; drop it so the
                // state is plainly empty rather than expired-but-present.
                self.current.store(Arc::new(None));
                Err(err.into())
            }
        }
    }

    fn fresh_token(&self) -> Option<Arc<InstallationToken>> {
        let now = self.clock.now();
        let current = self.current.load();
        current
            .as_ref()
            .as_ref()
            .filter(|token| token.fresh_at(now, self.refresh_margin))
            .map(Arc::clone)
    }
}

impl std::fmt::Debug for InstallationTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationTokenSource")
            .field("identity", &self.identity)
            .field("refresh_margin", &self.refresh_margin)
            .field("has_token", &self.current.load().is_some())
            .finish()
    }
}
