//! Shared test doubles: an in-memory [`GitHubApi`] with programmable
//! responses and call counters, and a manually advanced [`Clock`].

// Each integration test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::macros::datetime;
use time::OffsetDateTime;

use gh_dispatch::{
    ApiError, AppIdentity, Clock, DispatchRequest, GitHubApi, InstallationToken, KeyMaterial,
};

pub const TEST_KEY_PEM: &str = include_str!("../data/app-key.pem");

pub fn identity() -> AppIdentity {
    AppIdentity::new(123, 456).unwrap()
}

pub fn key() -> KeyMaterial {
    KeyMaterial::from_secret(TEST_KEY_PEM).unwrap()
}

pub fn request() -> DispatchRequest {
    DispatchRequest::new("acme", "svc", "deploy.yml", "main")
        .unwrap()
        .with_input("env", "prod")
        .unwrap()
}

/// Clock frozen at a fixed instant until advanced by the test.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<OffsetDateTime>,
}

impl MockClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(datetime!(2026-01-01 00:00:00 UTC)),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

/// Programmable [`GitHubApi`] double.
///
/// Exchanges succeed by default, minting tokens valid for `token_ttl` past
/// the mock clock; dispatches succeed by default. Failures are queued per
/// call. `hang_*` flags park the call forever so cancellation can be tested.
pub struct MockApi {
    clock: Arc<MockClock>,
    token_ttl: Duration,
    exchange_calls: AtomicU32,
    dispatch_calls: AtomicU32,
    exchange_failures: Mutex<VecDeque<ApiError>>,
    dispatch_results: Mutex<VecDeque<Result<(), ApiError>>>,
    exchange_delay: Mutex<Duration>,
    hang_exchange: AtomicBool,
    hang_dispatch: AtomicBool,
    tokens_seen: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new(clock: Arc<MockClock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            token_ttl: Duration::from_secs(60 * 60),
            exchange_calls: AtomicU32::new(0),
            dispatch_calls: AtomicU32::new(0),
            exchange_failures: Mutex::new(VecDeque::new()),
            dispatch_results: Mutex::new(VecDeque::new()),
            exchange_delay: Mutex::new(Duration::ZERO),
            hang_exchange: AtomicBool::new(false),
            hang_dispatch: AtomicBool::new(false),
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn exchange_count(&self) -> u32 {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn dispatch_count(&self) -> u32 {
        self.dispatch_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_exchange(&self, err: ApiError) {
        self.exchange_failures.lock().unwrap().push_back(err);
    }

    pub fn queue_dispatch(&self, result: Result<(), ApiError>) {
        self.dispatch_results.lock().unwrap().push_back(result);
    }

    pub fn set_exchange_delay(&self, delay: Duration) {
        *self.exchange_delay.lock().unwrap() = delay;
    }

    pub fn set_hang_exchange(&self, hang: bool) {
        self.hang_exchange.store(hang, Ordering::SeqCst);
    }

    pub fn set_hang_dispatch(&self, hang: bool) {
        self.hang_dispatch.store(hang, Ordering::SeqCst);
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitHubApi for MockApi {
    async fn exchange_token(
        &self,
        assertion: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, ApiError> {
        // A signed assertion has three dot-separated parts.
        assert_eq!(assertion.split('.').count(), 3, "malformed app assertion");

        let n = self.exchange_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.hang_exchange.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.exchange_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.exchange_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(InstallationToken::new(
            format!("ghs_mock_{n}"),
            self.clock.now() + self.token_ttl,
            installation_id,
        ))
    }

    async fn dispatch_workflow(
        &self,
        token: &str,
        _request: &DispatchRequest,
    ) -> Result<(), ApiError> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(token.to_owned());

        if self.hang_dispatch.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        self.dispatch_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
