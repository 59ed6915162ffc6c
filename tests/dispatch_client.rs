//! End-to-end dispatch scenarios against the in-memory API double:
//! classification, retry behavior, backoff timing, and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{identity, key, request, MockApi, MockClock};
use gh_dispatch::{
    ApiError, DispatchClient, DispatchError, RetryPolicy, TransientError,
};

fn client(api: Arc<MockApi>, clock: Arc<MockClock>) -> DispatchClient {
    DispatchClient::builder(identity(), key())
        .github_api(api)
        .clock(clock)
        .build()
        .expect("mock-backed client never fails to build")
}

fn transient_503() -> ApiError {
    ApiError::Transient(TransientError::Status {
        status: 503,
        message: "Service Unavailable".into(),
    })
}

#[tokio::test]
async fn success_uses_one_exchange_and_one_dispatch() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    let client = client(Arc::clone(&api), clock);

    client.dispatch(&request()).await.expect("dispatch succeeds");

    assert_eq!(api.exchange_count(), 1);
    assert_eq!(api.dispatch_count(), 1);
    assert_eq!(api.tokens_seen(), vec!["ghs_mock_1".to_owned()]);
}

#[tokio::test]
async fn cached_token_is_shared_across_dispatches() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    let client = client(Arc::clone(&api), clock);

    client.dispatch(&request()).await.unwrap();
    client.dispatch(&request()).await.unwrap();

    assert_eq!(api.exchange_count(), 1);
    assert_eq!(api.dispatch_count(), 2);
    assert_eq!(
        api.tokens_seen(),
        vec!["ghs_mock_1".to_owned(), "ghs_mock_1".to_owned()]
    );
}

#[tokio::test]
async fn validation_422_is_terminal_with_trigger_detail() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.queue_dispatch(Err(ApiError::Validation {
        message: "Workflow does not have 'workflow_dispatch' trigger".into(),
    }));
    let client = client(Arc::clone(&api), clock);

    let err = client.dispatch(&request()).await.unwrap_err();
    match err {
        DispatchError::Validation { message } => {
            assert!(message.contains("workflow_dispatch"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    assert_eq!(api.dispatch_count(), 1, "422 must not be retried");
}

#[tokio::test]
async fn not_found_is_terminal() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.queue_dispatch(Err(ApiError::NotFound {
        message: "Not Found".into(),
    }));
    let client = client(Arc::clone(&api), clock);

    let err = client.dispatch(&request()).await.unwrap_err();
    assert!(matches!(err, DispatchError::NotFound { .. }));
    assert_eq!(api.dispatch_count(), 1, "404 must not be retried");
}

#[tokio::test]
async fn auth_failure_is_terminal_and_names_the_status() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.queue_dispatch(Err(ApiError::Auth {
        status: 403,
        message: "Resource not accessible by integration".into(),
    }));
    let client = client(Arc::clone(&api), clock);

    let err = client.dispatch(&request()).await.unwrap_err();
    match err {
        DispatchError::Auth { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("integration"));
        }
        other => panic!("expected Auth, got {other:?}"),
    }
    assert_eq!(api.dispatch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_exponential_backoff() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.queue_dispatch(Err(transient_503()));
    api.queue_dispatch(Err(transient_503()));
    // Third attempt falls through to the default Ok.
    let client = client(Arc::clone(&api), clock);

    let started = Instant::now();
    client.dispatch(&request()).await.expect("succeeds after retries");

    // Defaults: 1 s after the first failure, 2 s after the second.
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(api.dispatch_count(), 3);
    assert_eq!(api.exchange_count(), 1, "token is reused across retries");
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_carries_the_last_transient_error() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    for _ in 0..3 {
        api.queue_dispatch(Err(transient_503()));
    }
    let client = client(Arc::clone(&api), clock);

    let err = client.dispatch(&request()).await.unwrap_err();
    match err {
        DispatchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, TransientError::Status { status: 503, .. }));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(api.dispatch_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn custom_retry_policy_bounds_attempts() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.queue_dispatch(Err(transient_503()));
    let client = DispatchClient::builder(identity(), key())
        .github_api(api.clone())
        .clock(clock)
        .retry_policy(RetryPolicy::new(1, Duration::from_secs(1), 2.0))
        .build()
        .unwrap();

    let err = client.dispatch(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::RetriesExhausted { attempts: 1, .. }
    ));
    assert_eq!(api.dispatch_count(), 1);
}

#[tokio::test]
async fn transient_exchange_failure_is_retried_like_dispatch_failures() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.fail_next_exchange(transient_503());
    let client = client(Arc::clone(&api), clock);

    client.dispatch(&request()).await.expect("second exchange succeeds");

    assert_eq!(api.exchange_count(), 2);
    assert_eq!(api.dispatch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_dispatch_preserves_the_cached_token() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    let client = client(Arc::clone(&api), clock);

    client.dispatch(&request()).await.unwrap();
    assert_eq!(api.exchange_count(), 1);

    api.set_hang_dispatch(true);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = client
        .dispatch_cancellable(&request(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));

    // The cached token survived the cancelled call and is reused.
    assert!(client.token_source().current_token().is_some());
    api.set_hang_dispatch(false);
    client.dispatch(&request()).await.unwrap();
    assert_eq!(api.exchange_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_returns_cancelled() {
    let clock = MockClock::new();
    let api = MockApi::new(Arc::clone(&clock));
    api.queue_dispatch(Err(transient_503()));
    api.queue_dispatch(Err(transient_503()));
    let client = client(Arc::clone(&api), clock);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        // Fires during the first 1 s backoff sleep.
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let err = client
        .dispatch_cancellable(&request(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
    assert_eq!(api.dispatch_count(), 1);
}
