//! Tests for keyed deduplication and debouncing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tessera::coordinator::{DEFAULT_DEBOUNCE_DELAY, RequestCoordinator};
use tessera::{CancellationToken, TesseraError};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ============================================================================
// Deduplication
// ============================================================================

#[tokio::test]
async fn concurrent_identical_keys_run_once() {
    let coordinator = RequestCoordinator::<String>::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let call = || {
        let calls = calls.clone();
        coordinator.coordinate("k", move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(ms(50)).await;
            Ok("answer".to_string())
        })
    };

    let (a, b, c, d) = tokio::join!(call(), call(), call(), call());
    for result in [a, b, c, d] {
        assert_eq!(result.unwrap(), "answer");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!coordinator.is_pending("k"));
}

#[tokio::test]
async fn failure_is_broadcast_to_every_caller() {
    let coordinator = RequestCoordinator::<u32>::new();
    let call = || {
        coordinator.coordinate("k", |_| async {
            tokio::time::sleep(ms(20)).await;
            Err(TesseraError::Generation("boom".into()))
        })
    };

    let (a, b) = tokio::join!(call(), call());
    assert!(matches!(a, Err(TesseraError::Generation(ref m)) if m == "boom"));
    assert!(matches!(b, Err(TesseraError::Generation(ref m)) if m == "boom"));
}

#[tokio::test]
async fn distinct_keys_run_independently() {
    let coordinator = RequestCoordinator::<&'static str>::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let call = |key: &'static str| {
        let calls = calls.clone();
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .coordinate(key, move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(ms(20)).await;
                    Ok(key)
                })
                .await
        }
    };

    let (a, b) = tokio::join!(call("a"), call("b"));
    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn settled_key_runs_again() {
    let coordinator = RequestCoordinator::<usize>::new();
    let calls = Arc::new(AtomicUsize::new(0));
    for expected in 1..=2 {
        let calls = calls.clone();
        let value = coordinator
            .coordinate("k", move |_| async move {
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await
            .unwrap();
        assert_eq!(value, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_rejects_waiters_and_trips_token() {
    let coordinator = RequestCoordinator::<u32>::new();
    let seen_token: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));

    let waiter = {
        let coordinator = coordinator.clone();
        let seen_token = seen_token.clone();
        tokio::spawn(async move {
            coordinator
                .coordinate("k", move |token| {
                    *seen_token.lock().unwrap() = Some(token);
                    async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(1)
                    }
                })
                .await
        })
    };

    tokio::time::sleep(ms(10)).await;
    assert!(coordinator.is_pending("k"));
    assert_eq!(coordinator.pending_count(), 1);

    assert!(coordinator.cancel("k"));
    assert!(matches!(waiter.await.unwrap(), Err(TesseraError::Cancelled)));
    assert!(seen_token.lock().unwrap().as_ref().unwrap().is_cancelled());
    assert!(!coordinator.is_pending("k"));
}

#[tokio::test]
async fn cancel_unknown_key_is_a_noop() {
    let coordinator = RequestCoordinator::<u32>::new();
    assert!(!coordinator.cancel("nothing"));
    assert_eq!(coordinator.pending_count(), 0);
}

// ============================================================================
// Debounce
// ============================================================================

#[test]
fn default_delay_is_half_a_second() {
    assert_eq!(DEFAULT_DEBOUNCE_DELAY, ms(500));
    assert_eq!(RequestCoordinator::<u32>::new().debounce_delay(), ms(500));
}

#[tokio::test(start_paused = true)]
async fn burst_executes_only_the_last_call() {
    let coordinator = RequestCoordinator::<u32>::new();
    let executions = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 1..=3u32 {
        let coordinator = coordinator.clone();
        let executions = executions.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(ms(100 * u64::from(i))).await;
            coordinator
                .debounce("typing", ms(500), move |_| async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert!(!coordinator.is_pending("typing"));
}

#[tokio::test(start_paused = true)]
async fn calls_outside_the_window_each_execute() {
    let coordinator = RequestCoordinator::<u32>::with_debounce_delay(ms(200));
    let executions = Arc::new(AtomicUsize::new(0));

    for i in 0..2u32 {
        let executions = executions.clone();
        let value = coordinator
            .debounce_default("k", move |_| async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            })
            .await
            .unwrap();
        assert_eq!(value, i);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_debounce_window_skips_execution() {
    let coordinator = RequestCoordinator::<u32>::new();
    let executions = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let coordinator = coordinator.clone();
        let executions = executions.clone();
        tokio::spawn(async move {
            coordinator
                .debounce("k", ms(500), move |_| async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
        })
    };

    tokio::time::sleep(ms(100)).await;
    assert!(coordinator.is_pending("k"));
    assert!(coordinator.cancel("k"));
    assert!(matches!(waiter.await.unwrap(), Err(TesseraError::Cancelled)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn clear_cancels_every_key() {
    let coordinator = RequestCoordinator::<u32>::new();

    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .coordinate("a", |_| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(1)
                })
                .await
        })
    };
    let debounced = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .debounce("b", ms(500), |_| async { Ok(2) })
                .await
        })
    };

    tokio::time::sleep(ms(10)).await;
    assert_eq!(coordinator.pending_count(), 2);

    coordinator.clear();
    assert!(matches!(in_flight.await.unwrap(), Err(TesseraError::Cancelled)));
    assert!(matches!(debounced.await.unwrap(), Err(TesseraError::Cancelled)));
    assert_eq!(coordinator.pending_count(), 0);
}

// ============================================================================
// Debounce into a dedup key
// ============================================================================

#[tokio::test(start_paused = true)]
async fn fired_debounce_joins_the_call_in_flight() {
    let coordinator = RequestCoordinator::<u32>::new();
    let executions = Arc::new(AtomicUsize::new(0));
    let work = |value: u32| {
        let executions = executions.clone();
        move |_: CancellationToken| async move {
            executions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(value)
        }
    };

    let (prefetch, typed) = tokio::join!(
        coordinator.coordinate("analysis:abc", work(1)),
        coordinator.debounce_into("entry-1", "analysis:abc", ms(500), work(2)),
    );
    assert_eq!(prefetch.unwrap(), 1);
    assert_eq!(typed.unwrap(), 1);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn debounce_key_cancels_its_fired_call() {
    let coordinator = RequestCoordinator::<u32>::new();

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .debounce_into("entry-1", "analysis:abc", ms(500), |_| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(7)
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(coordinator.is_pending("entry-1"));
    assert!(coordinator.is_pending("analysis:abc"));

    assert!(coordinator.cancel("entry-1"));
    assert!(matches!(waiter.await.unwrap(), Err(TesseraError::Cancelled)));
    assert!(!coordinator.is_pending("analysis:abc"));
    assert!(!coordinator.is_pending("entry-1"));
}
