//! Keyed request deduplication and debouncing.
//!
//! [`RequestCoordinator::coordinate`] merges concurrent calls that share a
//! key into one execution whose outcome, success or failure, is delivered
//! to every caller. [`RequestCoordinator::debounce`] collapses a burst of
//! calls into the last one. Debounced calls are deduplicated when their
//! timer fires, so the two compose: with
//! [`RequestCoordinator::debounce_into`] the settled call joins any
//! identical call already in flight under its dedup key.
//!
//! Cancellation is cooperative: the work closure receives the pending
//! call's [`CancellationToken`], and [`RequestCoordinator::cancel`] both
//! trips that token and rejects every waiter with
//! [`TesseraError::Cancelled`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::telemetry;
use crate::{Result, TesseraError};

/// Debounce delay used when callers don't pick one.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

struct PendingCall<T> {
    id: u64,
    result: SharedResult<T>,
    cancel: CancellationToken,
    created_at: Instant,
}

struct DebounceSlot<T> {
    id: u64,
    timer: JoinHandle<()>,
    waiters: Vec<oneshot::Sender<Result<T>>>,
}

struct State<T> {
    pending: HashMap<String, PendingCall<T>>,
    debounced: HashMap<String, DebounceSlot<T>>,
    /// Debounce key to the dedup key its fired call runs under.
    aliases: HashMap<String, String>,
    next_id: u64,
}

impl<T> State<T> {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    debounce_delay: Duration,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-key single-flight and debounce.
///
/// Cheap to clone; clones share state.
pub struct RequestCoordinator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RequestCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a coordinator with the default debounce delay (500ms).
    pub fn new() -> Self {
        Self::with_debounce_delay(DEFAULT_DEBOUNCE_DELAY)
    }

    /// Create a coordinator with a custom default debounce delay.
    pub fn with_debounce_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    pending: HashMap::new(),
                    debounced: HashMap::new(),
                    aliases: HashMap::new(),
                    next_id: 0,
                }),
                debounce_delay: delay,
            }),
        }
    }

    /// Default debounce delay.
    pub fn debounce_delay(&self) -> Duration {
        self.inner.debounce_delay
    }

    /// Run `f` for `key`, or join the call already in flight for `key`.
    ///
    /// Only the first caller's `f` is invoked; later callers' closures are
    /// dropped unused. The record is removed once the call settles.
    pub async fn coordinate<F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(existing) = self.join(key) {
            return existing.await;
        }

        let cancel = CancellationToken::new();
        let work = f(cancel.clone());

        let shared = {
            let mut st = self.inner.lock();
            // Another caller may have registered while `f` was running.
            if let Some(existing) = st.pending.get(key) {
                metrics::counter!(telemetry::DEDUPLICATED_TOTAL).increment(1);
                existing.result.clone()
            } else {
                let id = st.next_id();
                let result = settle(
                    Arc::downgrade(&self.inner),
                    key.to_owned(),
                    id,
                    cancel.clone(),
                    work,
                )
                .boxed()
                .shared();
                st.pending.insert(
                    key.to_owned(),
                    PendingCall {
                        id,
                        result: result.clone(),
                        cancel,
                        created_at: Instant::now(),
                    },
                );
                result
            }
        };
        shared.await
    }

    fn join(&self, key: &str) -> Option<SharedResult<T>> {
        let st = self.inner.lock();
        let pending = st.pending.get(key)?;
        metrics::counter!(telemetry::DEDUPLICATED_TOTAL).increment(1);
        debug!(key, "joining in-flight call");
        Some(pending.result.clone())
    }

    /// Run `f` for `key` after `delay` of quiet.
    ///
    /// Every call restarts the timer. When it fires, only the most recent
    /// caller's `f` runs (deduplicated on `key`), and every caller in the
    /// window receives that one result.
    pub async fn debounce<F, Fut>(&self, key: &str, delay: Duration, f: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.debounce_into(key, key, delay, f).await
    }

    /// Debounce on `key`, then deduplicate the settled call on `dedup_key`.
    ///
    /// The fired call joins a call already in flight under `dedup_key`
    /// (for example an identical prefetch) instead of starting its own.
    /// Until it settles, [`cancel`](Self::cancel) on `key` cancels it.
    pub async fn debounce_into<F, Fut>(
        &self,
        key: &str,
        dedup_key: &str,
        delay: Duration,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut st = self.inner.lock();
            let id = st.next_id();
            let mut waiters = match st.debounced.remove(key) {
                Some(previous) => {
                    previous.timer.abort();
                    debug!(key, "debounce timer restarted");
                    previous.waiters
                }
                None => Vec::new(),
            };
            waiters.push(tx);

            let weak = Arc::downgrade(&self.inner);
            let owned_key = key.to_owned();
            let dedup_key = dedup_key.to_owned();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let coordinator = RequestCoordinator { inner };
                let waiters = {
                    let mut st = coordinator.inner.lock();
                    let waiters = match st.debounced.get(&owned_key) {
                        Some(slot) if slot.id == id => st
                            .debounced
                            .remove(&owned_key)
                            .map(|slot| slot.waiters)
                            .unwrap_or_default(),
                        _ => return,
                    };
                    if dedup_key != owned_key {
                        st.aliases.insert(owned_key.clone(), dedup_key.clone());
                    }
                    waiters
                };
                let result = coordinator.coordinate(&dedup_key, f).await;
                {
                    let mut st = coordinator.inner.lock();
                    if st.aliases.get(&owned_key) == Some(&dedup_key) {
                        st.aliases.remove(&owned_key);
                    }
                }
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
            });
            st.debounced
                .insert(key.to_owned(), DebounceSlot { id, timer, waiters });
        }
        rx.await.unwrap_or(Err(TesseraError::Cancelled))
    }

    /// Debounce with the coordinator's default delay.
    pub async fn debounce_default<F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.debounce(key, self.inner.debounce_delay, f).await
    }

    /// Cancel everything outstanding for `key`.
    ///
    /// Trips the in-flight call's token, stops a pending debounce timer and
    /// rejects every waiter with [`TesseraError::Cancelled`]. A debounce key
    /// whose timer already fired cancels the call it merged into, along
    /// with everyone waiting on that call. Returns whether anything was
    /// cancelled.
    pub fn cancel(&self, key: &str) -> bool {
        let (pending, aliased, slot) = {
            let mut st = self.inner.lock();
            let aliased = match st.aliases.remove(key) {
                Some(dedup_key) => st.pending.remove(&dedup_key),
                None => None,
            };
            (st.pending.remove(key), aliased, st.debounced.remove(key))
        };
        let found = pending.is_some() || aliased.is_some() || slot.is_some();
        for pending in pending.into_iter().chain(aliased) {
            debug!(
                key,
                age_ms = pending.created_at.elapsed().as_millis() as u64,
                "cancelling in-flight call"
            );
            pending.cancel.cancel();
        }
        if let Some(slot) = slot {
            reject(slot);
        }
        found
    }

    /// Cancel every key.
    pub fn clear(&self) {
        let (pending, debounced) = {
            let mut st = self.inner.lock();
            st.aliases.clear();
            (
                std::mem::take(&mut st.pending),
                std::mem::take(&mut st.debounced),
            )
        };
        if !pending.is_empty() || !debounced.is_empty() {
            debug!(
                pending = pending.len(),
                debounced = debounced.len(),
                "clearing coordinator"
            );
        }
        for call in pending.into_values() {
            call.cancel.cancel();
        }
        for slot in debounced.into_values() {
            reject(slot);
        }
    }

    /// Number of keys with an in-flight call or a waiting debounce timer.
    pub fn pending_count(&self) -> usize {
        let st = self.inner.lock();
        let waiting = st
            .debounced
            .keys()
            .filter(|k| !st.pending.contains_key(*k))
            .count();
        st.pending.len() + waiting
    }

    /// Whether `key` has an in-flight call or a waiting debounce timer.
    pub fn is_pending(&self, key: &str) -> bool {
        let st = self.inner.lock();
        st.pending.contains_key(key)
            || st.debounced.contains_key(key)
            || st
                .aliases
                .get(key)
                .is_some_and(|dedup_key| st.pending.contains_key(dedup_key))
    }
}

/// Run `work` until it settles or `cancel` trips, then drop the pending
/// record if it is still ours.
async fn settle<T, Fut>(
    inner: std::sync::Weak<Inner<T>>,
    key: String,
    id: u64,
    cancel: CancellationToken,
    work: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TesseraError::Cancelled),
        result = work => result,
    };
    if let Some(inner) = inner.upgrade() {
        let mut st = inner.lock();
        if st.pending.get(&key).is_some_and(|p| p.id == id) {
            st.pending.remove(&key);
        }
    }
    result
}

fn reject<T>(slot: DebounceSlot<T>) {
    slot.timer.abort();
    for waiter in slot.waiters {
        let _ = waiter.send(Err(TesseraError::Cancelled));
    }
}
