//! Fetch de-duplication and trailing-edge debounce for a single resource.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::ServiceError;

pub type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), ServiceError>> + Send + Sync>;

/// Result of a direct [`RefreshCoordinator::fetch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    /// Another fetch was already in flight; nothing was done.
    Skipped,
}

struct Inner {
    resource: &'static str,
    fetch: FetchFn,
    in_flight: AtomicBool,
    completed: AtomicU64,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the in-flight flag and pending debounce timer for one resource.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("resource", &self.inner.resource)
            .field("debounce", &self.inner.debounce)
            .field("in_flight", &self.is_fetching())
            .finish()
    }
}

struct InFlightReset<'a>(&'a AtomicBool);

impl Drop for InFlightReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshCoordinator {
    pub fn new<F, Fut>(resource: &'static str, debounce: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        let fetch: FetchFn = Arc::new(move || Box::pin(fetch()));
        Self {
            inner: Arc::new(Inner {
                resource,
                fetch,
                in_flight: AtomicBool::new(false),
                completed: AtomicU64::new(0),
                debounce,
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Number of fetches that ran to completion, successful or not.
    pub fn completed_fetches(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Runs the fetch now unless one is already in flight.
    pub async fn fetch(&self) -> Result<FetchOutcome, ServiceError> {
        Self::fetch_inner(&self.inner).await
    }

    async fn fetch_inner(inner: &Inner) -> Result<FetchOutcome, ServiceError> {
        if inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(resource = inner.resource, "fetch already in flight, skipping");
            return Ok(FetchOutcome::Skipped);
        }
        let _reset = InFlightReset(&inner.in_flight);

        let result = (inner.fetch)().await;
        inner.completed.fetch_add(1, Ordering::AcqRel);
        result.map(|_| FetchOutcome::Fetched)
    }

    /// Cancels any pending refetch and schedules a new one after the debounce
    /// delay. Bursts of requests collapse into a single trailing fetch.
    pub async fn request_refetch(&self) {
        let mut pending = self.inner.pending.lock().await;
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let inner = self.inner.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            // Detach so that a later request only cancels the timer, never a
            // fetch that has already started.
            tokio::spawn(async move {
                if let Err(e) = Self::fetch_inner(&inner).await {
                    warn!(resource = inner.resource, error = %e, "debounced refetch failed");
                }
            });
        }));
    }
}
