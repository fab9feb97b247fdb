//! Resource synchronizer: keeps one `OrderedCollection` consistent with a
//! list + watch source and signals every applied change.
//!
//! Lifecycle: `Created -> Bootstrapped -> Watching -> Stopped`. A manual
//! `resync` relists in place while the watch keeps running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use metrics::{counter, gauge, histogram};
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument, Span};
use vigilant_core::{ChangeKind, Listing, ObjectKey, Projection, ResourceSource, SourceError, WatchChange};

use crate::collection::OrderedCollection;
use crate::notify::ChangeNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Created,
    Bootstrapped,
    Watching,
    Stopped,
}

/// Watch changes applied while at least one listing is in flight. They are
/// newer than (or as new as) what that listing returns, so they are laid
/// back over it once it lands. `None` marks a delete.
struct InFlight<V> {
    listings: usize,
    changes: FxHashMap<ObjectKey, Option<V>>,
}

/// Counts one listing in flight; the overlay is dropped with the last one,
/// including when the bootstrap future is cancelled mid-list.
struct ListingGuard<'a, V> {
    in_flight: &'a Mutex<InFlight<V>>,
}

impl<'a, V> ListingGuard<'a, V> {
    fn enter(in_flight: &'a Mutex<InFlight<V>>) -> Self {
        lock(in_flight).listings += 1;
        Self { in_flight }
    }
}

impl<V> Drop for ListingGuard<'_, V> {
    fn drop(&mut self) {
        let mut g = lock(self.in_flight);
        g.listings = g.listings.saturating_sub(1);
        if g.listings == 0 {
            g.changes.clear();
        }
    }
}

struct Shared<S: ResourceSource, V> {
    source: S,
    projection: Projection<S::Object, V>,
    collection: OrderedCollection<V>,
    cursor: Mutex<Option<String>>,
    state: Mutex<SyncState>,
    in_flight: Mutex<InFlight<V>>,
    started: AtomicBool,
    dirty: AtomicBool,
    cancel: CancellationToken,
    notifier: ChangeNotifier,
    task: Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

/// Cloneable handle; all clones drive the same collection and task.
pub struct ResourceSynchronizer<S: ResourceSource, V> {
    shared: Arc<Shared<S, V>>,
}

impl<S: ResourceSource, V> Clone for ResourceSynchronizer<S, V> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S, V> ResourceSynchronizer<S, V>
where
    S: ResourceSource,
    V: Clone + Send + Sync + 'static,
{
    /// `span` scopes every log line the synchronizer and its task emit.
    pub fn new(source: S, projection: Projection<S::Object, V>, notifier: ChangeNotifier, span: Span) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                projection,
                collection: OrderedCollection::new(),
                cursor: Mutex::new(None),
                state: Mutex::new(SyncState::Created),
                in_flight: Mutex::new(InFlight { listings: 0, changes: FxHashMap::default() }),
                started: AtomicBool::new(false),
                dirty: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                notifier,
                task: Mutex::new(None),
                span,
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        *lock(&self.shared.state)
    }

    /// Resource version recorded by the last successful listing.
    pub fn cursor(&self) -> Option<String> {
        lock(&self.shared.cursor).clone()
    }

    pub fn values(&self) -> Vec<V> {
        self.shared.collection.values()
    }

    pub fn len(&self) -> usize {
        self.shared.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.collection.is_empty()
    }

    pub fn collection(&self) -> &OrderedCollection<V> {
        &self.shared.collection
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    /// Read and clear the dirty flag.
    pub fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }

    fn mark_changed(&self) {
        self.shared.dirty.store(true, Ordering::Release);
        self.shared.notifier.signal();
    }

    /// Full listing into the collection. On failure the collection keeps its
    /// previous content and the error is only logged. Watch changes applied
    /// while the listing is in flight survive the replacement.
    pub async fn bootstrap(&self) -> Result<usize, SourceError> {
        let t0 = Instant::now();
        let _listing = ListingGuard::enter(&self.shared.in_flight);
        let res = self.shared.source.list().instrument(self.shared.span.clone()).await;
        self.shared.span.in_scope(|| self.install(res, t0))
    }

    fn install(&self, res: Result<Listing<S::Object>, SourceError>, t0: Instant) -> Result<usize, SourceError> {
        let in_flight = lock(&self.shared.in_flight);
        self.install_locked(res, &in_flight.changes, t0)
    }

    fn install_locked(
        &self,
        res: Result<Listing<S::Object>, SourceError>,
        overlay: &FxHashMap<ObjectKey, Option<V>>,
        t0: Instant,
    ) -> Result<usize, SourceError> {
        match res {
            Ok(listing) => {
                let p = self.shared.projection;
                let mut skipped = 0usize;
                let entries: Vec<_> = listing
                    .items
                    .iter()
                    .filter_map(|obj| match p.key(obj) {
                        Some(key) => Some((key, p.project(obj))),
                        None => {
                            skipped += 1;
                            None
                        }
                    })
                    .collect();
                self.shared.collection.replace_all(entries);
                for (key, change) in overlay {
                    match change {
                        Some(v) => self.shared.collection.set(key.clone(), v.clone()),
                        None => self.shared.collection.delete(key),
                    }
                }
                let count = self.shared.collection.len();
                *lock(&self.shared.cursor) = Some(listing.cursor.clone());
                {
                    let mut st = lock(&self.shared.state);
                    if *st == SyncState::Created {
                        *st = SyncState::Bootstrapped;
                    }
                }
                gauge!("vigilant_collection_items", count as f64);
                histogram!("vigilant_bootstrap_ms", t0.elapsed().as_secs_f64() * 1000.0);
                info!(items = count, skipped, overlaid = overlay.len(), cursor = %listing.cursor, took_ms = %t0.elapsed().as_millis(), "bootstrap ok");
                self.mark_changed();
                Ok(count)
            }
            Err(e) => {
                counter!("vigilant_bootstrap_failures_total", 1u64);
                warn!(error = %e, took_ms = %t0.elapsed().as_millis(), "bootstrap failed; keeping previous contents");
                Err(e)
            }
        }
    }

    /// Manual refresh: relist in place. The background watch is untouched.
    pub async fn resync(&self) -> Result<usize, SourceError> {
        debug!(parent: &self.shared.span, "resync requested");
        self.bootstrap().await
    }

    /// Spawn the reconciliation task. Idempotent; refused after `stop`.
    pub fn start(&self) -> bool {
        if self.shared.cancel.is_cancelled() {
            debug!(parent: &self.shared.span, "start after stop ignored");
            return false;
        }
        if self.shared.started.swap(true, Ordering::AcqRel) {
            debug!(parent: &self.shared.span, "already started");
            return false;
        }
        *lock(&self.shared.state) = SyncState::Watching;
        let cursor = self.cursor().unwrap_or_default();
        let this = self.clone();
        let span = self.shared.span.clone();
        let handle = tokio::spawn(async move { this.reconcile(cursor).await }.instrument(span));
        *lock(&self.shared.task) = Some(handle);
        true
    }

    /// Cancel the background task. Safe before `start` and safe to repeat.
    pub fn stop(&self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        self.shared.cancel.cancel();
        *lock(&self.shared.state) = SyncState::Stopped;
        info!(parent: &self.shared.span, "synchronizer stopped");
    }

    /// Wait for the background task to exit. Returns immediately when it was
    /// never started or was already joined.
    pub async fn join(&self) {
        let handle = lock(&self.shared.task).take();
        if let Some(h) = handle {
            if let Err(e) = h.await {
                warn!(parent: &self.shared.span, error = %e, "reconcile task ended abnormally");
            }
        }
    }

    async fn reconcile(self, cursor: String) {
        let cancel = self.shared.cancel.clone();
        let opened = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("cancelled before watch opened");
                return;
            }
            res = self.shared.source.watch(&cursor) => res,
        };
        let mut stream = match opened {
            Ok(s) => s,
            Err(e) => {
                counter!("vigilant_watch_open_failures_total", 1u64);
                warn!(error = %e, cursor = %cursor, "watch failed to open; snapshot stays as is until refresh");
                return;
            }
        };
        info!(cursor = %cursor, "watch started");
        let mut applied = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(applied, "watch stopped by cancellation");
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(change)) => {
                        if self.apply(change) {
                            applied += 1;
                        }
                    }
                    Some(Err(e)) => {
                        counter!("vigilant_watch_events_skipped_total", 1u64);
                        warn!(error = %e, "skipping undecodable watch event");
                    }
                    None => {
                        info!(applied, "watch stream ended; no reconnect");
                        break;
                    }
                }
            }
        }
    }

    /// Apply one change and signal. Returns `false` for events that could not
    /// be keyed.
    fn apply(&self, change: WatchChange<S::Object>) -> bool {
        let p = self.shared.projection;
        let Some(key) = p.key(&change.object) else {
            counter!("vigilant_watch_events_skipped_total", 1u64);
            warn!(kind = %change.kind, "skipping watch event without namespace/name");
            return false;
        };
        let value = match change.kind {
            ChangeKind::Added | ChangeKind::Modified => Some(p.project(&change.object)),
            ChangeKind::Deleted => None,
        };
        {
            let mut in_flight = lock(&self.shared.in_flight);
            match &value {
                Some(v) => self.shared.collection.set(key.clone(), v.clone()),
                None => self.shared.collection.delete(&key),
            }
            if in_flight.listings > 0 {
                in_flight.changes.insert(key.clone(), value);
            }
        }
        counter!("vigilant_watch_events_applied_total", 1u64);
        debug!(kind = %change.kind, key = %key, "applied");
        self.mark_changed();
        true
    }
}

/// Object-safe view of a synchronizer for the UI layer, which does not care
/// which source feeds it.
#[async_trait::async_trait]
pub trait LiveCollection<V>: Send + Sync {
    fn values(&self) -> Vec<V>;
    fn take_dirty(&self) -> bool;
    fn state(&self) -> SyncState;
    async fn bootstrap(&self) -> Result<usize, SourceError>;
    async fn resync(&self) -> Result<usize, SourceError>;
    fn start(&self) -> bool;
    fn stop(&self);
}

#[async_trait::async_trait]
impl<S, V> LiveCollection<V> for ResourceSynchronizer<S, V>
where
    S: ResourceSource,
    V: Clone + Send + Sync + 'static,
{
    fn values(&self) -> Vec<V> {
        ResourceSynchronizer::values(self)
    }

    fn take_dirty(&self) -> bool {
        ResourceSynchronizer::take_dirty(self)
    }

    fn state(&self) -> SyncState {
        ResourceSynchronizer::state(self)
    }

    async fn bootstrap(&self) -> Result<usize, SourceError> {
        ResourceSynchronizer::bootstrap(self).await
    }

    async fn resync(&self) -> Result<usize, SourceError> {
        ResourceSynchronizer::resync(self).await
    }

    fn start(&self) -> bool {
        ResourceSynchronizer::start(self)
    }

    fn stop(&self) {
        ResourceSynchronizer::stop(self)
    }
}
