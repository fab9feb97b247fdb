//! Per-resource list controller: owns a synchronizer, a render-time copy
//! of its snapshot, and the selection cursor.

use std::sync::Arc;

use tracing::{debug, info_span, warn};
use vigilant_core::columns::{columns_for, row, ColumnSpec};
use vigilant_core::{Projection, ResourceKind, ResourceSource, TrackedResource};
use vigilant_store::{channel, ChangeReceiver, LiveCollection, ResourceSynchronizer};

/// Lines the list chrome takes from the body: two borders and the header row.
const CHROME_ROWS: u16 = 3;
/// Gap ratatui leaves between table columns.
const COLUMN_SPACING: u16 = 1;

/// Everything needed to draw one list, already windowed to the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFrame {
    pub title: String,
    pub columns: Vec<ColumnSpec>,
    /// Rows inside the visible window only.
    pub rows: Vec<Vec<String>>,
    /// Selected row, relative to `rows`.
    pub selected: Option<usize>,
    pub offset: usize,
    pub total: usize,
    pub empty_message: Option<String>,
    pub status: String,
}

pub struct ViewController {
    kind: ResourceKind,
    sync: Arc<dyn LiveCollection<TrackedResource>>,
    changes: ChangeReceiver,
    columns: Vec<ColumnSpec>,
    rows: Vec<TrackedResource>,
    cursor: usize,
    offset: usize,
    activated: bool,
}

impl ViewController {
    /// Controller over a fresh synchronizer for `source`.
    pub fn new<S>(kind: ResourceKind, source: S, projection: Projection<S::Object, TrackedResource>) -> Self
    where
        S: ResourceSource,
    {
        let (notifier, changes) = channel();
        let span = info_span!("sync", kind = %kind);
        let sync = ResourceSynchronizer::new(source, projection, notifier, span);
        Self::with_collection(kind, Arc::new(sync), changes)
    }

    pub fn with_collection(
        kind: ResourceKind,
        sync: Arc<dyn LiveCollection<TrackedResource>>,
        changes: ChangeReceiver,
    ) -> Self {
        Self {
            kind,
            sync,
            changes,
            columns: columns_for(kind),
            rows: Vec::new(),
            cursor: 0,
            offset: 0,
            activated: false,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Bootstrap then start watching, off the caller's task. Only the first
    /// call does anything. Must run inside a tokio runtime.
    pub fn activate(&mut self) {
        if self.activated {
            return;
        }
        self.activated = true;
        let sync = Arc::clone(&self.sync);
        let kind = self.kind;
        tokio::spawn(async move {
            if let Err(e) = sync.bootstrap().await {
                warn!(%kind, error = %e, "initial listing failed; starting watch anyway");
            }
            sync.start();
        });
    }

    pub fn select_next(&mut self) {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&TrackedResource> {
        self.rows.get(self.cursor)
    }

    /// Number of rows in the last pulled projection.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pull a fresh snapshot when the synchronizer reported changes.
    fn pull(&mut self) {
        if !self.sync.take_dirty() {
            return;
        }
        self.rows = self.sync.values();
        self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
        debug!(kind = %self.kind, rows = self.rows.len(), cursor = self.cursor, "pulled snapshot");
    }

    /// Columns that fit in `width`, keeping at least the first one.
    fn fitting_columns(&self, width: u16) -> Vec<ColumnSpec> {
        let mut used: u16 = 2;
        let mut out = Vec::new();
        for c in &self.columns {
            let need = c.width + if out.is_empty() { 0 } else { COLUMN_SPACING };
            if !out.is_empty() && used.saturating_add(need) > width {
                break;
            }
            used = used.saturating_add(need);
            out.push(*c);
        }
        out
    }

    pub fn render(&mut self, width: u16, height: u16) -> ListFrame {
        self.pull();
        let capacity = usize::from(height.saturating_sub(CHROME_ROWS)).max(1);
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + capacity {
            self.offset = self.cursor + 1 - capacity;
        }
        self.offset = self.offset.min(self.rows.len().saturating_sub(1));
        let columns = self.fitting_columns(width);
        let rows: Vec<Vec<String>> =
            self.rows.iter().skip(self.offset).take(capacity).map(|r| row(r, &columns)).collect();
        let total = self.rows.len();
        ListFrame {
            title: format!(" {} ({total}) ", self.kind),
            selected: (!rows.is_empty()).then(|| self.cursor - self.offset),
            empty_message: rows.is_empty().then(|| format!("No {} found", self.kind)),
            columns,
            rows,
            offset: self.offset,
            total,
            status: self.status_line(total),
        }
    }

    fn status_line(&self, total: usize) -> String {
        match self.kind {
            ResourceKind::Pods => format!("Total: {total} {} | d describe | l logs | r refresh", self.kind),
            ResourceKind::Deployments => format!("Total: {total} {} | d describe | r refresh", self.kind),
        }
    }

    /// Relist in the background; completion arrives as a change signal.
    pub fn refresh(&self) {
        let sync = Arc::clone(&self.sync);
        let kind = self.kind;
        tokio::spawn(async move {
            if let Err(e) = sync.resync().await {
                warn!(%kind, error = %e, "refresh failed");
            }
        });
    }

    pub fn stop(&self) {
        self.sync.stop();
    }

    /// Resolves on the next change signal from the synchronizer.
    pub async fn changed(&mut self) {
        self.changes.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use vigilant_core::{ResourceDetails, SourceError};
    use vigilant_store::SyncState;

    /// Collection whose content the test sets directly.
    #[derive(Default)]
    struct Manual {
        rows: Mutex<Vec<TrackedResource>>,
        dirty: AtomicBool,
    }

    impl Manual {
        fn set(&self, rows: Vec<TrackedResource>) {
            *self.rows.lock().unwrap() = rows;
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl LiveCollection<TrackedResource> for Manual {
        fn values(&self) -> Vec<TrackedResource> {
            self.rows.lock().unwrap().clone()
        }
        fn take_dirty(&self) -> bool {
            self.dirty.swap(false, Ordering::SeqCst)
        }
        fn state(&self) -> SyncState {
            SyncState::Watching
        }
        async fn bootstrap(&self) -> Result<usize, SourceError> {
            Ok(self.rows.lock().unwrap().len())
        }
        async fn resync(&self) -> Result<usize, SourceError> {
            self.dirty.store(true, Ordering::SeqCst);
            Ok(self.rows.lock().unwrap().len())
        }
        fn start(&self) -> bool {
            true
        }
        fn stop(&self) {}
    }

    fn pod(ns: &str, name: &str) -> TrackedResource {
        TrackedResource {
            namespace: ns.into(),
            name: name.into(),
            status: "Running".into(),
            ready: "1/1".into(),
            age: Duration::from_secs(120),
            details: ResourceDetails::Pod { restarts: 0, ip: "10.0.0.1".into(), node: "n1".into() },
        }
    }

    fn controller(rows: Vec<TrackedResource>) -> (ViewController, Arc<Manual>) {
        let manual = Arc::new(Manual::default());
        manual.set(rows);
        let (_tx, rx) = channel();
        let vc = ViewController::with_collection(ResourceKind::Pods, manual.clone(), rx);
        (vc, manual)
    }

    #[test]
    fn next_and_prev_move_within_bounds() {
        let (mut vc, _m) = controller(vec![pod("ns1", "pod-a"), pod("ns1", "pod-b")]);
        vc.render(200, 20);
        assert_eq!(vc.cursor(), 0);
        vc.select_next();
        assert_eq!(vc.selected().map(|r| r.name.as_str()), Some("pod-b"));
        vc.select_next();
        assert_eq!(vc.cursor(), 1, "no wraparound at the end");
        vc.select_prev();
        assert_eq!(vc.cursor(), 0);
        vc.select_prev();
        assert_eq!(vc.cursor(), 0, "no wraparound at the start");
    }

    #[test]
    fn cursor_is_clamped_after_shrink() {
        let (mut vc, m) = controller((0..5).map(|i| pod("ns", &format!("p{i}"))).collect());
        vc.render(200, 20);
        for _ in 0..4 {
            vc.select_next();
        }
        assert_eq!(vc.cursor(), 4);
        m.set(vec![pod("ns", "p0"), pod("ns", "p1")]);
        let frame = vc.render(200, 20);
        assert_eq!(vc.cursor(), 1);
        assert_eq!(frame.selected, Some(1));
    }

    #[test]
    fn empty_projection_renders_empty_state() {
        let (mut vc, _m) = controller(vec![]);
        let frame = vc.render(120, 20);
        assert!(vc.selected().is_none());
        assert_eq!(frame.empty_message.as_deref(), Some("No pods found"));
        assert_eq!(frame.selected, None);
        assert!(frame.status.starts_with("Total: 0 pods"));
    }

    #[test]
    fn render_without_changes_is_idempotent() {
        let (mut vc, _m) = controller(vec![pod("a", "x"), pod("b", "y")]);
        let first = vc.render(200, 20);
        let second = vc.render(200, 20);
        assert_eq!(first, second);
    }

    #[test]
    fn window_follows_cursor() {
        let (mut vc, _m) = controller((0..10).map(|i| pod("ns", &format!("p{i}"))).collect());
        // Height 6 leaves room for three rows.
        vc.render(200, 6);
        for _ in 0..5 {
            vc.select_next();
        }
        let frame = vc.render(200, 6);
        assert_eq!(frame.rows.len(), 3);
        assert_eq!(frame.offset, 3);
        assert_eq!(frame.selected, Some(2));
        assert_eq!(frame.rows[2][0], "p5");
    }

    #[test]
    fn narrow_width_drops_trailing_columns() {
        let (mut vc, _m) = controller(vec![pod("ns", "a")]);
        let frame = vc.render(42, 10);
        let labels: Vec<_> = frame.columns.iter().map(|c| c.label).collect();
        assert_eq!(labels, ["NAME", "NAMESPACE"]);
        assert_eq!(frame.rows[0], ["a", "ns"]);
    }

    /// Source with one fixed listing and a watch fed by the test.
    struct Scripted {
        items: Vec<TrackedResource>,
        stream: Mutex<Option<vigilant_core::EventStream<TrackedResource>>>,
    }

    #[async_trait::async_trait]
    impl ResourceSource for Scripted {
        type Object = TrackedResource;

        async fn list(&self) -> Result<vigilant_core::Listing<TrackedResource>, SourceError> {
            Ok(vigilant_core::Listing { items: self.items.clone(), cursor: "10".into() })
        }

        async fn watch(&self, _cursor: &str) -> Result<vigilant_core::EventStream<TrackedResource>, SourceError> {
            use futures::StreamExt;
            Ok(self.stream.lock().unwrap().take().unwrap_or_else(|| futures::stream::pending().boxed()))
        }
    }

    fn key_of(r: &TrackedResource) -> Option<vigilant_core::ObjectKey> {
        Some(r.key())
    }

    async fn render_until(vc: &mut ViewController, pred: impl Fn(&ListFrame) -> bool) -> ListFrame {
        for _ in 0..40 {
            let frame = vc.render(200, 20);
            if pred(&frame) {
                return frame;
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), vc.changed()).await;
        }
        panic!("frame never matched; last: {:?}", vc.render(200, 20));
    }

    #[tokio::test]
    async fn bootstrapped_single_item_then_deleted_renders_empty() {
        use futures::StreamExt;
        use vigilant_core::{ChangeKind, WatchChange};

        let (tx, rx) = futures::channel::mpsc::unbounded();
        let src = Scripted { items: vec![pod("default", "pod-a")], stream: Mutex::new(Some(rx.boxed())) };
        let mut vc = ViewController::new(ResourceKind::Pods, src, Projection::new(key_of, TrackedResource::clone));
        vc.activate();

        let frame = render_until(&mut vc, |f| f.total == 1).await;
        assert_eq!(frame.selected, Some(0));
        assert_eq!(vc.selected().map(|r| r.name.as_str()), Some("pod-a"));

        tx.unbounded_send(Ok(WatchChange::new(ChangeKind::Deleted, pod("default", "pod-a")))).expect("send");
        let frame = render_until(&mut vc, |f| f.total == 0).await;
        assert_eq!(frame.empty_message.as_deref(), Some("No pods found"));
        assert_eq!(frame.selected, None);
        assert!(vc.selected().is_none());
        vc.stop();
    }
}
