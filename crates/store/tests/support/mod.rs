#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use tokio::sync::oneshot;
use vigilant_core::prelude::*;
use vigilant_core::EventStream;
use vigilant_store::{ChangeReceiver, ResourceSynchronizer};

#[derive(Debug, Clone)]
pub struct FakeObj {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub status: String,
}

pub fn obj(ns: &str, name: &str, status: &str) -> FakeObj {
    FakeObj { namespace: Some(ns.into()), name: Some(name.into()), status: status.into() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub status: String,
}

fn key_of(o: &FakeObj) -> Option<ObjectKey> {
    Some(ObjectKey::new(o.namespace.as_deref()?, o.name.as_deref()?))
}

fn row_of(o: &FakeObj) -> Row {
    Row {
        key: format!("{}/{}", o.namespace.as_deref().unwrap_or(""), o.name.as_deref().unwrap_or("")),
        status: o.status.clone(),
    }
}

pub const PROJECTION: Projection<FakeObj, Row> = Projection::new(key_of, row_of);

pub type Event = Result<WatchChange<FakeObj>, SourceError>;

/// When armed, the next `list` reports that it started and then waits for
/// the release before returning.
pub type ListGate = Arc<Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>>;

/// Arm `gate`; returns the "list entered" receiver and the release sender.
pub fn hold_list(gate: &ListGate) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    *gate.lock().unwrap() = Some((entered_tx, release_rx));
    (entered_rx, release_tx)
}

/// Scripted source: each `list` pops the next queued listing (the last one
/// repeats), each `watch` hands out the next queued stream.
#[derive(Default)]
pub struct FakeSource {
    listings: Mutex<VecDeque<Result<Listing<FakeObj>, SourceError>>>,
    last: Mutex<Option<Listing<FakeObj>>>,
    streams: Mutex<VecDeque<Result<EventStream<FakeObj>, SourceError>>>,
    pub watch_cursors: Arc<Mutex<Vec<String>>>,
    pub list_calls: Mutex<usize>,
    pub list_gate: ListGate,
}

impl FakeSource {
    pub fn with_listing(items: Vec<FakeObj>, cursor: &str) -> Self {
        let s = Self::default();
        s.push_listing(Ok(Listing { items, cursor: cursor.into() }));
        s
    }

    pub fn push_listing(&self, l: Result<Listing<FakeObj>, SourceError>) {
        self.listings.lock().unwrap().push_back(l);
    }

    pub fn push_stream(&self, s: EventStream<FakeObj>) {
        self.streams.lock().unwrap().push_back(Ok(s));
    }

    pub fn push_watch_error(&self, e: SourceError) {
        self.streams.lock().unwrap().push_back(Err(e));
    }

    /// Live channel-backed stream; dropping the sender ends it.
    pub fn live_stream(&self) -> UnboundedSender<Event> {
        let (tx, rx) = unbounded();
        self.push_stream(rx.boxed());
        tx
    }
}

#[async_trait::async_trait]
impl ResourceSource for FakeSource {
    type Object = FakeObj;

    async fn list(&self) -> Result<Listing<FakeObj>, SourceError> {
        *self.list_calls.lock().unwrap() += 1;
        let held = self.list_gate.lock().unwrap().take();
        if let Some((entered, release)) = held {
            let _ = entered.send(());
            let _ = release.await;
        }
        let next = self.listings.lock().unwrap().pop_front();
        match next {
            Some(Ok(l)) => {
                *self.last.lock().unwrap() = Some(l.clone());
                Ok(l)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SourceError::List("no listing scripted".into())),
        }
    }

    async fn watch(&self, cursor: &str) -> Result<EventStream<FakeObj>, SourceError> {
        self.watch_cursors.lock().unwrap().push(cursor.to_string());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(futures::stream::pending().boxed()))
    }
}

pub fn added(o: FakeObj) -> Event {
    Ok(WatchChange::new(ChangeKind::Added, o))
}

pub fn modified(o: FakeObj) -> Event {
    Ok(WatchChange::new(ChangeKind::Modified, o))
}

pub fn deleted(o: FakeObj) -> Event {
    Ok(WatchChange::new(ChangeKind::Deleted, o))
}

pub fn statuses(sync: &ResourceSynchronizer<FakeSource, Row>) -> Vec<(String, String)> {
    sync.values().into_iter().map(|r| (r.key, r.status)).collect()
}

/// Wait on change signals until `pred` holds, failing after two seconds.
pub async fn wait_until<F>(rx: &mut ChangeReceiver, sync: &ResourceSynchronizer<FakeSource, Row>, pred: F)
where
    F: Fn(&[Row]) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if pred(&sync.values()) {
            return;
        }
        if tokio::time::timeout_at(deadline, rx.changed()).await.is_err() {
            panic!("condition not reached; snapshot: {:?}", sync.values());
        }
    }
}
