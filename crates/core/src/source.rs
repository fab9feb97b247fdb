//! Contract between the synchronizer and whatever serves list/watch for one
//! resource type. The kube-backed implementation lives in `vigilant-kubehub`.

use futures::stream::BoxStream;

use crate::{ChangeKind, ObjectKey};

/// Errors a source can report. Per-event `Decode` errors are recoverable and
/// only cost the single event.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("list failed: {0}")]
    List(String),
    #[error("watch failed: {0}")]
    Watch(String),
    #[error("undecodable event: {0}")]
    Decode(String),
    #[error("client: {0}")]
    Client(String),
}

/// Result of a full listing: the objects plus the resource version to resume
/// a watch from.
#[derive(Debug, Clone)]
pub struct Listing<O> {
    pub items: Vec<O>,
    pub cursor: String,
}

#[derive(Debug, Clone)]
pub struct WatchChange<O> {
    pub kind: ChangeKind,
    pub object: O,
}

impl<O> WatchChange<O> {
    pub fn new(kind: ChangeKind, object: O) -> Self {
        Self { kind, object }
    }
}

/// Watch stream. It may end at any time without an error item.
pub type EventStream<O> = BoxStream<'static, Result<WatchChange<O>, SourceError>>;

/// List/watch provider for a single resource type.
#[async_trait::async_trait]
pub trait ResourceSource: Send + Sync + 'static {
    type Object: Send + 'static;

    async fn list(&self) -> Result<Listing<Self::Object>, SourceError>;

    /// Open a watch starting at `cursor` (a listing's resource version).
    async fn watch(&self, cursor: &str) -> Result<EventStream<Self::Object>, SourceError>;
}

/// Key extraction plus projection for one object type. Both are pure.
pub struct Projection<O, V> {
    key: fn(&O) -> Option<ObjectKey>,
    project: fn(&O) -> V,
}

impl<O, V> Projection<O, V> {
    pub const fn new(key: fn(&O) -> Option<ObjectKey>, project: fn(&O) -> V) -> Self {
        Self { key, project }
    }

    /// `None` when the object lacks the identity needed to key it.
    pub fn key(&self, obj: &O) -> Option<ObjectKey> {
        (self.key)(obj)
    }

    pub fn project(&self, obj: &O) -> V {
        (self.project)(obj)
    }
}

impl<O, V> Clone for Projection<O, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, V> Copy for Projection<O, V> {}
