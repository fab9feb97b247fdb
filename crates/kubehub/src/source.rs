//! Typed list/watch source backed by the API server.

use std::fmt::Debug;

use futures::{Stream, StreamExt};
use kube::api::{Api, ListParams, WatchEvent, WatchParams};
use kube::{Client, Resource};
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use tracing::debug;
use vigilant_core::{ChangeKind, EventStream, Listing, ResourceSource, SourceError, WatchChange};

/// List/watch for one namespaced resource type, across all namespaces or
/// restricted to one.
pub struct KubeSource<K> {
    api: Api<K>,
    namespace: Option<String>,
}

impl<K> KubeSource<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        let api = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self { api, namespace: namespace.map(str::to_string) }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

#[async_trait::async_trait]
impl<K> ResourceSource for KubeSource<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    type Object = K;

    async fn list(&self) -> Result<Listing<K>, SourceError> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::List(e.to_string()))?;
        let cursor = list.metadata.resource_version.clone().unwrap_or_default();
        debug!(items = list.items.len(), cursor = %cursor, ns = ?self.namespace, "listed");
        Ok(Listing { items: list.items, cursor })
    }

    async fn watch(&self, cursor: &str) -> Result<EventStream<K>, SourceError> {
        // "0" asks the server for "any version", used when no listing recorded one.
        // Default params keep the server-side timeout (290s); the stream then
        // ends and is not reopened.
        let from = if cursor.is_empty() { "0" } else { cursor };
        let stream = self
            .api
            .watch(&WatchParams::default(), from)
            .await
            .map_err(|e| SourceError::Watch(e.to_string()))?;
        Ok(changes(stream))
    }
}

/// Adapt a raw kube watch stream into change items.
pub(crate) fn changes<K, St>(raw: St) -> EventStream<K>
where
    K: Send + 'static,
    St: Stream<Item = kube::Result<WatchEvent<K>>> + Send + 'static,
{
    raw.filter_map(|ev| futures::future::ready(convert(ev))).boxed()
}

/// Map one raw watch item. Bookmarks carry no object and are dropped.
pub(crate) fn convert<K>(ev: kube::Result<WatchEvent<K>>) -> Option<Result<WatchChange<K>, SourceError>> {
    match ev {
        Ok(WatchEvent::Added(o)) => Some(Ok(WatchChange::new(ChangeKind::Added, o))),
        Ok(WatchEvent::Modified(o)) => Some(Ok(WatchChange::new(ChangeKind::Modified, o))),
        Ok(WatchEvent::Deleted(o)) => Some(Ok(WatchChange::new(ChangeKind::Deleted, o))),
        Ok(WatchEvent::Bookmark(_)) => None,
        Ok(WatchEvent::Error(e)) => Some(Err(SourceError::Watch(format!("{} ({})", e.message, e.code)))),
        Err(e) => Some(Err(SourceError::Decode(e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use kube::core::ErrorResponse;

    fn pod(name: &str) -> Pod {
        serde_json::from_value(serde_json::json!({
            "metadata": { "name": name, "namespace": "default" }
        }))
        .expect("pod")
    }

    #[test]
    fn object_events_map_to_change_kinds() {
        let c = convert(Ok(WatchEvent::Added(pod("a")))).expect("some").expect("ok");
        assert_eq!(c.kind, ChangeKind::Added);
        let c = convert(Ok(WatchEvent::Modified(pod("a")))).expect("some").expect("ok");
        assert_eq!(c.kind, ChangeKind::Modified);
        let c = convert(Ok(WatchEvent::Deleted(pod("a")))).expect("some").expect("ok");
        assert_eq!(c.kind, ChangeKind::Deleted);
        assert_eq!(c.object.metadata.name.as_deref(), Some("a"));
    }

    #[test]
    fn server_error_event_becomes_error_item() {
        let err = ErrorResponse {
            status: "Failure".into(),
            message: "too old resource version".into(),
            reason: "Expired".into(),
            code: 410,
        };
        let out = convert::<Pod>(Ok(WatchEvent::Error(err))).expect("some");
        assert!(matches!(out, Err(SourceError::Watch(m)) if m.contains("410")));
    }

    #[tokio::test]
    async fn bookmarks_are_dropped_from_the_stream() {
        let bookmark: WatchEvent<Pod> = serde_json::from_value(serde_json::json!({
            "type": "BOOKMARK",
            "object": { "kind": "Pod", "apiVersion": "v1", "metadata": { "resourceVersion": "77" } }
        }))
        .expect("bookmark");
        let raw = futures::stream::iter(vec![
            Ok(WatchEvent::Added(pod("a"))),
            Ok(bookmark),
            Ok(WatchEvent::Deleted(pod("a"))),
        ]);
        let kinds: Vec<ChangeKind> = changes(raw).map(|c| c.expect("ok").kind).collect().await;
        assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Deleted]);
    }
}
