//! Name → controller factory map with lazy, memoized construction.

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::view::ViewController;

pub type Factory = Box<dyn Fn() -> ViewController + Send + Sync>;

#[derive(Default)]
pub struct ControllerRegistry {
    factories: BTreeMap<String, Factory>,
    cache: HashMap<String, ViewController>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering an existing name replaces its factory; an already built
    /// controller for that name stays cached.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> ViewController + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Controller for `name`, built and activated on first access.
    pub fn get(&mut self, name: &str) -> Option<&mut ViewController> {
        if !self.cache.contains_key(name) {
            let factory = self.factories.get(name)?;
            let mut controller = factory();
            controller.activate();
            info!(resource = name, "controller created");
            self.cache.insert(name.to_string(), controller);
        }
        self.cache.get_mut(name)
    }

    /// Registered names, sorted.
    pub fn available_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.cache.len()
    }

    /// Stop and drop every memoized controller.
    pub fn clear(&mut self) {
        for (name, controller) in self.cache.drain() {
            controller.stop();
            info!(resource = %name, "controller stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vigilant_core::{EventStream, Listing, ResourceKind, SourceError, TrackedResource, Projection, ObjectKey};

    struct Empty;

    #[async_trait::async_trait]
    impl vigilant_core::ResourceSource for Empty {
        type Object = TrackedResource;

        async fn list(&self) -> Result<Listing<TrackedResource>, SourceError> {
            Ok(Listing { items: vec![], cursor: "1".into() })
        }

        async fn watch(&self, _cursor: &str) -> Result<EventStream<TrackedResource>, SourceError> {
            use futures::StreamExt;
            Ok(futures::stream::pending().boxed())
        }
    }

    fn key(r: &TrackedResource) -> Option<ObjectKey> {
        Some(r.key())
    }

    const IDENTITY: Projection<TrackedResource, TrackedResource> = Projection::new(key, TrackedResource::clone);

    fn counting_registry(builds: Arc<AtomicUsize>) -> ControllerRegistry {
        let mut reg = ControllerRegistry::new();
        for kind in ResourceKind::ALL {
            let builds = Arc::clone(&builds);
            reg.register(kind.name(), move || {
                builds.fetch_add(1, Ordering::SeqCst);
                ViewController::new(kind, Empty, IDENTITY)
            });
        }
        reg
    }

    #[tokio::test]
    async fn get_builds_once_and_memoizes() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut reg = counting_registry(Arc::clone(&builds));
        assert!(reg.get("pods").is_some());
        reg.get("pods").expect("pods").select_next();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(reg.active_count(), 1);
        reg.get("deployments").expect("deployments");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        reg.clear();
    }

    #[tokio::test]
    async fn unknown_name_builds_nothing() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut reg = counting_registry(Arc::clone(&builds));
        assert!(reg.get("services").is_none());
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn names_are_sorted() {
        let reg = counting_registry(Arc::new(AtomicUsize::new(0)));
        assert_eq!(reg.available_names(), ["deployments", "pods"]);
        assert!(reg.is_registered("pods"));
    }

    #[tokio::test]
    async fn clear_drops_cache_and_rebuilds_on_next_get() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut reg = counting_registry(Arc::clone(&builds));
        reg.get("pods");
        reg.clear();
        assert_eq!(reg.active_count(), 0);
        reg.get("pods");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        reg.clear();
    }
}
