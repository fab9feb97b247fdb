//! Vigilant core types shared by the store, the kube adapters and the UI.

#![forbid(unsafe_code)]

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod columns;
pub mod source;

pub use source::{EventStream, Listing, Projection, ResourceSource, SourceError, WatchChange};

/// Composite `namespace/name` key. Ordering is plain string ordering, which is
/// what gives collections their stable iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self(format!("{namespace}/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of change carried by a watch event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Resource types the dashboard knows how to track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pods,
    Deployments,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Pods, ResourceKind::Deployments];

    /// Name used by the command bar and the controller registry.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Deployments => "deployments",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            ResourceKind::Pods => "pod",
            ResourceKind::Deployments => "deployment",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == lower || k.singular() == lower)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display-ready projection of one cluster object at a point in time.
/// Replaced wholesale on update, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedResource {
    pub namespace: String,
    pub name: String,
    pub status: String,
    /// Readiness fraction, e.g. `1/2`.
    pub ready: String,
    /// Elapsed time since creation, measured when the projection was built.
    pub age: Duration,
    pub details: ResourceDetails,
}

/// Type-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceDetails {
    Pod {
        restarts: i32,
        ip: String,
        node: String,
    },
    Deployment {
        up_to_date: i32,
        available: i32,
        strategy: String,
        image: String,
    },
}

impl TrackedResource {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn kind(&self) -> ResourceKind {
        match self.details {
            ResourceDetails::Pod { .. } => ResourceKind::Pods,
            ResourceDetails::Deployment { .. } => ResourceKind::Deployments,
        }
    }

    /// Restart count for pods, up-to-date replica count for deployments.
    pub fn count(&self) -> i32 {
        match &self.details {
            ResourceDetails::Pod { restarts, .. } => *restarts,
            ResourceDetails::Deployment { up_to_date, .. } => *up_to_date,
        }
    }

    pub fn age_label(&self) -> String {
        format_age(self.age)
    }
}

/// Compact age label: `<1m`, `42m`, `5h`, `3d`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        return "<1m".to_string();
    }
    if secs < 3_600 {
        let minutes = ((secs + 30) / 60).min(59);
        return format!("{minutes}m");
    }
    if secs < 86_400 {
        let hours = ((secs + 1_800) / 3_600).min(23);
        return format!("{hours}h");
    }
    format!("{}d", (secs + 43_200) / 86_400)
}

pub mod prelude {
    pub use super::{
        ChangeKind, ObjectKey, ResourceDetails, ResourceKind, TrackedResource,
    };
    pub use crate::source::{Listing, Projection, ResourceSource, SourceError, WatchChange};
}
