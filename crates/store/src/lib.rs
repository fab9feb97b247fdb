//! Vigilant store: in-RAM collections kept in step with the cluster.
//!
//! - [`collection::OrderedCollection`] holds projected objects keyed by
//!   `namespace/name`, iterated in key order.
//! - [`notify`] is the single-slot change signal consumed by the UI.
//! - [`sync::ResourceSynchronizer`] runs list-then-watch against a
//!   [`vigilant_core::ResourceSource`] and applies events to a collection.

#![forbid(unsafe_code)]

pub mod collection;
pub mod notify;
pub mod sync;

pub use collection::OrderedCollection;
pub use notify::{channel, ChangeNotifier, ChangeReceiver};
pub use sync::{LiveCollection, ResourceSynchronizer, SyncState};
