//! Vigilant kubehub: the API-server side of the dashboard.
//!
//! Typed [`KubeSource`]s feed the synchronizers in `vigilant-store`;
//! [`project`] turns API objects into display rows; [`ops`] covers the
//! one-shot reads behind describe, logs and the header.

#![forbid(unsafe_code)]

pub mod describe;
pub mod ops;
pub mod project;
pub mod source;

pub use ops::{connect, ClusterOps, ClusterSummary, KubeOps};
pub use source::KubeSource;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;

pub type PodSource = KubeSource<Pod>;
pub type DeploymentSource = KubeSource<Deployment>;

pub fn pod_source(client: Client, namespace: Option<&str>) -> PodSource {
    KubeSource::new(client, namespace)
}

pub fn deployment_source(client: Client, namespace: Option<&str>) -> DeploymentSource {
    KubeSource::new(client, namespace)
}
