//! Projections from API objects to `TrackedResource`, mirroring what
//! `kubectl get` shows for pods and deployments.

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use vigilant_core::{ObjectKey, Projection, ResourceDetails, TrackedResource};

pub const PODS: Projection<Pod, TrackedResource> = Projection::new(object_key::<Pod>, project_pod);
pub const DEPLOYMENTS: Projection<Deployment, TrackedResource> =
    Projection::new(object_key::<Deployment>, project_deployment);

/// `namespace/name`, or `None` when either part is missing.
pub fn object_key<K: ResourceExt>(o: &K) -> Option<ObjectKey> {
    let ns = o.meta().namespace.as_deref()?;
    let name = o.meta().name.as_deref()?;
    Some(ObjectKey::new(ns, name))
}

fn age_of(ts: Option<&Time>) -> Duration {
    ts.and_then(|t| (Utc::now() - t.0).to_std().ok()).unwrap_or_default()
}

pub fn pod_status(p: &Pod) -> String {
    if p.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }
    let status = p.status.as_ref();
    let reason = status
        .and_then(|s| s.container_statuses.as_ref())
        .into_iter()
        .flatten()
        .find_map(|cs| {
            let st = cs.state.as_ref()?;
            st.waiting
                .as_ref()
                .and_then(|w| w.reason.clone())
                .or_else(|| st.terminated.as_ref().and_then(|t| t.reason.clone()))
        });
    if let Some(r) = reason {
        return r;
    }
    status.and_then(|s| s.phase.clone()).unwrap_or_else(|| "Unknown".to_string())
}

pub fn project_pod(p: &Pod) -> TrackedResource {
    let statuses = p.status.as_ref().and_then(|s| s.container_statuses.as_deref()).unwrap_or(&[]);
    let total = p
        .spec
        .as_ref()
        .map(|s| s.containers.len())
        .filter(|n| *n > 0)
        .unwrap_or(statuses.len());
    let ready = statuses.iter().filter(|c| c.ready).count();
    let restarts = statuses.iter().map(|c| c.restart_count).sum::<i32>();
    TrackedResource {
        namespace: p.namespace().unwrap_or_default(),
        name: p.name_any(),
        status: pod_status(p),
        ready: format!("{ready}/{total}"),
        age: age_of(p.metadata.creation_timestamp.as_ref()),
        details: ResourceDetails::Pod {
            restarts,
            ip: p.status.as_ref().and_then(|s| s.pod_ip.clone()).unwrap_or_default(),
            node: p.spec.as_ref().and_then(|s| s.node_name.clone()).unwrap_or_default(),
        },
    }
}

pub fn deployment_status(replicas: i32, ready: i32, available: i32) -> &'static str {
    if replicas == 0 {
        "Scaled to 0"
    } else if ready == replicas {
        "Ready"
    } else if available > 0 {
        "Available"
    } else {
        "Not Ready"
    }
}

pub fn project_deployment(d: &Deployment) -> TrackedResource {
    let st = d.status.as_ref();
    let replicas = st.and_then(|s| s.replicas).unwrap_or(0);
    let ready = st.and_then(|s| s.ready_replicas).unwrap_or(0);
    let available = st.and_then(|s| s.available_replicas).unwrap_or(0);
    let up_to_date = st.and_then(|s| s.updated_replicas).unwrap_or(0);
    let spec = d.spec.as_ref();
    let strategy = match spec.and_then(|s| s.strategy.as_ref()).and_then(|s| s.type_.as_deref()) {
        Some("Recreate") => "Recreate",
        _ => "RollingUpdate",
    };
    let image = spec
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|s| s.containers.first())
        .and_then(|c| c.image.clone())
        .unwrap_or_else(|| "N/A".to_string());
    TrackedResource {
        namespace: d.namespace().unwrap_or_default(),
        name: d.name_any(),
        status: deployment_status(replicas, ready, available).to_string(),
        ready: format!("{ready}/{replicas}"),
        age: age_of(d.metadata.creation_timestamp.as_ref()),
        details: ResourceDetails::Deployment { up_to_date, available, strategy: strategy.to_string(), image },
    }
}
