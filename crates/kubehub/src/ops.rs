//! One-shot cluster operations used by the detail panes and the header.

use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};
use vigilant_core::ResourceKind;

use crate::describe::{describe_deployment, describe_pod};

const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";
const LEGACY_MASTER_LABEL: &str = "node-role.kubernetes.io/master";

/// Header facts about the connected cluster. Fields that could not be
/// fetched stay empty or zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub cluster_name: String,
    pub version: String,
    pub control_plane_nodes: usize,
    pub worker_nodes: usize,
}

#[async_trait::async_trait]
pub trait ClusterOps: Send + Sync {
    /// `describe`-style text for one object.
    async fn describe(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<String>;

    /// Last `tail_lines` lines of a pod's log. Without an explicit container
    /// the pod's first container is used.
    async fn logs(&self, namespace: &str, pod: &str, container: Option<&str>, tail_lines: Option<i64>) -> Result<String>;

    async fn summary(&self) -> Result<ClusterSummary>;
}

/// `ClusterOps` over a live client.
#[derive(Clone)]
pub struct KubeOps {
    client: Client,
    cluster_name: String,
}

impl KubeOps {
    pub fn new(client: Client, cluster_name: impl Into<String>) -> Self {
        Self { client, cluster_name: cluster_name.into() }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn count_nodes(&self, selector: &str) -> Result<usize> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default().labels(selector))
            .await
            .with_context(|| format!("listing nodes with {selector}"))?;
        Ok(list.items.len())
    }
}

#[async_trait::async_trait]
impl ClusterOps for KubeOps {
    async fn describe(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<String> {
        counter!("vigilant_describe_total", 1u64);
        debug!(%kind, namespace, name, "describe");
        match kind {
            ResourceKind::Pods => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
                let pod = api.get(name).await.with_context(|| format!("getting pod {namespace}/{name}"))?;
                Ok(describe_pod(&pod))
            }
            ResourceKind::Deployments => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let d = api.get(name).await.with_context(|| format!("getting deployment {namespace}/{name}"))?;
                Ok(describe_deployment(&d))
            }
        }
    }

    async fn logs(&self, namespace: &str, pod: &str, container: Option<&str>, tail_lines: Option<i64>) -> Result<String> {
        counter!("vigilant_logs_total", 1u64);
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let container = match container {
            Some(c) => Some(c.to_string()),
            None => {
                let p = api.get(pod).await.with_context(|| format!("getting pod {namespace}/{pod}"))?;
                let spec = p.spec.ok_or_else(|| anyhow!("pod {namespace}/{pod} has no spec"))?;
                spec.containers.into_iter().next().map(|c| c.name)
            }
        };
        let lp = LogParams { container: container.clone(), tail_lines, ..LogParams::default() };
        info!(namespace, pod, container = ?container, tail = ?tail_lines, "fetching logs");
        api.logs(pod, &lp).await.with_context(|| format!("reading logs of {namespace}/{pod}"))
    }

    async fn summary(&self) -> Result<ClusterSummary> {
        let version = match self.client.apiserver_version().await {
            Ok(info) => info.git_version,
            Err(e) => {
                warn!(error = %e, "server version unavailable");
                String::new()
            }
        };
        let mut control_plane_nodes = self.count_nodes(CONTROL_PLANE_LABEL).await.unwrap_or_else(|e| {
            warn!(error = %e, "control-plane node count unavailable");
            0
        });
        if control_plane_nodes == 0 {
            control_plane_nodes = self.count_nodes(LEGACY_MASTER_LABEL).await.unwrap_or(0);
        }
        let worker_nodes = self
            .count_nodes(&format!("!{CONTROL_PLANE_LABEL},!{LEGACY_MASTER_LABEL}"))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "worker node count unavailable");
                0
            });
        Ok(ClusterSummary { cluster_name: self.cluster_name.clone(), version, control_plane_nodes, worker_nodes })
    }
}

/// Cluster name behind `context`, or behind the current context when `None`.
pub fn cluster_name_for(cfg: &Kubeconfig, context: Option<&str>) -> Option<String> {
    let ctx_name = context.map(str::to_string).or_else(|| cfg.current_context.clone())?;
    cfg.contexts
        .iter()
        .find(|c| c.name == ctx_name)
        .and_then(|c| c.context.as_ref())
        .map(|c| c.cluster.clone())
}

/// Build a client for `context` (current context when `None`) and resolve the
/// cluster name shown in the header.
pub async fn connect(context: Option<&str>) -> Result<(Client, String)> {
    let opts = KubeConfigOptions { context: context.map(str::to_string), ..KubeConfigOptions::default() };
    let config = match context {
        Some(_) => Config::from_kubeconfig(&opts).await.context("loading kubeconfig context")?,
        None => Config::infer().await.context("inferring kube config")?,
    };
    let client = Client::try_from(config).context("building kube client")?;
    let cluster = match Kubeconfig::read() {
        Ok(cfg) => cluster_name_for(&cfg, context).unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "no kubeconfig for cluster name; running in-cluster?");
            String::new()
        }
    };
    info!(context = ?context, cluster = %cluster, "kube client ready");
    Ok((client, cluster))
}
