//! Plain-text `describe` output for pods and deployments.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, ContainerState, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::project::{deployment_status, pod_status};

const LABEL_WIDTH: usize = 14;

struct Doc {
    out: String,
}

impl Doc {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn field(&mut self, indent: usize, label: &str, value: impl AsRef<str>) {
        let label = format!("{label}:");
        let width = LABEL_WIDTH.saturating_sub(indent).max(label.len() + 1);
        self.out.push_str(&format!("{:indent$}{label:<width$}{}\n", "", value.as_ref()));
    }

    fn section(&mut self, indent: usize, title: &str) {
        self.out.push_str(&format!("{:indent$}{title}:\n", ""));
    }

    /// `key=value` pairs, first on the label line, the rest aligned below.
    fn map(&mut self, label: &str, m: Option<&BTreeMap<String, String>>) {
        let Some(m) = m.filter(|m| !m.is_empty()) else {
            self.field(0, label, "<none>");
            return;
        };
        for (i, (k, v)) in m.iter().enumerate() {
            if i == 0 {
                self.field(0, label, format!("{k}={v}"));
            } else {
                self.out.push_str(&format!("{:width$}{k}={v}\n", "", width = LABEL_WIDTH));
            }
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn ts(t: Option<&Time>) -> String {
    t.map(|t| t.0.to_rfc2822()).unwrap_or_else(|| "<unknown>".to_string())
}

fn meta_block(doc: &mut Doc, m: &ObjectMeta) {
    doc.field(0, "Name", m.name.as_deref().unwrap_or(""));
    doc.field(0, "Namespace", m.namespace.as_deref().unwrap_or(""));
    doc.field(0, "Created", ts(m.creation_timestamp.as_ref()));
    doc.map("Labels", m.labels.as_ref());
    doc.map("Annotations", m.annotations.as_ref());
}

fn state_label(s: Option<&ContainerState>) -> String {
    let Some(s) = s else { return "Unknown".to_string() };
    if s.running.is_some() {
        return "Running".to_string();
    }
    if let Some(w) = &s.waiting {
        return match &w.reason {
            Some(r) => format!("Waiting ({r})"),
            None => "Waiting".to_string(),
        };
    }
    if let Some(t) = &s.terminated {
        return match &t.reason {
            Some(r) => format!("Terminated ({r}, exit {})", t.exit_code),
            None => format!("Terminated (exit {})", t.exit_code),
        };
    }
    "Unknown".to_string()
}

fn container_block(doc: &mut Doc, c: &Container) {
    doc.section(2, &c.name);
    doc.field(4, "Image", c.image.as_deref().unwrap_or("<none>"));
    let ports: Vec<String> = c
        .ports
        .iter()
        .flatten()
        .map(|p| format!("{}/{}", p.container_port, p.protocol.as_deref().unwrap_or("TCP")))
        .collect();
    doc.field(4, "Ports", if ports.is_empty() { "<none>".to_string() } else { ports.join(", ") });
}

pub fn describe_pod(p: &Pod) -> String {
    let mut doc = Doc::new();
    meta_block(&mut doc, &p.metadata);
    let spec = p.spec.as_ref();
    let status = p.status.as_ref();
    doc.field(0, "Node", spec.and_then(|s| s.node_name.as_deref()).unwrap_or("<none>"));
    doc.field(0, "Status", pod_status(p));
    doc.field(0, "IP", status.and_then(|s| s.pod_ip.as_deref()).unwrap_or("<none>"));
    doc.field(0, "QoS Class", status.and_then(|s| s.qos_class.as_deref()).unwrap_or("<none>"));
    doc.section(0, "Containers");
    let statuses = status.and_then(|s| s.container_statuses.as_deref()).unwrap_or(&[]);
    for c in spec.map(|s| s.containers.as_slice()).unwrap_or(&[]) {
        container_block(&mut doc, c);
        if let Some(cs) = statuses.iter().find(|cs| cs.name == c.name) {
            doc.field(4, "State", state_label(cs.state.as_ref()));
            doc.field(4, "Ready", cs.ready.to_string());
            doc.field(4, "Restart Count", cs.restart_count.to_string());
        }
    }
    let conditions = status.and_then(|s| s.conditions.as_deref()).unwrap_or(&[]);
    if !conditions.is_empty() {
        doc.section(0, "Conditions");
        for c in conditions {
            doc.field(2, &c.type_, &c.status);
        }
    }
    doc.finish()
}

pub fn describe_deployment(d: &Deployment) -> String {
    let mut doc = Doc::new();
    meta_block(&mut doc, &d.metadata);
    let spec = d.spec.as_ref();
    let st = d.status.as_ref();
    let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
    let replicas = st.and_then(|s| s.replicas).unwrap_or(0);
    let ready = st.and_then(|s| s.ready_replicas).unwrap_or(0);
    let available = st.and_then(|s| s.available_replicas).unwrap_or(0);
    let updated = st.and_then(|s| s.updated_replicas).unwrap_or(0);
    let unavailable = st.and_then(|s| s.unavailable_replicas).unwrap_or(0);
    doc.field(0, "Status", deployment_status(replicas, ready, available));
    doc.field(
        0,
        "Replicas",
        format!("{desired} desired | {updated} updated | {replicas} total | {available} available | {unavailable} unavailable"),
    );
    let strategy = spec.and_then(|s| s.strategy.as_ref());
    doc.field(0, "Strategy", strategy.and_then(|s| s.type_.as_deref()).unwrap_or("RollingUpdate"));
    if let Some(ru) = strategy.and_then(|s| s.rolling_update.as_ref()) {
        let fmt = |v: Option<&IntOrString>| match v {
            Some(IntOrString::Int(i)) => i.to_string(),
            Some(IntOrString::String(s)) => s.clone(),
            None => "25%".to_string(),
        };
        doc.field(
            0,
            "RollingUpdate",
            format!("{} max unavailable, {} max surge", fmt(ru.max_unavailable.as_ref()), fmt(ru.max_surge.as_ref())),
        );
    }
    doc.section(0, "Pod Template");
    doc.section(1, "Containers");
    let containers = spec
        .and_then(|s| s.template.spec.as_ref())
        .map(|s| s.containers.as_slice())
        .unwrap_or(&[]);
    for c in containers {
        container_block(&mut doc, c);
    }
    let conditions = st.and_then(|s| s.conditions.as_deref()).unwrap_or(&[]);
    if !conditions.is_empty() {
        doc.section(0, "Conditions");
        for c in conditions {
            let reason = c.reason.as_deref().unwrap_or("");
            doc.field(2, &c.type_, format!("{} {reason}", c.status).trim_end());
        }
    }
    doc.finish()
}
