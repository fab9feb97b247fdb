//! Built-in columns for the tracked kinds.
//!
//! This module provides:
//! - Column specs (labels and relative widths) per resource kind
//! - Cell rendering for a `TrackedResource` in column order

#![forbid(unsafe_code)]

use crate::{ResourceDetails, ResourceKind, TrackedResource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Name,
    Namespace,
    Status,
    Ready,
    Restarts,
    UpToDate,
    Available,
    Age,
    Ip,
    Node,
    Strategy,
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub kind: ColumnKind,
    pub label: &'static str,
    /// Minimum width in terminal cells.
    pub width: u16,
}

fn col(kind: ColumnKind, label: &'static str, width: u16) -> ColumnSpec {
    ColumnSpec { kind, label, width }
}

/// Full column set for a kind, in display order.
pub fn columns_for(kind: ResourceKind) -> Vec<ColumnSpec> {
    let mut cols = vec![
        col(ColumnKind::Name, "NAME", 24),
        col(ColumnKind::Namespace, "NAMESPACE", 14),
        col(ColumnKind::Status, "STATUS", 12),
        col(ColumnKind::Ready, "READY", 7),
    ];
    match kind {
        ResourceKind::Pods => {
            cols.push(col(ColumnKind::Restarts, "RESTARTS", 8));
            cols.push(col(ColumnKind::Age, "AGE", 5));
            cols.push(col(ColumnKind::Ip, "IP", 15));
            cols.push(col(ColumnKind::Node, "NODE", 14));
        }
        ResourceKind::Deployments => {
            cols.push(col(ColumnKind::UpToDate, "UP-TO-DATE", 10));
            cols.push(col(ColumnKind::Available, "AVAILABLE", 9));
            cols.push(col(ColumnKind::Age, "AGE", 5));
            cols.push(col(ColumnKind::Strategy, "STRATEGY", 13));
            cols.push(col(ColumnKind::Image, "IMAGE", 24));
        }
    }
    cols
}

/// Render one cell. Columns that do not apply to the resource render empty.
pub fn cell(res: &TrackedResource, kind: ColumnKind) -> String {
    match (kind, &res.details) {
        (ColumnKind::Name, _) => res.name.clone(),
        (ColumnKind::Namespace, _) => res.namespace.clone(),
        (ColumnKind::Status, _) => res.status.clone(),
        (ColumnKind::Ready, _) => res.ready.clone(),
        (ColumnKind::Age, _) => res.age_label(),
        (ColumnKind::Restarts, ResourceDetails::Pod { restarts, .. }) => restarts.to_string(),
        (ColumnKind::Ip, ResourceDetails::Pod { ip, .. }) => ip.clone(),
        (ColumnKind::Node, ResourceDetails::Pod { node, .. }) => node.clone(),
        (ColumnKind::UpToDate, ResourceDetails::Deployment { up_to_date, .. }) => up_to_date.to_string(),
        (ColumnKind::Available, ResourceDetails::Deployment { available, .. }) => available.to_string(),
        (ColumnKind::Strategy, ResourceDetails::Deployment { strategy, .. }) => strategy.clone(),
        (ColumnKind::Image, ResourceDetails::Deployment { image, .. }) => image.clone(),
        _ => String::new(),
    }
}

/// Render a full row for the given column set.
pub fn row(res: &TrackedResource, cols: &[ColumnSpec]) -> Vec<String> {
    cols.iter().map(|c| cell(res, c.kind)).collect()
}
