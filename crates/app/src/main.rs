use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, info_span};
use vigilant_core::columns::{columns_for, row};
use vigilant_core::{Projection, ResourceKind, ResourceSource, TrackedResource};
use vigilant_kubehub::{deployment_source, pod_source, project, KubeOps};
use vigilant_store::{channel, ResourceSynchronizer};
use vigilant_tui::{App, AppConfig, ControllerRegistry, ViewController};

#[derive(Parser, Debug)]
#[command(name = "vigilant", version, about = "Live Kubernetes dashboard for the terminal")]
struct Cli {
    /// Kubeconfig context (default: current context)
    #[arg(long, env = "VIGILANT_CONTEXT", global = true)]
    context: Option<String>,

    /// Restrict watches to one namespace (default: all namespaces)
    #[arg(short = 'n', long, env = "VIGILANT_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Resource view shown at startup
    #[arg(long, env = "VIGILANT_RESOURCE", default_value = "pods")]
    resource: String,

    /// Log file; the terminal belongs to the UI
    #[arg(long, env = "VIGILANT_LOG_FILE", default_value = "vigilant-debug.log")]
    log_file: PathBuf,

    /// Force debug-level logging
    #[arg(long)]
    debug: bool,

    /// UI tick in milliseconds
    #[arg(long, env = "VIGILANT_TICK_MS", default_value_t = 250)]
    tick_ms: u64,

    /// Lines of pod log fetched into the log pane
    #[arg(long, env = "VIGILANT_TAIL_LINES", default_value_t = 500)]
    tail_lines: i64,

    /// Output format for one-shot commands
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print one snapshot of a resource and exit
    List {
        /// Resource name, e.g. "pods" or "deployment"
        resource: String,
    },
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            initial_resource: self.resource.clone(),
            tick: Duration::from_millis(self.tick_ms.max(10)),
            tail_lines: self.tail_lines,
        }
    }
}

fn init_tracing(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let default = if debug { "debug" } else { "info" };
    let env = std::env::var("VIGILANT_LOG").unwrap_or_else(|_| default.to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("VIGILANT_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid VIGILANT_METRICS_ADDR; expected host:port");
        }
    }
}

fn parse_kind(name: &str) -> Result<ResourceKind> {
    ResourceKind::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.name()).collect();
        anyhow!("unknown resource {name:?}; known resources: {}", known.join(", "))
    })
}

/// One bootstrap through a synchronizer, no watch.
async fn snapshot<S>(kind: ResourceKind, source: S, projection: Projection<S::Object, TrackedResource>) -> Result<Vec<TrackedResource>>
where
    S: ResourceSource,
{
    let (notifier, _changes) = channel();
    let sync = ResourceSynchronizer::new(source, projection, notifier, info_span!("sync", kind = %kind));
    let res = sync.bootstrap().await;
    sync.stop();
    res.with_context(|| format!("listing {kind}"))?;
    Ok(sync.values())
}

/// Left-aligned columns sized to the widest cell, two spaces apart.
fn format_table(kind: ResourceKind, items: &[TrackedResource]) -> String {
    let cols = columns_for(kind);
    let rows: Vec<Vec<String>> = items.iter().map(|r| row(r, &cols)).collect();
    let widths: Vec<usize> = cols
        .iter()
        .enumerate()
        .map(|(i, c)| rows.iter().map(|r| r[i].chars().count()).fold(c.label.len(), usize::max))
        .collect();
    let header: Vec<String> = cols.iter().map(|c| c.label.to_string()).collect();
    let mut out = String::new();
    for cells in std::iter::once(&header).chain(rows.iter()) {
        let line: Vec<String> = cells.iter().zip(&widths).map(|(c, w)| format!("{c:<w$}")).collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

async fn run_list(cli: &Cli, resource: &str) -> Result<()> {
    let kind = parse_kind(resource)?;
    let (client, _cluster) = vigilant_kubehub::connect(cli.context.as_deref()).await?;
    let ns = cli.namespace.as_deref();
    let items = match kind {
        ResourceKind::Pods => snapshot(kind, pod_source(client, ns), project::PODS).await?,
        ResourceKind::Deployments => snapshot(kind, deployment_source(client, ns), project::DEPLOYMENTS).await?,
    };
    match cli.output {
        Output::Human => print!("{}", format_table(kind, &items)),
        Output::Json => println!("{}", serde_json::to_string_pretty(&items)?),
    }
    Ok(())
}

async fn run_tui(cli: &Cli) -> Result<()> {
    let (client, cluster) = vigilant_kubehub::connect(cli.context.as_deref()).await?;
    info!(cluster = %cluster, namespace = ?cli.namespace, "connected");
    let mut registry = ControllerRegistry::new();
    {
        let (client, ns) = (client.clone(), cli.namespace.clone());
        registry.register(ResourceKind::Pods.name(), move || {
            ViewController::new(ResourceKind::Pods, pod_source(client.clone(), ns.as_deref()), project::PODS)
        });
    }
    {
        let (client, ns) = (client.clone(), cli.namespace.clone());
        registry.register(ResourceKind::Deployments.name(), move || {
            ViewController::new(ResourceKind::Deployments, deployment_source(client.clone(), ns.as_deref()), project::DEPLOYMENTS)
        });
    }
    let ops = Arc::new(KubeOps::new(client, cluster));
    App::new(registry, ops, cli.app_config()).run().await?;
    info!("bye");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Some(Commands::List { resource }) => {
            init_tracing(cli.debug, None)?;
            init_metrics();
            run_list(&cli, resource).await
        }
        None => {
            init_tracing(cli.debug, Some(&cli.log_file))?;
            init_metrics();
            run_tui(&cli).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigilant_core::ResourceDetails;

    #[test]
    fn defaults_start_the_tui_on_pods() {
        let cli = Cli::try_parse_from(["vigilant"]).expect("parse");
        assert!(cli.command.is_none());
        let cfg = cli.app_config();
        assert_eq!(cfg.initial_resource, "pods");
        assert_eq!(cfg.tick, Duration::from_millis(250));
        assert_eq!(cfg.tail_lines, 500);
        assert_eq!(cli.log_file, PathBuf::from("vigilant-debug.log"));
    }

    #[test]
    fn list_subcommand_takes_global_flags() {
        let cli = Cli::try_parse_from(["vigilant", "list", "deploy", "-o", "json", "-n", "kube-system"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::List { ref resource }) if resource == "deploy"));
        assert_eq!(cli.output, Output::Json);
        assert_eq!(cli.namespace.as_deref(), Some("kube-system"));
    }

    #[test]
    fn unknown_resource_lists_known_ones() {
        assert_eq!(parse_kind("Deployment").expect("kind"), ResourceKind::Deployments);
        let err = parse_kind("services").expect_err("unknown").to_string();
        assert!(err.contains("pods, deployments"), "{err}");
    }

    #[test]
    fn table_aligns_to_widest_cell() {
        let pod = TrackedResource {
            namespace: "kube-system".into(),
            name: "coredns-abc".into(),
            status: "Running".into(),
            ready: "1/1".into(),
            age: Duration::from_secs(90),
            details: ResourceDetails::Pod { restarts: 2, ip: "10.244.0.3".into(), node: "kind-control-plane".into() },
        };
        let out = format_table(ResourceKind::Pods, &[pod]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("NAME         NAMESPACE    STATUS   READY  RESTARTS"), "{}", lines[0]);
        assert!(lines[1].starts_with("coredns-abc  kube-system  Running  1/1    2"), "{}", lines[1]);
        assert!(lines[1].ends_with("10.244.0.3  kind-control-plane"), "{}", lines[1]);
    }

    #[test]
    fn empty_table_prints_header_only() {
        let out = format_table(ResourceKind::Deployments, &[]);
        assert_eq!(out, "NAME  NAMESPACE  STATUS  READY  UP-TO-DATE  AVAILABLE  AGE  STRATEGY  IMAGE\n");
    }
}
