//! kubegraph - build relationship graphs of Kubernetes resources
//!
//! Builds a graph from a starting resource or a whole namespace, prints or
//! saves it as JSON, and converts saved graphs to other formats.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use kubegraph::graph::persistence;
use kubegraph::{BuildOptions, GraphBuilder, KubernetesClient, ResourceIdentifier};
use std::path::PathBuf;
use std::sync::Arc;

/// Build relationship graphs of Kubernetes resources
#[derive(Parser, Debug)]
#[command(name = "kubegraph")]
#[command(about = "Build relationship graphs of Kubernetes resources", long_about = None)]
struct Cli {
    /// Enable debug logging (written to a temp file)
    #[arg(long, short = 'd')]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a graph starting from one resource
    Resource {
        /// Resource kind (e.g. Deployment)
        #[arg(long, short = 'k')]
        kind: String,
        /// Resource name
        #[arg(long)]
        name: String,
        /// Namespace (omit for cluster-scoped resources)
        #[arg(long, short = 'n')]
        namespace: Option<String>,
        /// Expansion depth
        #[arg(long, default_value_t = 2)]
        depth: u32,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build a graph of all resources in a namespace
    Namespace {
        /// Namespace to graph
        namespace: String,
        /// Expansion depth per resource
        #[arg(long, default_value_t = 1)]
        depth: u32,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Convert a saved graph to another format
    Export {
        /// Saved graph JSON file
        input: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "dot")]
        format: ExportFormat,
        /// Output file (stdout if omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct BuildArgs {
    /// Skip RBAC discoverers
    #[arg(long)]
    no_rbac: bool,
    /// Skip network policy discoverers
    #[arg(long)]
    no_network: bool,
    /// Skip third-party operator discoverers
    #[arg(long)]
    no_crds: bool,
    /// Maximum number of graph nodes
    #[arg(long, default_value_t = 500)]
    max_nodes: usize,
    /// Output file (stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Dot,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            include_rbac: !self.no_rbac,
            include_network: !self.no_network,
            include_crds: !self.no_crds,
            max_nodes: self.max_nodes,
            cluster_id: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = kubegraph::cli::init_logging(cli.debug);
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    match cli.command {
        Command::Resource {
            kind,
            name,
            namespace,
            depth,
            build,
        } => {
            let resource_id = ResourceIdentifier::new(kind, name, namespace.as_deref())
                .context("invalid resource identifier")?;
            let options = build.options();

            let client = KubernetesClient::try_default()
                .await
                .context("Failed to connect to cluster")?;
            let mut builder = GraphBuilder::with_defaults(Arc::new(client));

            let graph = builder
                .build_from_resource(&resource_id, depth, &options)
                .await?;
            print_summary(&builder, &graph);
            emit_graph(&graph, build.output.as_deref())?;
        }
        Command::Namespace {
            namespace,
            depth,
            build,
        } => {
            let options = build.options();

            let client = KubernetesClient::try_default()
                .await
                .context("Failed to connect to cluster")?;
            let mut builder = GraphBuilder::with_defaults(Arc::new(client));

            let graph = builder
                .build_namespace_graph(&namespace, depth, &options)
                .await?;
            print_summary(&builder, &graph);
            emit_graph(&graph, build.output.as_deref())?;
        }
        Command::Export {
            input,
            format,
            output,
        } => {
            let graph = persistence::load_graph(&input)?;
            let rendered = match format {
                ExportFormat::Json => {
                    serde_json::to_string_pretty(&persistence::to_document(&graph))?
                }
                ExportFormat::Dot => persistence::to_dot(&graph),
            };
            match output {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}

fn print_summary(builder: &GraphBuilder, graph: &kubegraph::ResourceGraph) {
    let stats = builder.get_discovery_stats();
    let sampling = builder.get_pod_sampling_info();

    eprintln!(
        "Graph: {} nodes, {} edges ({} discoveries, {} errors, {} relationships)",
        graph.node_count(),
        graph.edge_count(),
        stats.discoveries,
        stats.errors,
        stats.total_relationships,
    );
    if sampling.sampled_count > 0 {
        eprintln!(
            "Pod sampling: {} templates (~{} pods represented)",
            sampling.sampled_count, sampling.total_count
        );
    }
    let permission_errors = builder.get_permission_errors();
    if !permission_errors.is_empty() {
        eprintln!("Permission errors ({}):", permission_errors.len());
        for error in permission_errors {
            eprintln!("  - {error}");
        }
    }
}

fn emit_graph(graph: &kubegraph::ResourceGraph, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            persistence::save_graph(graph, path)?;
            eprintln!("Saved graph to {}", path.display());
        }
        None => {
            let document = persistence::to_document(graph);
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }
    Ok(())
}
