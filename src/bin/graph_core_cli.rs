//! `graph_core_cli`: a thin command-line harness over the graph analytics
//! core, driven by JSON fixtures.
//!
//! ## Usage
//!
//! ```bash
//! graph_core_cli graph load --fixture fixture.json
//! graph_core_cli spectral build --fixture fixture.json --out snapshot.json
//! graph_core_cli clusters view --fixture fixture.json --snapshot snapshot.json --granularity 20
//! graph_core_cli propagation run --fixture fixture.json --tags tags.json
//! graph_core_cli discovery recommend --fixture fixture.json --seeds acct-1,acct-2
//! graph_core_cli cache stats
//! ```
//!
//! Environment variables (`RUST_LOG`, `LOG_FORMAT`) control logging exactly
//! as in the library's `CoreConfig::from_env` convention.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use graph_analytics_core::{
    AccountId, AccountView, AnchorSet, CancelGuard, ClusterQuery, ClusterService, DiscoveryEngine, DiscoveryRequest,
    Edge, GraphStore, InMemoryGraphLoader, InMemoryStore, PropagationConfig, PropagationEngine, SnapshotLoader,
    SpectralConfig, SpectralEngine, TagAssignment,
};

type BoxError = Box<dyn Error>;

#[derive(Parser)]
#[command(name = "graph_core_cli", version, about = "Social-graph analytics core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GraphStore operations.
    Graph {
        #[command(subcommand)]
        action: GraphAction,
    },
    /// SpectralEngine operations.
    Spectral {
        #[command(subcommand)]
        action: SpectralAction,
    },
    /// ClusterService operations.
    Clusters {
        #[command(subcommand)]
        action: ClustersAction,
    },
    /// PropagationEngine operations.
    Propagation {
        #[command(subcommand)]
        action: PropagationAction,
    },
    /// DiscoveryEngine operations.
    Discovery {
        #[command(subcommand)]
        action: DiscoveryAction,
    },
    /// A tiny standalone `MetricsCache` demonstration (hit/miss/coalesce).
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum GraphAction {
    /// Load a fixture and print node/edge counts and the graph hash.
    Load {
        #[arg(long)]
        fixture: PathBuf,
    },
}

#[derive(Subcommand)]
enum SpectralAction {
    /// Build a snapshot from a fixture and write it to disk.
    Build {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long, default_value_t = 16)]
        n_dims: usize,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum ClustersAction {
    /// Print a cluster view over a previously built snapshot.
    View {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long, default_value_t = 20)]
        granularity: u32,
        #[arg(long, default_value_t = 50)]
        budget: u32,
    },
}

#[derive(Subcommand)]
enum PropagationAction {
    /// Run label propagation from a tag-assignment fixture.
    Run {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        tags: PathBuf,
    },
}

#[derive(Subcommand)]
enum DiscoveryAction {
    /// Rank candidates against a comma-separated seed list.
    Recommend {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long, value_delimiter = ',')]
        seeds: Vec<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Run a few puts/gets through a fresh `MetricsCache` and print stats.
    Stats,
}

/// The on-disk fixture format consumed by `--fixture` ("the CLI's
/// `--fixture` mode").
#[derive(Debug, Serialize, Deserialize)]
struct Fixture {
    accounts: Vec<graph_analytics_core::AccountView>,
    edges: Vec<Edge>,
}

impl Fixture {
    fn load(path: &PathBuf) -> Result<Self, BoxError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn into_loader(self) -> InMemoryGraphLoader {
        InMemoryGraphLoader::new(self.accounts, self.edges)
    }
}

/// Initialize the tracing subscriber with JSON or pretty format.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "graph_core_cli=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Graph { action: GraphAction::Load { fixture } } => {
            let loader = Fixture::load(&fixture)?.into_loader();
            let handle = GraphStore.load(&loader).await?;
            println!(
                "nodes={} edges={} hash={}",
                handle.num_nodes(),
                handle.edges().len(),
                handle.hash()
            );
        }
        Command::Spectral { action: SpectralAction::Build { fixture, n_dims, out } } => {
            let loader = Fixture::load(&fixture)?.into_loader();
            let handle = GraphStore.load(&loader).await?;
            let config = SpectralConfig { n_dims, ..Default::default() };
            let snapshot = SpectralEngine.build(&handle, &config, None, &CancelGuard::default())?;
            snapshot.save(&out)?;
            println!(
                "wrote snapshot to {out:?} (converged={}, stability_ari={:.3})",
                snapshot.manifest.solver_converged, snapshot.manifest.stability_ari
            );
        }
        Command::Clusters { action: ClustersAction::View { fixture, snapshot, granularity, budget } } => {
            let loader = Fixture::load(&fixture)?.into_loader();
            let handle = GraphStore.load(&loader).await?;
            let snapshot = SnapshotLoader.load(&snapshot, handle.hash())?;

            let store = std::sync::Arc::new(InMemoryStore::new());
            let service = ClusterService::new(store, "cli");
            let query = ClusterQuery { granularity, budget, ..Default::default() };
            let view = service.view(&handle, &snapshot, &query).await?;
            println!("{} clusters (budget_remaining={})", view.clusters.len(), view.meta.budget_remaining);
            for cluster in &view.clusters {
                println!("  #{} size={} label={:?}", cluster.id, cluster.size, cluster.label);
            }
        }
        Command::Propagation { action: PropagationAction::Run { fixture, tags } } => {
            let loader = Fixture::load(&fixture)?.into_loader();
            let handle = GraphStore.load(&loader).await?;
            let assignments: Vec<TagAssignment> = serde_json::from_slice(&std::fs::read(&tags)?)?;
            let anchors = AnchorSet::from_tag_assignments(assignments);
            let result = PropagationEngine.propagate(&handle, &anchors, &PropagationConfig::default())?;
            println!(
                "none_class_fraction={:.3} louvain_agreement_ari={:.3}",
                result.diagnostics.none_class_fraction, result.diagnostics.louvain_agreement_ari
            );
            for warning in &result.warnings {
                println!("  warning[{}]: {}", warning.code, warning.message);
            }
        }
        Command::Discovery { action: DiscoveryAction::Recommend { fixture, seeds, limit } } => {
            let loader = Fixture::load(&fixture)?.into_loader();
            let handle = GraphStore.load(&loader).await?;
            let engine = DiscoveryEngine::default();
            let request = DiscoveryRequest {
                seeds: seeds.into_iter().map(AccountId::resolved).collect(),
                limit,
                ..Default::default()
            };
            let result = engine.discover(&handle, None, &request, "cli", &CancelGuard::default())?;
            println!("{} candidates, showing {}", result.total_candidates, result.items.len());
            for rec in &result.items {
                println!("  {} composite={:.4}", rec.account_id, rec.composite);
            }
        }
        Command::Cache { action: CacheAction::Stats } => {
            use graph_analytics_core::{CacheConfig, MetricsCache};
            use std::time::Duration;

            let cache: MetricsCache<String, u32> = MetricsCache::new(CacheConfig::new(100, Duration::from_secs(60)));
            cache.put("demo".to_string(), 1);
            cache.get(&"demo".to_string());
            cache.get(&"missing".to_string());
            let stats = cache.stats();
            println!(
                "hits={} misses={} coalesced={} evictions={} entries={}",
                stats.hits, stats.misses, stats.coalesced, stats.evictions, stats.entries
            );
        }
    }

    Ok(())
}
