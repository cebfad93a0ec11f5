//! Mantis Metrics CLI - resolve metric queries against a semantic manifest
//!
//! Usage:
//!   mantis-metrics resolve --manifest <manifest.json> --metrics <a,b> [--group-by <x,y>]
//!   mantis-metrics group-by --manifest <manifest.json> --metrics <a,b>
//!   mantis-metrics list-metrics --manifest <manifest.json> [--model <name>]
//!
//! Examples:
//!   mantis-metrics resolve --manifest semantic_manifest.json --metrics bookings --group-by metric_time__month
//!   mantis-metrics resolve --metrics bookings --group-by listing__country_latest --order-by -bookings --limit 10 --json
//!   mantis-metrics group-by --metrics bookings,views
//!   mantis-metrics list-metrics --model bookings_source

use clap::{Parser, Subcommand};
use mantis_metrics::config::Settings;
use mantis_metrics::model::SemanticManifest;
use mantis_metrics::resolver::{
    GroupByItemResolver, QueryParameters, QueryParser, ResolutionDag, SuggestionGenerator,
};
use mantis_metrics::semantic::SemanticManifestLookup;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "MANTIS_METRICS_LOG";

#[derive(Parser)]
#[command(name = "mantis-metrics")]
#[command(about = "Mantis Metrics - resolve metric queries against a semantic manifest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a query and print the resulting query spec
    Resolve {
        /// Path to the JSON manifest (defaults to [manifest] path in the config)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Metrics to query
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Group-by items (dunder names or object-builder calls)
        #[arg(short, long, value_delimiter = ',')]
        group_by: Vec<String>,

        /// Order-by items, prefixed with '-' for descending
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        order_by: Vec<String>,

        /// Row limit
        #[arg(short, long, allow_hyphen_values = true)]
        limit: Option<i64>,

        /// Only compute the min and max of the single group-by item
        #[arg(long)]
        min_max_only: bool,

        /// Print the query spec as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the group-by items available for a set of metrics
    GroupBy {
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Metrics to query (none lists items for distinct-value queries)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },

    /// List metrics in the manifest
    ListMetrics {
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Only list metrics that read this semantic model
        #[arg(long)]
        model: Option<String>,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Resolve {
            manifest,
            metrics,
            group_by,
            order_by,
            limit,
            min_max_only,
            json,
        } => {
            let Some(lookup) = load_lookup(manifest, &settings) else {
                return ExitCode::FAILURE;
            };
            let params = QueryParameters {
                metric_names: metrics,
                group_by_names: group_by,
                order_by_names: order_by,
                limit,
                min_max_only,
                ..QueryParameters::default()
            };
            cmd_resolve(&lookup, &params, json)
        }
        Commands::GroupBy { manifest, metrics } => {
            let Some(lookup) = load_lookup(manifest, &settings) else {
                return ExitCode::FAILURE;
            };
            cmd_group_by(&lookup, &metrics)
        }
        Commands::ListMetrics { manifest, model } => {
            let Some(lookup) = load_lookup(manifest, &settings) else {
                return ExitCode::FAILURE;
            };
            cmd_list_metrics(&lookup, model.as_deref())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn load_lookup(manifest: Option<PathBuf>, settings: &Settings) -> Option<SemanticManifestLookup> {
    let path = match manifest {
        Some(path) => path,
        None => match settings.manifest.resolved_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("No manifest given: pass --manifest or set [manifest] path in the config");
                return None;
            }
            Err(e) => {
                eprintln!("Error resolving manifest path: {}", e);
                return None;
            }
        },
    };

    let source = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading manifest '{}': {}", path.display(), e);
            return None;
        }
    };
    let manifest = match SemanticManifest::from_json(&source) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error parsing manifest '{}': {}", path.display(), e);
            return None;
        }
    };
    info!(
        path = %path.display(),
        models = manifest.semantic_models.len(),
        metrics = manifest.metrics.len(),
        "loaded manifest"
    );

    match SemanticManifestLookup::with_settings(manifest, settings.clone()) {
        Ok(lookup) => Some(lookup),
        Err(e) => {
            eprintln!("Invalid manifest: {}", e);
            None
        }
    }
}

fn cmd_resolve(lookup: &SemanticManifestLookup, params: &QueryParameters, json: bool) -> ExitCode {
    let result = match QueryParser::new(lookup).parse_and_validate_query(params) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&result.query_spec) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing query spec: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let spec = &result.query_spec;
    if !spec.metric_specs.is_empty() {
        println!("Metrics:");
        for metric in &spec.metric_specs {
            println!("  - {}", metric.output_name());
        }
    }
    let group_by = spec.linkable_specs();
    if !group_by.is_empty() {
        println!("Group by:");
        for item in &group_by {
            println!("  - {}", item.qualified_name());
        }
    }
    if !spec.order_by_specs.is_empty() {
        println!("Order by:");
        for order in &spec.order_by_specs {
            let dir = if order.descending { "desc" } else { "asc" };
            println!("  - {} {}", order.instance_spec.output_name(), dir);
        }
    }
    if let Some(limit) = spec.limit {
        println!("Limit: {}", limit);
    }
    let models: Vec<&str> = result.queried_semantic_models.iter().map(String::as_str).collect();
    println!("Semantic models: {}", models.join(", "));
    ExitCode::SUCCESS
}

fn cmd_group_by(lookup: &SemanticManifestLookup, metrics: &[String]) -> ExitCode {
    for metric in metrics {
        if lookup.metric(metric).is_none() {
            eprintln!("Unknown metric: {}", metric);
            return ExitCode::FAILURE;
        }
    }

    let dag = match ResolutionDag::build(lookup, metrics, None) {
        Ok(dag) => dag,
        Err(e) => {
            eprintln!("Error building resolution DAG: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let resolver = GroupByItemResolver::new(lookup, &dag, SuggestionGenerator::disabled());
    let result = match resolver.resolve_available_items() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error resolving group-by items: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !result.is_success() {
        for issue in result.issue_set.errors() {
            eprintln!("  {}", issue.kind);
        }
        return ExitCode::FAILURE;
    }
    for spec in result.candidate_set.specs() {
        println!("{}", spec.qualified_name());
    }
    ExitCode::SUCCESS
}

fn cmd_list_metrics(lookup: &SemanticManifestLookup, model: Option<&str>) -> ExitCode {
    let names: Vec<String> = match model {
        Some(model) => match lookup.metrics_for_semantic_model(model) {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => lookup.metric_names().into_iter().map(str::to_string).collect(),
    };

    if names.is_empty() {
        println!("No metrics defined.");
        return ExitCode::SUCCESS;
    }
    println!("Metrics:");
    for name in &names {
        let kind = lookup.metric(name).map(|m| m.type_name()).unwrap_or("unknown");
        println!("  - {} ({})", name, kind);
    }
    ExitCode::SUCCESS
}
