#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use namematch_harness::config::HarnessConfig;
use namematch_harness::dataset::{load_names, NameDataset};
use namematch_harness::evaluation::{
    all_subsets, best_subset, experiment_plan, read_all_metrics, sort_by_f1, ExperimentRunner,
    ReportStore,
};
use namematch_harness::gateway::{
    Attribution, NoopUsageSink, SearchServiceGateway, StderrUsageSink, UsageSink,
};
use namematch_harness::render::{write_chart, write_metrics_json, ChartSeries};

#[derive(Parser)]
#[command(name = "namematch", version, about = "Fuzzy name search evaluation harness")]
struct Cli {
    /// JSON config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or replace) the search index from the schema file
    CreateIndex {
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Upload the correctly spelled names, one document per name
    Upload {
        #[arg(long)]
        names: Option<PathBuf>,
    },
    /// Query every field subset with the misspelled names and persist reports
    Run {
        /// Create the index and upload names before querying
        #[arg(long)]
        setup: bool,
        /// Print one JSON usage record per service call to stderr
        #[arg(long)]
        usage: bool,
        /// Skip metrics and chart generation after the run
        #[arg(long)]
        no_render: bool,
    },
    /// Recompute metrics from completed reports and write metrics.json
    Metrics {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render the comparison chart against the baseline subset
    Render {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        baseline: Option<String>,
    },
    /// Print the subset with the highest F1 (shortest name on ties)
    Best,
    /// List the field subsets a run would evaluate
    Subsets {
        /// Comma-separated field list (defaults to the configured fields)
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = HarnessConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::CreateIndex { schema } => {
            let path = schema.unwrap_or_else(|| config.schema_path());
            create_index(&config, &path).await?;
        }
        Commands::Upload { names } => {
            let path = names.unwrap_or_else(|| config.names_path());
            upload(&config, &path).await?;
        }
        Commands::Run {
            setup,
            usage,
            no_render,
        } => {
            if setup {
                create_index(&config, &config.schema_path()).await?;
                upload(&config, &config.names_path()).await?;
            }
            if usage {
                run_experiment(&config, Arc::new(StderrUsageSink)).await?;
            } else {
                run_experiment(&config, Arc::new(NoopUsageSink)).await?;
            }
            if !no_render {
                let store = ReportStore::open(config.reports_dir())?;
                let metrics = read_all_metrics(&store)?;
                let out_dir = config.output_dir();
                write_metrics_json(&metrics, &out_dir.join("metrics.json"))?;
                match ChartSeries::from_metrics(&metrics, &config.experiment.baseline) {
                    Ok(series) => write_chart(&series, &out_dir)?,
                    Err(e) => tracing::warn!(error = %e, "chart not rendered"),
                }
            }
        }
        Commands::Metrics { out } => {
            let store = ReportStore::open(config.reports_dir())?;
            let metrics = read_all_metrics(&store)?;
            let out = out.unwrap_or_else(|| config.output_dir().join("metrics.json"));
            write_metrics_json(&metrics, &out)?;
            for m in sort_by_f1(metrics.values(), true) {
                println!(
                    "{}\tf1={}\tprecision={}\trecall={}",
                    m.name(),
                    fmt_score(m.f1),
                    fmt_score(m.precision),
                    fmt_score(m.recall)
                );
            }
        }
        Commands::Render { out, baseline } => {
            let store = ReportStore::open(config.reports_dir())?;
            let metrics = read_all_metrics(&store)?;
            let baseline = baseline.unwrap_or_else(|| config.experiment.baseline.clone());
            let series = ChartSeries::from_metrics(&metrics, &baseline)?;
            let out = out.unwrap_or_else(|| config.output_dir());
            write_chart(&series, &out)?;
            println!("{} subsets at or above {baseline}", series.rows.len());
        }
        Commands::Best => {
            let store = ReportStore::open(config.reports_dir())?;
            let metrics = read_all_metrics(&store)?;
            match best_subset(metrics.values()) {
                Some(best) => println!("{}\tf1={}", best.name(), fmt_score(best.f1)),
                None => return Err("no subset has a defined F1 score".into()),
            }
        }
        Commands::Subsets { fields } => {
            let fields = fields.unwrap_or_else(|| config.experiment.fields.clone());
            for subset in all_subsets(&fields)? {
                println!("{subset}");
            }
        }
    }

    Ok(())
}

async fn create_index(
    config: &HarnessConfig,
    schema_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(schema_path)?;
    let schema: serde_json::Value = serde_json::from_str(&raw)?;
    let adapter = config.search_adapter()?;
    adapter.create_index(&schema).await?;
    Ok(())
}

async fn upload(
    config: &HarnessConfig,
    names_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let names = load_names(names_path)?;
    let adapter = config.search_adapter()?;
    let summary = adapter
        .upload_documents(&names, &config.experiment.fields)
        .await?;
    tracing::info!(
        documents = summary.documents,
        batches = summary.batches,
        failed = summary.failed,
        "names uploaded"
    );
    if summary.failed > 0 {
        return Err(format!("{} documents were rejected by the index", summary.failed).into());
    }
    Ok(())
}

async fn run_experiment<U: UsageSink>(
    config: &HarnessConfig,
    usage_sink: Arc<U>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = NameDataset::load(config.expected_path(), config.misspelled_path())?;
    let subsets = experiment_plan(&config.experiment.fields, &config.experiment.baseline)?;
    let store = ReportStore::open(config.reports_dir())?;

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, reports = %store.dir().display(), "experiment run");
    let gateway =
        SearchServiceGateway::with_config(config.search_adapter()?, usage_sink, config.gateway_config())
            .with_attribution(Attribution::new("runner::query").with_run(run_id));

    let summary = ExperimentRunner::new(&store)
        .run(&dataset, &subsets, &gateway)
        .await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn fmt_score(score: Option<f64>) -> String {
    match score {
        Some(v) => format!("{v:.4}"),
        None => "undefined".to_string(),
    }
}
