//! spending - Extract, store, and chart cloud spending per region

use chrono::NaiveDate;
use clap::Parser;
use spending::{
    SpendingError,
    chart::ChartRenderer,
    cli::{Cli, Command, FetchArgs, PlotArgs, SummaryArgs},
    error::Result,
    output::render_summary,
    persist::{Persister, RawSnapshotSource, load_table},
    pipeline::Extractor,
    source::CostSource,
};
use spending_provider_aws::CostExplorerSource;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The only place the wall clock is read
fn resolve_as_of(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| chrono::Local::now().date_naive())
}

async fn run_fetch(args: FetchArgs, json: bool) -> Result<()> {
    let as_of = resolve_as_of(args.as_of);
    let plan = args.plan(as_of);

    let source: Arc<dyn CostSource> = match &args.from_raw {
        Some(path) => Arc::new(RawSnapshotSource::load(path)?),
        None => Arc::new(CostExplorerSource::new(args.api_region.clone()).await),
    };
    info!(
        "Running extraction as of {} via {} for {} regions",
        as_of,
        source.name(),
        plan.scopes().len()
    );

    let show_progress = !json && is_terminal::is_terminal(std::io::stdout());
    let extractor =
        Extractor::new(source, Persister::new(&args.data_dir, as_of)).with_progress(show_progress);
    let report = extractor.run(&plan).await?;
    info!(
        "Saved {} observations to {}",
        report.dataset.len(),
        report.table.latest.display()
    );

    // Artifacts are on disk by now; mixed units still fail the run.
    match render_summary(&report.dataset, args.threshold, json) {
        Ok(summary) => println!("{summary}"),
        Err(SpendingError::EmptyDataset) => warn!("No observations returned, nothing to summarize"),
        Err(e) => return Err(e),
    }
    Ok(())
}

fn run_plot(args: PlotArgs) -> Result<()> {
    let as_of = resolve_as_of(args.as_of);
    let dataset = load_table(&args.csv)?;
    let path = ChartRenderer::new(&args.outdir, as_of)
        .with_threshold(args.threshold)
        .render(&dataset)?;
    println!("{}", path.display());
    Ok(())
}

fn run_summary(args: SummaryArgs, json: bool) -> Result<()> {
    let dataset = load_table(&args.csv)?;
    println!("{}", render_summary(&dataset, args.threshold, json)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fetch(args) => run_fetch(args, cli.json).await,
        Command::Plot(args) => run_plot(args),
        Command::Summary(args) => run_summary(args, cli.json),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Quiet by default; RUST_LOG still wins when set.
    let default_filter = if cli.verbose { "spending=info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
