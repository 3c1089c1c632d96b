use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;

use genie::common::config::GenieConfig;
use genie::common::fsutils::absolute_path;
use genie::common::setup::setup_logging;
use genie::coordinator::{Collaborators, CompletionReport, GenieNode, StepOutcome};
use genie::model::{JobRequest, JobStatus};
use genie::services::{Catalog, JobPersistence, MemoryStore};

#[derive(Parser)]
struct CommonOpts {
    /// Path to the node configuration file
    #[arg(long, global = true, env = "GENIE_CONFIG", value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Enables debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Parser)]
#[command(author, version, about = "Genie job coordination")]
struct RootOptions {
    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Run a job and wait until it finishes
    Run(RunOpts),
    /// Show which cluster and command would run a job
    Resolve(ResolveOpts),
}

#[derive(Parser)]
struct RunOpts {
    /// Job request in TOML
    request: PathBuf,

    /// Clusters, commands and applications in TOML
    #[arg(long)]
    catalog: PathBuf,

    /// Host recorded as the submitter of the job, this host by default
    #[arg(long)]
    client_host: Option<String>,
}

#[derive(Parser)]
struct ResolveOpts {
    /// Job request in TOML
    request: PathBuf,

    /// Clusters, commands and applications in TOML
    #[arg(long)]
    catalog: PathBuf,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<GenieConfig> {
    let mut config = match path {
        Some(path) => GenieConfig::load(&path)
            .with_context(|| format!("Cannot load configuration {}", path.display()))?,
        None => GenieConfig::default(),
    };
    config.working_dir = absolute_path(config.working_dir)?;
    Ok(config)
}

fn load_request(path: &Path) -> anyhow::Result<JobRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job request {}", path.display()))?;
    Ok(JobRequest::parse(&content)?)
}

fn start_node(
    common: CommonOpts,
    catalog: &Path,
    request: &JobRequest,
) -> anyhow::Result<GenieNode> {
    let config = load_config(common.config)?;
    let catalog = Catalog::load(catalog)
        .with_context(|| format!("Cannot load catalog {}", catalog.display()))?;
    let store = Arc::new(MemoryStore::with_catalog(catalog));
    store.create_job_request(request.clone())?;
    Ok(GenieNode::start(config, store.clone(), store, Collaborators::local()))
}

fn print_report(report: &CompletionReport) {
    for (step, outcome) in &report.steps {
        match outcome {
            StepOutcome::Done => println!("  {step}: done"),
            StepOutcome::Skipped(reason) => println!("  {step}: skipped ({reason})"),
            StepOutcome::Failed(reason) => println!("  {step}: failed ({reason})"),
        }
    }
}

async fn command_run(common: CommonOpts, opts: RunOpts) -> anyhow::Result<()> {
    let request = load_request(&opts.request)?;
    let node = start_node(common, &opts.catalog, &request)?;
    let mut completed = node.completion.subscribe(&request.id);

    let client_host = opts
        .client_host
        .unwrap_or_else(|| node.config.hostname.clone());
    let job_id = node.coordinator.coordinate_job(&request, &client_host)?;
    println!("Job {job_id} submitted");

    let report = tokio::select! {
        report = &mut completed => report?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, killing job {job_id}");
            let outcome = node.coordinator.kill_job(&job_id)?;
            log::debug!("Kill of job {job_id}: {outcome:?}");
            completed.await?
        }
    };

    let status = report
        .status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    println!("Job {job_id} finished with status {status}");
    print_report(&report);
    if report.status != Some(JobStatus::Succeeded) {
        bail!("Job {job_id} did not succeed");
    }
    Ok(())
}

async fn command_resolve(common: CommonOpts, opts: ResolveOpts) -> anyhow::Result<()> {
    let request = load_request(&opts.request)?;
    let node = start_node(common, &opts.catalog, &request)?;
    let selection = node.coordinator.select_resources(&request)?;
    let criteria = &selection.chosen_criteria;
    println!(
        "Cluster: {} ({}), criterion #{} {}",
        selection.cluster.id,
        selection.cluster.name,
        criteria.cluster_criterion_index,
        criteria.cluster_criterion
    );
    println!(
        "Command: {} ({}), criterion #{} {}",
        selection.command.id,
        selection.command.name,
        criteria.command_criterion_index,
        criteria.command_criterion
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = RootOptions::parse();
    setup_logging(options.common.verbose);

    let result = match options.subcmd {
        SubCommand::Run(opts) => command_run(options.common, opts).await,
        SubCommand::Resolve(opts) => command_resolve(options.common, opts).await,
    };

    if let Err(error) = result {
        log::error!("{error:?}");
        std::process::exit(1);
    }
    Ok(())
}
