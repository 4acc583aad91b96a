use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use esdiag_analysis::DiagnosticSession;
use esdiag_bundle::{
    load_demo, open_store, BundleIngestor, IngestConfig, Ingestion, KeyValueStore, ParsedBundle,
    SecondaryPass, SecondaryReport, StoreBackend, ALIASES_KEY, INDEX_TEMPLATES_KEY,
};
use report::{
    render_json, render_markdown, render_policy_comparison, render_policy_lookup, ReportOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

mod report;

#[derive(Parser)]
#[command(name = "esdiag")]
#[command(about = "Inspect Elasticsearch diagnostic bundles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with ingestion settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for best-effort persisted lookups (overrides ESDIAG_STORE_DIR)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Store backend: file|memory (overrides ESDIAG_STORE_BACKEND)
    #[arg(long, global = true)]
    store_backend: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a diagnostic bundle ZIP and print a report
    Inspect(InspectArgs),

    /// Load the static demo documents from a directory and print a report
    Demo(DemoArgs),

    /// Print a document persisted by an earlier ingestion
    Lookup(LookupArgs),

    /// Find the ILM policy of an index, or compare two policies
    Policy(PolicyArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Args)]
struct ReportArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Filter searchable sections (pipelines, segments, shards, policies,
    /// index settings, transforms, ML jobs)
    #[arg(long)]
    search: Option<String>,

    /// Page of unassigned shards to show (1-based)
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to the diagnostic bundle
    bundle: PathBuf,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Args)]
struct DemoArgs {
    /// Directory holding the demo JSON documents
    dir: PathBuf,

    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LookupKey {
    #[value(name = "index_templates")]
    IndexTemplates,
    Aliases,
}

impl LookupKey {
    fn store_key(self) -> &'static str {
        match self {
            Self::IndexTemplates => INDEX_TEMPLATES_KEY,
            Self::Aliases => ALIASES_KEY,
        }
    }
}

#[derive(Args)]
struct LookupArgs {
    #[arg(value_enum)]
    key: LookupKey,
}

#[derive(Args)]
#[command(group(ArgGroup::new("query").required(true).args(["index", "compare"])))]
struct PolicyArgs {
    /// Path to the diagnostic bundle
    bundle: PathBuf,

    /// Index whose policy to show
    #[arg(long)]
    index: Option<String>,

    /// Two policy names to compare phase by phase
    #[arg(long, num_args = 2, value_names = ["LEFT", "RIGHT"])]
    compare: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Inspect(args) => matches!(args.report.format, OutputFormat::Json),
        Commands::Demo(args) => matches!(args.report.format, OutputFormat::Json),
        Commands::Lookup(_) => true,
        Commands::Policy(_) => false,
    };
    if json_output && !cli.verbose {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = resolve_config(&cli)?;
    let store = open_store(&config).context("Failed to open lookup store")?;

    match cli.command {
        Commands::Inspect(args) => run_inspect(args, config, store).await?,
        Commands::Demo(args) => run_demo(args, store)?,
        Commands::Lookup(args) => run_lookup(args, store)?,
        Commands::Policy(args) => run_policy(args, config, store)?,
    }

    Ok(())
}

/// Defaults, then the TOML file, then environment, then flags
fn resolve_config(cli: &Cli) -> Result<IngestConfig> {
    let mut config = match &cli.config {
        Some(path) => IngestConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => IngestConfig::default(),
    };
    config = config.with_env_overrides()?;
    if let Some(dir) = &cli.store_dir {
        config.store_dir = dir.clone();
    }
    if let Some(backend) = &cli.store_backend {
        config.store_backend = StoreBackend::parse(backend)?;
    }
    config.validate()?;
    log::debug!(
        "Store backend {} at {}",
        config.store_backend.as_str(),
        config.store_dir.display()
    );
    Ok(config)
}

fn report_options(args: &ReportArgs) -> ReportOptions {
    ReportOptions {
        search: args.search.clone(),
        page: args.page,
    }
}

fn print_report(bundle: &ParsedBundle, args: &ReportArgs) -> Result<()> {
    let session = DiagnosticSession::from_bundle(bundle);
    let options = report_options(args);
    match args.format {
        OutputFormat::Markdown => {
            if let Some(advisory) = session.advisory() {
                eprintln!("{advisory}");
            }
            print!("{}", render_markdown(bundle, &session, &options));
        }
        OutputFormat::Json => println!("{}", render_json(bundle, &session, &options)?),
    }
    Ok(())
}

fn spawn_secondary(pass: SecondaryPass) -> Option<JoinHandle<SecondaryReport>> {
    if pass.pending() == 0 {
        return None;
    }
    Some(tokio::task::spawn_blocking(move || pass.run()))
}

fn ingest(path: &Path, config: IngestConfig, store: Arc<dyn KeyValueStore>) -> Result<Ingestion> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    BundleIngestor::new(config, store)
        .ingest_bytes(bytes)
        .with_context(|| format!("Failed to open {}", path.display()))
}

async fn run_inspect(
    args: InspectArgs,
    config: IngestConfig,
    store: Arc<dyn KeyValueStore>,
) -> Result<()> {
    let ingestion = ingest(&args.bundle, config, store)?;

    // The report never waits on the secondary pass.
    let secondary = spawn_secondary(ingestion.secondary);
    print_report(&ingestion.bundle, &args.report)?;

    if let Some(handle) = secondary {
        match handle.await {
            Ok(report) => {
                for (kind, outcome) in &report.persisted {
                    log::debug!("{kind}: {outcome:?}");
                }
                for failure in &report.skipped {
                    log::debug!("Skipped optional file {failure}");
                }
            }
            Err(err) => log::warn!("Secondary pass did not finish: {err}"),
        }
    }
    Ok(())
}

fn run_demo(args: DemoArgs, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let load = load_demo(&args.dir, store.as_ref())
        .with_context(|| format!("Demo data unavailable in {}", args.dir.display()))?;
    for (kind, outcome) in load.degraded() {
        log::warn!("{kind} not available for lookup: {outcome:?}");
    }
    print_report(&load.bundle, &args.report)
}

fn run_lookup(args: LookupArgs, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let key = args.key.store_key();
    match store.get(key)? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => bail!("No {key} stored; run `esdiag inspect` on a bundle that contains them"),
    }
    Ok(())
}

fn run_policy(args: PolicyArgs, config: IngestConfig, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let ingestion = ingest(&args.bundle, config, store)?;
    log::debug!(
        "Skipping {} optional documents for policy lookup",
        ingestion.secondary.pending()
    );
    let session = DiagnosticSession::from_bundle(&ingestion.bundle);
    let policies = session.ilm_policies()?;

    let output = match (&args.index, args.compare.as_deref()) {
        (Some(index), _) => render_policy_lookup(policies, index)?,
        (None, Some([left, right])) => render_policy_comparison(policies, left, right)?,
        _ => bail!("Pass --index or --compare"),
    };
    print!("{output}");
    Ok(())
}
