//! announce-diff CLI
//!
//! Local execution entry point for one-off batches and scheduled jobs.

use std::path::PathBuf;
use std::sync::Arc;

use announce_diff::{
    config::load_config,
    error::{AppError, Result},
    models::{BatchReport, CompareMode, Config, ItemId, Locale, dedup_ids, id_range, parse_batch},
    pipeline::{GitIdentity, GitPublisher, ItemOutcome, Watcher},
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

/// announce-diff - Announcement Change Detector
#[derive(Parser, Debug)]
#[command(
    name = "announce-diff",
    version,
    about = "Detects changes on announcement pages"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Enable verbose logging (also `DEBUG=true`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Values that take precedence over the configuration file.
#[derive(Args, Debug)]
struct Overrides {
    /// Directory holding baselines
    #[arg(short, long, global = true, env = "STORAGE_PATH")]
    storage: Option<PathBuf>,

    /// Maximum requests per second
    #[arg(long, global = true, env = "QPS")]
    qps: Option<u32>,

    /// User-Agent header sent with every request
    #[arg(long, global = true, env = "USER_AGENT")]
    ua: Option<String>,

    /// Site locale (zh or en)
    #[arg(long, global = true)]
    locale: Option<Locale>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and compare a set of items once
    Run {
        /// Item ID, may be repeated
        #[arg(long = "id")]
        ids: Vec<ItemId>,

        /// Comma-separated list of item IDs
        #[arg(long = "ids")]
        batch: Option<String>,

        /// First ID of an inclusive range
        #[arg(long, requires = "to")]
        from: Option<u64>,

        /// Last ID of an inclusive range
        #[arg(long, requires = "from")]
        to: Option<u64>,

        /// Deadline for the whole batch in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Baseline strategy (rich or digest)
        #[arg(long)]
        mode: Option<CompareMode>,
    },

    /// Scheduled run over an ID range, committing changes to git
    Job {
        /// First ID of the range
        #[arg(long, env = "BEGIN_ID")]
        begin_id: u64,

        /// Last ID of the range
        #[arg(long, env = "END_ID")]
        end_id: u64,

        /// Log git commands instead of running them (also `DRY_RUN=true`)
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration and print effective values
    Validate,
}

/// Initialize logging with `level` as the default filter.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Environment toggles are on only for the literal value `true`.
fn is_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim() == "true")
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(storage) = self.storage {
            config.storage.root = storage;
        }
        if let Some(qps) = self.qps {
            config.fetch.qps = qps;
        }
        if let Some(ua) = self.ua.filter(|ua| !ua.trim().is_empty()) {
            config.fetch.user_agent = ua;
        }
        if let Some(locale) = self.locale {
            config.fetch.locale = locale;
        }
    }
}

/// Merge explicit IDs, a comma-separated batch and a range into one list.
fn collect_ids(
    ids: Vec<ItemId>,
    batch: Option<&str>,
    range: Option<(u64, u64)>,
) -> Result<Vec<ItemId>> {
    let mut all = ids;
    if let Some(batch) = batch {
        all.extend(parse_batch(batch)?);
    }
    if let Some((from, to)) = range {
        all.extend(id_range(from, to)?);
    }

    let all = dedup_ids(all);
    if all.is_empty() {
        return Err(AppError::validation(
            "no item IDs given; use --id, --ids or --from/--to",
        ));
    }
    Ok(all)
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        .map_err(|e| AppError::config(format!("invalid progress template: {e}")))?;
    let bar = ProgressBar::new(len as u64);
    bar.set_style(style);
    Ok(bar)
}

async fn run_batch(config: &Config, ids: Vec<ItemId>) -> Result<BatchReport> {
    let bar = progress_bar(ids.len())?;
    let hook_bar = bar.clone();
    let watcher = Watcher::from_config(config)
        .await?
        .with_progress(Arc::new(move |outcome: &ItemOutcome| {
            hook_bar.set_message(outcome.id().to_string());
            hook_bar.inc(1);
        }));

    let report = watcher.run(ids).await;
    bar.finish_and_clear();
    Ok(report)
}

fn log_report(report: &BatchReport) {
    log::info!(
        "total={}, diff_count={}, failures={}",
        report.total,
        report.change_count(),
        report.failures.len()
    );
    for record in &report.records {
        log::info!("{}", record);
    }
    for failure in &report.failures {
        log::debug!("[{}] {:?}: {}", failure.id, failure.kind, failure.message);
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    if cli.verbose {
        config.logging.debug = true;
    }
    init_logging(config.logging.level());

    match cli.command {
        Command::Run {
            ids,
            batch,
            from,
            to,
            timeout_secs,
            mode,
        } => {
            if let Some(timeout_secs) = timeout_secs {
                config.batch.timeout_secs = timeout_secs;
            }
            if let Some(mode) = mode {
                config.storage.mode = mode;
            }

            let ids = collect_ids(ids, batch.as_deref(), from.zip(to))?;
            let report = run_batch(&config, ids).await?;
            log_report(&report);
        }

        Command::Job {
            begin_id,
            end_id,
            dry_run,
        } => {
            let dry_run = dry_run || is_enabled(std::env::var("DRY_RUN").ok().as_deref());
            GitPublisher::ensure_available().await?;

            let ids = id_range(begin_id, end_id)?;
            log::info!("Job over {}..={} ({} items)", begin_id, end_id, ids.len());

            let report = run_batch(&config, ids).await?;
            log_report(&report);

            let publisher = GitPublisher::new(&config.storage.root, dry_run);
            if report.has_changes() {
                publisher.configure_identity(&GitIdentity::from_env()).await?;
            }
            if publisher.publish(&report).await? {
                log::info!("Committed {}", report.summary_title());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            let effective = toml::to_string_pretty(&config)
                .map_err(|e| AppError::config(format!("cannot render config: {e}")))?;
            println!("{effective}");

            log::info!("Config OK");
        }
    }

    Ok(())
}
