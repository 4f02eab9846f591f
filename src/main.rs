//! `washcycle`: trigger surface for the scheduling and billing engine.
//!
//! Every command loads the JSON snapshot store, runs one operation, writes
//! the snapshot back and prints the outcome as JSON. The exit code is 1
//! when the outcome is not a success.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;

use washcycle::config::FileConfig;
use washcycle::core::YearMonth;
use washcycle::invoicing::InvoiceGenerator;
use washcycle::jobs::JobGenerator;
use washcycle::memstore::MemoryStore;
use washcycle::month_end::MonthEndCloser;
use washcycle::report::RunReport;
use washcycle::scheduler::{Trigger, run_triggers};

#[derive(Parser)]
#[command(name = "washcycle", version, about = "Recurring car-wash scheduling and billing")]
struct Cli {
    /// Path to washcycle.toml
    #[arg(short, long, env = "WASHCYCLE_CONFIG", default_value = "washcycle.toml")]
    config: PathBuf,

    /// Override the snapshot file from the config
    #[arg(long, env = "WASHCYCLE_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Billing month given as `--month M --year Y`.
#[derive(clap::Args, Clone, Copy)]
struct MonthArgs {
    /// Month (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: u32,
    #[arg(long)]
    year: i32,
}

impl MonthArgs {
    fn year_month(self) -> Result<YearMonth> {
        Ok(YearMonth::new(self.year, self.month)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate wash jobs (tomorrow by default)
    Jobs {
        /// Service-local date to generate for (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate invoices (previous month by default)
    Invoice {
        #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long, requires = "month")]
        year: Option<i32>,
        /// full_subscription or per_wash (defaults to the configured mode)
        #[arg(long)]
        mode: Option<String>,
    },
    /// Report whether invoices already exist for a month
    CheckInvoices(MonthArgs),
    /// Close every pending invoice issued in a month
    Close(MonthArgs),
    /// Revert the month-end close of a month, or one closure batch
    Revert {
        #[arg(long, requires = "year", conflicts_with = "batch", value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long, requires = "month")]
        year: Option<i32>,
        /// Closure batch id
        #[arg(long)]
        batch: Option<u64>,
    },
    /// List months with invoices, newest first
    Months,
    /// Run the daily job and monthly invoice triggers until Ctrl+C
    Daemon,
}

#[derive(Debug, Clone, Copy)]
enum Task {
    Jobs,
    Invoices,
}

/// What a command prints.
struct Output {
    success: bool,
    json: String,
}

impl Output {
    fn report(report: &RunReport) -> Result<Self> {
        Ok(Self {
            success: report.success,
            json: serde_json::to_string_pretty(report)?,
        })
    }

    fn value(value: &impl Serialize) -> Result<Self> {
        Ok(Self {
            success: true,
            json: serde_json::to_string_pretty(value)?,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{}", output.json);
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e:#}");
            if let Ok(json) = serde_json::to_string_pretty(&RunReport::failure(format!("{e:#}"))) {
                println!("{json}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Output> {
    let config = FileConfig::load(&cli.config)?;
    let snapshot = cli.snapshot.unwrap_or_else(|| config.store.snapshot.clone());
    let store = MemoryStore::load(&snapshot)
        .with_context(|| format!("Failed to load store snapshot {}", snapshot.display()))?;
    let actor = config.operator.name.clone();
    let now = Utc::now();

    let output = match cli.command {
        Commands::Jobs { date } => {
            let generator = JobGenerator::new(store.clone()).created_by(&actor);
            let summary = match date {
                Some(date) => generator.run_for_date(date).await?,
                None => generator.run_at(now).await?,
            };
            Output::report(&RunReport::from(&summary))?
        }
        Commands::Invoice { month, year, mode } => {
            let requested = match (month, year) {
                (Some(month), Some(year)) => Some(YearMonth::new(year, month)?),
                _ => None,
            };
            let mode = mode.unwrap_or_else(|| config.invoices.mode.clone());
            let outcome = InvoiceGenerator::new(store.clone())
                .created_by(&actor)
                .run_at(now, requested, &mode)
                .await?;
            Output::report(&RunReport::from(&outcome))?
        }
        Commands::CheckInvoices(args) => {
            let existing = InvoiceGenerator::new(store.clone())
                .check_existing(args.year_month()?)
                .await?;
            Output::report(&RunReport::from(&existing))?
        }
        Commands::Close(args) => {
            let summary = MonthEndCloser::new(store.clone())
                .performed_by(&actor)
                .close(args.year_month()?, now)
                .await?;
            Output::report(&RunReport::from(&summary))?
        }
        Commands::Revert { month, year, batch } => {
            let closer = MonthEndCloser::new(store.clone()).performed_by(&actor);
            let summary = match (batch, month, year) {
                (Some(batch), _, _) => closer.revert_batch(batch, now).await?,
                (None, Some(month), Some(year)) => {
                    closer.revert(YearMonth::new(year, month)?, now).await?
                }
                _ => bail!("revert needs --month and --year, or --batch"),
            };
            Output::report(&RunReport::from(&summary))?
        }
        Commands::Months => {
            let months = MonthEndCloser::new(store.clone()).overview().await?;
            return Output::value(&months);
        }
        Commands::Daemon => {
            daemon(&config, store.clone(), &snapshot).await?;
            return Output::value(&serde_json::json!({ "success": true, "message": "Scheduler stopped" }));
        }
    };

    store
        .save(&snapshot)
        .await
        .with_context(|| format!("Failed to save store snapshot {}", snapshot.display()))?;
    Ok(output)
}

async fn daemon(config: &FileConfig, store: MemoryStore, snapshot: &Path) -> Result<()> {
    let triggers = [
        (
            Task::Jobs,
            Trigger::Daily {
                at: config.jobs_time()?,
            },
        ),
        (
            Task::Invoices,
            Trigger::Monthly {
                day: config.invoices.run_day,
                at: config.invoice_time()?,
            },
        ),
    ];
    let mode = config.invoice_mode()?;
    let actor = config.operator.name.clone();

    run_triggers(&triggers, |task, at| {
        let store = store.clone();
        let actor = actor.clone();
        let snapshot = snapshot.to_path_buf();
        async move {
            if let Err(e) = fire(task, at, &store, &actor, mode.as_str()).await {
                error!("Task {:?} failed: {e:#}", task);
            }
            if let Err(e) = store.save(&snapshot).await {
                error!("Failed to save store snapshot {}: {e}", snapshot.display());
            }
        }
    })
    .await;
    Ok(())
}

async fn fire(
    task: Task,
    at: DateTime<Utc>,
    store: &MemoryStore,
    actor: &str,
    mode: &str,
) -> Result<()> {
    let report = match task {
        Task::Jobs => {
            let summary = JobGenerator::new(store.clone())
                .created_by(actor)
                .run_at(at)
                .await?;
            RunReport::from(&summary)
        }
        Task::Invoices => {
            let outcome = InvoiceGenerator::new(store.clone())
                .created_by(actor)
                .run_at(at, None, mode)
                .await?;
            RunReport::from(&outcome)
        }
    };
    info!("{:?}: {}", task, report.message);
    Ok(())
}
