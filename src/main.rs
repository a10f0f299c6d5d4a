use clap::{Parser, Subcommand};
use hiscores_scraper::constants;
use hiscores_scraper::infra::JsonFileSink;
use hiscores_scraper::logging;
use hiscores_scraper::{Coordinator, ScrapeConfig, ScraperError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "hiscores_scraper")]
#[command(about = "Concurrent scraper for the Old School RuneScape hiscores")]
#[command(version = "0.1.0")]
struct Cli {
    /// Directory for rolling JSON logs
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a page range and write the aggregate to JSON
    Run {
        /// TOML config file (missing file means defaults)
        #[arg(long, default_value = constants::DEFAULT_CONFIG_PATH)]
        config: String,
        /// First page (inclusive)
        #[arg(long)]
        start: Option<u32>,
        /// Last page (inclusive)
        #[arg(long)]
        end: Option<u32>,
        /// Skill table index (0 = overall)
        #[arg(long)]
        table: Option<u32>,
        /// Maximum pages in flight
        #[arg(long)]
        max_concurrency: Option<usize>,
        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Where the JSON batch is written
        #[arg(long)]
        output_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&cli.log_dir);

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            table,
            max_concurrency,
            timeout_secs,
            output_dir,
        } => {
            let mut config = ScrapeConfig::load(&config)?;
            config.apply_env()?;
            if let Some(v) = start {
                config.start_page = v;
            }
            if let Some(v) = end {
                config.end_page = v;
            }
            if let Some(v) = table {
                config.table = v;
            }
            if let Some(v) = max_concurrency {
                config.max_concurrency = v;
            }
            if let Some(v) = timeout_secs {
                config.request_timeout_secs = v;
            }
            if let Some(v) = output_dir {
                config.output_dir = v;
            }

            let sink = Arc::new(JsonFileSink::new(&config.output_dir));
            let mut coordinator = Coordinator::with_reqwest(&config, sink)?;

            let cancel = coordinator.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    cancel.cancel();
                }
            });

            let started = Instant::now();
            match coordinator.run(config.pages()).await {
                Ok(report) => {
                    info!(
                        "It took {:?} to retrieve {} records from {} pages",
                        started.elapsed(),
                        report.records,
                        report.pages_total
                    );
                    for failure in &report.failures {
                        warn!("Page {} failed: {}", failure.page, failure.error);
                    }
                }
                Err(e) => {
                    if let ScraperError::Sink { report, .. } = &e {
                        warn!(
                            "Results not saved: {} records from {} pages ({} failed)",
                            report.records, report.pages_succeeded, report.pages_failed
                        );
                    }
                    error!("Run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
