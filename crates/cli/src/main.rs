//! perfctl - command-line client for the perf-monitor service
//!
//! Queries status and reports, manages alert thresholds, switches the
//! optimization strategy and drives the validation loop.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{optimize, status, thresholds, validation};

/// Adaptive Performance Engine CLI
#[derive(Parser)]
#[command(name = "perfctl")]
#[command(author, version, about = "CLI for the Adaptive Performance Engine", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via PERF_API_URL env var)
    #[arg(long, env = "PERF_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the configured format, then table)
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show monitor status
    Status,

    /// Show a performance report
    Report {
        /// Restrict the report to one operation type
        #[arg(long, short)]
        operation: Option<String>,

        /// Report window in minutes
        #[arg(long, short, default_value_t = 60)]
        window: u64,
    },

    /// Manage alert thresholds
    #[command(subcommand)]
    Thresholds(ThresholdCommands),

    /// Show or change the optimization strategy
    #[command(subcommand)]
    Strategy(StrategyCommands),

    /// Trigger optimizations and list opportunities
    #[command(subcommand)]
    Optimize(OptimizeCommands),

    /// Show recent optimization executions and fired alerts
    Alerts {
        /// Maximum number of entries
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Only entries from the last N hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },

    /// Run or inspect the validation loop
    #[command(subcommand)]
    Validation(ValidationCommands),

    /// Store CLI defaults in ~/.config/perfctl/config.json
    Config {
        /// API endpoint URL to store
        #[arg(long)]
        set_api_url: Option<String>,

        /// Output format to store
        #[arg(long)]
        set_format: Option<output::OutputFormat>,
    },
}

#[derive(Subcommand)]
pub enum ThresholdCommands {
    /// List registered thresholds
    List,

    /// Register or replace a threshold
    Set {
        /// Metric name (e.g. cpu_percent, memory_percent, response_time)
        metric: String,

        /// Warning level
        #[arg(long)]
        warning: f64,

        /// Critical level
        #[arg(long)]
        critical: f64,

        /// Evaluation window in minutes
        #[arg(long, default_value_t = 5)]
        window: u64,

        /// Consecutive violating samples before an alert fires
        #[arg(long, default_value_t = 3)]
        consecutive: u32,
    },

    /// Delete the threshold for a metric
    Delete {
        /// Metric name
        metric: String,
    },
}

#[derive(Subcommand)]
pub enum StrategyCommands {
    /// Show the active strategy and learned rates
    Get,

    /// Set the strategy (conservative, balanced, aggressive, adaptive)
    Set {
        /// Strategy name
        strategy: String,
    },
}

#[derive(Subcommand)]
pub enum OptimizeCommands {
    /// Trigger an action, or an automatic pass when none is given
    Trigger {
        /// Action type (e.g. memory_cleanup)
        action: Option<String>,
    },

    /// List actions whose conditions hold now
    Opportunities,
}

#[derive(Subcommand)]
pub enum ValidationCommands {
    /// Run one validation cycle now
    Run,

    /// Show the latest result and recent history
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = config::Config::load()?;

    if let Commands::Config {
        set_api_url,
        set_format,
    } = &cli.command
    {
        if let Some(url) = set_api_url {
            url::Url::parse(url)?;
            settings.api_url = Some(url.clone());
        }
        if set_format.is_some() {
            settings.default_format = *set_format;
        }
        settings.save()?;
        output::print_success(&format!(
            "Configuration saved to {}",
            config::Config::config_path()?.display()
        ));
        return Ok(());
    }

    let format = cli.format.or(settings.default_format).unwrap_or_default();
    let client = client::ApiClient::new(&settings.resolve_api_url(cli.api_url.as_deref()))?;

    match cli.command {
        Commands::Status => status::show_status(&client, format).await?,
        Commands::Report { operation, window } => {
            status::show_report(&client, operation, window, format).await?
        }
        Commands::Thresholds(cmd) => match cmd {
            ThresholdCommands::List => thresholds::list_thresholds(&client, format).await?,
            ThresholdCommands::Set {
                metric,
                warning,
                critical,
                window,
                consecutive,
            } => {
                let threshold = client::Threshold {
                    metric_name: metric,
                    warning_threshold: warning,
                    critical_threshold: critical,
                    window_minutes: window,
                    consecutive_violations: consecutive,
                };
                thresholds::set_threshold(&client, threshold, format).await?
            }
            ThresholdCommands::Delete { metric } => {
                thresholds::delete_threshold(&client, &metric, format).await?
            }
        },
        Commands::Strategy(cmd) => match cmd {
            StrategyCommands::Get => optimize::get_strategy(&client, format).await?,
            StrategyCommands::Set { strategy } => {
                optimize::set_strategy(&client, &strategy, format).await?
            }
        },
        Commands::Optimize(cmd) => match cmd {
            OptimizeCommands::Trigger { action } => {
                optimize::trigger(&client, action, format).await?
            }
            OptimizeCommands::Opportunities => {
                optimize::show_opportunities(&client, format).await?
            }
        },
        Commands::Alerts { limit, hours } => {
            thresholds::show_alerts(&client, limit, hours, format).await?
        }
        Commands::Validation(cmd) => match cmd {
            ValidationCommands::Run => validation::run(&client, format).await?,
            ValidationCommands::Status => validation::show_status(&client, format).await?,
        },
        Commands::Config { .. } => {}
    }

    Ok(())
}
