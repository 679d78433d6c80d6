//! Threshold and alert commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{AlertHistory, ApiClient, DeletedThreshold, Threshold};
use crate::output::{
    color_status, format_value, print_json, print_rows, print_success, OutputFormat,
};

#[derive(Tabled)]
struct ThresholdRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Warning")]
    warning: String,
    #[tabled(rename = "Critical")]
    critical: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Consecutive")]
    consecutive: u32,
}

impl From<&Threshold> for ThresholdRow {
    fn from(t: &Threshold) -> Self {
        Self {
            metric: t.metric_name.clone(),
            warning: format_value(t.warning_threshold),
            critical: format_value(t.critical_threshold),
            window: format!("{}m", t.window_minutes),
            consecutive: t.consecutive_violations,
        }
    }
}

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
}

#[derive(Tabled)]
struct ExecutionRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

/// List registered thresholds
pub async fn list_thresholds(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let mut thresholds: Vec<Threshold> = client.get("thresholds").await?;
    thresholds.sort_by(|a, b| a.metric_name.cmp(&b.metric_name));

    match format {
        OutputFormat::Json => print_json(&thresholds),
        OutputFormat::Table => {
            let rows: Vec<ThresholdRow> = thresholds.iter().map(ThresholdRow::from).collect();
            print_rows(&rows, "No thresholds registered");
            Ok(())
        }
    }
}

/// Register or replace a threshold
pub async fn set_threshold(
    client: &ApiClient,
    threshold: Threshold,
    format: OutputFormat,
) -> Result<()> {
    let registered: Threshold = client.post("thresholds", &threshold).await?;

    match format {
        OutputFormat::Json => print_json(&registered),
        OutputFormat::Table => {
            print_success(&format!(
                "Threshold for {} set (warning {}, critical {})",
                registered.metric_name,
                format_value(registered.warning_threshold),
                format_value(registered.critical_threshold)
            ));
            Ok(())
        }
    }
}

/// Remove the threshold for a metric
pub async fn delete_threshold(
    client: &ApiClient,
    metric_name: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("thresholds/{}", metric_name);
    let response: DeletedThreshold = client.delete(&path).await?;

    match format {
        OutputFormat::Json => print_json(&response.deleted),
        OutputFormat::Table => {
            print_success(&format!(
                "Threshold for {} deleted",
                response.deleted.metric_name
            ));
            Ok(())
        }
    }
}

/// Show recent alerts
pub async fn show_alerts(
    client: &ApiClient,
    limit: usize,
    hours: u64,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("alerts/history?limit={}&hours={}", limit, hours);
    let history: AlertHistory = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&history),
        OutputFormat::Table => {
            let executions: Vec<ExecutionRow> = history
                .history
                .iter()
                .map(|record| ExecutionRow {
                    time: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    action: record.action_type.clone(),
                    result: if record.success {
                        "success".green().to_string()
                    } else {
                        "failed".red().to_string()
                    },
                    duration: format!("{:.1}ms", record.duration_ms),
                })
                .collect();
            println!("{}", "Optimizations".bold());
            print_rows(
                &executions,
                &format!("No optimizations in the last {} hours", hours),
            );

            println!();
            println!("{}", "Alerts".bold());
            let rows: Vec<AlertRow> = history
                .alerts
                .iter()
                .map(|alert| AlertRow {
                    time: alert.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    metric: alert.metric_name.clone(),
                    severity: color_status(&alert.severity),
                    value: format_value(alert.current),
                    threshold: format_value(alert.threshold),
                })
                .collect();
            print_rows(&rows, &format!("No alerts in the last {} hours", hours));
            Ok(())
        }
    }
}
