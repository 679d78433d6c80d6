//! Validation loop commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, ValidationResult, ValidationStatus};
use crate::output::{
    color_pass, color_score, color_status, format_value, print_heading, print_json, print_rows,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ViolationRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Limit")]
    limit: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "Probe")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Limits")]
    limits: String,
    #[tabled(rename = "Regression")]
    regression: String,
    #[tabled(rename = "Actions")]
    actions: usize,
}

fn print_result(result: &ValidationResult) {
    println!(
        "Timestamp:       {}",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Effectiveness:   {}", color_score(result.effectiveness_score));
    println!(
        "Within limits:   {}",
        color_pass(result.within_thresholds)
    );
    println!(
        "Regression:      {}",
        color_pass(result.regression_results.passed)
    );
    if result.needs_adjustment {
        print_warning("Limits breached; corrective actions were considered");
    }
    if let Some(error) = &result.error {
        println!("Error:           {}", error.red());
    }

    let violations: Vec<ViolationRow> = result
        .threshold_validation
        .violations
        .iter()
        .map(|v| ViolationRow {
            metric: v.metric.clone(),
            current: format_value(v.current),
            limit: format_value(v.limit),
            severity: color_status(&v.severity),
        })
        .collect();
    if !violations.is_empty() {
        println!();
        println!("{}", "Violations".bold());
        print_rows(&violations, "");
    }

    let probes: Vec<ProbeRow> = result
        .regression_results
        .probes
        .iter()
        .map(|p| ProbeRow {
            name: p.name.clone(),
            result: color_pass(p.passed),
            detail: p.detail.clone(),
        })
        .collect();
    if !probes.is_empty() {
        println!();
        println!("{}", "Regression Probes".bold());
        print_rows(&probes, "");
    }

    if !result.actions_triggered.is_empty() {
        println!();
        println!("{}", "Corrective Actions".bold());
        for record in &result.actions_triggered {
            let outcome = if record.success {
                "success".green()
            } else {
                "failed".red()
            };
            println!("  {:<22} {}", record.action_type, outcome);
        }
    }
}

/// Run one validation cycle now
pub async fn run(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: ValidationResult = client.post("validation/run", &()).await?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            print_heading("Validation Result", 60);
            print_result(&result);
            Ok(())
        }
    }
}

/// Show the latest validation result and recent history
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: ValidationStatus = client.get("validation/status").await?;

    if format == OutputFormat::Json {
        return print_json(&status);
    }

    print_heading("Validation Status", 60);
    println!("Strategy:        {}", color_status(&status.strategy));
    println!("Probes:          {}", status.probes.join(", "));
    println!();

    match &status.latest {
        Some(latest) => print_result(latest),
        None => print_warning("No validation cycle has completed yet"),
    }

    if !status.recent.is_empty() {
        println!();
        println!("{}", "Recent Cycles".bold());
        let rows: Vec<HistoryRow> = status
            .recent
            .iter()
            .map(|r| HistoryRow {
                time: r.timestamp.format("%H:%M:%S").to_string(),
                score: color_score(r.effectiveness_score),
                limits: color_pass(r.within_thresholds),
                regression: color_pass(r.regression_results.passed),
                actions: r.actions_triggered.len(),
            })
            .collect();
        print_rows(&rows, "");
    }

    Ok(())
}
