//! Status and performance report commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{
    ApiClient, MonitorStatus, PerformanceReport, ReportRequest, SystemSample,
};
use crate::output::{
    color_status, format_ms, format_ratio, print_heading, print_json, print_rows, OutputFormat,
};

/// Row for the per-operation report table
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "P95")]
    p95: String,
    #[tabled(rename = "P99")]
    p99: String,
    #[tabled(rename = "Trend")]
    trend: String,
}

/// Row for the optimization history table
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

fn print_system_sample(sample: &SystemSample) {
    println!("CPU:              {:.1}%", sample.cpu_percent);
    println!(
        "Memory:           {:.1}% ({:.0} MB)",
        sample.memory_percent, sample.memory_mb
    );
    println!("Disk:             {:.1}%", sample.disk_usage);
    println!("Processes:        {}", sample.process_count);
    println!(
        "Sampled at:       {}",
        sample
            .timestamp
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed()
    );
}

/// Show monitor status
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: MonitorStatus = client.get("status").await?;

    if format == OutputFormat::Json {
        return print_json(&status);
    }

    print_heading("Monitor Status", 50);
    let active = if status.monitoring_active {
        "running".green()
    } else {
        "stopped".yellow()
    };
    println!("Monitoring:       {}", active);
    println!("Strategy:         {}", color_status(&status.current_strategy));
    println!("Metrics stored:   {}", status.total_metrics);
    println!("Operations:       {}", status.operation_types.join(", "));
    println!("Thresholds:       {}", status.threshold_count);
    println!("Actions:          {}", status.optimization_actions);
    println!("Services:         {}", status.services_integrated);
    println!("Alert callbacks:  {}", status.alert_callbacks);
    println!("Patterns learned: {}", status.patterns_learned);

    if let Some(sample) = &status.current_system_metrics {
        println!();
        print_heading("Host", 50);
        print_system_sample(sample);
    }

    Ok(())
}

/// Show a performance report
pub async fn show_report(
    client: &ApiClient,
    operation_type: Option<String>,
    window_minutes: u64,
    format: OutputFormat,
) -> Result<()> {
    let request = ReportRequest {
        operation_type,
        window_minutes,
    };
    let report: PerformanceReport = client.post("report", &request).await?;

    if format == OutputFormat::Json {
        return print_json(&report);
    }

    print_heading("Performance Report", 60);
    println!(
        "Window: {} minutes   Strategy: {}   Patterns learned: {}",
        report.window_minutes,
        color_status(&report.strategy),
        report.patterns_learned
    );
    println!();

    let rows: Vec<OperationRow> = report
        .operations
        .iter()
        .map(|(name, op)| OperationRow {
            operation: name.clone(),
            count: op.stats.count,
            avg: format_ms(op.stats.avg_ms),
            p95: format_ms(op.stats.p95_ms),
            p99: format_ms(op.stats.p99_ms),
            trend: format!(
                "{:+.2}ms/sample ({} fit)",
                op.trend.trend,
                format_ratio(op.trend.confidence)
            ),
        })
        .collect();
    print_rows(&rows, "No operations recorded in this window");

    if !report.optimization_history.is_empty() {
        println!();
        println!("{}", "Recent Optimizations".bold());
        let rows: Vec<ExecutionRow> = report
            .optimization_history
            .iter()
            .map(|record| ExecutionRow {
                time: record.timestamp.format("%H:%M:%S").to_string(),
                action: record.action_type.clone(),
                result: if record.success {
                    "success".green().to_string()
                } else {
                    record
                        .error
                        .clone()
                        .unwrap_or_else(|| "failed".to_string())
                        .red()
                        .to_string()
                },
                duration: format_ms(record.duration_ms),
            })
            .collect();
        print_rows(&rows, "");
    }

    if let Some(sample) = &report.system_metrics {
        println!();
        print_heading("Host", 60);
        print_system_sample(sample);
    }

    Ok(())
}
