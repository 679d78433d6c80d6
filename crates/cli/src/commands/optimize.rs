//! Strategy and optimization commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{
    ApiClient, Opportunities, StrategyInfo, StrategyRequest, TriggerRequest, TriggerResponse,
};
use crate::output::{
    color_status, format_value, print_heading, print_info, print_json, print_rows, print_success,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct LearningRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Learning Rate")]
    learning_rate: String,
}

#[derive(Tabled)]
struct OpportunityRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "Learning Rate")]
    learning_rate: String,
    #[tabled(rename = "Cooldown")]
    cooldown: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn print_strategy(info: &StrategyInfo) {
    print_heading("Optimization Strategy", 40);
    println!("Strategy:         {}", color_status(&info.strategy));
    println!("Patterns learned: {}", info.patterns_learned);

    if !info.learning_rates.is_empty() {
        println!();
        let rows: Vec<LearningRow> = info
            .learning_rates
            .iter()
            .map(|(action, rate)| LearningRow {
                action: action.clone(),
                learning_rate: format!("{:.4}", rate),
            })
            .collect();
        print_rows(&rows, "");
    }
}

/// Show the active strategy and learned rates
pub async fn get_strategy(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info: StrategyInfo = client.get("adaptive/strategy").await?;

    match format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => {
            print_strategy(&info);
            Ok(())
        }
    }
}

/// Switch the optimization strategy
pub async fn set_strategy(client: &ApiClient, strategy: &str, format: OutputFormat) -> Result<()> {
    let request = StrategyRequest {
        strategy: strategy.to_lowercase(),
    };
    let info: StrategyInfo = client.put("adaptive/strategy", &request).await?;

    match format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => {
            print_success(&format!("Strategy set to {}", info.strategy.cyan()));
            Ok(())
        }
    }
}

/// Trigger one action, or an automatic pass when no action is named
pub async fn trigger(
    client: &ApiClient,
    action_type: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let request = TriggerRequest {
        optimization_type: action_type,
    };
    let response: TriggerResponse = client.post("optimization/trigger", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            match &response.optimization_type {
                Some(action) => print_success(&format!("Optimization {} accepted", action.cyan())),
                None => print_success("Automatic optimization pass accepted"),
            }
            print_info("Actions run in the background; check `perfctl report` for outcomes");
            Ok(())
        }
    }
}

/// Show actions whose conditions hold right now
pub async fn show_opportunities(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: Opportunities = client.get("optimization/opportunities").await?;

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    print_heading("Optimization Opportunities", 60);
    println!("Strategy: {}", color_status(&result.strategy));
    println!();

    if result.opportunities.is_empty() {
        print_warning("No actions apply to the current metrics");
    } else {
        let rows: Vec<OpportunityRow> = result
            .opportunities
            .iter()
            .map(|o| OpportunityRow {
                action: o.action.action_type.clone(),
                priority: o.action.priority,
                learning_rate: format!("{:.4}", o.learning_rate),
                cooldown: format!("{:.0}m", o.action.cooldown_minutes),
                description: o.action.description.clone(),
            })
            .collect();
        print_rows(&rows, "");
    }

    if !result.current_metrics.is_empty() {
        println!();
        println!("{}", "Current Metrics".bold());
        for (name, value) in &result.current_metrics {
            println!("  {:<20} {}", name, format_value(*value));
        }
    }

    Ok(())
}
