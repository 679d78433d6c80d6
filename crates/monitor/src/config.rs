//! Monitor configuration

use anyhow::Result;
use perf_engine::collector::CollectorConfig;
use perf_engine::monitor::MonitorConfig;
use perf_engine::validation::{IntegratorConfig, ValidationLimits};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor configuration, read from `PERF_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Control plane port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Background sampling period in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Validation loop period in seconds
    #[serde(default = "default_validation_interval")]
    pub validation_interval_secs: u64,

    /// Capacity of the operation and host sample buffers
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Run automatic optimization after each background sample
    #[serde(default = "default_true")]
    pub auto_optimize: bool,

    /// Register cpu, memory and response time thresholds at startup
    #[serde(default = "default_true")]
    pub default_thresholds: bool,

    /// Directory for per-cycle validation reports
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: f64,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: f64,

    #[serde(default = "default_response_time_limit")]
    pub response_time_limit_ms: f64,

    #[serde(default = "default_cache_hit_rate_min")]
    pub cache_hit_rate_min: f64,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_sample_interval() -> u64 {
    30
}

fn default_validation_interval() -> u64 {
    300
}

fn default_max_samples() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_cpu_limit() -> f64 {
    80.0
}

fn default_memory_limit() -> f64 {
    85.0
}

fn default_response_time_limit() -> f64 {
    2000.0
}

fn default_cache_hit_rate_min() -> f64 {
    0.7
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            sample_interval_secs: default_sample_interval(),
            validation_interval_secs: default_validation_interval(),
            max_samples: default_max_samples(),
            auto_optimize: default_true(),
            default_thresholds: default_true(),
            report_dir: None,
            cpu_limit: default_cpu_limit(),
            memory_limit: default_memory_limit(),
            response_time_limit_ms: default_response_time_limit(),
            cache_hit_rate_min: default_cache_hit_rate_min(),
        }
    }
}

impl MonitorSettings {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("PERF"))
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("PERF").source(Some(vars)))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_samples: self.max_samples,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            sample_interval: Duration::from_secs(self.sample_interval_secs),
            auto_optimize: self.auto_optimize,
        }
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            cpu_percent: self.cpu_limit,
            memory_percent: self.memory_limit,
            response_time_ms: self.response_time_limit_ms,
            cache_hit_rate_min: self.cache_hit_rate_min,
        }
    }

    pub fn integrator_config(&self) -> IntegratorConfig {
        IntegratorConfig {
            interval: Duration::from_secs(self.validation_interval_secs),
            limits: self.validation_limits(),
            report_dir: self.report_dir.clone(),
        }
    }
}
