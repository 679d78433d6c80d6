//! Host-level metric sources
//!
//! The collector reads OS counters through [`SystemMetricsSource`] so tests
//! and embedders can substitute their own readings.

use crate::error::MonitorError;
use crate::models::SystemSample;
use async_trait::async_trait;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};

/// Trait for reading host resource counters
#[async_trait]
pub trait SystemMetricsSource: Send + Sync {
    /// Read the current host counters
    async fn sample(&self) -> Result<SystemSample>;
}

/// Reads host counters with `sysinfo`
pub struct SysinfoSource {
    system: Arc<Mutex<System>>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new_all())),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemMetricsSource for SysinfoSource {
    async fn sample(&self) -> Result<SystemSample> {
        let system = Arc::clone(&self.system);

        tokio::task::spawn_blocking(move || {
            let mut system = system.lock().unwrap_or_else(PoisonError::into_inner);
            read_system(&mut system)
        })
        .await
        .context("system sampling task panicked")?
        .map_err(anyhow::Error::from)
    }
}

fn read_system(system: &mut System) -> crate::Result<SystemSample> {
    system.refresh_cpu();
    system.refresh_memory();
    system.refresh_disks_list();
    system.refresh_disks();
    system.refresh_networks_list();
    system.refresh_networks();
    system.refresh_processes();

    let total_memory = system.total_memory();
    if total_memory == 0 {
        return Err(MonitorError::Collection(
            "host reported zero total memory".to_string(),
        ));
    }
    let used_memory = system.used_memory();
    let memory_percent = used_memory as f64 / total_memory as f64 * 100.0;

    let (disk_total, disk_available) = system.disks().iter().fold((0u64, 0u64), |acc, disk| {
        (acc.0 + disk.total_space(), acc.1 + disk.available_space())
    });
    let disk_usage = if disk_total > 0 {
        disk_total.saturating_sub(disk_available) as f64 / disk_total as f64 * 100.0
    } else {
        0.0
    };

    let network_io = system
        .networks()
        .iter()
        .map(|(_, data)| data.total_received() + data.total_transmitted())
        .sum();

    Ok(SystemSample {
        timestamp: Utc::now(),
        cpu_percent: system.global_cpu_info().cpu_usage() as f64,
        memory_percent,
        memory_mb: used_memory as f64 / (1024.0 * 1024.0),
        disk_usage,
        network_io,
        process_count: system.processes().len(),
    })
}

/// Fixed readings, useful for embedding without OS access
pub struct StaticSource {
    sample: Mutex<SystemSample>,
}

impl StaticSource {
    pub fn new(sample: SystemSample) -> Self {
        Self {
            sample: Mutex::new(sample),
        }
    }

    /// Replace the reading returned by subsequent samples
    pub fn set(&self, sample: SystemSample) {
        *self.sample.lock().unwrap_or_else(PoisonError::into_inner) = sample;
    }
}

#[async_trait]
impl SystemMetricsSource for StaticSource {
    async fn sample(&self) -> Result<SystemSample> {
        let mut sample = self
            .sample
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        sample.timestamp = Utc::now();
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sysinfo_source_reads_host() {
        let source = SysinfoSource::new();
        let sample = source.sample().await.unwrap();

        assert!(sample.memory_percent >= 0.0 && sample.memory_percent <= 100.0);
        assert!(sample.disk_usage >= 0.0 && sample.disk_usage <= 100.0);
        assert!(sample.process_count > 0);
    }

    #[tokio::test]
    async fn test_static_source_returns_configured_sample() {
        let source = StaticSource::new(SystemSample {
            cpu_percent: 12.5,
            ..Default::default()
        });
        assert_eq!(source.sample().await.unwrap().cpu_percent, 12.5);

        source.set(SystemSample {
            cpu_percent: 90.0,
            ..Default::default()
        });
        assert_eq!(source.sample().await.unwrap().cpu_percent, 90.0);
    }
}
