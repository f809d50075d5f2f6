//! Configuration loading from TOML files
//!
//! The binary picks the file with `--config <path>` (default
//! `config/dev.toml`). A missing or invalid file falls back to the built-in
//! demo lot.

use crate::domain::strategy::StrategyKind;
use crate::domain::types::VehicleType;
use crate::services::billing::FeeSchedule;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct LotConfig {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,
}

fn default_strategy() -> StrategyKind {
    StrategyKind::Nearest
}

/// Inclusive run of slot numbers sharing one vehicle type
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlotRangeConfig {
    pub vehicle_type: VehicleType,
    pub first: u32,
    pub last: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FloorConfig {
    pub number: u32,
    #[serde(default = "default_floor_active")]
    pub active: bool,
    #[serde(default)]
    pub slots: Vec<SlotRangeConfig>,
}

fn default_floor_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_base_fee")]
    pub base_fee: u64,
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self { base_fee: default_base_fee(), hourly_rate: default_hourly_rate() }
    }
}

fn default_base_fee() -> u64 {
    10
}

fn default_hourly_rate() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// JSONL ticket journal; absent means in-memory only
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatesConfig {
    #[serde(default = "default_entry_gates")]
    pub entry_gates: u32,
    #[serde(default = "default_gate_queue_size")]
    pub queue_size: usize,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self { entry_gates: default_entry_gates(), queue_size: default_gate_queue_size() }
    }
}

fn default_entry_gates() -> u32 {
    2
}

fn default_gate_queue_size() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub lot: LotConfig,
    #[serde(default)]
    pub floors: Vec<FloorConfig>,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub gates: GatesConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    lot_name: String,
    lot_address: String,
    strategy: StrategyKind,
    floors: Vec<FloorConfig>,
    base_fee: u64,
    hourly_rate: u64,
    store_file: Option<String>,
    metrics_interval_secs: u64,
    entry_gates: u32,
    gate_queue_size: usize,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lot_name: "Sky High Parking".to_string(),
            lot_address: "123 Main Street, Tech City".to_string(),
            strategy: StrategyKind::Nearest,
            floors: Self::default_floors(),
            base_fee: default_base_fee(),
            hourly_rate: default_hourly_rate(),
            store_file: None,
            metrics_interval_secs: default_metrics_interval(),
            entry_gates: default_entry_gates(),
            gate_queue_size: default_gate_queue_size(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Three floors, each: 1-2 motorcycle, 3-6 car, 7-8 truck
    fn default_floors() -> Vec<FloorConfig> {
        (1..=3)
            .map(|number| FloorConfig {
                number,
                active: true,
                slots: vec![
                    SlotRangeConfig { vehicle_type: VehicleType::Motorcycle, first: 1, last: 2 },
                    SlotRangeConfig { vehicle_type: VehicleType::Car, first: 3, last: 6 },
                    SlotRangeConfig { vehicle_type: VehicleType::Truck, first: 7, last: 8 },
                ],
            })
            .collect()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        for floor in &toml_config.floors {
            for range in &floor.slots {
                anyhow::ensure!(
                    range.first <= range.last,
                    "floor {}: slot range {}..={} is empty",
                    floor.number,
                    range.first,
                    range.last
                );
            }
        }

        Ok(Self {
            lot_name: toml_config.lot.name,
            lot_address: toml_config.lot.address,
            strategy: toml_config.lot.strategy,
            floors: toml_config.floors,
            base_fee: toml_config.billing.base_fee,
            hourly_rate: toml_config.billing.hourly_rate,
            store_file: toml_config.store.file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            entry_gates: toml_config.gates.entry_gates,
            gate_queue_size: toml_config.gates.queue_size,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(config_file = %path, error = %format!("{e:#}"), "config_load_failed");
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn lot_name(&self) -> &str {
        &self.lot_name
    }

    pub fn lot_address(&self) -> &str {
        &self.lot_address
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn floors(&self) -> &[FloorConfig] {
        &self.floors
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(self.base_fee, self.hourly_rate)
    }

    pub fn store_file(&self) -> Option<&str> {
        self.store_file.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn entry_gates(&self) -> u32 {
        self.entry_gates
    }

    pub fn gate_queue_size(&self) -> usize {
        self.gate_queue_size
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to switch strategy
    #[cfg(test)]
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }
}
