use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::simulation::SeriesSimulatorConfig;
use crate::telemetry::TelemetryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub enable_cors: bool,
    /// Origins allowed when CORS is enabled
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn default_request_timeout_secs() -> u64 { 30 }
fn default_cors_origins() -> Vec<String> { vec!["http://localhost:3000".to_string()] }

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig { pub data_dir: PathBuf }

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Run the periodic refresh loop
    pub auto_refresh: bool,
    pub refresh_seconds: u64,
    /// Fixed seed for reproducible runs (None = entropy)
    #[serde(default)]
    pub random_seed: Option<u64>,
    pub max_panels_per_side: usize,
    #[serde(default = "default_fault_probability")]
    pub fault_probability: f64,
    #[serde(default = "default_hard_fault_share")]
    pub hard_fault_share: f64,
}

fn default_fault_probability() -> f64 { SeriesSimulatorConfig::default().fault_probability }
fn default_hard_fault_share() -> f64 { SeriesSimulatorConfig::default().hard_fault_share }

impl SimulationConfig {
    pub fn series(&self) -> SeriesSimulatorConfig {
        SeriesSimulatorConfig {
            fault_probability: self.fault_probability.clamp(0.0, 1.0),
            hard_fault_share: self.hard_fault_share.clamp(0.0, 1.0),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("SSM__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}
