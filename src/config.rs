// src/config.rs
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

// --- Configuration & Constants ---

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,

    // TLS is enabled only when both paths are present
    pub cert_path: Option<String>,
    pub key_path: Option<String>,

    // JSON snapshot of users, hours, holidays and settings
    pub data_file: Option<PathBuf>,
    pub bootstrap_superuser_email: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::from_env::<AppConfig>()
    }

    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(host) = &cli.host {
            self.server_host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
        if let Some(data_file) = &cli.data_file {
            self.data_file = Some(data_file.clone());
        }
        self
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Command-line overrides for the environment configuration.
#[derive(Debug, Default, Parser)]
#[command(name = "hours-tracker", about = "Work-hours calendar and payroll service")]
pub struct Cli {
    /// Address to bind (overrides SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,
    /// Port to bind (overrides SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,
    /// JSON data file (overrides DATA_FILE)
    #[arg(long)]
    pub data_file: Option<PathBuf>,
}
