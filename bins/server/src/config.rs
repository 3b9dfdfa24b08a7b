use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "queue-server", about = "Durable topic-based message queue")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить HTTP + WebSocket сервер
    Serve(ConfigArgs),
    /// Необратимо удалить все данные очереди
    Destroy(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Интервал опроса пустой очереди WS consumer'ом.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[storage]`: имя backend'а + его собственные параметры,
/// которые передаются фабрике как JSON.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(flatten)]
    pub options: toml::Table,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            options: toml::Table::new(),
        }
    }
}

fn default_api_port() -> u16 {
    9200
}
fn default_poll_interval_ms() -> u64 {
    200
}
fn default_backend() -> String {
    "rocksdb".into()
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|detail| ServerError::Config { context: "parse", detail: format!("'{path}': {detail}") })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        if config.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be positive".into());
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl StorageConfig {
    /// Параметры backend'а в JSON для `StorageFactory::open`.
    pub fn options_json(&self) -> Result<String, ServerError> {
        serde_json::to_string(&self.options)
            .map_err(|e| ServerError::Config { context: "storage", detail: e.to_string() })
    }
}
