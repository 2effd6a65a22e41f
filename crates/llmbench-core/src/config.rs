use std::time::Duration;

use crate::{BenchError, Result};

#[derive(Debug, Clone, Default)]
pub struct BenchConfig {
    pub ollama: OllamaConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub timeout_secs: Option<u64>,
}

impl OllamaConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl BenchConfig {
    /// Reads `OLLAMA_HOST`, `OLLAMA_TIMEOUT_SECS`, `HOST`, `PORT` and `CORS_ORIGIN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("OLLAMA_HOST") {
            config.ollama.host = normalize_host(&host);
        }
        if let Some(secs) = lookup("OLLAMA_TIMEOUT_SECS") {
            config.ollama.timeout_secs = Some(parse_var("OLLAMA_TIMEOUT_SECS", &secs)?);
        }
        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.server.port = parse_var("PORT", &port)?;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            config.server.cors_origin = origin;
        }

        Ok(config)
    }
}

/// Ollama accepts `OLLAMA_HOST=0.0.0.0:11434`; clients need a scheme.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BenchError::Config(format!("invalid value for {}: {:?}", key, value)))
}
