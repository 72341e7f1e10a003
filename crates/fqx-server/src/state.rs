//! # Application State
//!
//! Shared by all request handlers via `Arc`. Planning keeps no state between
//! requests: every `POST /plan` builds its own `Planner` from the configuration
//! held here, with an ensemble built from the request's estimates.

use fqx_core::PlannerConfig;

/// Environment variable overriding the listen address.
pub const LISTEN_ADDR_ENV: &str = "FQX_LISTEN_ADDR";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Applied to every planning request.
    pub planner: PlannerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            planner: PlannerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = lookup(LISTEN_ADDR_ENV).filter(|a| !a.trim().is_empty()) {
            config.listen_addr = addr;
        }
        config
    }
}

pub struct AppState {
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_override() {
        let config = ServerConfig::from_lookup(|key| (key == LISTEN_ADDR_ENV).then(|| "127.0.0.1:9000".to_string()));
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(ServerConfig::from_lookup(|_| None).listen_addr, "0.0.0.0:3000");
        assert_eq!(ServerConfig::from_lookup(|_| Some(" ".to_string())).listen_addr, "0.0.0.0:3000");
    }
}
