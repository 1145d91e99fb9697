use std::str::FromStr;

/// A configuration variable that is present but unparseable.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected} (got {value:?})")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for each background task (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Seconds between progress simulation steps; `0` disables it (default: `10`).
    pub simulation_interval_secs: u64,
    /// Include the job name in `update_job_progress` deltas (default: `false`).
    pub hub_echo_names: bool,
    /// Start with the eight sample jobs instead of an empty list (default: `true`).
    pub seed_sample_jobs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            simulation_interval_secs: 10,
            hub_echo_names: false,
            seed_sample_jobs: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
    /// | `SIMULATION_INTERVAL_SECS` | `10`                    |
    /// | `HUB_ECHO_NAMES`           | `false`                 |
    /// | `SEED_SAMPLE_JOBS`         | `true`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = std::env::var("HOST").unwrap_or(defaults.host);

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(raw) => parse_origins(&raw),
            Err(_) => defaults.cors_origins,
        };

        Ok(Self {
            host,
            port: env_or("PORT", "u16", defaults.port)?,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", "u64", defaults.request_timeout_secs)?,
            shutdown_timeout_secs: env_or(
                "SHUTDOWN_TIMEOUT_SECS",
                "u64",
                defaults.shutdown_timeout_secs,
            )?,
            simulation_interval_secs: env_or(
                "SIMULATION_INTERVAL_SECS",
                "u64",
                defaults.simulation_interval_secs,
            )?,
            hub_echo_names: env_or("HUB_ECHO_NAMES", "bool", defaults.hub_echo_names)?,
            seed_sample_jobs: env_or("SEED_SAMPLE_JOBS", "bool", defaults.seed_sample_jobs)?,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: FromStr>(var: &'static str, expected: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn defaults_match_documented_table() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.simulation_interval_secs, 10);
        assert!(!config.hub_echo_names);
        assert!(config.seed_sample_jobs);
    }

    #[test]
    fn config_error_names_the_variable() {
        let err = ConfigError {
            var: "PORT",
            expected: "u16",
            value: "http".into(),
        };
        assert_eq!(err.to_string(), "PORT must be a valid u16 (got \"http\")");
    }
}
