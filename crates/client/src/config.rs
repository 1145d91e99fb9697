use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;
use crate::reconnect::ReconnectPolicy;

/// Which backend the client talks to. Chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// In-memory sample data with a local progress simulation.
    Mock,
    /// REST only; no push channel, so the listing is kept fresh by polling.
    Rest,
    /// Commands and pushes over the hub WebSocket; REST for fallback polls.
    Hub,
}

impl FromStr for TransportMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(TransportMode::Mock),
            "rest" | "http" => Ok(TransportMode::Rest),
            "hub" | "ws" | "websocket" => Ok(TransportMode::Hub),
            other => Err(ClientError::Config(format!(
                "JOBDECK_TRANSPORT must be one of mock, rest, hub (got {other:?})"
            ))),
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportMode,
    /// Base REST URL including the version prefix.
    pub api_base_url: String,
    /// Hub WebSocket URL.
    pub hub_url: String,
    /// Per-request timeout for REST calls and hub invocations.
    pub request_timeout: Duration,
    /// How long the channel may be down before fallback polling starts.
    pub poll_grace: Duration,
    /// Interval between fallback polls.
    pub poll_interval: Duration,
    pub reconnect: ReconnectPolicy,
    /// Mock mode: artificial latency per call.
    pub mock_latency: Duration,
    /// Mock mode: interval between simulated progress steps; zero disables.
    pub simulation_interval: Duration,
    /// Mock mode: include job names in simulated deltas.
    pub echo_names: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportMode::Hub,
            api_base_url: "http://localhost:3000/api/v1".into(),
            hub_url: "ws://localhost:3000/api/v1/hub".into(),
            request_timeout: Duration::from_secs(10),
            poll_grace: Duration::from_secs(5),
            poll_interval: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            mock_latency: Duration::from_millis(200),
            simulation_interval: Duration::from_secs(3),
            echo_names: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                          |
    /// |------------------------------------|----------------------------------|
    /// | `JOBDECK_TRANSPORT`                | `hub` (`mock`, `rest`, `hub`)    |
    /// | `JOBDECK_API_URL`                  | `http://localhost:3000/api/v1`   |
    /// | `JOBDECK_HUB_URL`                  | `ws://localhost:3000/api/v1/hub` |
    /// | `JOBDECK_REQUEST_TIMEOUT_SECS`     | `10`                             |
    /// | `JOBDECK_POLL_GRACE_SECS`          | `5`                              |
    /// | `JOBDECK_POLL_INTERVAL_SECS`       | `10`                             |
    /// | `JOBDECK_RECONNECT_DELAYS_MS`      | `0,2000,5000,10000,30000`        |
    /// | `JOBDECK_RECONNECT_MAX_ATTEMPTS`   | `5`                              |
    /// | `JOBDECK_MOCK_LATENCY_MS`          | `200`                            |
    /// | `JOBDECK_SIMULATION_INTERVAL_SECS` | `3` (`0` disables)                |
    /// | `JOBDECK_ECHO_NAMES`               | `false`                          |
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();

        let transport = match std::env::var("JOBDECK_TRANSPORT") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.transport,
        };

        let api_base_url = std::env::var("JOBDECK_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let hub_url = std::env::var("JOBDECK_HUB_URL").unwrap_or(defaults.hub_url);

        let request_timeout = Duration::from_secs(env_parse(
            "JOBDECK_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?);
        let poll_grace = Duration::from_secs(env_parse(
            "JOBDECK_POLL_GRACE_SECS",
            defaults.poll_grace.as_secs(),
        )?);
        let poll_interval = Duration::from_secs(env_parse(
            "JOBDECK_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?);
        if poll_interval.is_zero() {
            return Err(ClientError::Config(
                "JOBDECK_POLL_INTERVAL_SECS must be greater than 0".into(),
            ));
        }

        let delays = match std::env::var("JOBDECK_RECONNECT_DELAYS_MS") {
            Ok(raw) => parse_delays(&raw)?,
            Err(_) => defaults.reconnect.delays.clone(),
        };
        let max_attempts = env_parse(
            "JOBDECK_RECONNECT_MAX_ATTEMPTS",
            defaults.reconnect.max_attempts,
        )?;

        let mock_latency = Duration::from_millis(env_parse(
            "JOBDECK_MOCK_LATENCY_MS",
            defaults.mock_latency.as_millis() as u64,
        )?);
        let simulation_interval = Duration::from_secs(env_parse(
            "JOBDECK_SIMULATION_INTERVAL_SECS",
            defaults.simulation_interval.as_secs(),
        )?);
        let echo_names = env_parse("JOBDECK_ECHO_NAMES", defaults.echo_names)?;

        Ok(Self {
            transport,
            api_base_url,
            hub_url,
            request_timeout,
            poll_grace,
            poll_interval,
            reconnect: ReconnectPolicy::new(delays, max_attempts)?,
            mock_latency,
            simulation_interval,
            echo_names,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ClientError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ClientError::Config(format!("{key} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of millisecond delays.
pub fn parse_delays(raw: &str) -> Result<Vec<Duration>, ClientError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map(Duration::from_millis).map_err(|e| {
                ClientError::Config(format!("JOBDECK_RECONNECT_DELAYS_MS entry {s:?}: {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_mode_parses_aliases() {
        assert_eq!("MOCK".parse::<TransportMode>().unwrap(), TransportMode::Mock);
        assert_eq!("http".parse::<TransportMode>().unwrap(), TransportMode::Rest);
        assert_eq!("ws".parse::<TransportMode>().unwrap(), TransportMode::Hub);
        assert!("carrier-pigeon".parse::<TransportMode>().is_err());
    }

    #[test]
    fn parse_delays_list() {
        let delays = parse_delays("0, 2000,5000 ,").unwrap();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(5)
            ]
        );
        assert!(parse_delays("1,two").is_err());
    }

    #[test]
    fn defaults_match_documented_table() {
        let config = ClientConfig::default();
        assert_eq!(config.transport, TransportMode::Hub);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.delays.len(), 5);
    }
}
