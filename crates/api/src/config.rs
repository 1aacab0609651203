use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Default pacing between generation steps.
const DEFAULT_STEP_DELAY_MS: u64 = 2500;
/// Default bound after which the watchdog force-fails a job.
const DEFAULT_MAX_DURATION_SECS: u64 = 600;
/// Default watchdog tick.
const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 15;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
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
    /// How long shutdown waits for background tasks (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Plan generation pacing and safeguards.
    pub generation: GenerationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `10`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            generation: GenerationConfig::from_env(),
        }
    }
}

/// Tunables for the background advancement of generation jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Delay before each generation step runs.
    pub step_delay: Duration,
    /// Jobs running longer than this are force-failed. `None` disables the
    /// watchdog.
    pub max_duration: Option<Duration>,
    /// How often the watchdog scans active jobs.
    pub watchdog_interval: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
            max_duration: Some(Duration::from_secs(DEFAULT_MAX_DURATION_SECS)),
            watchdog_interval: Duration::from_secs(DEFAULT_WATCHDOG_INTERVAL_SECS),
        }
    }
}

impl GenerationConfig {
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `GENERATION_STEP_DELAY_MS`     | `2500`  |
    /// | `GENERATION_MAX_DURATION_SECS` | `600` (`0` disables) |
    /// | `WATCHDOG_INTERVAL_SECS`       | `15`    |
    pub fn from_env() -> Self {
        let step_delay_ms: u64 = std::env::var("GENERATION_STEP_DELAY_MS")
            .unwrap_or_else(|_| DEFAULT_STEP_DELAY_MS.to_string())
            .parse()
            .expect("GENERATION_STEP_DELAY_MS must be a valid u64");

        let max_duration_secs: u64 = std::env::var("GENERATION_MAX_DURATION_SECS")
            .unwrap_or_else(|_| DEFAULT_MAX_DURATION_SECS.to_string())
            .parse()
            .expect("GENERATION_MAX_DURATION_SECS must be a valid u64");

        let watchdog_interval_secs: u64 = std::env::var("WATCHDOG_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_WATCHDOG_INTERVAL_SECS.to_string())
            .parse()
            .expect("WATCHDOG_INTERVAL_SECS must be a valid u64");

        Self {
            step_delay: Duration::from_millis(step_delay_ms),
            max_duration: (max_duration_secs > 0).then(|| Duration::from_secs(max_duration_secs)),
            watchdog_interval: Duration::from_secs(watchdog_interval_secs.max(1)),
        }
    }
}
