//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup. A `.env` file is honored for local development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which durable store backs the cache and local joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store, for development and tests
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    /// JWT signing key for viewer sessions (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Season / event network ---
    /// Relay base URLs
    pub relay_urls: Vec<String>,
    /// Path to the season data file (roster + baselines)
    pub season_data_path: String,
    /// Wall-clock bound on one record fetch
    pub fetch_timeout: Duration,
    /// Per-relay connection timeout
    pub relay_connect_timeout: Duration,
    /// Durable cache TTL in seconds
    pub cache_ttl_secs: u64,
    /// Result-count cap sent with each subscription
    pub fetch_result_limit: usize,
    /// Event kind carrying workout records
    pub workout_event_kind: u32,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            relay_urls: Vec::new(),
            season_data_path: "data/season.json".to_string(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            relay_connect_timeout: Duration::from_millis(DEFAULT_RELAY_CONNECT_TIMEOUT_MS),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            fetch_result_limit: DEFAULT_FETCH_RESULT_LIMIT,
            workout_event_kind: DEFAULT_WORKOUT_EVENT_KIND,
        }
    }
}

const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RELAY_CONNECT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_FETCH_RESULT_LIMIT: usize = 5_000;
const DEFAULT_WORKOUT_EVENT_KIND: u32 = 1301;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            _ => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            store_backend,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            relay_urls: env::var("RELAY_URLS")
                .map(|v| parse_relay_urls(&v))
                .unwrap_or_default(),
            season_data_path: env::var("SEASON_DATA_PATH")
                .unwrap_or_else(|_| "data/season.json".to_string()),
            fetch_timeout: Duration::from_millis(parse_or(
                "FETCH_TIMEOUT_MS",
                DEFAULT_FETCH_TIMEOUT_MS,
            )?),
            relay_connect_timeout: Duration::from_millis(parse_or(
                "RELAY_CONNECT_TIMEOUT_MS",
                DEFAULT_RELAY_CONNECT_TIMEOUT_MS,
            )?),
            cache_ttl_secs: parse_or("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            fetch_result_limit: parse_or("FETCH_RESULT_LIMIT", DEFAULT_FETCH_RESULT_LIMIT)?,
            workout_event_kind: parse_or("WORKOUT_EVENT_KIND", DEFAULT_WORKOUT_EVENT_KIND)?,
        })
    }
}

/// Read an optional numeric variable, rejecting values that do not parse.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Split a comma-separated relay list, dropping blanks and trailing slashes.
fn parse_relay_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
