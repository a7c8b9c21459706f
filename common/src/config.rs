// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the web server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub web_server_addr: String,
    pub log_level: String,

    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub ledger: LedgerConfig,

    // Static file serving configuration
    pub static_files: StaticFilesConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for the session cookie token
    pub secret: String,
    pub ttl_seconds: i64,
    pub cleanup_interval_seconds: u64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// How long an issued challenge stays live
    pub nonce_ttl_seconds: i64,
    /// Addresses that receive the admin role at login
    pub admin_addresses: Vec<String>,
    pub user_landing: String,
    pub admin_landing: String,
    pub challenge_requests_per_minute: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON fixture used to seed the in-memory ledger
    pub fixture_path: Option<String>,
    /// DAO voters present before any admin adds one
    pub initial_voters: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    pub path: String,
    pub index: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            log_level: "info".to_string(),

            session: SessionConfig {
                secret: "dev_session_secret".to_string(),
                ttl_seconds: 1800,
                cleanup_interval_seconds: 300,
                cookie_name: "access_token".to_string(),
                cookie_secure: false,
            },
            auth: AuthConfig {
                nonce_ttl_seconds: 300,
                admin_addresses: Vec::new(),
                user_landing: "/static/register.html".to_string(),
                admin_landing: "/static/admin.html".to_string(),
                challenge_requests_per_minute: 10,
            },
            ledger: LedgerConfig {
                fixture_path: None,
                initial_voters: Vec::new(),
            },
            static_files: StaticFilesConfig {
                path: "./frontend".to_string(),
                index: "index.html".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = Self::default();

        // Build configuration
        let config = ConfigFile::builder()
            // Start with defaults
            .set_default("web_server_addr", defaults.web_server_addr)?
            .set_default("log_level", defaults.log_level)?
            .set_default("session.secret", defaults.session.secret)?
            .set_default("session.ttl_seconds", defaults.session.ttl_seconds)?
            .set_default("session.cleanup_interval_seconds", defaults.session.cleanup_interval_seconds as i64)?
            .set_default("session.cookie_name", defaults.session.cookie_name)?
            .set_default("session.cookie_secure", defaults.session.cookie_secure)?
            .set_default("auth.nonce_ttl_seconds", defaults.auth.nonce_ttl_seconds)?
            .set_default("auth.admin_addresses", Vec::<String>::new())?
            .set_default("auth.user_landing", defaults.auth.user_landing)?
            .set_default("auth.admin_landing", defaults.auth.admin_landing)?
            .set_default("auth.challenge_requests_per_minute", defaults.auth.challenge_requests_per_minute as i64)?
            .set_default("ledger.initial_voters", Vec::<String>::new())?
            .set_default("static_files.path", defaults.static_files.path)?
            .set_default("static_files.index", defaults.static_files.index)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_addresses")
                    .with_list_parse_key("ledger.initial_voters")
                    .try_parsing(true),
            )
            // Build and deserialize
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        // Try to load from file first
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(addr) = env::var("WEB_SERVER_ADDR") {
                    config.web_server_addr = addr;
                }
                if let Ok(level) = env::var("LOG_LEVEL") {
                    config.log_level = level;
                }
                if let Ok(secret) = env::var("SESSION_SECRET") {
                    config.session.secret = secret;
                }
                config.session.ttl_seconds = env::var("SESSION_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(config.session.ttl_seconds);
                config.session.cookie_secure = env::var("COOKIE_SECURE")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(config.session.cookie_secure);
                config.auth.nonce_ttl_seconds = env::var("NONCE_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(config.auth.nonce_ttl_seconds);
                config.auth.admin_addresses = split_list(env::var("ADMIN_ADDRESSES").ok());
                config.ledger.initial_voters = split_list(env::var("INITIAL_VOTERS").ok());
                config.ledger.fixture_path = env::var("LEDGER_FIXTURE").ok();
                if let Ok(path) = env::var("STATIC_FILES_PATH") {
                    config.static_files.path = path;
                }

                config
            }
        }
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
