use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub payme: PaymeConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymeConfig {
    pub merchant_id: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default = "default_true")]
    pub test_mode: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_test_api_url")]
    pub test_api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub callback_url: Option<String>,
}

impl PaymeConfig {
    /// Base URL of the provider API for the configured mode.
    pub fn api_base(&self) -> &str {
        if self.test_mode {
            &self.test_api_url
        } else {
            &self.api_url
        }
    }
}

impl Default for PaymeConfig {
    fn default() -> Self {
        Self {
            merchant_id: None,
            secret_key: None,
            test_mode: true,
            api_url: default_api_url(),
            test_api_url: default_test_api_url(),
            timeout_secs: default_timeout_secs(),
            callback_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubscriptionConfig {
    pub free_plan_name: String,
    pub free_plan_duration_days: i64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            free_plan_name: "Free".to_string(),
            free_plan_duration_days: 36500,
        }
    }
}

/// Credentials for the administrator created at first start.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub login: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "https://checkout.paycom.uz".to_string()
}

fn default_test_api_url() -> String {
    "https://test.paycom.uz".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://wedy.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("payme.test_mode", true)?
            .set_default("payme.timeout_secs", 30)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Environment variables use the WEDY__ prefix, double underscore separates levels
            .add_source(Environment::with_prefix("WEDY").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://wedy.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
            },
            payme: PaymeConfig::default(),
            subscription: SubscriptionConfig::default(),
            admin: None,
        }
    }
}
