use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub isolation_level: IsolationLevel,
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferSettings {
    #[serde(default = "default_transfer_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub require_positive_amount: bool,
    #[serde(default)]
    pub allow_self_transfer: bool,
    #[serde(default = "default_true")]
    pub allow_negative_balance: bool,
}

impl TransferSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_transfer_timeout_ms(),
            require_positive_amount: true,
            allow_self_transfer: false,
            allow_negative_balance: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

/// Isolation level every transfer transaction runs at.
///
/// `ReadCommitted` relies on the row lock taken by the balance update to
/// serialize transfers sharing an account. The stricter levels surface
/// conflicts as retryable errors instead of waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_transfer_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
