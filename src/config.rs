//! Configuration types, read from environment variables at startup.

use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Bounds for numeric answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Minimum width/height in meters.
    pub min_size: Decimal,
    /// Maximum width/height in meters.
    pub max_size: Decimal,
    pub min_quantity: u32,
    pub max_quantity: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_size: dec!(0.1),
            max_size: dec!(50),
            min_quantity: 1,
            max_quantity: 1000,
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size <= Decimal::ZERO {
            return Err(invalid("PRINT_QUOTE_MIN_SIZE", "must be positive"));
        }
        if self.min_size > self.max_size {
            return Err(invalid("PRINT_QUOTE_MAX_SIZE", "must not be below the minimum"));
        }
        if self.min_quantity == 0 {
            return Err(invalid("PRINT_QUOTE_MIN_QUANTITY", "must be positive"));
        }
        if self.min_quantity > self.max_quantity {
            return Err(invalid(
                "PRINT_QUOTE_MAX_QUANTITY",
                "must not be below the minimum",
            ));
        }
        Ok(())
    }
}

/// Which messaging channel the bot runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Telegram,
    Cli,
}

/// Telegram credentials and access control.
#[derive(Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// How the single-instance lock is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockConfig {
    /// Exclusive `flock` on a file.
    File(PathBuf),
    /// Linux abstract-namespace unix socket.
    Socket(String),
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::File(std::env::temp_dir().join("print-quote.lock"))
    }
}

/// Bot configuration.
#[derive(Debug)]
pub struct BotConfig {
    pub channel: ChannelKind,
    /// Present when `channel` is Telegram.
    pub telegram: Option<TelegramConfig>,
    pub limits: Limits,
    /// Optional JSON price table replacing the built-in one.
    pub prices_path: Option<PathBuf>,
    pub lock: LockConfig,
    pub log_dir: PathBuf,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let channel = match lookup("PRINT_QUOTE_CHANNEL").as_deref().map(str::trim) {
            None | Some("") | Some("telegram") => ChannelKind::Telegram,
            Some("cli") => ChannelKind::Cli,
            Some(other) => {
                return Err(invalid(
                    "PRINT_QUOTE_CHANNEL",
                    &format!("expected telegram or cli, got {other:?}"),
                ));
            }
        };

        let telegram = if channel == ChannelKind::Telegram {
            let token = lookup("TELEGRAM_BOT_TOKEN")
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

            let allowed_users: Vec<String> = lookup("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            Some(TelegramConfig {
                bot_token: SecretString::from(token),
                allowed_users,
            })
        } else {
            None
        };

        let defaults = Limits::default();
        let limits = Limits {
            min_size: parse_or(&lookup, "PRINT_QUOTE_MIN_SIZE", defaults.min_size)?,
            max_size: parse_or(&lookup, "PRINT_QUOTE_MAX_SIZE", defaults.max_size)?,
            min_quantity: parse_or(&lookup, "PRINT_QUOTE_MIN_QUANTITY", defaults.min_quantity)?,
            max_quantity: parse_or(&lookup, "PRINT_QUOTE_MAX_QUANTITY", defaults.max_quantity)?,
        };
        limits.validate()?;

        let prices_path = lookup("PRINT_QUOTE_PRICES")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let lock = match lookup("PRINT_QUOTE_LOCK") {
            None => LockConfig::default(),
            Some(value) => parse_lock(&value)?,
        };

        let log_dir = lookup("PRINT_QUOTE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./logs"));

        Ok(Self {
            channel,
            telegram,
            limits,
            prices_path,
            lock,
            log_dir,
        })
    }
}

/// `file:<path>` or `socket:<name>`.
fn parse_lock(value: &str) -> Result<LockConfig, ConfigError> {
    let value = value.trim();
    if let Some(path) = value.strip_prefix("file:").filter(|p| !p.is_empty()) {
        return Ok(LockConfig::File(PathBuf::from(path)));
    }
    if let Some(name) = value.strip_prefix("socket:").filter(|n| !n.is_empty()) {
        return Ok(LockConfig::Socket(name.to_string()));
    }
    Err(invalid(
        "PRINT_QUOTE_LOCK",
        &format!("expected file:<path> or socket:<name>, got {value:?}"),
    ))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .replace(',', ".")
            .parse()
            .map_err(|e: T::Err| invalid(key, &e.to_string())),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
