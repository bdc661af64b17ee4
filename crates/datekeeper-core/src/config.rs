//! DateKeeper configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DateKeeperError, Result};
use crate::interval::ReminderInterval;
use crate::types::Channel;

/// Upper bound for `scheduler.claim_lease_secs` (30 days).
pub const MAX_CLAIM_LEASE_SECS: u64 = 30 * 24 * 60 * 60;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateKeeperConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub email: SmtpConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    /// Log every reminder to the console in addition to the real channels.
    #[serde(default = "bool_true")]
    pub console_log: bool,
}

fn bool_true() -> bool { true }

impl Default for DateKeeperConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            gateway: GatewayConfig::default(),
            email: SmtpConfig::default(),
            sms: SmsConfig::default(),
            console_log: true,
        }
    }
}

impl DateKeeperConfig {
    /// Load config from `DATEKEEPER_CONFIG` or the default path, falling back
    /// to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DateKeeperError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DateKeeperError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DateKeeperError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        if s.max_concurrency == 0 {
            return Err(DateKeeperError::Config("scheduler.max_concurrency must be > 0".into()));
        }
        if s.send_timeout_secs == 0 || s.run_timeout_secs == 0 {
            return Err(DateKeeperError::Config("scheduler timeouts must be > 0".into()));
        }
        if s.check_interval_secs == 0 {
            return Err(DateKeeperError::Config("scheduler.check_interval_secs must be > 0".into()));
        }
        // A live pass holds a claim for at most every send of every interval.
        let longest_hold = s
            .send_timeout_secs
            .saturating_mul((Channel::ALL.len() * ReminderInterval::ALL.len()) as u64);
        if s.claim_lease_secs <= longest_hold {
            return Err(DateKeeperError::Config(format!(
                "scheduler.claim_lease_secs must exceed {longest_hold}s (send_timeout_secs x channels x intervals)"
            )));
        }
        if s.claim_lease_secs > MAX_CLAIM_LEASE_SECS {
            return Err(DateKeeperError::Config(format!(
                "scheduler.claim_lease_secs must be at most {MAX_CLAIM_LEASE_SECS}s"
            )));
        }
        Ok(())
    }

    /// `DATEKEEPER_CONFIG` if set, otherwise `~/.datekeeper/config.toml`.
    pub fn resolve_path() -> PathBuf {
        std::env::var("DATEKEEPER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the DateKeeper home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".datekeeper")
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.datekeeper/datekeeper.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

/// Reminder scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// "MIN HOUR DOM MON DOW", evaluated in server local time.
    #[serde(default = "default_cron")]
    pub cron: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Documents dispatched in parallel.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Budget for one sender call.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    /// Budget for a whole manual run before the caller gets a partial answer.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Age after which an uncommitted ledger claim may be taken over.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,
}

fn default_cron() -> String { "0 9 * * *".into() }
fn default_check_interval() -> u64 { 60 }
fn default_max_concurrency() -> usize { 8 }
fn default_send_timeout() -> u64 { 15 }
fn default_run_timeout() -> u64 { 120 }
fn default_claim_lease() -> u64 { 300 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            check_interval_secs: default_check_interval(),
            max_concurrency: default_max_concurrency(),
            send_timeout_secs: default_send_timeout(),
            run_timeout_secs: default_run_timeout(),
            claim_lease_secs: default_claim_lease(),
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// SMTP email channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Sender address. Defaults to `username` when empty.
    #[serde(default)]
    pub from_address: String,
}

fn default_smtp_port() -> u16 { 587 }
fn default_from_name() -> String { "DateKeeper".into() }

impl SmtpConfig {
    /// Whether enough is configured to attempt delivery.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.host.is_empty() && !self.username.is_empty()
    }
}

/// SMS channel configuration (Twilio REST API).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Sending number in E.164 form.
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_twilio_base")]
    pub api_base: String,
}

fn default_twilio_base() -> String { "https://api.twilio.com".into() }

impl SmsConfig {
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.account_sid.is_empty() && !self.auth_token.is_empty()
    }
}
