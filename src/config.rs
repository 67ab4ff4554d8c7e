use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{SCHEDULED_SEND_CHECK_SECS, SNOOZE_CHECK_SECS, UNDO_EXPIRE_SECS, UNDO_MAX_SIZE};
use crate::mail::{AccountId, AccountScope, Message};
use crate::scheduler::SchedulerConfig;
use crate::undo::UndoConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub undo: UndoSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub mailbox: MailboxSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UndoSettings {
    /// Seconds before an undo entry silently expires
    #[serde(default = "default_undo_expire_secs")]
    pub expire_secs: u64,
    /// Entries kept before the oldest is dropped
    #[serde(default = "default_undo_max_size")]
    pub max_size: usize,
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self {
            expire_secs: default_undo_expire_secs(),
            max_size: default_undo_max_size(),
        }
    }
}

impl From<&UndoSettings> for UndoConfig {
    fn from(settings: &UndoSettings) -> Self {
        Self {
            expire: Duration::from_secs(settings.expire_secs),
            max_size: settings.max_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerSettings {
    #[serde(default = "default_snooze_check_secs")]
    pub snooze_check_secs: u64,
    #[serde(default = "default_scheduled_send_check_secs")]
    pub scheduled_send_check_secs: u64,
    /// Full reconciliation period (0 = disabled)
    #[serde(default)]
    pub resync_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            snooze_check_secs: default_snooze_check_secs(),
            scheduled_send_check_secs: default_scheduled_send_check_secs(),
            resync_secs: 0,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        // A zero period would make tokio's interval panic
        Self {
            snooze_check: Duration::from_secs(settings.snooze_check_secs.max(1)),
            scheduled_send_check: Duration::from_secs(settings.scheduled_send_check_secs.max(1)),
            resync: (settings.resync_secs > 0).then(|| Duration::from_secs(settings.resync_secs)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MailboxSettings {
    /// Account the view starts scoped to (all accounts when unset)
    #[serde(default)]
    pub default_account: Option<AccountId>,
    /// TOML file of `[[messages]]` loaded into the in-memory gateway
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl MailboxSettings {
    pub fn initial_scope(&self) -> AccountScope {
        match self.default_account {
            Some(ref id) => AccountScope::Account(id.clone()),
            None => AccountScope::All,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    messages: Vec<Message>,
}

/// Read the messages listed in a seed file
pub fn load_seed(path: &Path) -> Result<Vec<Message>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    let seed: SeedFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse seed file: {}", path.display()))?;
    Ok(seed.messages)
}

fn default_undo_expire_secs() -> u64 {
    UNDO_EXPIRE_SECS
}

fn default_undo_max_size() -> usize {
    UNDO_MAX_SIZE
}

fn default_snooze_check_secs() -> u64 {
    SNOOZE_CHECK_SECS
}

fn default_scheduled_send_check_secs() -> u64 {
    SCHEDULED_SEND_CHECK_SECS
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("mailroom");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Parse a config file. Missing sections and fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the user config, or defaults when no file exists yet
    pub fn load_or_default() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let dir = path
            .parent()
            .context("Config path has no parent directory")?;

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.undo.expire_secs, 10);
        assert_eq!(config.undo.max_size, 10);
        assert_eq!(config.scheduler.snooze_check_secs, 60);
        assert_eq!(config.mailbox.initial_scope(), AccountScope::All);
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [undo]
            expire_secs = 30

            [scheduler]
            resync_secs = 600

            [mailbox]
            default_account = "work"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.undo.expire_secs, 30);
        assert_eq!(config.undo.max_size, 10);
        assert_eq!(config.scheduler.scheduled_send_check_secs, 60);
        assert_eq!(
            config.mailbox.initial_scope(),
            AccountScope::Account("work".to_string())
        );

        let scheduler = SchedulerConfig::from(&config.scheduler);
        assert_eq!(scheduler.resync, Some(Duration::from_secs(600)));
        let undo = UndoConfig::from(&config.undo);
        assert_eq!(undo.expire, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let settings = SchedulerSettings {
            snooze_check_secs: 0,
            scheduled_send_check_secs: 0,
            resync_secs: 0,
        };
        let scheduler = SchedulerConfig::from(&settings);
        assert_eq!(scheduler.snooze_check, Duration::from_secs(1));
        assert_eq!(scheduler.resync, None);
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let path = std::env::temp_dir().join(format!("mailroom-bad-{}.toml", std::process::id()));
        fs::write(&path, "[undo\nexpire_secs = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_seed_messages() {
        let path = std::env::temp_dir().join(format!("mailroom-seed-{}.toml", std::process::id()));
        let seed = r#"
            [[messages]]
            id = "m1"
            account_id = "work"
            thread_id = "t1"
            folder = "archive"
            flags = "READ | STARRED"
            subject = "Quarterly numbers"
            date = "2024-03-15T10:00:00Z"

            [messages.from]
            name = "Alice"
            email = "alice@example.com"
        "#;
        fs::write(&path, seed).unwrap();

        let messages = load_seed(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.folder, crate::mail::Folder::Archive);
        assert!(message.is_starred() && message.is_read());
        assert_eq!(message.from.display(), "Alice");
        assert!(message.labels.is_empty());
        assert!(message.snooze_until.is_none());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.scheduler.resync_secs = 120;
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
