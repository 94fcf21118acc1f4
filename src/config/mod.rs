//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then the TOML config file,
//! then `MURMUR_*` environment variables (which `.env` files may supply).
//!
//! ```toml
//! data_dir = "~/murmur"
//! write_through = true
//!
//! [retention]
//! long_term_days = 365
//! context_days = 7
//!
//! [relevance]
//! scorer = "keyword"
//! limit = 10
//!
//! [llm]
//! model = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo"
//! timeout_ms = 30000
//!
//! [speech]
//! command = "say"
//! args = ["-v", "Alex"]
//!
//! [scheduler]
//! check_interval_secs = 30
//! ```

use crate::gc::RetentionConfig;
use crate::relevance::ScorerKind;
use crate::{Error, Result};
use chrono::TimeDelta;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the hosted LLM API key.
pub const API_KEY_ENV: &str = "TOGETHER_API_KEY";

/// Default hosted LLM endpoint (OpenAI-compatible).
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.together.xyz/v1";

/// Default hosted LLM model.
pub const DEFAULT_LLM_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo";

/// Main configuration for murmur.
#[derive(Debug, Clone)]
pub struct MurmurConfig {
    /// Directory holding `memory.json`.
    pub data_dir: PathBuf,
    /// Save after every mutation (otherwise the scheduler flushes periodically).
    pub write_through: bool,
    /// Retention and contextual window settings.
    pub retention: RetentionConfig,
    /// Relevance query settings.
    pub relevance: RelevanceConfig,
    /// Hosted LLM settings.
    pub llm: LlmConfig,
    /// Speech settings.
    pub speech: SpeechConfig,
    /// Background scheduler settings.
    pub scheduler: SchedulerConfig,
}

/// Relevance query configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelevanceConfig {
    /// Which scorer ranks records.
    pub scorer: ScorerKind,
    /// Maximum matches returned by a relevance query.
    pub limit: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::Keyword,
            limit: 10,
        }
    }
}

/// Hosted LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            timeout_ms: None,
            connect_timeout_ms: None,
        }
    }
}

/// Speech configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechConfig {
    /// External synthesis command; console output only when unset.
    pub command: Option<String>,
    /// Arguments placed before the spoken text.
    pub args: Vec<String>,
    /// Seconds to wait for speech before giving up.
    pub listen_timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            listen_timeout_secs: 5,
        }
    }
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Seconds between reminder checks.
    pub check_interval_secs: u64,
    /// Announce reminders due within this many seconds.
    pub notify_lead_secs: u64,
    /// Seconds between flushes when write-through is off.
    pub flush_interval_secs: u64,
    /// Seconds of silence before the assistant speaks up.
    pub idle_turn_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            notify_lead_secs: 300,
            flush_interval_secs: 60,
            idle_turn_secs: 300,
        }
    }
}

impl SchedulerConfig {
    /// Announcement lead time.
    #[must_use]
    pub fn notify_lead(&self) -> TimeDelta {
        seconds(self.notify_lead_secs)
    }

    /// Minimum time between write-back flushes.
    #[must_use]
    pub fn flush_interval(&self) -> TimeDelta {
        seconds(self.flush_interval_secs)
    }

    /// Silence before a proactive turn.
    #[must_use]
    pub fn idle_turn(&self) -> TimeDelta {
        seconds(self.idle_turn_secs)
    }
}

/// Converts configured seconds, saturating at [`TimeDelta::MAX`].
fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Write-through persistence.
    pub write_through: Option<bool>,
    /// Retention section.
    pub retention: Option<ConfigFileRetention>,
    /// Relevance section.
    pub relevance: Option<ConfigFileRelevance>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Speech section.
    pub speech: Option<ConfigFileSpeech>,
    /// Scheduler section.
    pub scheduler: Option<ConfigFileScheduler>,
}

/// Retention section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetention {
    /// Long-term retention in days.
    pub long_term_days: Option<u32>,
    /// Contextual window in days.
    pub context_days: Option<u32>,
    /// Conversation turns kept in the contextual view.
    pub max_context_conversations: Option<usize>,
    /// Facts kept in the contextual view.
    pub max_relevant_facts: Option<usize>,
}

/// Relevance section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRelevance {
    /// Scorer name.
    pub scorer: Option<String>,
    /// Result limit.
    pub limit: Option<usize>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Base URL.
    pub base_url: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Speech section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSpeech {
    /// Synthesis command.
    pub command: Option<String>,
    /// Synthesis command arguments.
    pub args: Option<Vec<String>>,
    /// Listen timeout.
    pub listen_timeout_secs: Option<u64>,
}

/// Scheduler section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileScheduler {
    /// Check interval.
    pub check_interval_secs: Option<u64>,
    /// Notification lead time.
    pub notify_lead_secs: Option<u64>,
    /// Flush interval.
    pub flush_interval_secs: Option<u64>,
    /// Idle turn delay.
    pub idle_turn_secs: Option<u64>,
}

/// Returns the platform data directory for murmur, or `.murmur` if unknown.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".murmur"),
        |dirs| dirs.data_dir().join("murmur"),
    )
}

impl Default for MurmurConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            write_through: true,
            retention: RetentionConfig::default(),
            relevance: RelevanceConfig::default(),
            llm: LlmConfig::default(),
            speech: SpeechConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_var(key).and_then(|v| match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

impl MurmurConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from an explicit file, or the default location,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/murmur/` on macOS)
    /// 2. XDG config dir (`~/.config/murmur/` for Unix compatibility)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("murmur").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("murmur")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `MurmurConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = expand_home(&data_dir);
        }
        if let Some(write_through) = file.write_through {
            config.write_through = write_through;
        }
        if let Some(retention) = file.retention {
            let r = &mut config.retention;
            r.long_term_days = retention.long_term_days.unwrap_or(r.long_term_days);
            r.context_days = retention.context_days.unwrap_or(r.context_days);
            r.max_context_conversations = retention
                .max_context_conversations
                .unwrap_or(r.max_context_conversations);
            r.max_relevant_facts = retention.max_relevant_facts.unwrap_or(r.max_relevant_facts);
        }
        if let Some(relevance) = file.relevance {
            if let Some(scorer) = relevance.scorer {
                match ScorerKind::parse(&scorer) {
                    Some(kind) => config.relevance.scorer = kind,
                    None => tracing::warn!(scorer = %scorer, "Unknown relevance scorer, using keyword"),
                }
            }
            config.relevance.limit = relevance.limit.unwrap_or(config.relevance.limit);
        }
        if let Some(llm) = file.llm {
            if let Some(base_url) = llm.base_url {
                config.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            config.llm.api_key = llm.api_key.map(SecretString::from);
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
        }
        if let Some(speech) = file.speech {
            config.speech.command = speech.command;
            config.speech.args = speech.args.unwrap_or_default();
            if let Some(secs) = speech.listen_timeout_secs {
                config.speech.listen_timeout_secs = secs;
            }
        }
        if let Some(scheduler) = file.scheduler {
            let s = &mut config.scheduler;
            s.check_interval_secs = scheduler.check_interval_secs.unwrap_or(s.check_interval_secs);
            s.notify_lead_secs = scheduler.notify_lead_secs.unwrap_or(s.notify_lead_secs);
            s.flush_interval_secs = scheduler.flush_interval_secs.unwrap_or(s.flush_interval_secs);
            s.idle_turn_secs = scheduler.idle_turn_secs.unwrap_or(s.idle_turn_secs);
        }

        config
    }

    /// Applies `MURMUR_*` environment variable overrides.
    ///
    /// Reads:
    /// - `MURMUR_DATA_DIR`, `MURMUR_WRITE_THROUGH`
    /// - `MURMUR_RETENTION_DAYS`, `MURMUR_CONTEXT_DAYS`, `MURMUR_RETENTION_<KIND>_DAYS`
    /// - `MURMUR_RELEVANCE_SCORER`, `MURMUR_RELEVANCE_LIMIT`
    /// - `TOGETHER_API_KEY`, `MURMUR_LLM_BASE_URL`, `MURMUR_LLM_MODEL`,
    ///   `MURMUR_LLM_TIMEOUT_MS`, `MURMUR_LLM_CONNECT_TIMEOUT_MS`
    /// - `MURMUR_SPEECH_COMMAND`, `MURMUR_LISTEN_TIMEOUT_SECS`
    /// - `MURMUR_CHECK_INTERVAL_SECS`, `MURMUR_NOTIFY_LEAD_SECS`,
    ///   `MURMUR_FLUSH_INTERVAL_SECS`, `MURMUR_IDLE_TURN_SECS`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_var("MURMUR_DATA_DIR") {
            self.data_dir = expand_home(&dir);
        }
        if let Some(v) = env_bool("MURMUR_WRITE_THROUGH") {
            self.write_through = v;
        }

        self.retention = self.retention.with_env_overrides();

        if let Some(kind) = env_var("MURMUR_RELEVANCE_SCORER").and_then(|s| ScorerKind::parse(&s)) {
            self.relevance.scorer = kind;
        }
        if let Some(limit) = env_parse("MURMUR_RELEVANCE_LIMIT") {
            self.relevance.limit = limit;
        }

        if let Some(key) = env_var(API_KEY_ENV) {
            self.llm.api_key = Some(SecretString::from(key));
        }
        if let Some(url) = env_var("MURMUR_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = env_var("MURMUR_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(ms) = env_parse("MURMUR_LLM_TIMEOUT_MS") {
            self.llm.timeout_ms = Some(ms);
        }
        if let Some(ms) = env_parse("MURMUR_LLM_CONNECT_TIMEOUT_MS") {
            self.llm.connect_timeout_ms = Some(ms);
        }

        if let Some(command) = env_var("MURMUR_SPEECH_COMMAND") {
            let mut parts = command.split_whitespace().map(str::to_string);
            self.speech.command = parts.next();
            self.speech.args = parts.collect();
        }
        if let Some(secs) = env_parse("MURMUR_LISTEN_TIMEOUT_SECS") {
            self.speech.listen_timeout_secs = secs;
        }

        let s = &mut self.scheduler;
        s.check_interval_secs = env_parse("MURMUR_CHECK_INTERVAL_SECS").unwrap_or(s.check_interval_secs);
        s.notify_lead_secs = env_parse("MURMUR_NOTIFY_LEAD_SECS").unwrap_or(s.notify_lead_secs);
        s.flush_interval_secs = env_parse("MURMUR_FLUSH_INTERVAL_SECS").unwrap_or(s.flush_interval_secs);
        s.idle_turn_secs = env_parse("MURMUR_IDLE_TURN_SECS").unwrap_or(s.idle_turn_secs);

        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets write-through persistence.
    #[must_use]
    pub const fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    /// Returns the API key, failing when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] naming `TOGETHER_API_KEY` when unset.
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.llm.api_key.as_ref().ok_or_else(|| Error::OperationFailed {
            operation: "load_api_key".to_string(),
            cause: format!("no LLM API key found; set {API_KEY_ENV} or llm.api_key in the config file"),
        })
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = MurmurConfig::default();
        assert!(config.write_through);
        assert_eq!(config.retention.long_term_days, 365);
        assert_eq!(config.relevance.limit, 10);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.speech.listen_timeout_secs, 5);
        assert_eq!(config.scheduler.check_interval_secs, 30);
        assert_eq!(config.scheduler.notify_lead_secs, 300);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_from_toml_sections() {
        let config = MurmurConfig::from_toml(
            r#"
            data_dir = "/tmp/murmur-test"
            write_through = false

            [retention]
            long_term_days = 30
            context_days = 2

            [relevance]
            scorer = "substring"
            limit = 3

            [llm]
            model = "small-model"
            api_key = "secret"
            timeout_ms = 1000

            [speech]
            command = "say"
            args = ["-v", "Alex"]

            [scheduler]
            check_interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/murmur-test"));
        assert!(!config.write_through);
        assert_eq!(config.retention.long_term_days, 30);
        assert_eq!(config.retention.context_days, 2);
        assert_eq!(config.retention.max_relevant_facts, 10);
        assert_eq!(config.relevance.scorer, ScorerKind::Substring);
        assert_eq!(config.relevance.limit, 3);
        assert_eq!(config.llm.model, "small-model");
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(
            config.llm.api_key.as_ref().map(ExposeSecret::expose_secret),
            Some("secret")
        );
        assert_eq!(config.llm.timeout_ms, Some(1000));
        assert_eq!(config.speech.command.as_deref(), Some("say"));
        assert_eq!(config.speech.args, vec!["-v", "Alex"]);
        assert_eq!(config.scheduler.check_interval_secs, 5);
        assert_eq!(config.scheduler.flush_interval_secs, 60);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(MurmurConfig::from_toml("colour = \"blue\"").is_err());
        assert!(MurmurConfig::from_toml("data_dir = [").is_err());
    }

    #[test]
    fn test_require_api_key() {
        let config = MurmurConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));

        let mut config = MurmurConfig::default();
        config.llm.api_key = Some(SecretString::from("k".to_string()));
        assert!(config.require_api_key().is_ok());
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let mut config = MurmurConfig::default();
        config.llm.api_key = Some(SecretString::from("super-secret".to_string()));
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = MurmurConfig::load_from_file(Path::new("/nonexistent/murmur.toml")).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_scheduler_durations_saturate() {
        let config = SchedulerConfig {
            notify_lead_secs: u64::MAX,
            flush_interval_secs: u64::MAX / 2,
            idle_turn_secs: 90,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.notify_lead(), TimeDelta::MAX);
        assert_eq!(config.flush_interval(), TimeDelta::MAX);
        assert_eq!(config.idle_turn(), TimeDelta::seconds(90));
    }
}
