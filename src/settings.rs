//! Process-wide settings read from the environment.
//!
//! Settings are read once at startup into an explicit [`Settings`] value
//! that is passed by parameter to every component.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Required variables, reported together when any are missing.
pub const REQUIRED_VARS: [&str; 4] = [
    "GEMINI_API_KEY",
    "SERPER_API_KEY",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
];

/// All runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub telegram: TelegramSettings,
    pub schedule: ScheduleSettings,
    pub log: LogSettings,
}

/// Language model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    /// Model name without any provider prefix.
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub api_key: String,
    pub max_results: usize,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub enabled: bool,
    pub interval_minutes: u64,
    /// Five-field cron expression; takes precedence over the interval.
    pub cron: Option<String>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: default_interval_minutes(),
            cron: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: PathBuf::from("logs/research_crew.log"),
        }
    }
}

fn default_model() -> &'static str {
    "gemini-1.5-pro"
}

fn default_interval_minutes() -> u64 {
    1440 // daily
}

fn default_max_results() -> usize {
    10
}

fn default_timeout() -> u64 {
    300
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read logging settings only. Used before the full settings are
    /// validated so that validation failures are logged.
    pub fn log_from_env() -> LogSettings {
        Self::log_from_lookup(&|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let required = |key: &str| get(key).unwrap_or_default();

        let model = get("GEMINI_MODEL_NAME").unwrap_or_else(|| default_model().to_string());
        let model = model
            .strip_prefix("gemini/")
            .map(str::to_string)
            .unwrap_or(model);

        let llm = LlmSettings {
            api_key: required("GEMINI_API_KEY"),
            model,
            temperature: 0.2,
            timeout_seconds: parse_var(&get, "REQUEST_TIMEOUT_SECONDS", default_timeout())?,
        };

        let search = SearchSettings {
            api_key: required("SERPER_API_KEY"),
            max_results: parse_var(&get, "MAX_SEARCH_RESULTS", default_max_results())?,
        };

        let telegram = TelegramSettings {
            bot_token: required("TELEGRAM_BOT_TOKEN"),
            chat_id: required("TELEGRAM_CHAT_ID"),
        };

        let schedule = ScheduleSettings {
            enabled: parse_bool(&get, "SCHEDULE_ENABLED", true)?,
            interval_minutes: parse_var(
                &get,
                "SCHEDULE_INTERVAL_MINUTES",
                default_interval_minutes(),
            )?,
            cron: get("SCHEDULE_CRON").map(|c| c.trim().to_string()),
        };

        Ok(Self {
            llm,
            search,
            telegram,
            schedule,
            log: Self::log_from_lookup(&get),
        })
    }

    fn log_from_lookup<F>(get: &F) -> LogSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LogSettings::default();
        LogSettings {
            level: get("LOG_LEVEL").unwrap_or(defaults.level),
            file: get("LOG_FILE").map(PathBuf::from).unwrap_or(defaults.file),
        }
    }
}

fn parse_var<F, T>(get: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool<F>(get: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidVar {
                name,
                value: raw,
                reason: "expected true or false".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GEMINI_API_KEY", "g-key"),
            ("SERPER_API_KEY", "s-key"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "42"),
        ]
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&required())).unwrap();

        assert_eq!(settings.llm.model, "gemini-1.5-pro");
        assert_eq!(settings.search.max_results, 10);
        assert_eq!(settings.schedule, ScheduleSettings::default());
        assert_eq!(settings.schedule.interval_minutes, 1440);
        assert_eq!(settings.log, LogSettings::default());
        assert_eq!(settings.telegram.chat_id, "42");
    }

    #[test]
    fn test_reports_every_missing_var() {
        let err = Settings::from_lookup(lookup(&[("SERPER_API_KEY", "s")])).unwrap_err();
        match err {
            ConfigError::MissingVars(vars) => assert_eq!(
                vars,
                vec!["GEMINI_API_KEY", "TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = required();
        vars[0] = ("GEMINI_API_KEY", "   ");
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVars(v) if v == vec!["GEMINI_API_KEY"]));
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let mut vars = required();
        vars.push(("GEMINI_MODEL_NAME", "gemini/gemini-1.5-flash"));
        let settings = Settings::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(settings.llm.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_schedule_overrides() {
        let mut vars = required();
        vars.push(("SCHEDULE_ENABLED", "FALSE"));
        vars.push(("SCHEDULE_INTERVAL_MINUTES", "60"));
        vars.push(("SCHEDULE_CRON", " 0 9 * * MON "));
        let settings = Settings::from_lookup(lookup(&vars)).unwrap();

        assert!(!settings.schedule.enabled);
        assert_eq!(settings.schedule.interval_minutes, 60);
        assert_eq!(settings.schedule.cron.as_deref(), Some("0 9 * * MON"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut vars = required();
        vars.push(("MAX_SEARCH_RESULTS", "ten"));
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidVar {
                name: "MAX_SEARCH_RESULTS",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let mut vars = required();
        vars.push(("SCHEDULE_ENABLED", "maybe"));
        assert!(Settings::from_lookup(lookup(&vars)).is_err());
    }
}
