//! Configuration module for the mission-control application.
//!
//! Values come from the process environment (after `.env` is loaded), with an
//! optional TOML file underneath. Durations accept either a bare number of
//! seconds (`0.5` included) or a string with units, e.g. `"30s"`, `"2m"`,
//! `"1500ms"`.

use crate::openclaw::{DatasetLimits, DatasetSettings};
use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Main application configuration containing all sub-configurations
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for the application
    ///
    /// This value is used to set the log level for this application's target
    /// specifically. e.g. "debug" would be similar to
    /// "warn,mission_control=debug". Ignored when `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Port for the HTTP server
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graceful shutdown timeout duration
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,

    /// OpenClaw executable, resolved through `PATH` when not absolute
    #[serde(default = "default_openclaw_bin")]
    pub openclaw_bin: String,
    /// `PATH` handed to the OpenClaw child process
    #[serde(default)]
    pub openclaw_path: Option<String>,
    /// `HOME` handed to the OpenClaw child process
    #[serde(default)]
    pub openclaw_home: Option<String>,

    #[serde(
        default = "default_status_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub status_ttl: Duration,
    #[serde(
        default = "default_cost_text_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub cost_text_ttl: Duration,
    #[serde(
        default = "default_cost_json_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub cost_json_ttl: Duration,
    #[serde(
        default = "default_cron_ttl",
        deserialize_with = "deserialize_duration"
    )]
    pub cron_ttl: Duration,

    #[serde(
        default = "default_status_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub status_timeout: Duration,
    /// Applies to both the text and JSON cost commands
    #[serde(
        default = "default_cost_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub cost_timeout: Duration,
    #[serde(
        default = "default_cron_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub cron_timeout: Duration,
    #[serde(
        default = "default_cron_run_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub cron_run_timeout: Duration,
}

impl Config {
    /// Load from an optional TOML file, overridden by the environment.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")
    }

    pub fn dataset_settings(&self) -> DatasetSettings {
        DatasetSettings {
            status: DatasetLimits {
                ttl: self.status_ttl,
                timeout: self.status_timeout,
            },
            cost_text: DatasetLimits {
                ttl: self.cost_text_ttl,
                timeout: self.cost_timeout,
            },
            cost_json: DatasetLimits {
                ttl: self.cost_json_ttl,
                timeout: self.cost_timeout,
            },
            cron: DatasetLimits {
                ttl: self.cron_ttl,
                timeout: self.cron_timeout,
            },
            cron_run_timeout: self.cron_run_timeout,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_openclaw_bin() -> String {
    "openclaw".to_string()
}

fn default_status_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_cost_text_ttl() -> Duration {
    Duration::from_secs(120)
}

fn default_cost_json_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_cron_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_status_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_cost_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_cron_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_cron_run_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Units accepted in duration values. A bare number is seconds.
const DURATION_UNITS: [TimeUnit; 3] =
    [TimeUnit::MilliSecond, TimeUnit::Second, TimeUnit::Minute];

fn parse_duration(raw: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_time_units(&DURATION_UNITS)
        .parse(raw.trim())
        .map_err(|e| format!("invalid duration '{raw}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{raw}': {e}"))
}

/// Accepts a number of seconds (fractions allowed) or a string with an
/// optional unit suffix.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DurationValue {
        Seconds(u64),
        Fractional(f64),
        Text(String),
    }

    match DurationValue::deserialize(deserializer)? {
        DurationValue::Seconds(secs) => Ok(Duration::from_secs(secs)),
        DurationValue::Fractional(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid duration '{secs}': {e}"))),
        DurationValue::Text(text) => parse_duration(&text).map_err(D::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn parses_unit_suffixes() {
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration(" 5s "), Ok(Duration::from_secs(5)));
    }

    #[test]
    fn rejects_garbage_durations() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn empty_source_yields_defaults() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.openclaw_bin, "openclaw");
        assert!(config.openclaw_home.is_none());
        assert_eq!(config.dataset_settings(), DatasetSettings::default());
    }

    #[test]
    fn overrides_accept_numbers_and_strings() {
        let config: Config = Figment::new()
            .merge(Serialized::default("status_ttl", 5))
            .merge(Serialized::default("cost_json_ttl", "10m"))
            .merge(Serialized::default("cron_run_timeout", "90s"))
            .merge(Serialized::default("openclaw_home", "/srv/openclaw"))
            .extract()
            .unwrap();

        let settings = config.dataset_settings();
        assert_eq!(settings.status.ttl, Duration::from_secs(5));
        assert_eq!(settings.cost_json.ttl, Duration::from_secs(600));
        assert_eq!(settings.cron_run_timeout, Duration::from_secs(90));
        assert_eq!(config.openclaw_home.as_deref(), Some("/srv/openclaw"));
    }

    #[test]
    fn fractional_seconds_are_accepted() {
        let config: Config = Figment::new()
            .merge(Serialized::default("status_ttl", 0.5))
            .extract()
            .unwrap();
        assert_eq!(config.status_ttl, Duration::from_millis(500));

        let negative = Figment::new()
            .merge(Serialized::default("status_ttl", -1.5))
            .extract::<Config>();
        assert!(negative.is_err());
    }

    #[test]
    fn toml_file_is_overridden_by_environment() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("mission-control.toml", "port = 9000\ncron_ttl = \"45s\"\n")?;
            jail.set_env("PORT", "9100");
            jail.set_env("STATUS_TTL", "0.5");

            let config = Config::load(Some(Path::new("mission-control.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.port, 9100);
            assert_eq!(config.cron_ttl, Duration::from_secs(45));
            assert_eq!(config.status_ttl, Duration::from_millis(500));
            Ok(())
        });
    }
}
