use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;

use crate::services::calendar::CalendarSettings;

const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub cors_allowed_origins: Option<String>,
    pub calendar_base_url: String,
    pub calendar_id: String,
    pub calendar_timeout: Duration,
    pub calendar_patch_timeout: Duration,
    /// Zone that "local" dates and times are interpreted in
    pub timezone: Tz,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup so tests need not touch the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: &str| -> Result<Duration> {
            let raw = var(key, default);
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a number of seconds, got {raw:?}"))?;
            Ok(Duration::from_secs(secs))
        };

        let timezone_name = var("APP_TIMEZONE", "UTC");
        let timezone: Tz = timezone_name
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("APP_TIMEZONE {timezone_name:?} is not an IANA zone: {e}"))?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: var("BIND_ADDR", "0.0.0.0:3000"),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS"),
            calendar_base_url: var("GOOGLE_CALENDAR_BASE_URL", DEFAULT_CALENDAR_BASE_URL),
            calendar_id: var("GOOGLE_CALENDAR_ID", "primary"),
            calendar_timeout: secs("CALENDAR_HTTP_TIMEOUT_SECS", "10")?,
            calendar_patch_timeout: secs("CALENDAR_PATCH_TIMEOUT_SECS", "5")?,
            timezone,
        })
    }

    pub fn calendar_settings(&self) -> CalendarSettings {
        CalendarSettings {
            calendar_id: self.calendar_id.clone(),
            timezone: self.timezone,
        }
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

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.calendar_base_url, DEFAULT_CALENDAR_BASE_URL);
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.calendar_timeout, Duration::from_secs(10));
        assert_eq!(config.calendar_patch_timeout, Duration::from_secs(5));
        assert_eq!(config.timezone, chrono_tz::UTC);
        assert!(config.cors_allowed_origins.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("APP_TIMEZONE", "Asia/Seoul"),
            ("CALENDAR_PATCH_TIMEOUT_SECS", "2"),
            ("GOOGLE_CALENDAR_ID", "team@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.timezone, chrono_tz::Asia::Seoul);
        assert_eq!(config.calendar_patch_timeout, Duration::from_secs(2));
        assert_eq!(config.calendar_settings().calendar_id, "team@example.com");
    }

    #[test]
    fn test_missing_database_url_and_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("APP_TIMEZONE", "Mars/Olympus"),
        ]))
        .is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("CALENDAR_HTTP_TIMEOUT_SECS", "ten"),
        ]))
        .is_err());
    }
}
