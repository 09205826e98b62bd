use std::{env, time::Duration};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

fn get_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_env_bool(key: &str, default: bool) -> bool {
    match get_env(key) {
        None => default,
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
    }
}

fn get_env_u64(key: &str, default: u64) -> Result<u64> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<u64>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_opt_u64(key: &str) -> Result<Option<u64>> {
    match get_env(key) {
        None => Ok(None),
        Some(v) if matches!(v.to_lowercase().as_str(), "off" | "never" | "none") => Ok(None),
        Some(v) => Ok(Some(
            v.parse::<u64>()
                .map_err(|e| anyhow!("{key} invalid int: {e}"))?,
        )),
    }
}

fn get_env_string(key: &str, default: &str) -> String {
    get_env(key).unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Backend
    pub backend_base_url: String,
    pub http_timeout_ms: u64,

    // Polling
    pub notifications_poll_ms: u64,
    pub status_poll_secs: u64,
    pub sweep_ms: u64,

    // Sound cue fires once per notification after this uptime. None disables it.
    pub sound_min_uptime_secs: Option<u64>,

    // Storage / dashboard
    pub sqlite_path: String,
    pub dashboard_host: String,
    pub dashboard_port: u16,
    pub dashboard_open_browser: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_base_url: "http://127.0.0.1:5000".to_string(),
            http_timeout_ms: 10_000,
            notifications_poll_ms: 1_000,
            status_poll_secs: 5,
            sweep_ms: 250,
            sound_min_uptime_secs: None,
            sqlite_path: "./data/cws_dashboard.sqlite".to_string(),
            dashboard_host: "127.0.0.1".to_string(),
            dashboard_port: 8000,
            dashboard_open_browser: false,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let d = Self::default();
        let port = get_env_u64("DASHBOARD_PORT", d.dashboard_port as u64)?;
        let dashboard_port =
            u16::try_from(port).map_err(|_| anyhow!("DASHBOARD_PORT out of range (got {port})"))?;

        let s = Self {
            backend_base_url: get_env_string("BACKEND_BASE_URL", &d.backend_base_url)
                .trim_end_matches('/')
                .to_string(),
            http_timeout_ms: get_env_u64("HTTP_TIMEOUT_MS", d.http_timeout_ms)?,
            notifications_poll_ms: get_env_u64("NOTIFICATIONS_POLL_MS", d.notifications_poll_ms)?,
            status_poll_secs: get_env_u64("STATUS_POLL_SECS", d.status_poll_secs)?,
            sweep_ms: get_env_u64("SWEEP_MS", d.sweep_ms)?,
            sound_min_uptime_secs: get_env_opt_u64("SOUND_MIN_UPTIME_SECS")?,
            sqlite_path: get_env_string("SQLITE_PATH", &d.sqlite_path),
            dashboard_host: get_env_string("DASHBOARD_HOST", &d.dashboard_host),
            dashboard_port,
            dashboard_open_browser: get_env_bool("DASHBOARD_OPEN_BROWSER", d.dashboard_open_browser),
        };

        s.validate()?;
        Ok(s)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.backend_base_url.starts_with("http://") && !self.backend_base_url.starts_with("https://") {
            return Err(anyhow!(
                "BACKEND_BASE_URL must start with http:// or https:// (got {})",
                self.backend_base_url
            ));
        }
        if self.http_timeout_ms < 1 {
            return Err(anyhow!("HTTP_TIMEOUT_MS must be >= 1 (got {})", self.http_timeout_ms));
        }
        if self.notifications_poll_ms < 100 {
            return Err(anyhow!(
                "NOTIFICATIONS_POLL_MS must be >= 100 (got {})",
                self.notifications_poll_ms
            ));
        }
        if self.status_poll_secs < 1 {
            return Err(anyhow!(
                "STATUS_POLL_SECS must be >= 1 (got {})",
                self.status_poll_secs
            ));
        }
        if self.sweep_ms < 10 {
            return Err(anyhow!("SWEEP_MS must be >= 10 (got {})", self.sweep_ms));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.status_poll_secs, 5);
        assert_eq!(s.sound_min_uptime_secs, None);
    }

    #[test]
    fn rejects_non_http_backend() {
        let s = Settings {
            backend_base_url: "ftp://example".to_string(),
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_too_fast_polling() {
        let s = Settings {
            notifications_poll_ms: 10,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
