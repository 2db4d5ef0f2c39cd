pub mod aggregate;
pub mod auth;
pub mod domain;
pub mod ingest;
pub mod report;
pub mod time;
pub mod validate;
pub mod view;

pub mod config {
    use anyhow::Context;
    use chrono::FixedOffset;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    pub const DEFAULT_BASE_URL: &str = "https://dairy-farm-server.onrender.com";
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RETRIES: u32 = 3;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub api_base_url: String,
        pub api_timeout: Duration,
        pub api_retries: u32,
        pub utc_offset_hours: i32,
        pub token_path: Option<PathBuf>,
        pub api_token: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let timeout_secs = std::env::var("DAIRY_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS);

            let api_retries = std::env::var("DAIRY_API_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(DEFAULT_RETRIES)
                .max(1);

            let utc_offset_hours = match std::env::var("DAIRY_UTC_OFFSET_HOURS") {
                Ok(s) => s
                    .trim()
                    .parse::<i32>()
                    .with_context(|| format!("DAIRY_UTC_OFFSET_HOURS is not an integer: {s}"))?,
                Err(_) => 0,
            };

            let token_path = std::env::var("DAIRY_TOKEN_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .or_else(|| dirs::config_dir().map(|dir| dir.join("dairy").join("token")));

            Ok(Self {
                api_base_url: std::env::var("DAIRY_API_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                api_timeout: Duration::from_secs(timeout_secs),
                api_retries,
                utc_offset_hours,
                token_path,
                api_token: std::env::var("DAIRY_API_TOKEN")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        /// Offset used to turn backend timestamps into farm calendar dates.
        pub fn farm_offset(&self) -> anyhow::Result<FixedOffset> {
            FixedOffset::east_opt(self.utc_offset_hours * 3600).with_context(|| {
                format!(
                    "DAIRY_UTC_OFFSET_HOURS out of range: {}",
                    self.utc_offset_hours
                )
            })
        }

        pub fn require_token_path(&self) -> anyhow::Result<&Path> {
            self.token_path
                .as_deref()
                .context("DAIRY_TOKEN_PATH is required (no config directory found)")
        }
    }
}
