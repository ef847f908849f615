use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::util::env::{db_url, env_opt, env_parse, env_req};

pub const DEFAULT_BASE_URL: &str = "https://api.hotelbeds.com/hotel-content-api/1.0";

/// Upstream credentials and request settings.
#[derive(Clone)]
pub struct ApiConfig {
    pub key: String,
    pub secret: String,
    pub base_url: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("key", &"***")
            .field("secret", &"***")
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            key: env_req("API_KEY")?,
            secret: env_req("API_SECRET")?,
            base_url: env_opt("HOTELBEDS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            language: env_opt("HOTELBEDS_LANGUAGE").unwrap_or_else(|| "ENG".into()),
            timeout_secs: env_parse("HOTELBEDS_TIMEOUT_SECS", 30u64),
        })
    }
}

/// Inclusive index range walked in fixed-size windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub start: u64,
    pub end: u64,
    pub batch_size: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: 1,
            end: 50_000,
            batch_size: 100,
        }
    }
}

impl WindowConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            start: env_parse("ETL_START_INDEX", d.start),
            end: env_parse("ETL_END_INDEX", d.end),
            batch_size: env_parse("ETL_BATCH_SIZE", d.batch_size),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch size must be greater than zero");
        }
        if self.start == 0 {
            bail!("start index is 1-based; got 0");
        }
        if self.start > self.end {
            bail!("start index {} is past end index {}", self.start, self.end);
        }
        Ok(())
    }
}

/// Everything a run needs, resolved once at process entry.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database_url: String,
    pub windows: WindowConfig,
    pub archive_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Resolve from the environment. An explicit database URL makes the
    /// `DATABASE_URL` / `DB_*` variables optional.
    pub fn from_env_with_db(database_url: Option<String>) -> Result<Self> {
        let database_url = match database_url {
            Some(url) => url,
            None => db_url()?,
        };
        Ok(Self {
            api: ApiConfig::from_env()?,
            database_url,
            windows: WindowConfig::from_env(),
            archive_dir: env_opt("ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("archive")),
            log_file: env_opt("LOG_FILE").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_config_validation() {
        assert!(WindowConfig::default().validate().is_ok());
        let zero = WindowConfig {
            batch_size: 0,
            ..WindowConfig::default()
        };
        assert!(zero.validate().is_err());
        let inverted = WindowConfig {
            start: 10,
            end: 9,
            batch_size: 5,
        };
        assert!(inverted.validate().is_err());
        let from_zero = WindowConfig {
            start: 0,
            end: 9,
            batch_size: 5,
        };
        assert!(from_zero.validate().is_err());
    }

    #[test]
    fn api_config_debug_hides_credentials() {
        let cfg = ApiConfig {
            key: "live-key".into(),
            secret: "live-secret".into(),
            base_url: DEFAULT_BASE_URL.into(),
            language: "ENG".into(),
            timeout_secs: 30,
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("live-key"));
        assert!(!out.contains("live-secret"));
        assert!(out.contains("hotel-content-api"));
    }
}
