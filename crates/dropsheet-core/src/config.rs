use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::collaborators::SheetTarget;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// IANA zone whose calendar date counts as "today".
    pub timezone: String,
    pub warehouse: WarehouseConfig,
    pub queries: QueriesConfig,
    pub metadata: MetadataConfig,
    pub leaderboard: LeaderboardConfig,
    pub publisher: PublisherConfig,
    pub targets: TargetsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            warehouse: WarehouseConfig::default(),
            queries: QueriesConfig::default(),
            metadata: MetadataConfig::default(),
            leaderboard: LeaderboardConfig::default(),
            publisher: PublisherConfig::default(),
            targets: TargetsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    pub database_url_env: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database_url_env: "DATABASE_URL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueriesConfig {
    pub dir: PathBuf,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("queries"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub collectibles_url_env: String,
    pub comics_url_env: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            collectibles_url_env: "API_CALL_URL_SETS".to_string(),
            comics_url_env: "API_CALL_URL_COMICS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeaderboardConfig {
    pub limit: u32,
    /// The activity window starts this many days before today and ends yesterday.
    pub window_days: u32,
    pub excluded_wallets: Vec<String>,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_days: 61,
            excluded_wallets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    GoogleSheets,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    pub kind: PublisherKind,
    pub access_token_env: String,
    pub output_dir: PathBuf,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::GoogleSheets,
            access_token_env: "GOOGLE_SHEETS_ACCESS_TOKEN".to_string(),
            output_dir: PathBuf::from("out"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetsConfig {
    pub transfers: SheetTarget,
    pub mints: SheetTarget,
    pub active_wallets: SheetTarget,
    pub drops: SheetTarget,
    pub leaderboard: SheetTarget,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            transfers: SheetTarget::new("Veve Tracker Daily", "Transfers"),
            mints: SheetTarget::new("Veve Tracker Daily", "Mints"),
            active_wallets: SheetTarget::new("Active Wallets", "Daily"),
            drops: SheetTarget::new("Veve Drops", "All"),
            leaderboard: SheetTarget::new("Leaderboard", "Daily"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.leaderboard.limit == 0 {
            return Err(PipelineError::Config(
                "leaderboard.limit must be at least 1".to_string(),
            ));
        }
        if self.leaderboard.window_days < 1 {
            return Err(PipelineError::Config(
                "leaderboard.window_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| PipelineError::Config(format!("unknown timezone `{}`", self.timezone)))
    }
}

/// Reads a secret from the environment variable named by the config.
pub fn required_env(var: &str) -> Result<String> {
    std::env::var(var)
        .map_err(|_| PipelineError::Config(format!("environment variable {var} must be set")))
}
