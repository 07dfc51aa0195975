// Runtime settings read from the environment

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_PHOTO_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Root for the Foods, FoodLog and ConditionLog directories
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub photo_intake_url: Option<String>,
    pub photo_intake_token: Option<String>,
    pub photo_timeout: Duration,
    /// SQLite file for session state; sessions live in memory when unset
    pub session_db: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (environment, CLI flags, a test map).
    ///
    /// Creates the data directory so it can be canonicalized.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()));
        let data_dir = expand_home(data_dir);
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        let data_dir = data_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", data_dir.display()))?;

        let tz_name = get("TZ").unwrap_or_else(|| DEFAULT_TIMEZONE.into());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|e| eyre!("Invalid timezone '{}': {}", tz_name, e))?;

        let photo_timeout = match get("PHOTO_INTAKE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid PHOTO_INTAKE_TIMEOUT_SECS '{}'", raw))?,
            None => DEFAULT_PHOTO_TIMEOUT_SECS,
        };

        Ok(Settings {
            data_dir,
            timezone,
            photo_intake_url: get("PHOTO_INTAKE_URL"),
            photo_intake_token: get("PHOTO_INTAKE_TOKEN"),
            photo_timeout: Duration::from_secs(photo_timeout),
            session_db: get("SESSION_DB").map(|p| expand_home(PathBuf::from(p))),
        })
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(rest),
            Err(_) => path,
        },
        Err(_) => path,
    }
}
