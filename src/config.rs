use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use dotenv::dotenv;
use serde::Deserialize;
use tracing::warn;

use crate::{statement_parsing::ParserSettings, utils::empty_as_none};

#[derive(Deserialize)]
pub struct EnvironmentVariables {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub database_url: Option<String>,
    pub watch_dir: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub processed_dir: Option<String>,
    pub settle_debounce_ms: Option<u64>,
    pub watch_poll_ms: Option<u64>,
    pub write_settle_ms: Option<u64>,
    pub store_timeout_ms: Option<u64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parsers_file: Option<String>,
    pub archive_processed: Option<bool>,
    pub dry_run: Option<bool>,
}

pub struct Config {
    /// Unset only for dry runs, which keep everything in memory.
    pub database_url: Option<String>,
    pub watch_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub settle_debounce: Duration,
    pub watch_poll: Duration,
    pub write_settle: Duration,
    pub store_timeout: Duration,
    pub archive_processed: bool,
    pub dry_run: bool,

    pub parsers: HashMap<String, ParserSettings>,
}

impl Config {
    pub fn new() -> Result<Self, anyhow::Error> {
        let _ = dotenv().map_err(|err| warn!("error loading .env: {:?}", err));

        let envs =
            envy::from_env::<EnvironmentVariables>().context("invalid environment variables")?;

        return Config::from_envs(envs);
    }

    pub fn from_envs(envs: EnvironmentVariables) -> Result<Self, anyhow::Error> {
        let dry_run = envs.dry_run.unwrap_or(false);
        if envs.database_url.is_none() && !dry_run {
            anyhow::bail!("DATABASE_URL must be set unless DRY_RUN is on");
        }

        let watch_dir = resolve_dir(Path::new(&envs.watch_dir));
        let processed_dir = match envs.processed_dir {
            Some(dir) => resolve_dir(Path::new(&dir)),
            None => watch_dir.join("processed"),
        };

        let parsers = match envs.parsers_file {
            Some(path) => load_parser_settings(&path)?,
            None => HashMap::new(),
        };

        return Ok(Config {
            database_url: envs.database_url,
            watch_dir,
            processed_dir,
            settle_debounce: Duration::from_millis(envs.settle_debounce_ms.unwrap_or(3000)),
            watch_poll: Duration::from_millis(envs.watch_poll_ms.unwrap_or(500)),
            write_settle: Duration::from_millis(envs.write_settle_ms.unwrap_or(2000)),
            store_timeout: Duration::from_millis(envs.store_timeout_ms.unwrap_or(10_000)),
            archive_processed: envs.archive_processed.unwrap_or(true) && !dry_run,
            dry_run,

            parsers,
        });
    }
}

/// Absolute form of `path` with symlinks resolved as far as it exists, so
/// the watched and processed directories compare by prefix.
fn resolve_dir(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            resolve_dir(parent).join(name)
        }
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn load_parser_settings(path: &str) -> Result<HashMap<String, ParserSettings>, anyhow::Error> {
    let contents = std::fs::read_to_string(path).context("error reading parsers file")?;

    serde_json::from_str(&contents).context("invalid parsers file")
}
