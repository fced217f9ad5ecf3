//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "POTD_BACK_CONFIG_PATH";
/// Default root for documents and attachments.
const DEFAULT_DATA_DIR: &str = "potd-data";
/// Rows shown on the public leaderboard before ties are appended.
const DEFAULT_LEADERBOARD_ROWS: usize = 20;
/// Sheet written by season archival when none is named.
const DEFAULT_EXPORT_SHEET: &str = "POTD Sheet";
/// Accepted layout for `utc_offset`, e.g. `-05:00`.
const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Root directory; documents live in `data/`, local attachments in `images/`.
    pub data_dir: PathBuf,
    /// Fixed offset of the competition's reference timezone.
    pub utc_offset: UtcOffset,
    /// Row count of the public leaderboard.
    pub leaderboard_rows: usize,
    /// Base URL of the chat bridge; offline gateway when absent.
    pub gateway_url: Option<String>,
    /// Bearer token presented to the chat bridge.
    pub gateway_token: Option<String>,
    /// JSON workbook written by season archival.
    pub export_path: PathBuf,
    /// Sheet used when archival names none.
    pub export_sheet: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config = Self::from_raw(raw);
                    info!(
                        path = %path.display(),
                        data_dir = %app_config.data_dir.display(),
                        utc_offset = %app_config.utc_offset,
                        gateway = app_config.gateway_url.as_deref().unwrap_or("offline"),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Directory holding the JSON documents.
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("data")
    }

    /// Directory holding attachments for the offline gateway.
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let data_dir = raw.data_dir.unwrap_or(defaults.data_dir);
        let utc_offset = match raw.utc_offset.as_deref().map(parse_offset) {
            Some(Ok(offset)) => offset,
            Some(Err(value)) => {
                warn!(%value, "invalid utc_offset; keeping default");
                defaults.utc_offset
            }
            None => defaults.utc_offset,
        };

        Self {
            export_path: raw
                .export_path
                .unwrap_or_else(|| data_dir.join("export").join("sheets.json")),
            data_dir,
            utc_offset,
            leaderboard_rows: raw
                .leaderboard_rows
                .filter(|rows| *rows > 0)
                .unwrap_or(defaults.leaderboard_rows),
            gateway_url: raw.gateway_url.filter(|url| !url.trim().is_empty()),
            gateway_token: raw.gateway_token,
            export_sheet: raw.export_sheet.unwrap_or(defaults.export_sheet),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            export_path: data_dir.join("export").join("sheets.json"),
            data_dir,
            utc_offset: UtcOffset::from_hms(-5, 0, 0).unwrap_or(UtcOffset::UTC),
            leaderboard_rows: DEFAULT_LEADERBOARD_ROWS,
            gateway_url: None,
            gateway_token: None,
            export_sheet: DEFAULT_EXPORT_SHEET.to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_dir: Option<PathBuf>,
    utc_offset: Option<String>,
    leaderboard_rows: Option<usize>,
    gateway_url: Option<String>,
    gateway_token: Option<String>,
    export_path: Option<PathBuf>,
    export_sheet: Option<String>,
}

fn parse_offset(value: &str) -> Result<UtcOffset, String> {
    UtcOffset::parse(value.trim(), OFFSET_FORMAT).map_err(|_| value.to_owned())
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
