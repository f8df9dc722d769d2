//! Configuration types for archive-watch

use crate::error::{Error, Result};
use crate::types::ArchiveType;
use crate::utils::extension_of;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watched directory configuration
///
/// Supplied by the host application. The `archive_extensions` list is the
/// archive-classification predicate: files whose extension is listed are
/// watched for stability and extracted, everything else is reported as
/// detected straight away.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch for new files (default: "./imports")
    #[serde(default = "default_watch_path")]
    pub path: PathBuf,

    /// Where archives are extracted to (None = the watched directory itself)
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Interval between directory listings and size samples (default: 2 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// File extensions to treat as archives, without dots (default: zip, 7z)
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// Create the watched directory on start if it does not exist (default: true)
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: default_watch_path(),
            destination: None,
            poll_interval: default_poll_interval(),
            archive_extensions: default_archive_extensions(),
            create_if_missing: true,
        }
    }
}

impl WatchConfig {
    /// Config for `path` with every other setting at its default
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: WatchConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Directory archives are extracted into
    pub fn destination_dir(&self) -> &Path {
        self.destination.as_deref().unwrap_or(&self.path)
    }

    /// Check whether a path is classified as an archive
    ///
    /// Matching is case-insensitive and uses the final extension only.
    pub fn is_archive(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => self
                .archive_extensions
                .iter()
                .any(|ae| ae.eq_ignore_ascii_case(&ext)),
            None => false,
        }
    }

    /// Validate the configuration
    ///
    /// Every allow-listed extension must map to an extraction backend, so that
    /// a file classified as an archive always has somewhere to go.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll_interval must be greater than zero".into(),
                key: Some("poll_interval".into()),
            });
        }

        if self.archive_extensions.is_empty() {
            return Err(Error::Config {
                message: "archive_extensions must not be empty".into(),
                key: Some("archive_extensions".into()),
            });
        }

        if let Some(ext) = self
            .archive_extensions
            .iter()
            .find(|ext| ArchiveType::from_extension(ext).is_none())
        {
            return Err(Error::Config {
                message: format!("no extraction backend for archive extension '{}'", ext),
                key: Some("archive_extensions".into()),
            });
        }

        Ok(())
    }
}

fn default_watch_path() -> PathBuf {
    PathBuf::from("./imports")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_archive_extensions() -> Vec<String> {
    vec!["zip".into(), "7z".into()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (integer milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
