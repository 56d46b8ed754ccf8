//! Configuration management for the FileEX daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/fileex/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("page_size must be between 1 and 10000, got {0}")]
    InvalidPageSize(usize),

    #[error("thumbnail_size must be between 16 and 1024, got {0}")]
    InvalidThumbnailSize(u32),

    #[error("max_extract_size must be greater than 0, got {0}")]
    InvalidMaxExtractSize(u64),

    #[error("restricted_paths entries must be non-empty absolute paths, got {0:?}")]
    InvalidRestrictedPath(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the FileEX daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Filesystem access and trash configuration.
    pub files: FilesConfig,

    /// Thumbnail and archive preview configuration.
    pub preview: PreviewConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for storing daemon data (trash, logs).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Write logs to daily rotated files in this directory instead of stderr.
    pub log_file: Option<PathBuf>,

    /// IPC socket path. Defaults to a per-user runtime location.
    pub socket_path: Option<PathBuf>,
}

/// Filesystem access and trash configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Path prefixes that can never be listed, previewed or trashed.
    pub restricted_paths: Vec<String>,

    /// Reject every mutating operation.
    pub read_only: bool,

    /// Trash directory. Defaults to `<data_dir>/trash`.
    pub trash_dir: Option<PathBuf>,

    /// Directory whose subdirectories are presented as drives, for
    /// containers where the host volumes are bind-mounted.
    pub mount_root: Option<PathBuf>,

    /// Default number of entries per directory page.
    pub page_size: usize,
}

/// Preview configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Thumbnail bounding box edge in pixels.
    pub thumbnail_size: u32,

    /// Largest archive member that may be extracted, in bytes (default: 100MB).
    pub max_extract_size: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_file: None,
            socket_path: None,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            restricted_paths: default_restricted_paths(),
            read_only: true,
            trash_dir: None,
            mount_root: None,
            page_size: 100,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: 100,
            max_extract_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fileex")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fileex")
}

/// Returns the system locations denied by default on the current platform.
fn default_restricted_paths() -> Vec<String> {
    let paths: &[&str] = if cfg!(windows) {
        &[
            r"C:\Windows",
            r"C:\Program Files",
            r"C:\Program Files (x86)",
            r"C:\$Recycle.Bin",
            r"C:\System Volume Information",
        ]
    } else {
        &["/etc", "/var", "/usr", "/sys", "/proc", "/dev", "/root"]
    };

    paths.iter().map(|p| p.to_string()).collect()
}

/// Parse a boolean environment value.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl FilesConfig {
    /// Trash directory, falling back to `<data_dir>/trash`.
    pub fn trash_dir(&self, data_dir: &Path) -> PathBuf {
        self.trash_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("trash"))
    }
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEEX_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - FILEEX_READ_ONLY: Override the read-only flag (true/false, 1/0, yes/no)
    /// - FILEEX_TRASH_DIR: Override the trash directory
    /// - FILEEX_MOUNT_ROOT: Override the pseudo-drive mount root
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("FILEEX_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(value) = std::env::var("FILEEX_READ_ONLY") {
            match parse_bool(&value) {
                Some(read_only) => {
                    tracing::info!("Overriding read_only from environment: {}", read_only);
                    self.files.read_only = read_only;
                }
                None if value.is_empty() => {}
                None => tracing::warn!("Ignoring invalid FILEEX_READ_ONLY value: {:?}", value),
            }
        }

        if let Ok(dir) = std::env::var("FILEEX_TRASH_DIR") {
            if !dir.is_empty() {
                tracing::info!("Overriding trash_dir from environment: {}", dir);
                self.files.trash_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(root) = std::env::var("FILEEX_MOUNT_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding mount_root from environment: {}", root);
                self.files.mount_root = Some(PathBuf::from(root));
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate page_size: 1-10000
        if self.files.page_size < 1 || self.files.page_size > 10000 {
            return Err(ConfigError::InvalidPageSize(self.files.page_size));
        }

        // Validate thumbnail_size: 16-1024
        if !(16..=1024).contains(&self.preview.thumbnail_size) {
            return Err(ConfigError::InvalidThumbnailSize(self.preview.thumbnail_size));
        }

        // Validate max_extract_size: > 0
        if self.preview.max_extract_size == 0 {
            return Err(ConfigError::InvalidMaxExtractSize(self.preview.max_extract_size));
        }

        for entry in &self.files.restricted_paths {
            if entry.trim().is_empty() || !Path::new(entry).is_absolute() {
                return Err(ConfigError::InvalidRestrictedPath(entry.clone()));
            }
        }

        // Validate log_level is a known value
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Trash directory after applying the data directory default.
    pub fn trash_dir(&self) -> PathBuf {
        self.files.trash_dir(&self.daemon.data_dir)
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/fileex/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 4] = [
        "FILEEX_LOG_LEVEL",
        "FILEEX_READ_ONLY",
        "FILEEX_TRASH_DIR",
        "FILEEX_MOUNT_ROOT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.daemon.log_level, "info");
        assert!(config.daemon.log_file.is_none());
        assert!(config.files.read_only);
        assert_eq!(config.files.page_size, 100);
        assert!(!config.files.restricted_paths.is_empty());
        assert_eq!(config.preview.thumbnail_size, 100);
        assert_eq!(config.preview.max_extract_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_default_daemon_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(config.data_dir.to_string_lossy().contains("fileex"));
    }

    #[cfg(unix)]
    #[test]
    fn test_default_restricted_paths_unix() {
        let paths = default_restricted_paths();
        for expected in ["/etc", "/var", "/usr", "/sys", "/proc", "/dev", "/root"] {
            assert!(paths.iter().any(|p| p == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_default_trash_dir_under_data_dir() {
        let mut config = Config::default();
        config.daemon.data_dir = PathBuf::from("/srv/fileex");
        assert_eq!(config.trash_dir(), PathBuf::from("/srv/fileex/trash"));

        config.files.trash_dir = Some(PathBuf::from("/mnt/trash"));
        assert_eq!(config.trash_dir(), PathBuf::from("/mnt/trash"));
    }

    #[test]
    fn test_from_toml_empty() {
        // Empty TOML should use all defaults
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[daemon]
log_level = "debug"

[files]
read_only = false
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.daemon.log_level, "debug");
        assert!(!config.files.read_only);
        // Unspecified values keep their defaults
        assert_eq!(config.files.page_size, 100);
        assert_eq!(config.preview, PreviewConfig::default());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[daemon]
data_dir = "/var/lib/fileex"
log_level = "warn"
log_file = "/var/log/fileex"
socket_path = "/run/fileex.sock"

[files]
restricted_paths = ["/secret"]
read_only = false
trash_dir = "/data/.trash"
mount_root = "/mnt"
page_size = 50

[preview]
thumbnail_size = 256
max_extract_size = 1048576
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.daemon.data_dir, PathBuf::from("/var/lib/fileex"));
        assert_eq!(config.daemon.log_file, Some(PathBuf::from("/var/log/fileex")));
        assert_eq!(config.daemon.socket_path, Some(PathBuf::from("/run/fileex.sock")));
        assert_eq!(config.files.restricted_paths, vec!["/secret".to_string()]);
        assert_eq!(config.files.trash_dir, Some(PathBuf::from("/data/.trash")));
        assert_eq!(config.files.mount_root, Some(PathBuf::from("/mnt")));
        assert_eq!(config.files.page_size, 50);
        assert_eq!(config.preview.thumbnail_size, 256);
        assert_eq!(config.preview.max_extract_size, 1048576);
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let result = Config::from_toml("invalid [ toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let toml = r#"
[files]
read_only = "sometimes"
"#;
        let err = Config::from_toml(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid TOML"));
    }

    #[test]
    fn test_roundtrip_custom() {
        let mut config = Config::default();
        config.files.read_only = false;
        config.files.mount_root = Some(PathBuf::from("/mnt"));
        config.preview.thumbnail_size = 64;

        let toml = config.to_toml().unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.daemon.log_level = "debug".to_string();
        config.save(&config_path).unwrap();

        assert!(config_path.exists());
        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "invalid [ toml").unwrap();

        let err = Config::load(&config_path).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("fileex"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("FILEEX_LOG_LEVEL", "trace");
        std::env::set_var("FILEEX_READ_ONLY", "false");
        std::env::set_var("FILEEX_TRASH_DIR", "/tmp/fileex-trash");
        std::env::set_var("FILEEX_MOUNT_ROOT", "/mnt/host");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.daemon.log_level, "trace");
        assert!(!config.files.read_only);
        assert_eq!(config.files.trash_dir, Some(PathBuf::from("/tmp/fileex-trash")));
        assert_eq!(config.files.mount_root, Some(PathBuf::from("/mnt/host")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_does_not_override() {
        clear_env();
        for var in ENV_VARS {
            std::env::set_var(var, "");
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config, Config::default());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_read_only_ignored() {
        clear_env();
        std::env::set_var("FILEEX_READ_ONLY", "perhaps");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert!(config.files.read_only);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_unset_does_not_override() {
        clear_env();

        let mut config = Config::default();
        config.files.read_only = false;
        config.apply_env_overrides();
        assert!(!config.files.read_only);
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_page_size() {
        let mut config = Config::default();

        config.files.page_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPageSize(0)));

        config.files.page_size = 10001;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPageSize(10001)));

        config.files.page_size = 1;
        assert!(config.validate().is_ok());
        config.files.page_size = 10000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_thumbnail_size() {
        let mut config = Config::default();

        config.preview.thumbnail_size = 15;
        assert_eq!(config.validate(), Err(ConfigError::InvalidThumbnailSize(15)));

        config.preview.thumbnail_size = 1025;
        assert_eq!(config.validate(), Err(ConfigError::InvalidThumbnailSize(1025)));

        config.preview.thumbnail_size = 16;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_extract_size_zero() {
        let mut config = Config::default();
        config.preview.max_extract_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxExtractSize(0)));
    }

    #[test]
    fn test_validate_restricted_paths() {
        let mut config = Config::default();

        config.files.restricted_paths = vec![String::new()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRestrictedPath(_))
        ));

        config.files.restricted_paths = vec!["relative/dir".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRestrictedPath(_))
        ));

        config.files.restricted_paths = Vec::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();

        config.daemon.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.daemon.log_level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );
    }
}
