//! Configuration loading and root folder resolution
//!
//! Two sources of configuration:
//! 1. **TOML bootstrap**: bind address, port, session lifetime, upload limit,
//!    logging (read once at startup)
//! 2. **Root folder**: holds `spm.db` and the `media/` tree
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `SPM_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "SPM_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "spm.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder for database and uploaded files
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Session lifetime in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Upper bound on a single uploaded document
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_session_ttl_hours() -> i64 {
    12
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind: default_bind(),
            port: default_port(),
            session_ttl_hours: default_session_ttl_hours(),
            max_upload_bytes: default_max_upload_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the platform config
    /// locations are searched; if none exists the built-in defaults are used.
    /// Nothing is logged here; report the returned [`ConfigSource`] once
    /// tracing is up.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match find_config_file() {
                Some(path) => path,
                None => return Ok((Self::default(), ConfigSource::Defaults)),
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        Ok((config, ConfigSource::File(path)))
    }

    fn validate(&self) -> Result<()> {
        if self.session_ttl_hours <= 0 {
            return Err(Error::Config(
                "session_ttl_hours must be positive".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No config file was found
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => warn!("No config file found, using built-in defaults"),
        }
    }
}

/// Locate the platform config file, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("spm").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/spm/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("spm"))
        .unwrap_or_else(|| PathBuf::from("./spm_data"))
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder and the media directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(self.media_path())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn media_path(&self) -> PathBuf {
        self.root_folder.join("media")
    }
}
