//! Configuration loading and root folder resolution
//!
//! Root folder resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. `LINGUA_ROOT_FOLDER` environment variable
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: the resolver logs a
//! warning and falls through to the next tier.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LINGUA_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "LINGUA_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "lingua.db";

/// Values used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            port: 5760,
        }
    }
}

/// Optional settings read from `config.toml`
///
/// Every field is optional; absent keys fall back to CLI/env/compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
    pub port: Option<u16>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Resolves the root folder for one service
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_file: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Explicit config file, bypassing the platform search
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Load the TOML config, if one can be found and parsed
    pub fn toml_config(&self) -> Option<TomlConfig> {
        let path = self
            .config_file
            .clone()
            .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
            .or_else(find_config_file)?;

        match TomlConfig::load(&path) {
            Ok(config) => {
                debug!("{}: loaded config file {}", self.module_name, path.display());
                Some(config)
            }
            Err(e) => {
                warn!(
                    "{}: ignoring config file {}: {}",
                    self.module_name,
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Resolve the root folder using the priority order above
    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(root_folder) = self.toml_config().and_then(|c| c.root_folder) {
            return root_folder;
        }

        // Priority 4: OS-dependent compiled default
        warn!(
            "{}: no root folder configured, using compiled default",
            self.module_name
        );
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            debug!("Created root folder {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

/// Platform config file search
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("lingua").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/lingua/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/lingua (or /var/lib/lingua for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("lingua"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lingua"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/lingua
        dirs::data_dir()
            .map(|d| d.join("lingua"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lingua"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\lingua
        dirs::data_local_dir()
            .map(|d| d.join("lingua"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lingua"))
    } else {
        PathBuf::from("./lingua_data")
    }
}
