//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default HTTP port for the sales ingestion service
pub const DEFAULT_PORT: u16 = 5810;

/// Service configuration loaded from `<root>/tradeops.toml`
///
/// Every field has a default so a missing or empty file yields a working
/// configuration. Environment variables override file values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,
    /// Base URL of the FIFO cost-allocation service; when unset the
    /// in-process ratio allocator is used instead
    pub fifo_service_url: Option<String>,
    /// Shared secret required by the transform endpoint; when unset the
    /// check is disabled
    pub transform_security_code: Option<String>,
    /// Reject resolution against an empty product catalog instead of
    /// accepting every extracted SKU
    pub strict_catalog: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            fifo_service_url: None,
            transform_security_code: None,
            strict_catalog: false,
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file_key: Option<&str>,
) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Some(key) = config_file_key {
        if let Ok(config_path) = load_config_file() {
            if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
                if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                    if let Some(root_folder) = config.get(key).and_then(|v| v.as_str()) {
                        return Ok(PathBuf::from(root_folder));
                    }
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(get_default_root_folder())
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
    }
    Ok(())
}

/// Path of the service database inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("tradeops.db")
}

/// Load service configuration from `<root>/tradeops.toml`
///
/// A missing file yields the defaults. After the file is read, the
/// `TRADEOPS_PORT`, `TRADEOPS_FIFO_URL`, `TRADEOPS_SECURITY_CODE`, and
/// `TRADEOPS_STRICT_CATALOG` environment variables override its values.
pub fn load_service_config(root: &Path) -> Result<ServiceConfig> {
    let config_path = root.join("tradeops.toml");
    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        toml::from_str::<ServiceConfig>(&content)
            .map_err(|e| Error::Config(format!("invalid {}: {}", config_path.display(), e)))?
    } else {
        ServiceConfig::default()
    };

    if let Ok(port) = std::env::var("TRADEOPS_PORT") {
        config.port = port
            .parse()
            .map_err(|_| Error::Config(format!("TRADEOPS_PORT is not a port number: {}", port)))?;
    }
    if let Ok(url) = std::env::var("TRADEOPS_FIFO_URL") {
        config.fifo_service_url = if url.is_empty() { None } else { Some(url) };
    }
    if let Ok(code) = std::env::var("TRADEOPS_SECURITY_CODE") {
        config.transform_security_code = if code.is_empty() { None } else { Some(code) };
    }
    if let Ok(strict) = std::env::var("TRADEOPS_STRICT_CATALOG") {
        config.strict_catalog = matches!(strict.as_str(), "1" | "true" | "yes");
    }

    Ok(config)
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    let config_dir = if cfg!(target_os = "linux") {
        // Try ~/.config/tradeops/config.toml first, then /etc/tradeops/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("tradeops").join("config.toml"));
        let system_config = PathBuf::from("/etc/tradeops/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else if cfg!(target_os = "macos") {
        dirs::config_dir()
            .map(|d| d.join("tradeops").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    } else if cfg!(target_os = "windows") {
        dirs::config_dir()
            .map(|d| d.join("tradeops").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    } else {
        return Err(Error::Config("Unsupported platform".to_string()));
    };

    if config_dir.exists() {
        Ok(config_dir)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", config_dir)))
    }
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("tradeops"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tradeops"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tradeops"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tradeops"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tradeops"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tradeops"))
    } else {
        PathBuf::from("./tradeops_data")
    }
}
