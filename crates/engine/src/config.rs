//! Engine configuration via `appstruct.toml`
//!
//! Tunables shared by every application served by one provider. A default
//! file can be written on first start; to change settings, edit the file and
//! restart.

use serde::{Deserialize, Serialize};
use std::path::Path;

use appstruct_core::{Error, Result};

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "appstruct.toml";

/// Default number of PLog events kept for point reads.
pub const DEFAULT_PLOG_CACHE_SIZE: usize = 10_000;

/// Default lifetime of verified value tokens, in seconds.
pub const DEFAULT_VERIFIED_TOKEN_TTL_SECS: u64 = 600;

/// Engine configuration loaded from `appstruct.toml`.
///
/// # Example
///
/// ```toml
/// # PLog events kept in memory for single-event reads (0 disables the cache)
/// plog_cache_size = 10000
///
/// # Lifetime of verified value tokens, seconds
/// verified_token_ttl_secs = 600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructsConfig {
    /// Capacity of the PLog point-read cache.
    #[serde(default = "default_plog_cache_size")]
    pub plog_cache_size: usize,
    /// Lifetime of issued verified value tokens.
    #[serde(default = "default_verified_token_ttl_secs")]
    pub verified_token_ttl_secs: u64,
}

fn default_plog_cache_size() -> usize {
    DEFAULT_PLOG_CACHE_SIZE
}

fn default_verified_token_ttl_secs() -> u64 {
    DEFAULT_VERIFIED_TOKEN_TTL_SECS
}

impl Default for StructsConfig {
    fn default() -> Self {
        Self {
            plog_cache_size: DEFAULT_PLOG_CACHE_SIZE,
            verified_token_ttl_secs: DEFAULT_VERIFIED_TOKEN_TTL_SECS,
        }
    }
}

impl StructsConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# appstruct engine configuration
#
# PLog events kept in memory for single-event reads.
# Set to 0 to disable the cache.
plog_cache_size = 10000

# Lifetime of verified value tokens, seconds.
verified_token_ttl_secs = 600
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value has the
    /// wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StructsConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_argument(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::storage(
                format!("read config file '{}'", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidArgument(msg) => Error::InvalidArgument(format!(
                "config file '{}': {}",
                path.display(),
                msg
            )),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::storage(
                    format!("write default config file '{}'", path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::invalid_argument(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::storage(format!("write config file '{}'", path.display()), e)
        })
    }

    fn validate(&self) -> Result<()> {
        if self.verified_token_ttl_secs == 0 {
            return Err(Error::invalid_argument(
                "verified_token_ttl_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}
