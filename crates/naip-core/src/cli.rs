//! Shared CLI helpers for workspace tools.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` with `verbose`, `info` without.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbose))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}

pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config {}: {e}", path.display())))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatasetConfig;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.toml");
        fs::write(&path, "manifest_path = \"val.csv\"\nsplit = \"val\"\nimage_size = 256\n").unwrap();

        let config: DatasetConfig = load_toml_config(&path).unwrap();
        assert_eq!(config.image_size, 256);
        assert_eq!(config.split, crate::Split::Val);
    }

    #[test]
    fn test_load_toml_config_missing_file() {
        let err = load_toml_config::<DatasetConfig>(Path::new("/nonexistent/dataset.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_toml_config_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "image_size = \"large\"").unwrap();

        let err = load_toml_config::<DatasetConfig>(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
