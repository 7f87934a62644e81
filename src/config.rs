use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::Path,
};

use crate::{error::MapError, layout::DEFAULT_NODE_SIZE, query::DEFAULT_PAGE_SIZE};

/// Tunables of the load pipeline, read from a TOML file:
///
/// ```toml
/// page_size = 25
/// node_size = 150.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Segments requested per `find_segments` page.
    pub page_size: usize,
    /// Horizontal spacing between neighbouring nodes and vertical spacing between depths.
    pub node_size: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            page_size: DEFAULT_PAGE_SIZE,
            node_size: DEFAULT_NODE_SIZE,
        }
    }
}

impl ExplorerConfig {
    /// Read and validate the config at `path`. A missing file yields the defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read explorer config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(ExplorerConfig::default());
        }
        let content = read_to_string(path)?;
        let config: ExplorerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MapError> {
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), MapError> {
        if self.page_size == 0 {
            return Err(MapError::Config("page_size must be positive".to_string()));
        }
        if !self.node_size.is_finite() || self.node_size <= 0.0 {
            return Err(MapError::Config(format!(
                "node_size must be a positive number, got {}",
                self.node_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExplorerConfig::from_path(dir.path().join("mapview.toml")).unwrap();
        assert_eq!(config, ExplorerConfig::default());
        assert_eq!(config.page_size, 25);
        assert_eq!(config.node_size, 150.0);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapview.toml");
        write(&path, "page_size = 10\n").unwrap();
        let config = ExplorerConfig::from_path(&path).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.node_size, DEFAULT_NODE_SIZE);

        let custom = ExplorerConfig {
            page_size: 5,
            node_size: 40.0,
        };
        custom.save(&path).unwrap();
        assert_eq!(ExplorerConfig::from_path(&path).unwrap(), custom);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapview.toml");
        write(&path, "page_size = 0\n").unwrap();
        assert!(matches!(
            ExplorerConfig::from_path(&path),
            Err(MapError::Config(_))
        ));

        write(&path, "node_size = \"wide\"\n").unwrap();
        assert!(matches!(
            ExplorerConfig::from_path(&path),
            Err(MapError::Config(_))
        ));

        let negative = ExplorerConfig {
            node_size: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }
}
