//! Join configuration, loaded from TOML.

use std::path::Path;

use geojoin_cover::CoverConfig;
use geojoin_types::{Resolution, SourceKey};
use serde::{Deserialize, Serialize};

use crate::error::{JoinError, JoinResult};

/// Top-level configuration file.
///
/// ```toml
/// [join]
/// resolution = 7
/// primary = "goes"
/// secondaries = ["m2"]
///
/// [cover]
/// result_size_limit = 8192
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeojoinConfig {
    pub join: JoinConfig,
    pub cover: CoverConfig,
}

impl GeojoinConfig {
    pub fn from_toml_str(text: &str) -> JoinResult<Self> {
        toml::from_str(text).map_err(|e| JoinError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> JoinResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> JoinResult<String> {
        toml::to_string(self).map_err(|e| JoinError::Config(e.to_string()))
    }
}

/// Configuration for [`JoinEngine`](crate::JoinEngine).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Shared join resolution. `None` takes the first secondary source's
    /// native resolution.
    pub resolution: Option<Resolution>,
    /// Source whose samples produce records.
    pub primary: SourceKey,
    /// Sources matched against the primary, in output order.
    pub secondaries: Vec<SourceKey>,
    /// Stored secondary values are `(value - value_offset) / value_scale`.
    pub value_scale: f64,
    pub value_offset: f64,
    /// Number of progress reports over a join walk.
    pub progress_checkpoints: usize,
    /// Bound on identifiers a cover or seed expansion may produce.
    pub result_size_limit: usize,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            primary: SourceKey::Goes,
            secondaries: vec![SourceKey::Merra2],
            value_scale: 0.001,
            value_offset: 0.0,
            progress_checkpoints: 10,
            result_size_limit: 4096,
        }
    }
}

impl JoinConfig {
    pub fn validate(&self) -> JoinResult<()> {
        if !self.value_scale.is_finite() || self.value_scale == 0.0 {
            return Err(JoinError::Config(format!(
                "value_scale must be finite and non-zero, got {}",
                self.value_scale
            )));
        }
        if !self.value_offset.is_finite() {
            return Err(JoinError::Config("value_offset must be finite".into()));
        }
        if self.secondaries.contains(&self.primary) {
            return Err(JoinError::Config(format!(
                "{} is both primary and secondary",
                self.primary
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = GeojoinConfig::from_toml_str("").unwrap();
        assert_eq!(config, GeojoinConfig::default());
        assert_eq!(config.join.value_scale, 0.001);
        assert_eq!(config.join.progress_checkpoints, 10);
        assert_eq!(config.cover.result_size_limit, 4096);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = GeojoinConfig::from_toml_str(
            r#"
            [join]
            resolution = 7
            secondaries = ["m2", "amsr2"]

            [cover]
            min_resolution = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.join.resolution, Some(Resolution::new(7).unwrap()));
        assert_eq!(config.join.primary, SourceKey::Goes);
        assert_eq!(config.join.secondaries[1], SourceKey::parse("amsr2"));
        assert_eq!(config.cover.min_resolution, Some(Resolution::new(3).unwrap()));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let err = GeojoinConfig::from_toml_str("[join]\nresolution = 99\n").unwrap_err();
        assert!(matches!(err, JoinError::Config(_)));

        let config = JoinConfig {
            value_scale: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = JoinConfig {
            secondaries: vec![SourceKey::Goes],
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(JoinConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = GeojoinConfig::default();
        config.join.resolution = Some(Resolution::new(9).unwrap());
        let text = config.to_toml_string().unwrap();
        assert_eq!(GeojoinConfig::from_toml_str(&text).unwrap(), config);
    }
}
