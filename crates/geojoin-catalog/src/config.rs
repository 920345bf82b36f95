use geojoin_types::Resolution;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Catalog`](crate::Catalog).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Resolution every key is normalized to. `None` stores keys verbatim.
    pub resolution: Option<Resolution>,
    /// Upper bound on the identifiers a single seed may expand to.
    pub result_size_limit: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            result_size_limit: 4096,
        }
    }
}

impl CatalogConfig {
    pub fn at(resolution: Resolution) -> Self {
        Self {
            resolution: Some(resolution),
            ..Default::default()
        }
    }
}
