use geojoin_types::Resolution;
use serde::{Deserialize, Serialize};

/// Bounds on cover generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Maximum number of identifiers a single cover may hold.
    pub result_size_limit: usize,
    /// Coarsest resolution a cover may fall back to. `None` disables
    /// fallback: an oversized cover is an error.
    pub min_resolution: Option<Resolution>,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            result_size_limit: 4096,
            min_resolution: None,
        }
    }
}
