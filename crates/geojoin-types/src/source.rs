//! Source keys tagging which product a datum came from.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies a data source inside a catalog.
///
/// Known products have dedicated variants with fixed small indices; any
/// other key is carried verbatim as [`SourceKey::Custom`].
///
/// Keys compare by name, so a `Custom` spelling of a known name is the
/// same key as its variant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKey {
    Goes,
    GoesBand3,
    GoesBand4,
    GoesBand5,
    Modis,
    Merra2,
    Custom(String),
}

impl SourceKey {
    /// Known keys in index order.
    pub const KNOWN: [SourceKey; 6] = [
        SourceKey::Goes,
        SourceKey::GoesBand3,
        SourceKey::GoesBand4,
        SourceKey::GoesBand5,
        SourceKey::Modis,
        SourceKey::Merra2,
    ];

    /// Parse a free-form key. Known names map to their variants.
    pub fn parse(s: &str) -> Self {
        match s {
            "goes" => Self::Goes,
            "goes_b3" => Self::GoesBand3,
            "goes_b4" => Self::GoesBand4,
            "goes_b5" => Self::GoesBand5,
            "modis" => Self::Modis,
            "m2" => Self::Merra2,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Goes => "goes",
            Self::GoesBand3 => "goes_b3",
            Self::GoesBand4 => "goes_b4",
            Self::GoesBand5 => "goes_b5",
            Self::Modis => "modis",
            Self::Merra2 => "m2",
            Self::Custom(s) => s,
        }
    }

    /// Fixed index for known keys.
    pub fn known_index(&self) -> Option<u16> {
        Self::KNOWN
            .iter()
            .position(|k| k.as_str() == self.as_str())
            .map(|i| i as u16)
    }

    /// The canonical form: known names become their variant.
    pub fn normalized(&self) -> Self {
        Self::parse(self.as_str())
    }

    pub fn is_known(&self) -> bool {
        self.known_index().is_some()
    }

    /// Map a GOES imager band name (as found in product file names) to its
    /// key. Only the bands the joins understand are recognized.
    pub fn from_goes_band(band: &str) -> Option<Self> {
        match band {
            "BAND_03" => Some(Self::GoesBand3),
            "BAND_04" => Some(Self::GoesBand4),
            "BAND_05" => Some(Self::GoesBand5),
            _ => None,
        }
    }
}

impl PartialEq for SourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for SourceKey {}

impl Hash for SourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

// Known keys first, in index order, then custom keys by name.
impl Ord for SourceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = |k: &Self| k.known_index().unwrap_or(u16::MAX);
        rank(self)
            .cmp(&rank(other))
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl PartialOrd for SourceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for SourceKey {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for SourceKey {
    fn from(s: String) -> Self {
        match Self::parse(&s) {
            Self::Custom(_) => Self::Custom(s),
            known => known,
        }
    }
}

impl From<&SourceKey> for SourceKey {
    fn from(k: &SourceKey) -> Self {
        k.clone()
    }
}

impl From<SourceKey> for String {
    fn from(k: SourceKey) -> String {
        match k {
            SourceKey::Custom(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for SourceKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Infallible> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_roundtrip() {
        for key in SourceKey::KNOWN {
            assert_eq!(SourceKey::parse(key.as_str()), key);
            assert!(key.is_known());
        }
    }

    #[test]
    fn known_indices_are_stable() {
        assert_eq!(SourceKey::Goes.known_index(), Some(0));
        assert_eq!(SourceKey::Custom("m2".into()).known_index(), Some(5));
        assert_eq!(SourceKey::Merra2.known_index(), Some(5));
        assert_eq!(SourceKey::from("viirs").known_index(), None);
    }

    #[test]
    fn free_form_keys_are_kept() {
        let key: SourceKey = "amsr2_tb89".parse().unwrap();
        assert_eq!(key, SourceKey::Custom("amsr2_tb89".into()));
        assert_eq!(key.to_string(), "amsr2_tb89");
        assert_eq!(SourceKey::from(String::from("m2")), SourceKey::Merra2);
    }

    #[test]
    fn custom_spelling_of_a_known_name_is_the_same_key() {
        let spelled = SourceKey::Custom("goes".into());
        assert_eq!(spelled, SourceKey::Goes);
        assert_eq!(spelled.normalized(), SourceKey::Goes);
        assert!(matches!(spelled.normalized(), SourceKey::Goes));
        assert!(SourceKey::Merra2 < SourceKey::Custom("amsr2".into()));
        assert!(SourceKey::Custom("a".into()) < SourceKey::Custom("b".into()));
    }

    #[test]
    fn goes_band_names() {
        assert_eq!(SourceKey::from_goes_band("BAND_04"), Some(SourceKey::GoesBand4));
        assert_eq!(SourceKey::from_goes_band("BAND_01"), None);
    }

    #[test]
    fn serde_as_plain_string() {
        let json = serde_json::to_string(&SourceKey::Modis).unwrap();
        assert_eq!(json, "\"modis\"");
        let parsed: SourceKey = serde_json::from_str("\"goes_b5\"").unwrap();
        assert_eq!(parsed, SourceKey::GoesBand5);
        let custom: SourceKey = serde_json::from_str("\"tb\"").unwrap();
        assert_eq!(custom, SourceKey::Custom("tb".into()));
    }
}
