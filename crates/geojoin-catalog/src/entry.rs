//! Catalog entry types.

use std::collections::BTreeMap;

use geojoin_types::SpatialId;
use serde::{Deserialize, Serialize};

/// One datum as delivered by a source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    /// The identifier the source assigned, before any normalization.
    pub id: SpatialId,
    pub datum: f64,
    /// Position of the sample in its source, when the caller needs to
    /// refer back to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<usize>,
}

impl DataEntry {
    pub fn new(id: SpatialId, datum: f64) -> Self {
        Self {
            id,
            datum,
            coord: None,
        }
    }

    pub fn with_coord(id: SpatialId, datum: f64, coord: usize) -> Self {
        Self {
            id,
            datum,
            coord: Some(coord),
        }
    }
}

/// Small integer standing in for a [`SourceKey`](geojoin_types::SourceKey)
/// inside one catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceIndex(pub u16);

/// All data that normalizes to one catalog key, grouped by source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogEntry {
    data: BTreeMap<SourceIndex, Vec<DataEntry>>,
}

impl CatalogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append in insertion order.
    pub fn push(&mut self, source: SourceIndex, entry: DataEntry) {
        self.data.entry(source).or_default().push(entry);
    }

    /// Data for one source; empty if the source has none here.
    pub fn get(&self, source: SourceIndex) -> &[DataEntry] {
        self.data.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, source: SourceIndex) -> bool {
        self.data.get(&source).is_some_and(|v| !v.is_empty())
    }

    /// Sources present, ascending by index.
    pub fn sources(&self) -> impl Iterator<Item = SourceIndex> + '_ {
        self.data.keys().copied()
    }

    /// Total number of data entries across sources.
    pub fn len(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_empty() {
        let entry = CatalogEntry::new();
        assert!(entry.is_empty());
        assert!(entry.get(SourceIndex(0)).is_empty());
        assert!(!entry.has(SourceIndex(0)));
    }

    #[test]
    fn push_keeps_insertion_order_per_source() {
        let id = SpatialId::root(1).unwrap();
        let mut entry = CatalogEntry::new();
        entry.push(SourceIndex(5), DataEntry::new(id, 3.0));
        entry.push(SourceIndex(0), DataEntry::new(id, 1.0));
        entry.push(SourceIndex(5), DataEntry::with_coord(id, 2.0, 7));

        let m2: Vec<f64> = entry.get(SourceIndex(5)).iter().map(|d| d.datum).collect();
        assert_eq!(m2, vec![3.0, 2.0]);
        assert_eq!(entry.get(SourceIndex(5))[1].coord, Some(7));
        assert_eq!(entry.sources().collect::<Vec<_>>(), vec![SourceIndex(0), SourceIndex(5)]);
        assert_eq!(entry.len(), 3);
    }
}
