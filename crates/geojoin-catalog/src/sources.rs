//! Mapping between source keys and per-catalog indices.

use geojoin_types::SourceKey;

use crate::entry::SourceIndex;

/// Known keys occupy the first indices, in [`SourceKey::KNOWN`] order;
/// custom keys follow in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct SourceTable {
    custom: Vec<String>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn custom_base() -> u16 {
        SourceKey::KNOWN.len() as u16
    }

    /// Index for `key`, registering custom keys on first use.
    pub fn intern(&mut self, key: &SourceKey) -> SourceIndex {
        if let Some(idx) = self.lookup(key) {
            return idx;
        }
        self.custom.push(key.as_str().to_string());
        SourceIndex(Self::custom_base() + (self.custom.len() - 1) as u16)
    }

    /// Index for `key` without registering it.
    pub fn lookup(&self, key: &SourceKey) -> Option<SourceIndex> {
        if let Some(i) = key.known_index() {
            return Some(SourceIndex(i));
        }
        self.custom
            .iter()
            .position(|k| k == key.as_str())
            .map(|pos| SourceIndex(Self::custom_base() + pos as u16))
    }

    /// The key behind an index.
    pub fn key(&self, index: SourceIndex) -> Option<SourceKey> {
        let i = index.0 as usize;
        if i < SourceKey::KNOWN.len() {
            return Some(SourceKey::KNOWN[i].clone());
        }
        self.custom
            .get(i - SourceKey::KNOWN.len())
            .map(|s| SourceKey::Custom(s.clone()))
    }
}
