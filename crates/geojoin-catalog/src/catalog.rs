//! The sorted identifier catalog.
//!
//! A [`Catalog`] maps normalized spatial identifiers to [`CatalogEntry`]
//! values in a `BTreeMap`, so iteration is always in ascending key order.
//! With a resolution set, every identifier is coerced to it and cleared
//! before it is used as a key; without one, identifiers are keys verbatim.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use geojoin_cover::expand;
use geojoin_types::{Resolution, SourceKey, SpatialId};
use tracing::debug;

use crate::config::CatalogConfig;
use crate::dump::SourceIdIndex;
use crate::entry::{CatalogEntry, DataEntry, SourceIndex};
use crate::error::{CatalogError, CatalogResult};
use crate::sources::SourceTable;

/// Sorted map from normalized identifiers to per-source data.
#[derive(Clone, Debug)]
pub struct Catalog {
    config: CatalogConfig,
    entries: BTreeMap<SpatialId, CatalogEntry>,
    sources: SourceTable,
}

impl Catalog {
    /// Create a catalog at `resolution`, pre-opening an empty entry for
    /// every cell the seeds expand to.
    pub fn new(resolution: Option<Resolution>, seeds: &[SpatialId]) -> CatalogResult<Self> {
        Self::with_config(
            CatalogConfig {
                resolution,
                ..Default::default()
            },
            seeds,
        )
    }

    /// Create a seeded catalog from a full configuration.
    pub fn with_config(config: CatalogConfig, seeds: &[SpatialId]) -> CatalogResult<Self> {
        let mut catalog = Self::unseeded(config);
        let mut opened = 0;
        for &seed in seeds {
            opened += catalog.open_entry(seed)?;
        }
        if !seeds.is_empty() {
            debug!(seeds = seeds.len(), opened, "catalog seeded");
        }
        Ok(catalog)
    }

    /// Create an empty catalog with no pre-opened entries.
    pub fn unseeded(config: CatalogConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            sources: SourceTable::new(),
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.config.resolution
    }

    pub fn result_size_limit(&self) -> usize {
        self.config.result_size_limit
    }

    /// Number of entries (open cells).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The key `id` is stored under.
    pub fn storage_key(&self, id: SpatialId) -> SpatialId {
        match self.config.resolution {
            Some(r) => id.join_key(r),
            None => id,
        }
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = SpatialId> + '_ {
        self.entries.keys().copied()
    }

    /// Entries in ascending key order.
    pub fn entries(&self) -> impl Iterator<Item = (SpatialId, &CatalogEntry)> + '_ {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    /// The entry `id` normalizes to, if open.
    pub fn entry(&self, id: SpatialId) -> Option<&CatalogEntry> {
        self.entries.get(&self.storage_key(id))
    }

    /// `(first key, terminator of last key)`: every stored key lies in
    /// this half-open range. `None` when empty.
    pub fn bounds(&self) -> Option<(SpatialId, SpatialId)> {
        let (first, _) = self.entries.first_key_value()?;
        let (last, _) = self.entries.last_key_value()?;
        Some((*first, last.terminator()))
    }

    /// Index assigned to a source key in this catalog, if it has one.
    pub fn source_index(&self, key: &SourceKey) -> Option<SourceIndex> {
        self.sources.lookup(key)
    }

    /// Source key behind an index.
    pub fn source_key(&self, index: SourceIndex) -> Option<SourceKey> {
        self.sources.key(index)
    }

    // ---------------------------------------------------------------
    // Insertion
    // ---------------------------------------------------------------

    /// Open empty entries for every cell `id` represents at the catalog
    /// resolution. Idempotent; returns the number of entries newly opened.
    pub fn open_entry(&mut self, id: SpatialId) -> CatalogResult<usize> {
        let keys = match self.config.resolution {
            Some(r) => expand(id, r, self.config.result_size_limit)?,
            None => vec![id],
        };
        let mut opened = 0;
        for key in keys {
            if let Entry::Vacant(slot) = self.entries.entry(key) {
                slot.insert(CatalogEntry::new());
                opened += 1;
            }
        }
        Ok(opened)
    }

    /// Add a datum, creating its entry if needed.
    pub fn add(&mut self, key: &SourceKey, id: SpatialId, datum: f64) {
        self.add_entry(key, DataEntry::new(id, datum));
    }

    /// Add a datum normalized to `resolution` instead of the catalog's own.
    pub fn add_at_resolution(
        &mut self,
        key: &SourceKey,
        id: SpatialId,
        datum: f64,
        resolution: Resolution,
    ) {
        let source = self.sources.intern(key);
        self.entries
            .entry(id.join_key(resolution))
            .or_default()
            .push(source, DataEntry::new(id, datum));
    }

    /// Add a prepared data entry, creating its entry if needed.
    pub fn add_entry(&mut self, key: &SourceKey, entry: DataEntry) {
        let source = self.sources.intern(key);
        let storage = self.storage_key(entry.id);
        self.entries.entry(storage).or_default().push(source, entry);
    }

    /// Add a datum only if its entry is already open. Returns whether it
    /// was inserted; the catalog is unchanged otherwise.
    pub fn add_to_entry(&mut self, key: &SourceKey, id: SpatialId, datum: f64) -> bool {
        self.insert_if_open(key, DataEntry::new(id, datum))
    }

    /// [`add_to_entry`](Self::add_to_entry) for a prepared data entry.
    pub fn insert_if_open(&mut self, key: &SourceKey, entry: DataEntry) -> bool {
        let storage = self.storage_key(entry.id);
        let Some(slot) = self.entries.get_mut(&storage) else {
            return false;
        };
        slot.push(self.sources.intern(key), entry);
        true
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// All data for a source across entries, in ascending key order and
    /// insertion order within an entry.
    pub fn get_all_data(&self, key: &SourceKey) -> Vec<DataEntry> {
        let Some(source) = self.sources.lookup(key) else {
            return Vec::new();
        };
        self.entries
            .values()
            .flat_map(|e| e.get(source).iter().copied())
            .collect()
    }

    /// Data for a source in the entry `id` normalizes to.
    ///
    /// Fails with [`CatalogError::NotFound`] if that entry is not open. An
    /// open entry without data for `key` yields an empty slice.
    pub fn get_data(&self, key: &SourceKey, id: SpatialId) -> CatalogResult<&[DataEntry]> {
        let storage = self.storage_key(id);
        let entry = self
            .entries
            .get(&storage)
            .ok_or(CatalogError::NotFound(storage))?;
        Ok(match self.sources.lookup(key) {
            Some(source) => entry.get(source),
            None => &[],
        })
    }

    /// Original identifiers per source, sorted.
    pub fn id_index(&self) -> SourceIdIndex {
        let mut index = SourceIdIndex::new();
        for entry in self.entries.values() {
            for source in entry.sources() {
                if let Some(key) = self.sources.key(source) {
                    index.extend(&key, entry.get(source).iter().map(|d| d.id));
                }
            }
        }
        index.sort();
        index
    }
}
