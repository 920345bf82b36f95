//! JSON-lines dump of the original identifiers held per source.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use geojoin_types::{SourceKey, SpatialId};

use crate::error::CatalogResult;

/// Source key -> original identifiers (as `i64`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceIdIndex {
    ids: BTreeMap<String, Vec<i64>>,
}

impl SourceIdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, key: &SourceKey, ids: impl IntoIterator<Item = SpatialId>) {
        self.ids
            .entry(key.as_str().to_string())
            .or_default()
            .extend(ids.into_iter().map(SpatialId::to_i64));
    }

    /// Sort each source's list ascending.
    pub fn sort(&mut self) {
        for ids in self.ids.values_mut() {
            ids.sort_unstable();
        }
    }

    pub fn get(&self, key: &str) -> Option<&[i64]> {
        self.ids.get(key).map(Vec::as_slice)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write one `{"<source>": [ids...]}` object per line.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> CatalogResult<()> {
        for (source, ids) in &self.ids {
            let mut line = serde_json::Map::new();
            line.insert(source.clone(), serde_json::to_value(ids)?);
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read a dump written by [`write_json_lines`](Self::write_json_lines).
    /// Lines for the same source are merged; blank lines are skipped.
    pub fn read_json_lines<R: BufRead>(input: R) -> CatalogResult<Self> {
        let mut index = Self::new();
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let object: BTreeMap<String, Vec<i64>> = serde_json::from_str(&line)?;
            for (source, ids) in object {
                index.ids.entry(source).or_default().extend(ids);
            }
        }
        Ok(index)
    }
}
