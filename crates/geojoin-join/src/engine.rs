//! The join engine.
//!
//! A join inserts every source into one [`Catalog`] at a shared resolution,
//! then walks the catalog in ascending key order. Each primary sample in a
//! cell becomes one [`JoinRecord`]; every secondary source present in the
//! same cell contributes the unweighted mean of its samples there.

use geojoin_catalog::{Catalog, CatalogConfig, DataEntry};
use geojoin_cover::{cover, CoverConfig, Region};
use geojoin_types::{Resolution, SourceKey, SpatialId, TemporalId};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{GeojoinConfig, JoinConfig};
use crate::error::{JoinError, JoinResult};
use crate::source::{SampleSource, SlicedSource, SourceData};

/// One secondary source's contribution to a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SecondaryMatch {
    /// Source coordinate of the first secondary sample in the cell.
    pub coord: Option<usize>,
    /// Mean of the secondary samples in the cell.
    pub value: Option<f64>,
}

/// One joined output row per primary sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JoinRecord {
    /// The primary sample's identifier; `None` for samples without a
    /// valid location.
    pub spatial: Option<SpatialId>,
    pub temporal: Option<TemporalId>,
    pub primary_coord: usize,
    /// In the order the secondaries were given.
    pub secondaries: Vec<SecondaryMatch>,
    /// Primary band values at this sample, in [`JoinOutput::bands`] order.
    pub bands: Vec<f64>,
}

/// Counters gathered during a join.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    /// Catalog entries walked.
    pub cells: usize,
    /// Entries holding primary data.
    pub cells_with_primary: usize,
    pub records: usize,
    /// Primary records paired with a secondary value, summed over
    /// secondaries.
    pub elements_pushed: usize,
    /// Samples rejected by the cover restriction.
    pub outside_cover: usize,
    /// Samples without an identifier, over all sources.
    pub invalid_samples: usize,
}

/// Result of a join.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JoinOutput {
    pub resolution: Resolution,
    pub primary: SourceKey,
    pub secondaries: Vec<SourceKey>,
    pub bands: Vec<String>,
    pub records: Vec<JoinRecord>,
    pub stats: JoinStats,
}

/// Region-of-interest restriction for a join.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinCover {
    /// Covered at the join resolution when the join runs.
    Region(Region),
    /// Precomputed cells, expanded to the join resolution.
    Cells(Vec<SpatialId>),
}

/// Joins a primary source against secondary sources.
#[derive(Clone, Debug)]
pub struct JoinEngine {
    config: JoinConfig,
    cover_config: CoverConfig,
    cover: Option<JoinCover>,
}

/// Walk positions between progress reports. Never zero.
pub fn progress_step(total: usize, checkpoints: usize) -> usize {
    (total / checkpoints.max(1)).max(1)
}

/// Unweighted mean of a cell's samples and the coordinate of the first.
pub fn aggregate(data: &[DataEntry]) -> JoinResult<(f64, Option<usize>)> {
    let first = data
        .first()
        .ok_or_else(|| JoinError::EmptyAggregation("secondary cell".into()))?;
    let mean = data.iter().map(|d| d.datum).sum::<f64>() / data.len() as f64;
    Ok((mean, first.coord))
}

impl JoinEngine {
    pub fn new(config: JoinConfig) -> Self {
        Self {
            config,
            cover_config: CoverConfig::default(),
            cover: None,
        }
    }

    pub fn from_config(config: &GeojoinConfig) -> Self {
        Self {
            config: config.join.clone(),
            cover_config: config.cover.clone(),
            cover: None,
        }
    }

    /// Restrict the join to a region of interest.
    pub fn with_region(mut self, region: Region) -> Self {
        self.cover = Some(JoinCover::Region(region));
        self
    }

    /// Restrict the join to precomputed cells.
    pub fn with_cells(mut self, cells: Vec<SpatialId>) -> Self {
        self.cover = Some(JoinCover::Cells(cells));
        self
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Pick the configured primary and secondary documents by key.
    pub fn select<'a>(
        &self,
        sources: &'a [SourceData],
    ) -> JoinResult<(&'a SourceData, Vec<&'a SourceData>)> {
        let find = |key: &SourceKey| {
            sources
                .iter()
                .find(|s| &s.key == key)
                .ok_or_else(|| JoinError::Config(format!("no source document for {key}")))
        };
        let primary = find(&self.config.primary)?;
        let secondaries = self
            .config
            .secondaries
            .iter()
            .map(find)
            .collect::<JoinResult<Vec<_>>>()?;
        Ok((primary, secondaries))
    }

    /// The configured resolution, else the first secondary's native one.
    pub fn resolve_resolution(&self, secondaries: &[&dyn SampleSource]) -> JoinResult<Resolution> {
        self.config
            .resolution
            .or_else(|| secondaries.first().and_then(|s| s.native_resolution()))
            .ok_or_else(|| {
                JoinError::Config(
                    "no join resolution: configure one or give the first secondary a native resolution"
                        .into(),
                )
            })
    }

    // ---------------------------------------------------------------
    // Join
    // ---------------------------------------------------------------

    /// Join `primary` against `secondaries` by spatial cell.
    pub fn join(
        &self,
        primary: &dyn SampleSource,
        secondaries: &[&dyn SampleSource],
    ) -> JoinResult<JoinOutput> {
        self.config.validate()?;
        let keys: Vec<&SourceKey> = secondaries.iter().map(|s| s.key()).collect();
        for (i, key) in keys.iter().enumerate() {
            if *key == primary.key() || keys[..i].contains(key) {
                return Err(JoinError::Config(format!("source {key} given twice")));
            }
        }
        for source in std::iter::once(primary).chain(secondaries.iter().copied()) {
            if source.values().len() != source.len() {
                return Err(JoinError::ShapeMismatch {
                    what: format!("{} values", source.key()),
                    expected: source.len(),
                    actual: source.values().len(),
                });
            }
            if source.valid_count() == 0 {
                return Err(JoinError::NoValidSources(source.key().to_string()));
            }
        }
        let bands = primary.bands();
        for (name, band) in &bands {
            if band.len() != primary.len() {
                return Err(JoinError::ShapeMismatch {
                    what: name.to_string(),
                    expected: primary.len(),
                    actual: band.len(),
                });
            }
        }

        let resolution = self.resolve_resolution(secondaries)?;
        let mut catalog = self.build_catalog(resolution)?;
        let restricted = self.cover.is_some();

        let mut stats = JoinStats::default();
        for source in std::iter::once(primary).chain(secondaries.iter().copied()) {
            insert_source(&mut catalog, source, restricted, &mut stats);
        }

        let temporal = primary.temporal_id();
        let primary_index = catalog.source_index(primary.key());
        let secondary_index: Vec<_> = keys.iter().map(|k| catalog.source_index(k)).collect();

        let total = catalog.len();
        let step = progress_step(total, self.config.progress_checkpoints);
        let mut records = Vec::new();
        for (i, (_, entry)) in catalog.entries().enumerate() {
            if i % step == 0 {
                info!(done = i, total, percent = i * 100 / total, "join progress");
            }
            stats.cells += 1;
            let Some(primary_index) = primary_index.filter(|&p| entry.has(p)) else {
                continue;
            };
            stats.cells_with_primary += 1;

            let matches: Vec<SecondaryMatch> = secondary_index
                .iter()
                .map(|idx| {
                    idx.and_then(|idx| aggregate(entry.get(idx)).ok())
                        .map(|(value, coord)| SecondaryMatch {
                            coord,
                            value: Some(value),
                        })
                        .unwrap_or_default()
                })
                .collect();
            let matched = matches.iter().filter(|m| m.value.is_some()).count();

            for sample in entry.get(primary_index) {
                let coord = sample.coord.unwrap_or_default();
                records.push(JoinRecord {
                    spatial: Some(sample.id),
                    temporal,
                    primary_coord: coord,
                    secondaries: matches.clone(),
                    bands: bands.iter().map(|(_, b)| b[coord]).collect(),
                });
                stats.elements_pushed += matched;
            }
        }

        // Samples without a location keep their row when nothing restricts
        // the join spatially.
        if !restricted {
            for (coord, _) in primary.ids().iter().enumerate().filter(|(_, id)| id.is_none()) {
                records.push(JoinRecord {
                    spatial: None,
                    temporal,
                    primary_coord: coord,
                    secondaries: vec![SecondaryMatch::default(); secondaries.len()],
                    bands: bands.iter().map(|(_, b)| b[coord]).collect(),
                });
            }
        }

        stats.records = records.len();
        info!(
            resolution = resolution.level(),
            records = stats.records,
            elements_pushed = stats.elements_pushed,
            "join complete"
        );
        Ok(JoinOutput {
            resolution,
            primary: primary.key().clone(),
            secondaries: keys.into_iter().cloned().collect(),
            bands: bands.iter().map(|(n, _)| n.to_string()).collect(),
            records,
            stats,
        })
    }

    /// Resolve each sliced secondary at the primary's time, then join.
    pub fn join_sliced(
        &self,
        primary: &dyn SampleSource,
        secondaries: &[&SlicedSource],
    ) -> JoinResult<JoinOutput> {
        let at = primary.temporal_id().ok_or_else(|| {
            JoinError::Config(format!("primary source {} has no temporal id", primary.key()))
        })?;
        let resolved = secondaries
            .iter()
            .map(|s| s.at(at))
            .collect::<JoinResult<Vec<_>>>()?;
        let refs: Vec<&dyn SampleSource> = resolved.iter().map(|s| s as &dyn SampleSource).collect();
        self.join(primary, &refs)
    }

    fn build_catalog(&self, resolution: Resolution) -> JoinResult<Catalog> {
        let config = CatalogConfig {
            resolution: Some(resolution),
            result_size_limit: self.config.result_size_limit,
        };
        let seeds = match &self.cover {
            None => return Ok(Catalog::unseeded(config)),
            Some(JoinCover::Region(region)) => {
                cover(region, resolution, self.cover_config.result_size_limit)?
            }
            Some(JoinCover::Cells(cells)) => cells.clone(),
        };
        Ok(Catalog::with_config(config, &seeds)?)
    }
}

fn insert_source(
    catalog: &mut Catalog,
    source: &dyn SampleSource,
    restricted: bool,
    stats: &mut JoinStats,
) {
    let bounds = catalog.bounds();
    let (mut inserted, mut outside, mut invalid) = (0usize, 0usize, 0usize);
    for (coord, (id, &value)) in source.ids().iter().zip(source.values()).enumerate() {
        let Some(id) = *id else {
            invalid += 1;
            continue;
        };
        let entry = DataEntry::with_coord(id, value, coord);
        if !restricted {
            catalog.add_entry(source.key(), entry);
            inserted += 1;
            continue;
        }
        let key = catalog.storage_key(id);
        let in_range = bounds.is_some_and(|(lo, hi)| lo <= key && key < hi);
        if in_range && catalog.insert_if_open(source.key(), entry) {
            inserted += 1;
        } else {
            outside += 1;
        }
    }
    stats.outside_cover += outside;
    stats.invalid_samples += invalid;
    debug!(source = %source.key(), inserted, outside, invalid, "source inserted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojoin_cover::locate;
    use geojoin_types::TemporalResolution;

    fn res(level: u8) -> Resolution {
        Resolution::new(level).unwrap()
    }

    fn under(cell: SpatialId, digits: &[u8]) -> SpatialId {
        digits.iter().fold(cell, |id, &d| id.child(d).unwrap())
    }

    fn engine_at(level: u8) -> JoinEngine {
        JoinEngine::new(JoinConfig {
            resolution: Some(res(level)),
            ..Default::default()
        })
    }

    fn source(key: SourceKey, samples: &[(SpatialId, f64)]) -> SourceData {
        SourceData::new(
            key,
            samples.iter().map(|&(id, _)| Some(id)).collect(),
            samples.iter().map(|&(_, v)| v).collect(),
        )
        .unwrap()
    }

    fn cells() -> (SpatialId, SpatialId) {
        (
            SpatialId::from_path(4, &[0, 1, 2, 3, 0]).unwrap(),
            SpatialId::from_path(4, &[0, 1, 2, 3, 1]).unwrap(),
        )
    }

    #[test]
    fn progress_step_is_never_zero() {
        assert_eq!(progress_step(0, 10), 1);
        assert_eq!(progress_step(5, 10), 1);
        assert_eq!(progress_step(100, 10), 10);
        assert_eq!(progress_step(100, 0), 100);
    }

    #[test]
    fn aggregate_guards_empty_cells() {
        assert!(matches!(aggregate(&[]), Err(JoinError::EmptyAggregation(_))));
        let id = SpatialId::root(0).unwrap();
        let (mean, coord) = aggregate(&[DataEntry::with_coord(id, 1.0, 4), DataEntry::with_coord(id, 2.0, 9)]).unwrap();
        assert_eq!(mean, 1.5);
        assert_eq!(coord, Some(4));
    }

    #[test]
    fn seeded_scenario_fans_out_secondary() {
        let (a, b) = cells();
        let goes = source(SourceKey::Goes, &[(under(a, &[0, 1]), 10.0), (under(a, &[2]), 20.0)]);
        let m2 = source(SourceKey::Merra2, &[(under(a, &[3, 3]), 4.0)]);

        let out = engine_at(5).with_cells(vec![a, b]).join(&goes, &[&m2]).unwrap();
        assert_eq!(out.records.len(), 2);
        for (coord, record) in out.records.iter().enumerate() {
            assert_eq!(record.spatial.map(|id| id.join_key(res(5))), Some(a));
            assert_eq!(record.primary_coord, coord);
            assert_eq!(record.secondaries, vec![SecondaryMatch { coord: Some(0), value: Some(4.0) }]);
        }
        assert_eq!(out.stats.cells, 2);
        assert_eq!(out.stats.cells_with_primary, 1);
        assert_eq!(out.stats.elements_pushed, 2);
    }

    #[test]
    fn multiple_secondary_hits_are_averaged() {
        let (a, _) = cells();
        let goes = source(SourceKey::Goes, &[(under(a, &[0]), 1.0)]);
        let m2 = source(
            SourceKey::Merra2,
            &[(under(a, &[1]), 2.0), (under(a, &[2]), 4.0), (under(a, &[3]), 9.0)],
        );
        let out = engine_at(5).join(&goes, &[&m2]).unwrap();
        assert_eq!(out.records[0].secondaries[0].value, Some(5.0));
        assert_eq!(out.records[0].secondaries[0].coord, Some(0));
    }

    #[test]
    fn absent_secondary_is_no_match() {
        let (a, b) = cells();
        let goes = source(SourceKey::Goes, &[(a, 1.0), (b, 2.0)]);
        let m2 = source(SourceKey::Merra2, &[(b, 7.0)]);
        let out = engine_at(5).join(&goes, &[&m2]).unwrap();
        assert_eq!(out.records[0].secondaries[0], SecondaryMatch::default());
        assert_eq!(out.records[1].secondaries[0].value, Some(7.0));
        assert_eq!(out.stats.elements_pushed, 1);
    }

    #[test]
    fn cells_without_primary_contribute_nothing() {
        let (a, b) = cells();
        let goes = source(SourceKey::Goes, &[(a, 1.0)]);
        let m2 = source(SourceKey::Merra2, &[(b, 7.0), (a, 3.0)]);
        let out = engine_at(5).join(&goes, &[&m2]).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.stats.cells, 2);
    }

    #[test]
    fn source_without_valid_samples_aborts() {
        let (a, _) = cells();
        let goes = source(SourceKey::Goes, &[(a, 1.0)]);
        let empty = SourceData::new(SourceKey::Merra2, vec![None, None], vec![0.0, 0.0]).unwrap();
        let err = engine_at(5).join(&goes, &[&empty]).unwrap_err();
        assert!(matches!(err, JoinError::NoValidSources(ref k) if k == "m2"));
    }

    #[test]
    fn resolution_falls_back_to_first_secondary() {
        let (a, _) = cells();
        let goes = source(SourceKey::Goes, &[(under(a, &[1, 1]), 1.0)]);
        let m2 = source(SourceKey::Merra2, &[(under(a, &[2, 2]), 3.0)]).with_resolution(res(5));
        let engine = JoinEngine::new(JoinConfig::default());
        let out = engine.join(&goes, &[&m2]).unwrap();
        assert_eq!(out.resolution, res(5));
        assert_eq!(out.records[0].secondaries[0].value, Some(3.0));

        let bare = source(SourceKey::Merra2, &[(a, 3.0)]);
        assert!(matches!(engine.join(&goes, &[&bare]), Err(JoinError::Config(_))));
    }

    #[test]
    fn duplicate_sources_are_rejected() {
        let (a, _) = cells();
        let goes = source(SourceKey::Goes, &[(a, 1.0)]);
        let m2 = source(SourceKey::Merra2, &[(a, 1.0)]);
        assert!(matches!(engine_at(5).join(&goes, &[&m2, &m2]), Err(JoinError::Config(_))));
        assert!(matches!(engine_at(5).join(&goes, &[&goes]), Err(JoinError::Config(_))));
        let spelled = source(SourceKey::Custom("goes".into()), &[(a, 2.0)]);
        assert!(matches!(engine_at(5).join(&goes, &[&spelled]), Err(JoinError::Config(_))));
    }

    #[test]
    fn invalid_primary_samples_keep_a_row() {
        let (a, _) = cells();
        let goes = SourceData::new(SourceKey::Goes, vec![None, Some(a)], vec![1.0, 2.0])
            .unwrap()
            .with_band("goes_b3", vec![30.0, 31.0])
            .unwrap();
        let m2 = source(SourceKey::Merra2, &[(a, 5.0)]);
        let out = engine_at(5).join(&goes, &[&m2]).unwrap();
        assert_eq!(out.bands, vec!["goes_b3".to_string()]);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].bands, vec![31.0]);
        let invalid = &out.records[1];
        assert_eq!(invalid.spatial, None);
        assert_eq!(invalid.primary_coord, 0);
        assert_eq!(invalid.bands, vec![30.0]);
        assert_eq!(invalid.secondaries, vec![SecondaryMatch::default()]);
        assert_eq!(out.stats.invalid_samples, 1);
    }

    #[test]
    fn region_restricts_insertion() {
        let r = res(6);
        let inside = locate(19.5, -155.5, r).unwrap();
        let outside = locate(-40.0, 60.0, r).unwrap();
        let goes = source(SourceKey::Goes, &[(inside, 1.0), (outside, 2.0)]);
        let m2 = source(SourceKey::Merra2, &[(inside, 8.0), (outside, 9.0)]);

        let engine = JoinEngine::new(JoinConfig {
            resolution: Some(r),
            ..Default::default()
        })
        .with_region(Region::circle(19.5, -155.5, 1.0).unwrap());
        let out = engine.join(&goes, &[&m2]).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].secondaries[0].value, Some(8.0));
        assert_eq!(out.stats.outside_cover, 2);
    }

    #[test]
    fn select_by_configured_keys() {
        let (a, _) = cells();
        let docs = vec![
            source(SourceKey::Merra2, &[(a, 1.0)]),
            source(SourceKey::Goes, &[(a, 2.0)]),
        ];
        let engine = engine_at(5);
        let (primary, secondaries) = engine.select(&docs).unwrap();
        assert_eq!(primary.key, SourceKey::Goes);
        assert_eq!(secondaries[0].key, SourceKey::Merra2);
        assert!(matches!(engine.select(&docs[..1]), Err(JoinError::Config(_))));
    }

    #[test]
    fn sliced_join_uses_coincident_slices() {
        let (a, _) = cells();
        let hour = 3_600_000;
        let t = TemporalId::new(hour / 2, TemporalResolution::FINEST).unwrap();
        let goes = source(SourceKey::Goes, &[(a, 1.0)]).with_temporal_id(t);
        let hourly = TemporalResolution::for_half_width(chrono::Duration::minutes(30));
        let m2 = SlicedSource::new(
            SourceKey::Merra2,
            vec![Some(a)],
            vec![TemporalId::new(0, hourly).unwrap(), TemporalId::new(hour, hourly).unwrap()],
            vec![vec![2.0], vec![6.0]],
        )
        .unwrap();

        let out = engine_at(5).join_sliced(&goes, &[&m2]).unwrap();
        assert_eq!(out.records[0].secondaries[0].value, Some(4.0));
        assert_eq!(out.records[0].temporal, Some(t));

        let untimed = source(SourceKey::Goes, &[(a, 1.0)]);
        assert!(matches!(engine_at(5).join_sliced(&untimed, &[&m2]), Err(JoinError::Config(_))));
    }
}
