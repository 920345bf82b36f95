//! Sample sources: the seam between external readers and the join.

use std::collections::BTreeMap;
use std::io::Read;

use geojoin_cover::locate;
use geojoin_types::{Resolution, SourceKey, SpatialId, TemporalId};
use serde::{Deserialize, Serialize};

use crate::error::{JoinError, JoinResult};
use crate::temporal::{mean_over_slices, TemporalMatcher};

/// Per-sample data delivered by an external reader.
///
/// Samples are addressed by their source coordinate: the position in
/// [`ids`](Self::ids). A sample without a valid location has no identifier.
pub trait SampleSource {
    fn key(&self) -> &SourceKey;

    /// Resolution of the source's native grid, if known.
    fn native_resolution(&self) -> Option<Resolution> {
        None
    }

    /// Acquisition time of the whole source.
    fn temporal_id(&self) -> Option<TemporalId> {
        None
    }

    fn ids(&self) -> &[Option<SpatialId>];

    fn values(&self) -> &[f64];

    /// Additional per-sample columns carried through to joined records.
    fn bands(&self) -> Vec<(&str, &[f64])> {
        Vec::new()
    }

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// Number of samples with an identifier.
    fn valid_count(&self) -> usize {
        self.ids().iter().filter(|id| id.is_some()).count()
    }
}

fn check_len(what: &str, expected: usize, actual: usize) -> JoinResult<()> {
    if expected != actual {
        return Err(JoinError::ShapeMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// A fully materialized source, as read from a JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub key: SourceKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_id: Option<TemporalId>,
    pub ids: Vec<Option<SpatialId>>,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bands: BTreeMap<String, Vec<f64>>,
}

impl SourceData {
    pub fn new(key: SourceKey, ids: Vec<Option<SpatialId>>, values: Vec<f64>) -> JoinResult<Self> {
        check_len("values", ids.len(), values.len())?;
        Ok(Self {
            key,
            resolution: None,
            temporal_id: None,
            ids,
            values,
            bands: BTreeMap::new(),
        })
    }

    /// Locate each sample on the mesh at `resolution`. Samples with an
    /// out-of-range or non-finite position get no identifier.
    pub fn from_lat_lon(
        key: SourceKey,
        lats: &[f64],
        lons: &[f64],
        values: Vec<f64>,
        resolution: Resolution,
    ) -> JoinResult<Self> {
        check_len("longitudes", lats.len(), lons.len())?;
        let ids = lats
            .iter()
            .zip(lons)
            .map(|(&lat, &lon)| locate(lat, lon, resolution).ok())
            .collect();
        Ok(Self::new(key, ids, values)?.with_resolution(resolution))
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_temporal_id(mut self, temporal_id: TemporalId) -> Self {
        self.temporal_id = Some(temporal_id);
        self
    }

    pub fn with_band(mut self, name: impl Into<String>, values: Vec<f64>) -> JoinResult<Self> {
        let name = name.into();
        check_len(&name, self.ids.len(), values.len())?;
        self.bands.insert(name, values);
        Ok(self)
    }

    /// Check the parallel arrays agree; deserialized documents are not
    /// checked otherwise.
    pub fn validate(&self) -> JoinResult<()> {
        check_len("values", self.ids.len(), self.values.len())?;
        for (name, band) in &self.bands {
            check_len(name, self.ids.len(), band.len())?;
        }
        Ok(())
    }

    /// Read and validate one JSON document.
    pub fn from_json_reader<R: Read>(reader: R) -> JoinResult<Self> {
        let data: Self = serde_json::from_reader(reader)
            .map_err(|e| JoinError::Config(format!("invalid source document: {e}")))?;
        data.validate()?;
        Ok(data)
    }
}

impl SampleSource for SourceData {
    fn key(&self) -> &SourceKey {
        &self.key
    }

    fn native_resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    fn temporal_id(&self) -> Option<TemporalId> {
        self.temporal_id
    }

    fn ids(&self) -> &[Option<SpatialId>] {
        &self.ids
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn bands(&self) -> Vec<(&str, &[f64])> {
        self.bands
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect()
    }
}

/// A gridded product with several time slices over the same samples,
/// such as hourly reanalysis fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlicedSource {
    pub key: SourceKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    pub ids: Vec<Option<SpatialId>>,
    /// Ascending slice times.
    pub times: Vec<TemporalId>,
    /// One value per sample for each time.
    pub slices: Vec<Vec<f64>>,
}

impl SlicedSource {
    pub fn new(
        key: SourceKey,
        ids: Vec<Option<SpatialId>>,
        times: Vec<TemporalId>,
        slices: Vec<Vec<f64>>,
    ) -> JoinResult<Self> {
        let source = Self {
            key,
            resolution: None,
            ids,
            times,
            slices,
        };
        source.validate()?;
        Ok(source)
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn validate(&self) -> JoinResult<()> {
        check_len("time slices", self.times.len(), self.slices.len())?;
        for slice in &self.slices {
            check_len("time slice", self.ids.len(), slice.len())?;
        }
        TemporalMatcher::new(self.times.clone())?;
        Ok(())
    }

    /// The slices coincident with `primary`, averaged element-wise.
    pub fn at(&self, primary: TemporalId) -> JoinResult<SourceData> {
        let matcher = TemporalMatcher::new(self.times.clone())?;
        let hits = matcher.matches(primary);
        let Some(&first) = hits.first() else {
            return Err(JoinError::NoTemporalMatch(primary));
        };
        let selected: Vec<&[f64]> = hits.iter().map(|&i| self.slices[i].as_slice()).collect();
        let values = mean_over_slices(&selected)?;
        Ok(SourceData {
            key: self.key.clone(),
            resolution: self.resolution,
            temporal_id: Some(self.times[first]),
            ids: self.ids.clone(),
            values,
            bands: BTreeMap::new(),
        })
    }
}
