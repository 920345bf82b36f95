//! Flat triangulations of identifier sets for renderers.

use std::collections::BTreeMap;

use geojoin_types::SpatialId;
use serde::Serialize;
use tracing::debug;

use crate::mesh::{cell_triangle, Triangle};

/// A renderer-ready mesh: parallel latitude/longitude arrays and index
/// triples into them, one per cell in ascending identifier order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Triangulation {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// A sorted set of cells with their triangles.
///
/// The triangulation is built lazily and cached until the set changes.
#[derive(Debug, Default)]
pub struct CellGeometry {
    cells: BTreeMap<SpatialId, Triangle>,
    cache: Option<Triangulation>,
}

impl CellGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the cell an identifier denotes. Identifiers carrying finer bits
    /// are cleared first. Returns `false` if the cell was already present.
    pub fn insert(&mut self, id: SpatialId) -> bool {
        let cell = id.clear();
        if self.cells.contains_key(&cell) {
            return false;
        }
        self.cells.insert(cell, cell_triangle(cell));
        self.cache = None;
        true
    }

    pub fn contains(&self, id: SpatialId) -> bool {
        self.cells.contains_key(&id.clear())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SpatialId> + '_ {
        self.cells.keys().copied()
    }

    /// The cached triangulation, rebuilt if the set changed.
    pub fn triangulation(&mut self) -> &Triangulation {
        let cells = &self.cells;
        self.cache.get_or_insert_with(|| {
            let mut out = Triangulation {
                lats: Vec::with_capacity(cells.len() * 3),
                lons: Vec::with_capacity(cells.len() * 3),
                triangles: Vec::with_capacity(cells.len()),
            };
            for tri in cells.values() {
                let base = out.lats.len();
                for v in tri.vertices {
                    let (lat, lon) = v.to_lat_lon();
                    out.lats.push(lat);
                    out.lons.push(lon);
                }
                out.triangles.push([base, base + 1, base + 2]);
            }
            debug!(cells = cells.len(), "triangulation rebuilt");
            out
        })
    }
}

impl FromIterator<SpatialId> for CellGeometry {
    fn from_iter<I: IntoIterator<Item = SpatialId>>(iter: I) -> Self {
        let mut geometry = Self::new();
        for id in iter {
            geometry.insert(id);
        }
        geometry
    }
}
