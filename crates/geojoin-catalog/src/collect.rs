//! Regrouping data at a forced resolution for display.

use std::collections::BTreeMap;

use geojoin_cover::CellGeometry;
use geojoin_types::{Resolution, SpatialId};
use serde::Serialize;
use tracing::debug;

use crate::entry::DataEntry;

/// Mean of the data falling in one cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CollectedCell {
    pub id: SpatialId,
    pub mean: f64,
    pub count: usize,
}

/// Per-cell means in ascending cell order, with the range of the means.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Collected {
    pub cells: Vec<CollectedCell>,
    /// `(min, max)` over finite cell means; `None` if there are none.
    pub range: Option<(f64, f64)>,
}

impl Collected {
    /// Cell outlines for rendering, in the same order as `cells`.
    pub fn geometry(&self) -> CellGeometry {
        self.cells.iter().map(|c| c.id).collect()
    }
}

/// Group `entries` by their cell at `force_resolution` and average each
/// group.
pub fn collect(entries: &[DataEntry], force_resolution: Resolution) -> Collected {
    let mut groups: BTreeMap<SpatialId, (f64, usize)> = BTreeMap::new();
    for entry in entries {
        let slot = groups
            .entry(entry.id.join_key(force_resolution))
            .or_insert((0.0, 0));
        slot.0 += entry.datum;
        slot.1 += 1;
    }

    let cells: Vec<CollectedCell> = groups
        .into_iter()
        .map(|(id, (sum, count))| CollectedCell {
            id,
            mean: sum / count as f64,
            count,
        })
        .collect();

    let range = cells
        .iter()
        .map(|c| c.mean)
        .filter(|m| m.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, m| match acc {
            None => Some((m, m)),
            Some((lo, hi)) => Some((lo.min(m), hi.max(m))),
        });

    debug!(
        entries = entries.len(),
        cells = cells.len(),
        resolution = force_resolution.level(),
        "collected"
    );
    Collected { cells, range }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_coarse_cell() {
        let a = SpatialId::from_path(2, &[1, 0, 3]).unwrap();
        let b = SpatialId::from_path(2, &[1, 2, 0]).unwrap();
        let c = SpatialId::from_path(6, &[0, 0, 0]).unwrap();
        let entries = [
            DataEntry::new(a, 1.0),
            DataEntry::new(b, 3.0),
            DataEntry::new(c, 10.0),
        ];
        let out = collect(&entries, Resolution::new(1).unwrap());
        assert_eq!(out.cells.len(), 2);
        assert_eq!(out.cells[0].mean, 2.0);
        assert_eq!(out.cells[0].count, 2);
        assert_eq!(out.cells[1].mean, 10.0);
        assert_eq!(out.range, Some((2.0, 10.0)));
        assert_eq!(out.geometry().len(), 2);
    }

    #[test]
    fn nan_propagates_into_its_cell_only() {
        let a = SpatialId::from_path(0, &[1]).unwrap();
        let b = SpatialId::from_path(0, &[2]).unwrap();
        let out = collect(
            &[DataEntry::new(a, f64::NAN), DataEntry::new(b, 4.0)],
            Resolution::new(1).unwrap(),
        );
        assert!(out.cells[0].mean.is_nan());
        assert_eq!(out.range, Some((4.0, 4.0)));
        assert_eq!(collect(&[], Resolution::COARSEST), Collected::default());
    }
}
