//! Temporal matching of a primary instant against sorted time slices.

use geojoin_types::TemporalId;

use crate::error::{JoinError, JoinResult};

/// Sorted candidate temporal identifiers, searchable by coincidence.
#[derive(Clone, Debug)]
pub struct TemporalMatcher {
    candidates: Vec<TemporalId>,
    /// Largest candidate half-width; bounds the search window.
    widest: i64,
}

impl TemporalMatcher {
    /// Candidates must be in ascending order.
    pub fn new(candidates: Vec<TemporalId>) -> JoinResult<Self> {
        if let Some(i) = candidates.windows(2).position(|w| w[0] > w[1]) {
            return Err(JoinError::Unsorted { index: i + 1 });
        }
        let widest = candidates
            .iter()
            .map(|c| c.half_width_ms())
            .max()
            .unwrap_or(0);
        Ok(Self { candidates, widest })
    }

    pub fn candidates(&self) -> &[TemporalId] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Ascending indices of the candidates whose interval overlaps the
    /// primary's.
    pub fn matches(&self, primary: TemporalId) -> Vec<usize> {
        let reach = primary.half_width_ms() as i128 + self.widest as i128;
        let t = primary.millis() as i128;
        let (lo, hi) = (t - reach, t + reach);

        let start = self
            .candidates
            .partition_point(|c| (c.millis() as i128) < lo);
        self.candidates[start..]
            .iter()
            .take_while(|c| c.millis() as i128 <= hi)
            .enumerate()
            .filter(|(_, c)| primary.coincident(**c))
            .map(|(i, _)| start + i)
            .collect()
    }
}

/// Element-wise mean across equally long slices.
pub fn mean_over_slices(slices: &[&[f64]]) -> JoinResult<Vec<f64>> {
    let Some(first) = slices.first() else {
        return Err(JoinError::EmptyAggregation("time slices".into()));
    };
    let width = first.len();
    let mut sums = vec![0.0; width];
    for slice in slices {
        if slice.len() != width {
            return Err(JoinError::ShapeMismatch {
                what: "time slice".into(),
                expected: width,
                actual: slice.len(),
            });
        }
        for (sum, v) in sums.iter_mut().zip(slice.iter()) {
            *sum += v;
        }
    }
    let n = slices.len() as f64;
    Ok(sums.into_iter().map(|s| s / n).collect())
}
