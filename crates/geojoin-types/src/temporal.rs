use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Finest temporal resolution: a half-width of one millisecond.
pub const MAX_TEMPORAL_RESOLUTION: u8 = 48;

const RESOLUTION_BITS: u32 = 6;
const RESOLUTION_MASK: u64 = (1 << RESOLUTION_BITS) - 1;
/// Offset added to epoch milliseconds so that pre-1970 times stay positive.
const EPOCH_BIAS_MS: i64 = 1 << 56;
const MAX_BIASED_MS: i64 = (1 << 57) - 1;

/// A validated temporal resolution in `0..=MAX_TEMPORAL_RESOLUTION`.
///
/// Level `r` denotes an interval of half-width `2^(48 - r)` milliseconds
/// around the encoded instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TemporalResolution(u8);

impl TemporalResolution {
    pub const COARSEST: Self = Self(0);
    pub const FINEST: Self = Self(MAX_TEMPORAL_RESOLUTION);

    pub fn new(level: u8) -> TypeResult<Self> {
        if level > MAX_TEMPORAL_RESOLUTION {
            return Err(TypeError::InvalidTemporalResolution(level));
        }
        Ok(Self(level))
    }

    pub const fn level(self) -> u8 {
        self.0
    }

    /// Half-width of the interval in milliseconds.
    pub const fn half_width_ms(self) -> i64 {
        1i64 << (MAX_TEMPORAL_RESOLUTION - self.0)
    }

    pub fn half_width(self) -> Duration {
        Duration::milliseconds(self.half_width_ms())
    }

    /// The finest resolution whose half-width still covers `window`.
    ///
    /// An hourly product sampled at the half hour uses a 30 minute window.
    pub fn for_half_width(window: Duration) -> Self {
        let needed = window.num_milliseconds();
        (0..=MAX_TEMPORAL_RESOLUTION)
            .rev()
            .map(Self)
            .find(|r| r.half_width_ms() >= needed)
            .unwrap_or(Self::COARSEST)
    }
}

impl TryFrom<u8> for TemporalResolution {
    type Error = TypeError;

    fn try_from(level: u8) -> TypeResult<Self> {
        Self::new(level)
    }
}

impl From<TemporalResolution> for u8 {
    fn from(r: TemporalResolution) -> u8 {
        r.0
    }
}

/// Hierarchical temporal identifier.
///
/// ```text
/// bit  63     : always 0
/// bits 62..6  : epoch milliseconds + 2^56
/// bits 5..0   : temporal resolution
/// ```
///
/// The raw ordering sorts by instant first, then by resolution.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemporalId(u64);

impl TemporalId {
    /// Encode an instant (milliseconds since the Unix epoch).
    pub fn new(millis: i64, resolution: TemporalResolution) -> TypeResult<Self> {
        let biased = millis
            .checked_add(EPOCH_BIAS_MS)
            .filter(|b| (0..=MAX_BIASED_MS).contains(b))
            .ok_or(TypeError::TimeOutOfRange(millis))?;
        Ok(Self(((biased as u64) << RESOLUTION_BITS) | resolution.0 as u64))
    }

    pub fn from_datetime(at: DateTime<Utc>, resolution: TemporalResolution) -> TypeResult<Self> {
        Self::new(at.timestamp_millis(), resolution)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Wrap a raw value, validating the top bit and the resolution field.
    pub fn try_from_raw(raw: u64) -> TypeResult<Self> {
        if raw >> 63 != 0 {
            return Err(TypeError::InvalidIdentifier(format!("0x{raw:016x}: top bit set")));
        }
        TemporalResolution::new((raw & RESOLUTION_MASK) as u8)?;
        Ok(Self(raw))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn to_i64(self) -> i64 {
        self.0 as i64
    }

    /// Milliseconds since the Unix epoch.
    pub const fn millis(self) -> i64 {
        (self.0 >> RESOLUTION_BITS) as i64 - EPOCH_BIAS_MS
    }

    pub const fn resolution(self) -> u8 {
        (self.0 & RESOLUTION_MASK) as u8
    }

    pub fn half_width_ms(self) -> i64 {
        TemporalResolution(self.resolution().min(MAX_TEMPORAL_RESOLUTION)).half_width_ms()
    }

    /// The closed interval `[t - w, t + w]` in epoch milliseconds.
    pub fn interval(self) -> (i64, i64) {
        let w = self.half_width_ms();
        (self.millis().saturating_sub(w), self.millis().saturating_add(w))
    }

    pub fn with_resolution(self, resolution: TemporalResolution) -> Self {
        Self((self.0 & !RESOLUTION_MASK) | resolution.0 as u64)
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.millis())
    }

    /// Whether the two resolution-widened intervals overlap.
    pub fn coincident(self, other: Self) -> bool {
        let gap = (self.millis() as i128 - other.millis() as i128).abs();
        gap <= self.half_width_ms() as i128 + other.half_width_ms() as i128
    }
}

impl fmt::Debug for TemporalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemporalId({}ms@{})", self.millis(), self.resolution())
    }
}

impl fmt::Display for TemporalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Indices of `candidates` whose interval overlaps `reference`'s.
///
/// Each candidate's own resolution sets its width, so mixed resolutions are
/// fine.
pub fn temporal_coincidence(reference: TemporalId, candidates: &[TemporalId]) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| reference.coincident(**c))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2005, 12, 15, h, m, s).unwrap()
    }

    #[test]
    fn encode_decode_instant() {
        let t = at(0, 30, 15);
        let id = TemporalId::from_datetime(t, TemporalResolution::FINEST).unwrap();
        assert_eq!(id.millis(), t.timestamp_millis());
        assert_eq!(id.resolution(), 48);
        assert_eq!(id.to_datetime(), Some(t));
        assert_eq!(id.half_width_ms(), 1);
    }

    #[test]
    fn pre_epoch_instants_are_ordered() {
        let r = TemporalResolution::FINEST;
        let early = TemporalId::new(-86_400_000, r).unwrap();
        let epoch = TemporalId::new(0, r).unwrap();
        assert!(early < epoch);
        assert_eq!(early.millis(), -86_400_000);
    }

    #[test]
    fn out_of_range_instant_rejected() {
        let r = TemporalResolution::FINEST;
        assert_eq!(
            TemporalId::new(i64::MAX, r),
            Err(TypeError::TimeOutOfRange(i64::MAX))
        );
        assert!(TemporalId::new(-(1 << 57), r).is_err());
    }

    #[test]
    fn resolution_validation() {
        assert!(TemporalResolution::new(48).is_ok());
        assert_eq!(
            TemporalResolution::new(49),
            Err(TypeError::InvalidTemporalResolution(49))
        );
        assert_eq!(TemporalResolution::COARSEST.half_width_ms(), 1 << 48);
        assert!(TemporalId::try_from_raw(0x3f).is_err());
        assert!(TemporalId::try_from_raw(1 << 63).is_err());
    }

    #[test]
    fn half_width_selection() {
        let half_hour = TemporalResolution::for_half_width(Duration::minutes(30));
        assert!(half_hour.half_width_ms() >= 1_800_000);
        let finer = TemporalResolution::new(half_hour.level() + 1).unwrap();
        assert!(finer.half_width_ms() < 1_800_000);
        assert_eq!(
            TemporalResolution::for_half_width(Duration::zero()),
            TemporalResolution::FINEST
        );
    }

    #[test]
    fn coincidence_uses_interval_overlap() {
        let hourly = TemporalResolution::for_half_width(Duration::minutes(30));
        let slices: Vec<TemporalId> = (0..24)
            .map(|h| TemporalId::from_datetime(at(h, 30, 0), hourly).unwrap())
            .collect();
        let scan = TemporalId::from_datetime(at(0, 30, 15), TemporalResolution::FINEST).unwrap();
        assert_eq!(temporal_coincidence(scan, &slices), vec![0]);

        // Coarsening the reference widens its interval to neighbouring slices.
        let coarse = scan.with_resolution(TemporalResolution::for_half_width(Duration::hours(2)));
        let hits = temporal_coincidence(coarse, &slices);
        assert!(hits.len() > 1);
        assert!(hits.contains(&0) && hits.contains(&1));
    }

    #[test]
    fn coincidence_is_not_bit_equality() {
        let a = TemporalId::new(1_000, TemporalResolution::new(40).unwrap()).unwrap();
        let b = TemporalId::new(1_100, TemporalResolution::new(42).unwrap()).unwrap();
        assert_ne!(a, b);
        assert!(a.coincident(b));
        assert!(b.coincident(a));
    }

    #[test]
    fn interval_bounds() {
        let id = TemporalId::new(10_000, TemporalResolution::new(38).unwrap()).unwrap();
        assert_eq!(id.interval(), (10_000 - 1024, 10_000 + 1024));
    }

    #[test]
    fn serde_roundtrip() {
        let id = TemporalId::new(1_134_606_615_000, TemporalResolution::FINEST).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: TemporalId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
