//! Hierarchical spatial identifiers.
//!
//! A [`SpatialId`] packs a path through a recursively subdivided octahedral
//! triangle mesh together with the resolution (depth) of that path into a
//! single `u64`:
//!
//! ```text
//! bit  63      : always 0
//! bits 62..60  : root face (0..7)
//! bits 59..6   : 27 two-bit child digits, level 1 at bits 59..58
//! bit  5       : unused
//! bits 4..0    : resolution level (0 = coarsest, 27 = finest)
//! ```
//!
//! Identifiers produced by point location carry digits all the way down to
//! the finest level even when their resolution field is coarser, so
//! [`SpatialId::clear`] (or [`SpatialId::join_key`]) is required before two
//! identifiers can be compared as cells.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Finest encodable resolution level.
pub const MAX_RESOLUTION: u8 = 27;

/// Number of root faces (the faces of the octahedron).
pub const FACE_COUNT: u8 = 8;

const RESOLUTION_MASK: u64 = 0x1f;
const FACE_SHIFT: u32 = 60;
const FACE_MASK: u64 = 0x7 << FACE_SHIFT;
const TOP_BIT: u64 = 1 << 63;

/// Shift of the two-bit digit for `level` (1..=27).
const fn digit_shift(level: u8) -> u32 {
    FACE_SHIFT - 2 * level as u32
}

/// All bits finer than `level`, including the resolution field.
const fn finer_mask(level: u8) -> u64 {
    (1u64 << digit_shift(level)) - 1
}

/// A validated spatial resolution level in `0..=MAX_RESOLUTION`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Resolution(u8);

impl Resolution {
    /// Level 0: the eight root faces.
    pub const COARSEST: Self = Self(0);
    /// The deepest encodable level.
    pub const FINEST: Self = Self(MAX_RESOLUTION);

    /// Validate a raw level.
    pub fn new(level: u8) -> TypeResult<Self> {
        if level > MAX_RESOLUTION {
            return Err(TypeError::InvalidResolution(level));
        }
        Ok(Self(level))
    }

    /// The raw level.
    pub const fn level(self) -> u8 {
        self.0
    }

    /// One level coarser, if any.
    pub fn coarser(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// One level finer, if any.
    pub fn finer(self) -> Option<Self> {
        (self.0 < MAX_RESOLUTION).then(|| Self(self.0 + 1))
    }

    /// The resolution whose cells are roughly `km` across.
    ///
    /// Level 10 corresponds to ~10 km; each level halves the length scale.
    /// Results are clamped to the encodable range.
    pub fn from_length_km(km: f64) -> Self {
        let level = 10.0 - (km / 10.0).log2();
        if level.is_nan() {
            return Self::COARSEST;
        }
        Self(level.floor().clamp(0.0, MAX_RESOLUTION as f64) as u8)
    }

    /// Approximate edge length of a cell at this resolution, in km.
    pub fn length_km(self) -> f64 {
        10.0 * 2f64.powi(10 - self.0 as i32)
    }
}

impl TryFrom<u8> for Resolution {
    type Error = TypeError;

    fn try_from(level: u8) -> TypeResult<Self> {
        Self::new(level)
    }
}

impl From<Resolution> for u8 {
    fn from(r: Resolution) -> u8 {
        r.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hierarchical spatial identifier.
///
/// Ordering is the raw integer ordering, which places every descendant of a
/// cleared cell inside `[cell, cell.terminator())`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpatialId(u64);

impl SpatialId {
    /// Wrap a raw value without validation.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Wrap a raw value, rejecting a set top bit or a resolution field
    /// beyond [`MAX_RESOLUTION`].
    pub fn new(raw: u64) -> TypeResult<Self> {
        if raw & TOP_BIT != 0 {
            return Err(TypeError::InvalidIdentifier(format!("0x{raw:016x}: top bit set")));
        }
        let level = (raw & RESOLUTION_MASK) as u8;
        if level > MAX_RESOLUTION {
            return Err(TypeError::InvalidResolution(level));
        }
        Ok(Self(raw))
    }

    /// Decode the signed form used by the record container, where negative
    /// values mark samples without a location.
    pub fn from_i64(value: i64) -> Option<Self> {
        if value < 0 {
            return None;
        }
        Self::new(value as u64).ok()
    }

    /// The raw `u64`.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The signed form. Lossless because bit 63 is never set.
    pub const fn to_i64(self) -> i64 {
        self.0 as i64
    }

    /// The root cell for an octahedron face.
    pub fn root(face: u8) -> TypeResult<Self> {
        if face >= FACE_COUNT {
            return Err(TypeError::InvalidIdentifier(format!("face {face} out of range")));
        }
        Ok(Self((face as u64) << FACE_SHIFT))
    }

    /// Build a cell from a root face and a digit path; the resolution is the
    /// path length.
    pub fn from_path(face: u8, digits: &[u8]) -> TypeResult<Self> {
        let mut id = Self::root(face)?;
        for &d in digits {
            id = id.child(d)?;
        }
        Ok(id)
    }

    /// The raw resolution field. Terminators report 31.
    pub const fn resolution(self) -> u8 {
        (self.0 & RESOLUTION_MASK) as u8
    }

    /// The resolution field clamped into the valid range.
    fn level(self) -> u8 {
        self.resolution().min(MAX_RESOLUTION)
    }

    /// Root face index.
    pub const fn face(self) -> u8 {
        ((self.0 & FACE_MASK) >> FACE_SHIFT) as u8
    }

    /// Child digit (0..3) at `level`; levels outside `1..=MAX_RESOLUTION`
    /// read as 0.
    pub fn digit(self, level: u8) -> u8 {
        if level == 0 || level > MAX_RESOLUTION {
            return 0;
        }
        ((self.0 >> digit_shift(level)) & 0x3) as u8
    }

    /// Digits from level 1 down to this identifier's resolution.
    pub fn digits(self) -> Vec<u8> {
        (1..=self.level()).map(|l| self.digit(l)).collect()
    }

    /// Rewrite the resolution field only. Finer digits are left untouched,
    /// so coarsening must be followed by [`clear`](Self::clear).
    pub fn coerce(self, r: Resolution) -> Self {
        Self((self.0 & !RESOLUTION_MASK) | r.0 as u64)
    }

    /// [`coerce`](Self::coerce) from a raw level.
    pub fn coerce_resolution(self, level: u8) -> TypeResult<Self> {
        Ok(self.coerce(Resolution::new(level)?))
    }

    /// The ancestor at `r`: digits finer than `r` zeroed, resolution set to `r`.
    pub fn clear_to(self, r: Resolution) -> Self {
        Self((self.0 & !finer_mask(r.0)) | r.0 as u64)
    }

    /// [`clear_to`](Self::clear_to) from a raw level.
    pub fn clear_to_resolution(self, level: u8) -> TypeResult<Self> {
        Ok(self.clear_to(Resolution::new(level)?))
    }

    /// Zero every digit finer than this identifier's own resolution.
    pub fn clear(self) -> Self {
        self.clear_to(Resolution(self.level()))
    }

    /// Coerce to `r` and clear: the cell at `r` this identifier falls in.
    pub fn join_key(self, r: Resolution) -> Self {
        self.coerce(r).clear()
    }

    /// Every bit finer than the resolution set. No descendant of
    /// `self.clear()` compares greater than or equal to the terminator.
    pub fn terminator(self) -> Self {
        Self(self.0 | finer_mask(self.level()))
    }

    /// Whether `other` lies inside the cell `self` denotes, using the
    /// half-open range `[self.clear(), self.terminator())`.
    pub fn contains(self, other: Self) -> bool {
        self.clear() <= other && other < self.terminator()
    }

    /// Whether both identifiers fall in the same cell at `r`.
    pub fn is_sibling_at(self, other: Self, r: Resolution) -> bool {
        self.join_key(r) == other.join_key(r)
    }

    /// The cell one level up, or `None` at a root face.
    pub fn parent(self) -> Option<Self> {
        let level = self.level();
        (level > 0).then(|| self.clear_to(Resolution(level - 1)))
    }

    /// The child cell with the given digit.
    pub fn child(self, digit: u8) -> TypeResult<Self> {
        let level = self.level();
        if level >= MAX_RESOLUTION {
            return Err(TypeError::InvalidResolution(level + 1));
        }
        if digit > 3 {
            return Err(TypeError::InvalidIdentifier(format!("child digit {digit} out of range")));
        }
        let next = level + 1;
        let base = self.clear().0 & !RESOLUTION_MASK;
        Ok(Self(base | ((digit as u64) << digit_shift(next)) | next as u64))
    }

    /// The four children, in ascending order.
    pub fn children(self) -> TypeResult<[Self; 4]> {
        Ok([self.child(0)?, self.child(1)?, self.child(2)?, self.child(3)?])
    }
}

impl fmt::Debug for SpatialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpatialId(0x{:016x}@{})", self.0, self.resolution())
    }
}

impl fmt::Display for SpatialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for SpatialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl FromStr for SpatialId {
    type Err = TypeError;

    /// Accepts `0x`-prefixed hex or decimal.
    fn from_str(s: &str) -> TypeResult<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        let raw = parsed.map_err(|e| TypeError::InvalidIdentifier(format!("{s}: {e}")))?;
        Self::new(raw)
    }
}
