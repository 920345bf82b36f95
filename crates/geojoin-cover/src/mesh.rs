//! The octahedral triangle mesh behind [`SpatialId`].
//!
//! Level 0 is the eight faces of an octahedron projected onto the unit
//! sphere. Each cell splits into four by the normalized midpoints of its
//! edges; child 3 is the centre triangle. Every cell keeps a consistent
//! counter-clockwise winding seen from outside the sphere, so a point is
//! inside a cell iff it is on the inner side of all three edge planes.

use geojoin_types::{Resolution, SpatialId, MAX_RESOLUTION};

use crate::error::{CoverError, CoverResult};
use crate::vector::Vec3;

/// Slack for points that sit exactly on a shared edge.
pub(crate) const EPSILON: f64 = 1e-12;

const V0: Vec3 = Vec3::new(0.0, 0.0, 1.0);
const V1: Vec3 = Vec3::new(1.0, 0.0, 0.0);
const V2: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const V3: Vec3 = Vec3::new(-1.0, 0.0, 0.0);
const V4: Vec3 = Vec3::new(0.0, -1.0, 0.0);
const V5: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Root faces in identifier order: four southern, then four northern.
const ROOTS: [[Vec3; 3]; 8] = [
    [V1, V5, V2],
    [V2, V5, V3],
    [V3, V5, V4],
    [V4, V5, V1],
    [V1, V0, V4],
    [V4, V0, V3],
    [V3, V0, V2],
    [V2, V0, V1],
];

/// A spherical triangle with counter-clockwise vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
}

impl Triangle {
    pub const fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { vertices: [a, b, c] }
    }

    /// Edges as `(start, end)` pairs in winding order.
    pub fn edges(&self) -> [(Vec3, Vec3); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }

    /// Smallest signed distance (as a sine) from `p` to the three edge
    /// planes. Non-negative inside.
    pub fn score(&self, p: Vec3) -> f64 {
        self.edges()
            .iter()
            .map(|&(s, e)| s.cross(e).normalized().dot(p))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.score(p) >= -EPSILON
    }

    /// The four children in digit order.
    pub fn subdivide(&self) -> [Triangle; 4] {
        let [a, b, c] = self.vertices;
        let w0 = (b + c).normalized();
        let w1 = (a + c).normalized();
        let w2 = (a + b).normalized();
        [
            Triangle::new(a, w2, w1),
            Triangle::new(b, w0, w2),
            Triangle::new(c, w1, w0),
            Triangle::new(w0, w1, w2),
        ]
    }

    /// Unit vector through the vertex centroid.
    pub fn center(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (a + b + c).normalized()
    }

    /// Angular radius of the smallest cap around [`center`](Self::center)
    /// holding all three vertices.
    pub fn circumradius(&self) -> f64 {
        let center = self.center();
        self.vertices
            .iter()
            .map(|v| center.angle_to(*v))
            .fold(0.0, f64::max)
    }
}

/// The level-0 triangle for a face. Faces wrap modulo 8.
pub fn root_triangle(face: u8) -> Triangle {
    let [a, b, c] = ROOTS[(face % 8) as usize];
    Triangle::new(a, b, c)
}

/// The triangle of the cell an identifier denotes at its own resolution.
pub fn cell_triangle(id: SpatialId) -> Triangle {
    let mut tri = root_triangle(id.face());
    for level in 1..=id.resolution().min(MAX_RESOLUTION) {
        tri = tri.subdivide()[id.digit(level) as usize];
    }
    tri
}

/// Centre of a cell as latitude/longitude in degrees.
pub fn cell_center(id: SpatialId) -> (f64, f64) {
    cell_triangle(id).center().to_lat_lon()
}

/// Cell vertices as latitude/longitude pairs in degrees.
pub fn cell_vertices(id: SpatialId) -> [(f64, f64); 3] {
    cell_triangle(id).vertices.map(Vec3::to_lat_lon)
}

fn best_of(candidates: &[Triangle], p: Vec3) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, tri) in candidates.iter().enumerate() {
        let score = tri.score(p);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

/// Locate a point and tag it with `resolution`.
///
/// The identifier carries the full-depth digit path regardless of
/// `resolution`, like identifiers delivered by upstream geolocation; use
/// [`SpatialId::clear`] to get the cell itself.
pub fn locate(lat: f64, lon: f64, resolution: Resolution) -> CoverResult<SpatialId> {
    if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CoverError::InvalidCoordinate { lat, lon });
    }
    let p = Vec3::from_lat_lon(lat, lon);
    let roots: Vec<Triangle> = (0..8).map(root_triangle).collect();
    let face = best_of(&roots, p);

    let mut id = SpatialId::root(face as u8)?;
    let mut tri = roots[face];
    for _ in 0..MAX_RESOLUTION {
        let children = tri.subdivide();
        let digit = best_of(&children, p);
        id = id.child(digit as u8)?;
        tri = children[digit];
    }
    Ok(id.coerce(resolution))
}
