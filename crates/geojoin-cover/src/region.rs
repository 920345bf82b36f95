//! Region descriptors: spherical caps and convex hulls.

use geo::{Area, ConvexHull, Winding};
use geo_types::{coord, Coord, MultiPoint, Point};

use crate::error::{CoverError, CoverResult};
use crate::mesh::{Triangle, EPSILON};
use crate::vector::Vec3;

fn check_coordinate(lat: f64, lon: f64) -> CoverResult<()> {
    if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CoverError::InvalidCoordinate { lat, lon });
    }
    Ok(())
}

fn degenerate() -> CoverError {
    CoverError::InvalidRegion("polygon hull is degenerate (collinear or repeated vertices)".into())
}

/// Shortest angle from `p` to the minor great-circle arc `a -> b`.
fn arc_distance(p: Vec3, a: Vec3, b: Vec3) -> f64 {
    let n = a.cross(b);
    if n.norm() < EPSILON {
        return p.angle_to(a);
    }
    let n = n.normalized();
    let projected = p - n * p.dot(n);
    let endpoints = p.angle_to(a).min(p.angle_to(b));
    if projected.norm() < EPSILON {
        return endpoints;
    }
    let q = projected.normalized();
    if a.cross(q).dot(n) >= 0.0 && q.cross(b).dot(n) >= 0.0 {
        p.angle_to(q)
    } else {
        endpoints
    }
}

fn on_arc(x: Vec3, a: Vec3, b: Vec3, n: Vec3) -> bool {
    a.cross(x).dot(n) >= -EPSILON && x.cross(b).dot(n) >= -EPSILON
}

/// Whether the minor arcs `a -> b` and `c -> d` cross.
fn arcs_cross(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> bool {
    let n1 = a.cross(b).normalized();
    let n2 = c.cross(d).normalized();
    let x = n1.cross(n2);
    if x.norm() < EPSILON {
        return false;
    }
    let x = x.normalized();
    [x, -x]
        .iter()
        .any(|&cand| on_arc(cand, a, b, n1) && on_arc(cand, c, d, n2))
}

/// A circular region: every point within `radius` of `center`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cap {
    center: Vec3,
    /// Angular radius in radians.
    radius: f64,
}

impl Cap {
    /// A cap around a latitude/longitude with a radius in degrees of arc.
    pub fn new(lat: f64, lon: f64, radius_deg: f64) -> CoverResult<Self> {
        check_coordinate(lat, lon)?;
        if !radius_deg.is_finite() || !(0.0..=180.0).contains(&radius_deg) {
            return Err(CoverError::InvalidRegion(format!(
                "cap radius must be within [0, 180] degrees, got {radius_deg}"
            )));
        }
        Ok(Self {
            center: Vec3::from_lat_lon(lat, lon),
            radius: radius_deg.to_radians(),
        })
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.center.angle_to(p) <= self.radius + EPSILON
    }

    pub fn intersects(&self, tri: &Triangle) -> bool {
        if self.center.angle_to(tri.center()) > self.radius + tri.circumradius() + EPSILON {
            return false;
        }
        if tri.vertices.iter().any(|v| self.contains(*v)) || tri.contains(self.center) {
            return true;
        }
        tri.edges()
            .iter()
            .any(|&(a, b)| arc_distance(self.center, a, b) <= self.radius + EPSILON)
    }
}

/// A convex spherical polygon with counter-clockwise vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvexPolygon {
    vertices: Vec<Vec3>,
}

impl ConvexPolygon {
    /// The convex hull of latitude/longitude points (degrees).
    ///
    /// The points must fit strictly inside one hemisphere. Interior and
    /// collinear points are dropped.
    pub fn hull(points: &[(f64, f64)]) -> CoverResult<Self> {
        if points.len() < 3 {
            return Err(CoverError::InvalidRegion(format!(
                "polygon needs at least 3 vertices, got {}",
                points.len()
            )));
        }
        let mut vs = Vec::with_capacity(points.len());
        for &(lat, lon) in points {
            check_coordinate(lat, lon)?;
            vs.push(Vec3::from_lat_lon(lat, lon));
        }

        let sum = vs.iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, v| acc + *v);
        let center = sum.normalized();
        if sum.norm() < EPSILON || vs.iter().any(|v| v.dot(center) <= EPSILON) {
            return Err(CoverError::InvalidRegion(
                "polygon vertices do not fit in a hemisphere".into(),
            ));
        }

        // Gnomonic projection maps great circles to lines, so the planar
        // hull is the spherical hull.
        let (east, north) = tangent_basis(center);
        let projected: Vec<Coord<f64>> = vs
            .iter()
            .map(|v| {
                let d = v.dot(center);
                coord! { x: v.dot(east) / d, y: v.dot(north) / d }
            })
            .collect();

        let points: MultiPoint<f64> = projected.iter().map(|&c| Point::from(c)).collect();
        let hull = points.convex_hull();
        if hull.unsigned_area() < EPSILON {
            return Err(degenerate());
        }
        let mut ring = hull.exterior().clone();
        ring.make_ccw_winding();

        let mut indices: Vec<usize> = Vec::with_capacity(ring.0.len());
        for c in ring.coords() {
            let Some(i) = projected.iter().position(|p| p == c) else {
                return Err(degenerate());
            };
            if indices.last() != Some(&i) {
                indices.push(i);
            }
        }
        if indices.len() > 1 && indices.first() == indices.last() {
            indices.pop();
        }
        if indices.len() < 3 {
            return Err(degenerate());
        }
        Ok(Self {
            vertices: indices.into_iter().map(|i| vs[i]).collect(),
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    fn edges(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    pub fn contains(&self, p: Vec3) -> bool {
        self.edges()
            .all(|(a, b)| a.cross(b).normalized().dot(p) >= -EPSILON)
    }

    pub fn intersects(&self, tri: &Triangle) -> bool {
        tri.vertices.iter().any(|v| self.contains(*v))
            || self.vertices.iter().any(|v| tri.contains(*v))
            || tri
                .edges()
                .iter()
                .any(|&(a, b)| self.edges().any(|(c, d)| arcs_cross(a, b, c, d)))
    }
}

/// East/north unit vectors tangent to the sphere at `center`.
fn tangent_basis(center: Vec3) -> (Vec3, Vec3) {
    let axis = if center.z.abs() < 0.9 {
        Vec3::new(0.0, 0.0, 1.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let east = axis.cross(center).normalized();
    (east, center.cross(east))
}

/// A region of interest for cover generation.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    Circle(Cap),
    Polygon(ConvexPolygon),
}

impl Region {
    pub fn circle(lat: f64, lon: f64, radius_deg: f64) -> CoverResult<Self> {
        Ok(Self::Circle(Cap::new(lat, lon, radius_deg)?))
    }

    pub fn polygon(points: &[(f64, f64)]) -> CoverResult<Self> {
        Ok(Self::Polygon(ConvexPolygon::hull(points)?))
    }

    pub fn intersects(&self, tri: &Triangle) -> bool {
        match self {
            Self::Circle(cap) => cap.intersects(tri),
            Self::Polygon(poly) => poly.intersects(tri),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        match self {
            Self::Circle(cap) => cap.contains(p),
            Self::Polygon(poly) => poly.contains(p),
        }
    }
}
