//! Cover generation: the cells at a fixed resolution that touch a region.

use geojoin_types::{Resolution, SpatialId, FACE_COUNT};
use tracing::{debug, warn};

use crate::error::{CoverError, CoverResult};
use crate::mesh::{root_triangle, Triangle};
use crate::region::Region;

/// Every cell at `resolution` whose triangle intersects `region`, in
/// ascending identifier order.
///
/// Fails with [`CoverError::RegionTooLarge`] as soon as the cover would
/// hold more than `limit` identifiers.
pub fn cover(region: &Region, resolution: Resolution, limit: usize) -> CoverResult<Vec<SpatialId>> {
    let target = resolution.level();
    let mut out = Vec::new();
    let mut visited = 0usize;

    let mut stack: Vec<(SpatialId, Triangle)> = Vec::with_capacity(4 * (target as usize + 2));
    for face in (0..FACE_COUNT).rev() {
        stack.push((SpatialId::root(face)?, root_triangle(face)));
    }

    // Depth first, children pushed in reverse so cells come out ascending.
    while let Some((id, tri)) = stack.pop() {
        visited += 1;
        if !region.intersects(&tri) {
            continue;
        }
        if id.resolution() == target {
            if out.len() == limit {
                return Err(CoverError::RegionTooLarge {
                    resolution: target,
                    limit,
                });
            }
            out.push(id);
            continue;
        }
        let ids = id.children()?;
        let tris = tri.subdivide();
        for (child, child_tri) in ids.into_iter().zip(tris).rev() {
            stack.push((child, child_tri));
        }
    }

    out.sort_unstable();
    debug!(resolution = target, cells = out.len(), visited, "cover generated");
    Ok(out)
}

/// Like [`cover`], but falls back to coarser resolutions down to
/// `min_resolution` while the cover is too large. Returns the identifiers
/// and the resolution actually used.
pub fn cover_with_fallback(
    region: &Region,
    resolution: Resolution,
    min_resolution: Resolution,
    limit: usize,
) -> CoverResult<(Vec<SpatialId>, Resolution)> {
    let mut current = resolution;
    loop {
        match cover(region, current, limit) {
            Ok(ids) => {
                if current != resolution {
                    warn!(
                        requested = resolution.level(),
                        used = current.level(),
                        cells = ids.len(),
                        "cover coarsened to fit the result size limit"
                    );
                }
                return Ok((ids, current));
            }
            Err(CoverError::RegionTooLarge { .. }) if current > min_resolution => {
                // `current > min_resolution` guarantees a coarser level exists.
                current = current.coarser().unwrap_or(Resolution::COARSEST);
            }
            Err(e) => return Err(e),
        }
    }
}

/// The identifiers that represent `id` at `resolution`.
///
/// If `id` is coarser than `resolution`, this is every descendant at
/// `resolution`; otherwise it is the single ancestor at `resolution`.
pub fn expand(id: SpatialId, resolution: Resolution, limit: usize) -> CoverResult<Vec<SpatialId>> {
    let cell = id.clear();
    let from = cell.resolution();
    let target = resolution.level();
    if from >= target {
        return Ok(vec![cell.clear_to(resolution)]);
    }

    let count = 1u64 << (2 * u32::from(target - from));
    if count > limit as u64 {
        return Err(CoverError::RegionTooLarge {
            resolution: target,
            limit,
        });
    }

    let mut level = vec![cell];
    for _ in from..target {
        let mut next = Vec::with_capacity(level.len() * 4);
        for parent in &level {
            next.extend(parent.children()?);
        }
        level = next;
    }
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{cell_triangle, locate};
    use crate::vector::Vec3;

    fn res(level: u8) -> Resolution {
        Resolution::new(level).unwrap()
    }

    #[test]
    fn whole_sphere_at_level_zero() {
        let region = Region::circle(0.0, 0.0, 180.0).unwrap();
        let ids = cover(&region, Resolution::COARSEST, 100).unwrap();
        let roots: Vec<_> = (0..8).map(|f| SpatialId::root(f).unwrap()).collect();
        assert_eq!(ids, roots);
    }

    #[test]
    fn circle_cover_is_sorted_and_deterministic() {
        let region = Region::circle(19.5, -155.5, 2.0).unwrap();
        let a = cover(&region, res(6), 4096).unwrap();
        let b = cover(&region, res(6), 4096).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|id| id.resolution() == 6 && *id == id.clear()));
    }

    #[test]
    fn circle_cover_holds_the_center_cell() {
        for &(lat, lon) in &[(19.5, -155.5), (-60.0, 10.0), (0.0, 90.0), (89.9, 0.0)] {
            let region = Region::circle(lat, lon, 0.5).unwrap();
            let ids = cover(&region, res(8), 4096).unwrap();
            let center = locate(lat, lon, res(8)).unwrap().clear();
            assert!(ids.contains(&center), "{lat},{lon}");
        }
    }

    #[test]
    fn cover_reaches_sampled_interior_points() {
        let region = Region::polygon(&[(15.0, -174.0), (15.0, -145.0), (38.0, -145.0), (38.0, -174.0)]).unwrap();
        let ids = cover(&region, res(5), 4096).unwrap();
        for lat in [16.0, 20.0, 26.5, 33.0, 37.0] {
            for lon in [-173.0, -165.0, -158.0, -150.0, -146.0] {
                let cell = locate(lat, lon, res(5)).unwrap().clear();
                assert!(ids.binary_search(&cell).is_ok(), "{lat},{lon}");
            }
        }
    }

    #[test]
    fn every_cover_cell_touches_the_cap() {
        let region = Region::circle(-20.0, 30.0, 3.0).unwrap();
        let Region::Circle(cap) = &region else {
            unreachable!()
        };
        for id in cover(&region, res(7), 4096).unwrap() {
            let tri = cell_triangle(id);
            let touches = tri.vertices.iter().any(|v| cap.contains(*v))
                || tri.contains(cap.center())
                || cap.center().angle_to(tri.center()) <= cap.radius() + tri.circumradius();
            assert!(touches, "{id}");
        }
        assert!(region.contains(Vec3::from_lat_lon(-20.0, 30.0)));
    }

    #[test]
    fn limit_is_enforced() {
        let region = Region::circle(0.0, 0.0, 30.0).unwrap();
        let err = cover(&region, res(8), 16).unwrap_err();
        assert_eq!(err, CoverError::RegionTooLarge { resolution: 8, limit: 16 });
    }

    #[test]
    fn fallback_coarsens_until_it_fits() {
        let region = Region::circle(0.0, 0.0, 30.0).unwrap();
        let (ids, used) = cover_with_fallback(&region, res(8), res(1), 64).unwrap();
        assert!(used < res(8));
        assert!(ids.len() <= 64);
        assert!(ids.iter().all(|id| id.resolution() == used.level()));

        let err = cover_with_fallback(&region, res(8), res(7), 64).unwrap_err();
        assert!(matches!(err, CoverError::RegionTooLarge { resolution: 7, .. }));
    }

    #[test]
    fn expand_to_descendants_and_ancestor() {
        let id = SpatialId::from_path(3, &[1, 2]).unwrap();
        let kids = expand(id, res(4), 4096).unwrap();
        assert_eq!(kids.len(), 16);
        assert!(kids.iter().all(|k| id.contains(*k) && k.resolution() == 4));
        assert!(kids.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(expand(id, res(1), 4096).unwrap(), vec![SpatialId::from_path(3, &[1]).unwrap()]);
        assert_eq!(expand(id, res(2), 4096).unwrap(), vec![id]);
        assert!(matches!(
            expand(id, res(12), 4096),
            Err(CoverError::RegionTooLarge { resolution: 12, .. })
        ));
    }
}
