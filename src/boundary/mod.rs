//! Boundary extraction and vertex classification.
//!
//! Converts one boundary loop of a block into a run of [`BoundaryVertex`]
//! values in the local metric frame, with locked / reflex / antenna flags
//! computed, coincident duplicates removed, and the run rotated so a
//! "most locked" vertex sits at index 0 (so simplification never splits a
//! locked span across the array wrap).

pub mod simplify;

use crate::block::{Ring, RoadSpec};
use crate::error::{InputError, Result};
use crate::math::distance_2d::point_segment_sq_dist;
use crate::math::polygon_2d::{coincident, is_ccw, triangle_area};
use crate::math::{cross2, Frame, Point2};

/// Points closer than this collapse before locking and rotation.
const COINCIDENT_MTR: f64 = 1e-4;

/// One classified boundary vertex. `road` annotates the edge OUTGOING
/// from this vertex.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryVertex {
    pub loc: Point2,
    pub road: Option<RoadSpec>,
    /// Must survive simplification: topology degree != 2, antenna bound,
    /// or a road type/width discontinuity.
    pub locked: bool,
    /// Interior angle at this vertex exceeds 180 degrees.
    pub reflex: bool,
    /// The outgoing edge and its reverse border the same region.
    pub antenna: bool,
    /// Dot product of incoming and outgoing unit directions.
    pub dot: f64,
}

/// Extracts and classifies one boundary loop.
///
/// The outer loop is normalized counter-clockwise and holes clockwise, so
/// the block interior is always on the left of the walk direction.
///
/// # Errors
///
/// Returns [`InputError::DegenerateRing`] if fewer than 3 vertices (2 for
/// a hole) survive coincident-point removal.
pub fn extract_boundary(ring: &Ring, frame: &Frame, is_hole: bool) -> Result<Vec<BoundaryVertex>> {
    let n = ring.points.len();
    let need = if is_hole { 2 } else { 3 };
    if n < need {
        return Err(InputError::DegenerateRing { got: n, need }.into());
    }

    // Work on (point, road, degree) triples so reorderings stay consistent.
    let mut pts: Vec<(Point2, Option<RoadSpec>, u32)> = (0..n)
        .map(|i| {
            (
                frame.forward(ring.points[i]),
                ring.roads.get(i).copied().flatten(),
                ring.degrees.get(i).copied().unwrap_or(2),
            )
        })
        .collect();

    // Remove coincident duplicates by direct comparison, not by the
    // error-bounded simplifier.
    let mut i = 0;
    while pts.len() > 1 && i < pts.len() {
        let j = (i + 1) % pts.len();
        if coincident(pts[i].0, pts[j].0, COINCIDENT_MTR) {
            pts.remove(j.max(i).min(pts.len() - 1));
        } else {
            i += 1;
        }
    }

    if pts.len() < need {
        return Err(InputError::DegenerateRing {
            got: pts.len(),
            need,
        }
        .into());
    }

    // Interior on the left: outer rings walk CCW, holes CW.
    let locs: Vec<Point2> = pts.iter().map(|p| p.0).collect();
    let ccw = is_ccw(&locs);
    if (is_hole && ccw) || (!is_hole && !ccw) {
        reverse_ring(&mut pts);
    }

    let m = pts.len();
    let antenna: Vec<bool> = (0..m)
        .map(|i| {
            let (a, b) = (pts[i].0, pts[(i + 1) % m].0);
            (0..m).any(|j| {
                j != i
                    && coincident(pts[j].0, b, COINCIDENT_MTR)
                    && coincident(pts[(j + 1) % m].0, a, COINCIDENT_MTR)
            })
        })
        .collect();

    let mut verts: Vec<BoundaryVertex> = (0..m)
        .map(|i| {
            let prev = (i + m - 1) % m;
            let road = pts[i].1;
            let road_break = match (&pts[prev].1, &road) {
                (None, None) => false,
                (Some(a), Some(b)) => !a.matches(b),
                _ => true,
            };
            let locked = pts[i].2 != 2 || road_break || antenna[prev] || antenna[i];
            BoundaryVertex {
                loc: pts[i].0,
                road,
                locked,
                reflex: false,
                antenna: antenna[i],
                dot: 0.0,
            }
        })
        .collect();

    rotate_to_most_locked(&mut verts);
    recompute_flags(&mut verts);
    Ok(verts)
}

/// Reverses a ring in place, keeping each edge annotation attached to the
/// same geometric edge.
fn reverse_ring(pts: &mut Vec<(Point2, Option<RoadSpec>, u32)>) {
    let n = pts.len();
    let old = pts.clone();
    for (k, slot) in pts.iter_mut().enumerate() {
        let src = (n - 1 - k) % n;
        // New edge k runs old[src] -> old[src - 1]: the reverse of old
        // edge src - 1.
        let edge = (src + n - 1) % n;
        *slot = (old[src].0, old[edge].1, old[src].2);
    }
}

/// Rotates so index 0 is a locked vertex, preferring the one forming the
/// largest signed triangle with its neighbors; with no locked vertex,
/// the leftmost vertex is used.
fn rotate_to_most_locked(verts: &mut [BoundaryVertex]) {
    let n = verts.len();
    let best = if verts.iter().any(|v| v.locked) {
        (0..n)
            .filter(|&i| verts[i].locked)
            .max_by(|&a, &b| {
                let ta = triangle_area(
                    verts[(a + n - 1) % n].loc,
                    verts[a].loc,
                    verts[(a + 1) % n].loc,
                );
                let tb = triangle_area(
                    verts[(b + n - 1) % n].loc,
                    verts[b].loc,
                    verts[(b + 1) % n].loc,
                );
                ta.total_cmp(&tb)
            })
            .unwrap_or(0)
    } else {
        (0..n)
            .min_by(|&a, &b| verts[a].loc.x.total_cmp(&verts[b].loc.x))
            .unwrap_or(0)
    };
    verts.rotate_left(best);
}

/// Recomputes `reflex` and `dot` from current geometry. Must run after
/// any ring mutation; the flags are never carried stale.
pub fn recompute_flags(verts: &mut [BoundaryVertex]) {
    let n = verts.len();
    if n < 3 {
        return;
    }
    for i in 0..n {
        let prev = verts[(i + n - 1) % n].loc;
        let here = verts[i].loc;
        let next = verts[(i + 1) % n].loc;
        let d_in = (here - prev).try_normalize(0.0).unwrap_or_default();
        let d_out = (next - here).try_normalize(0.0).unwrap_or_default();
        verts[i].dot = d_in.dot(&d_out);
        // Interior on the left: a right turn means the interior angle
        // exceeds 180 degrees.
        verts[i].reflex = cross2(d_in, d_out) < 0.0;
    }
}

/// Simplifies a classified boundary under the block error bound and
/// refreshes the derived flags.
#[must_use]
pub fn simplify_boundary(verts: &[BoundaryVertex], err_mtr: f64) -> Vec<BoundaryVertex> {
    let mut out = simplify::simplify_ring(
        verts,
        err_mtr * err_mtr,
        &|v: &BoundaryVertex| v.locked,
        &|a: &BoundaryVertex, b: &BoundaryVertex, x: &BoundaryVertex| {
            point_segment_sq_dist(x.loc, a.loc, b.loc)
        },
    );
    recompute_flags(&mut out);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn road(width: f64) -> RoadSpec {
        RoadSpec {
            road_type: 1,
            width,
            grounded: true,
        }
    }

    fn square_ring() -> Ring {
        Ring::uniform(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
            road(6.0),
        )
    }

    #[test]
    fn square_extracts_four_vertices() {
        let verts = extract_boundary(&square_ring(), &Frame::identity(), false).unwrap();
        assert_eq!(verts.len(), 4);
        assert!(verts.iter().all(|v| !v.reflex));
        assert!(verts.iter().all(|v| !v.locked));
    }

    #[test]
    fn coincident_points_removed() {
        let mut ring = square_ring();
        ring.points.insert(1, Point2::new(10.0, 0.0));
        ring.roads.insert(1, Some(road(6.0)));
        ring.degrees.insert(1, 2);
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        assert_eq!(verts.len(), 4);
    }

    #[test]
    fn degenerate_ring_rejected() {
        let ring = Ring::bare(vec![Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)]);
        assert!(extract_boundary(&ring, &Frame::identity(), false).is_err());
    }

    #[test]
    fn cw_outer_ring_normalized_ccw() {
        let mut ring = square_ring();
        ring.points.reverse();
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        let locs: Vec<Point2> = verts.iter().map(|v| v.loc).collect();
        assert!(is_ccw(&locs));
    }

    #[test]
    fn road_discontinuity_locks_vertex() {
        let mut ring = square_ring();
        ring.roads[2] = Some(road(14.0));
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        // Both ends of the wide edge must lock.
        let locked: Vec<&BoundaryVertex> = verts.iter().filter(|v| v.locked).collect();
        assert_eq!(locked.len(), 2);
    }

    #[test]
    fn high_degree_vertex_locks() {
        let mut ring = square_ring();
        ring.degrees[1] = 3;
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        assert_eq!(verts.iter().filter(|v| v.locked).count(), 1);
    }

    #[test]
    fn reflex_vertex_detected() {
        let ring = Ring::bare(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(5.0, 5.0), // notch
            Point2::new(0.0, 10.0),
        ]);
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        let reflex: Vec<&BoundaryVertex> = verts.iter().filter(|v| v.reflex).collect();
        assert_eq!(reflex.len(), 1);
        assert!((reflex[0].loc - Point2::new(5.0, 5.0)).norm() < 1e-9);
    }

    #[test]
    fn antenna_edge_detected_and_locked() {
        // A square with a spike: edge (10,5)->(15,5) and back.
        let ring = Ring::bare(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 5.0),
            Point2::new(15.0, 5.0),
            Point2::new(10.0, 5.00001),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]);
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        assert!(verts.iter().any(|v| v.antenna));
        // Antenna endpoints lock.
        assert!(verts
            .iter()
            .filter(|v| v.antenna)
            .all(|v| v.locked));
    }

    #[test]
    fn simplify_boundary_recomputes_flags() {
        let ring = Ring::uniform(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(5.0, 0.01),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
            road(6.0),
        );
        let verts = extract_boundary(&ring, &Frame::identity(), false).unwrap();
        let simplified = simplify_boundary(&verts, 1.0);
        assert_eq!(simplified.len(), 4);
        for v in &simplified {
            assert!(!v.reflex);
            assert!(v.dot.abs() < 1e-6, "square corners have dot 0");
        }
    }

    #[test]
    fn holes_walk_clockwise() {
        let ring = square_ring();
        let verts = extract_boundary(&ring, &Frame::identity(), true).unwrap();
        let locs: Vec<Point2> = verts.iter().map(|v| v.loc).collect();
        assert!(!is_ccw(&locs));
    }
}
