//! Curve insertion and face construction.
//!
//! Curves are split against each other, snapped to a fixed quantum so
//! shared endpoints and crossings land on identical vertices, merged
//! where coincident (key sets union), and assembled into the half-edge
//! structure. Faces are carved from the next-pointer cycles; hole cycles
//! are attached to their containing face by leftward ray casting.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{ArrangementError, GeometryError, Result};
use crate::math::distance_2d::point_segment_sq_dist;
use crate::math::intersect_2d::segment_segment_intersect;
use crate::math::polygon_2d::signed_area;
use crate::math::{Point2, TOLERANCE};

use super::{tag, Arrangement, Face, FaceData, FaceId, Halfedge, HalfedgeId, Usage, Vertex, VertexId};

/// Vertex snap quantum in meters. Crossing points computed from two
/// different curve pairs must quantize to the same vertex.
pub const SNAP_MTR: f64 = 1e-6;

/// One input curve with the tag keys it toggles.
#[derive(Debug, Clone)]
pub struct Curve {
    pub src: Point2,
    pub dst: Point2,
    /// Sorted, deduplicated toggle keys.
    pub keys: Vec<usize>,
}

impl Curve {
    #[must_use]
    pub fn new(src: Point2, dst: Point2, mut keys: Vec<usize>) -> Self {
        keys.sort_unstable();
        keys.dedup();
        Self { src, dst, keys }
    }
}

type QPoint = (i64, i64);

fn quantize(p: Point2) -> QPoint {
    (
        (p.x / SNAP_MTR).round() as i64,
        (p.y / SNAP_MTR).round() as i64,
    )
}

fn unquantize(q: QPoint) -> Point2 {
    Point2::new(q.0 as f64 * SNAP_MTR, q.1 as f64 * SNAP_MTR)
}

/// Builds a tagged subdivision from a curve soup.
///
/// `feature_map[i]` is the face data assigned where key `i` is the
/// highest toggled-on key; `unbounded_idx` seeds the traversal set so
/// the unbounded side of the curve carrying that key tags correctly.
///
/// # Errors
///
/// Rejects curves shorter than the snap quantum, and reports an
/// invariant violation if a polygonal-feature face ends up without a
/// feature id.
pub fn create_block(
    curves: &[Curve],
    feature_map: &[FaceData],
    unbounded_idx: Option<usize>,
) -> Result<Arrangement> {
    for c in curves {
        if quantize(c.src) == quantize(c.dst) {
            return Err(GeometryError::ZeroLengthCurve {
                x: c.src.x,
                y: c.src.y,
            }
            .into());
        }
    }

    let segs = split_and_merge(curves);
    let (mut arr, pending) = assemble(&segs);
    assign_holes(&mut arr, pending);
    tag::apply_tags(&mut arr, feature_map, unbounded_idx);

    for (_, face) in &arr.faces {
        if face.data.usage == Usage::PolygonalFeature && face.data.feature.is_none() {
            return Err(ArrangementError::Invariant(
                "polygonal-feature face with no feature id".into(),
            )
            .into());
        }
    }
    Ok(arr)
}

/// Splits every curve at its crossings with every other curve, snaps the
/// pieces, and merges coincident pieces by key-set union.
fn split_and_merge(curves: &[Curve]) -> Vec<(QPoint, QPoint, Vec<usize>)> {
    let mut merged: BTreeMap<(QPoint, QPoint), BTreeSet<usize>> = BTreeMap::new();
    let snap_sq = SNAP_MTR * SNAP_MTR;

    for (i, a) in curves.iter().enumerate() {
        let mut cuts: Vec<(f64, Point2)> = vec![(0.0, a.src), (1.0, a.dst)];
        let dir = a.dst - a.src;
        let len_sq = dir.norm_squared();

        for (j, b) in curves.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some((pt, t, _)) = segment_segment_intersect(a.src, a.dst, b.src, b.dst) {
                cuts.push((t, pt));
            } else {
                // Parallel overlap or a near-touch the bounded test
                // missed: project the other curve's endpoints.
                for e in [b.src, b.dst] {
                    if point_segment_sq_dist(e, a.src, a.dst) < snap_sq {
                        let t = (e - a.src).dot(&dir) / len_sq;
                        cuts.push((t.clamp(0.0, 1.0), e));
                    }
                }
            }
        }

        cuts.sort_by(|x, y| x.0.total_cmp(&y.0));
        let mut prev = quantize(cuts[0].1);
        for &(_, p) in &cuts[1..] {
            let q = quantize(p);
            if q == prev {
                continue;
            }
            let key = if prev <= q { (prev, q) } else { (q, prev) };
            merged.entry(key).or_default().extend(a.keys.iter().copied());
            prev = q;
        }
    }

    merged
        .into_iter()
        .map(|((s, d), keys)| (s, d, keys.into_iter().collect()))
        .collect()
}

/// Builds vertices, twin half-edge pairs, angular orderings, next/prev
/// pointers, and faces for all positive-area cycles. Returns the
/// subdivision plus the nonpositive-area cycles still needing a face.
fn assemble(segs: &[(QPoint, QPoint, Vec<usize>)]) -> (Arrangement, Vec<HalfedgeId>) {
    let mut arr = Arrangement::new();
    let mut vmap: HashMap<QPoint, VertexId> = HashMap::new();

    let mut vertex = |arr: &mut Arrangement, q: QPoint| -> VertexId {
        *vmap.entry(q).or_insert_with(|| {
            arr.vertices.insert(Vertex {
                loc: unquantize(q),
                out: Vec::new(),
            })
        })
    };

    for (s, d, keys) in segs {
        let vs = vertex(&mut arr, *s);
        let vd = vertex(&mut arr, *d);
        let h = arr.halfedges.insert(Halfedge {
            origin: vs,
            twin: HalfedgeId::default(),
            next: HalfedgeId::default(),
            prev: HalfedgeId::default(),
            face: FaceId::default(),
            keys: keys.clone(),
        });
        let t = arr.halfedges.insert(Halfedge {
            origin: vd,
            twin: h,
            next: HalfedgeId::default(),
            prev: HalfedgeId::default(),
            face: FaceId::default(),
            keys: keys.clone(),
        });
        arr.halfedges[h].twin = t;
        arr.vertices[vs].out.push(h);
        arr.vertices[vd].out.push(t);
    }

    // Counter-clockwise angular order of outgoing edges at each vertex.
    let vids: Vec<VertexId> = arr.vertices.keys().collect();
    for v in &vids {
        let origin = arr.vertices[*v].loc;
        let mut out = std::mem::take(&mut arr.vertices[*v].out);
        out.sort_by(|&a, &b| {
            let pa = arr.vertices[arr.target(a)].loc - origin;
            let pb = arr.vertices[arr.target(b)].loc - origin;
            pa.y.atan2(pa.x).total_cmp(&pb.y.atan2(pb.x))
        });
        arr.vertices[*v].out = out;
    }

    // Interior on the left: an edge arriving at a vertex continues along
    // the clockwise neighbor of its twin in the angular order.
    let hids: Vec<HalfedgeId> = arr.halfedges.keys().collect();
    for &h in &hids {
        let t = arr.halfedges[h].twin;
        let v = arr.halfedges[t].origin;
        let ring = arr.vertices[v].out.clone();
        let Some(i) = ring.iter().position(|&x| x == t) else {
            continue;
        };
        let next = ring[(i + ring.len() - 1) % ring.len()];
        arr.halfedges[h].next = next;
        arr.halfedges[next].prev = h;
    }

    // Positive-area cycles bound a face; the rest are hole cycles.
    let mut seen: HashSet<HalfedgeId> = HashSet::new();
    let mut pending = Vec::new();
    for &h in &hids {
        if seen.contains(&h) {
            continue;
        }
        let cyc = arr.cycle(h);
        seen.extend(cyc.iter().copied());
        let pts: Vec<Point2> = cyc
            .iter()
            .map(|&c| arr.vertices[arr.halfedges[c].origin].loc)
            .collect();
        if signed_area(&pts) > TOLERANCE {
            let f = arr.faces.insert(Face {
                outer: Some(h),
                holes: Vec::new(),
                data: FaceData::default(),
            });
            for &c in &cyc {
                arr.halfedges[c].face = f;
            }
        } else {
            pending.push(h);
        }
    }

    (arr, pending)
}

/// Attaches each pending hole cycle to the face containing it, found by
/// casting a leftward ray from the cycle's leftmost vertex. Cycles whose
/// nearest crossing belongs to a still-pending cycle are retried after
/// that cycle resolves.
fn assign_holes(arr: &mut Arrangement, mut pending: Vec<HalfedgeId>) {
    while !pending.is_empty() {
        let mut progressed = false;
        let mut deferred = Vec::new();

        for rep in pending {
            let cyc = arr.cycle(rep);
            let Some(p) = cyc
                .iter()
                .map(|&h| arr.vertices[arr.halfedges[h].origin].loc)
                .min_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
            else {
                continue;
            };

            let mut best: Option<(f64, HalfedgeId)> = None;
            for e in arr.edges() {
                let a = arr.vertices[arr.halfedges[e].origin].loc;
                let b = arr.vertices[arr.target(e)].loc;
                if (a.y > p.y) == (b.y > p.y) {
                    continue;
                }
                let x = a.x + (b.x - a.x) * (p.y - a.y) / (b.y - a.y);
                if x >= p.x - SNAP_MTR * 0.5 {
                    continue;
                }
                if best.is_none_or(|(bx, _)| x > bx) {
                    let down = if a.y > b.y { e } else { arr.halfedges[e].twin };
                    best = Some((x, down));
                }
            }

            match best {
                None => {
                    for &c in &cyc {
                        arr.halfedges[c].face = arr.unbounded;
                    }
                    let ub = arr.unbounded;
                    arr.faces[ub].holes.push(rep);
                    progressed = true;
                }
                Some((_, down)) => {
                    let f = arr.halfedges[down].face;
                    if arr.faces.contains_key(f) {
                        for &c in &cyc {
                            arr.halfedges[c].face = f;
                        }
                        arr.faces[f].holes.push(rep);
                        progressed = true;
                    } else {
                        deferred.push(rep);
                    }
                }
            }
        }

        if !progressed && !deferred.is_empty() {
            debug_assert!(false, "unresolvable hole containment chain");
            for rep in deferred.drain(..) {
                let cyc = arr.cycle(rep);
                for &c in &cyc {
                    arr.halfedges[c].face = arr.unbounded;
                }
                let ub = arr.unbounded;
                arr.faces[ub].holes.push(rep);
            }
        }
        pending = deferred;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ring_curves(pts: &[Point2], keys: Vec<usize>) -> Vec<Curve> {
        (0..pts.len())
            .map(|i| Curve::new(pts[i], pts[(i + 1) % pts.len()], keys.clone()))
            .collect()
    }

    fn square(x0: f64, y0: f64, side: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ]
    }

    fn bounded_faces(arr: &Arrangement) -> Vec<FaceId> {
        arr.faces
            .iter()
            .filter(|(f, _)| *f != arr.unbounded)
            .map(|(f, _)| f)
            .collect()
    }

    #[test]
    fn zero_length_curve_rejected() {
        let c = Curve::new(Point2::new(1.0, 1.0), Point2::new(1.0, 1.0), vec![0]);
        assert!(create_block(&[c], &[], None).is_err());
    }

    #[test]
    fn single_square_tags_interior() {
        let curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        let map = vec![FaceData::road(7)];
        let arr = create_block(&curves, &map, None).unwrap();

        let faces = bounded_faces(&arr);
        assert_eq!(faces.len(), 1);
        assert_eq!(arr.faces[faces[0]].data.usage, Usage::Road);
        assert_eq!(arr.faces[faces[0]].data.feature, Some(7));
        assert_eq!(arr.faces[arr.unbounded].data.usage, Usage::Empty);
        assert_eq!(arr.faces[arr.unbounded].holes.len(), 1);
    }

    #[test]
    fn unbounded_seed_tags_outside() {
        let curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0, 1]);
        let map = vec![FaceData::road(7), FaceData::out_of_bounds()];
        let arr = create_block(&curves, &map, Some(1)).unwrap();

        assert_eq!(arr.faces[arr.unbounded].data.usage, Usage::OutOfBounds);
        let faces = bounded_faces(&arr);
        assert_eq!(faces.len(), 1);
        // Inside, both keys toggle: 1 goes off, 0 comes on.
        assert_eq!(arr.faces[faces[0]].data.usage, Usage::Road);
    }

    #[test]
    fn even_odd_hole_reverts_to_empty() {
        let mut curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        curves.extend(ring_curves(&square(3.0, 3.0, 4.0), vec![0]));
        let map = vec![FaceData::road(7)];
        let arr = create_block(&curves, &map, None).unwrap();

        let faces = bounded_faces(&arr);
        assert_eq!(faces.len(), 2);
        let mut usages: Vec<Usage> = faces.iter().map(|&f| arr.faces[f].data.usage).collect();
        usages.sort_by_key(|u| *u == Usage::Road);
        assert_eq!(usages, vec![Usage::Empty, Usage::Road]);

        // The ring face carries the hole cycle.
        let ring_face = faces
            .iter()
            .find(|&&f| arr.faces[f].data.usage == Usage::Road)
            .copied()
            .unwrap();
        assert_eq!(arr.faces[ring_face].holes.len(), 1);
    }

    #[test]
    fn overlapping_squares_highest_key_wins() {
        let mut curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        curves.extend(ring_curves(&square(5.0, 5.0, 10.0), vec![1]));
        let map = vec![FaceData::road(1), FaceData::road(2)];
        let arr = create_block(&curves, &map, None).unwrap();

        let faces = bounded_faces(&arr);
        assert_eq!(faces.len(), 3);
        // The overlap face toggles both keys; key 1 shadows key 0.
        let overlap = faces
            .iter()
            .find(|&&f| {
                let pts = arr.cycle_points(arr.faces[f].outer.unwrap());
                pts.iter().all(|p| {
                    p.x > 5.0 - 1e-6 && p.x < 10.0 + 1e-6 && p.y > 5.0 - 1e-6 && p.y < 10.0 + 1e-6
                })
            })
            .copied()
            .unwrap();
        assert_eq!(arr.faces[overlap].data.feature, Some(2));
    }

    #[test]
    fn crossing_segments_split_at_intersection() {
        let curves = vec![
            Curve::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), vec![]),
            Curve::new(Point2::new(5.0, -5.0), Point2::new(5.0, 5.0), vec![]),
        ];
        let arr = create_block(&curves, &[], None).unwrap();
        assert_eq!(arr.vertices.len(), 5);
        assert_eq!(arr.halfedges.len(), 8);
    }

    #[test]
    fn coincident_curves_union_keys() {
        let curves = vec![
            Curve::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), vec![0]),
            Curve::new(Point2::new(10.0, 0.0), Point2::new(0.0, 0.0), vec![1]),
        ];
        let arr = create_block(&curves, &[], None).unwrap();
        assert_eq!(arr.halfedges.len(), 2);
        let (_, he) = arr.halfedges.iter().next().unwrap();
        assert_eq!(he.keys, vec![0, 1]);
    }

    #[test]
    fn t_junction_splits_the_through_curve() {
        let curves = vec![
            Curve::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), vec![]),
            Curve::new(Point2::new(5.0, 0.0), Point2::new(5.0, 5.0), vec![]),
        ];
        let arr = create_block(&curves, &[], None).unwrap();
        assert_eq!(arr.vertices.len(), 4);
        assert_eq!(arr.halfedges.len(), 6);
    }

    #[test]
    fn nested_squares_hole_attaches_to_ring_face() {
        let mut curves = ring_curves(&square(0.0, 0.0, 20.0), vec![0]);
        curves.extend(ring_curves(&square(5.0, 5.0, 4.0), vec![1]));
        let map = vec![FaceData::road(1), FaceData::road(2)];
        let arr = create_block(&curves, &map, None).unwrap();

        let faces = bounded_faces(&arr);
        assert_eq!(faces.len(), 2);
        let outer_face = faces
            .iter()
            .find(|&&f| arr.faces[f].data.feature == Some(1))
            .copied()
            .unwrap();
        assert_eq!(arr.faces[outer_face].holes.len(), 1);
        let inner_face = faces
            .iter()
            .find(|&&f| arr.faces[f].data.feature == Some(2))
            .copied()
            .unwrap();
        assert!(arr.faces[inner_face].holes.is_empty());
    }
}
