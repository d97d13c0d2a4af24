//! Placement extraction from the tagged subdivision.
//!
//! Each non-empty, non-road, non-out-of-bounds face becomes output
//! geometry in the caller's coordinate frame: polygon-with-holes
//! placements for general features, open/closed polylines for string
//! features (split where the boundary stops hugging a grounded road),
//! anchored 4-corner boxes for box features, and merged ring sets for
//! forest, re-partitioned per face when the merge would overflow the
//! hole limit or the area threshold.

use tracing::warn;

use crate::arrangement::{Arrangement, FaceId, FeatureFamily, HalfedgeId, Usage};
use crate::math::polygon_2d::signed_area;
use crate::math::{left_normal, Frame, Point2, Vector2};
use crate::rules::{TerrainClass, TerrainClassifier};

/// Most hole rings a single placement may carry.
pub const MAX_HOLE_RINGS: usize = 255;

/// Extraction tuning.
#[derive(Debug, Clone, Copy)]
pub struct ExtractParams {
    /// Clearance split between two boxes sharing a side.
    pub box_gap: f64,
    /// Forest merges larger than this are emitted per face instead.
    pub forest_area_max: f64,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            box_gap: 2.0,
            forest_area_max: 250_000.0,
        }
    }
}

/// A polygon-with-holes placement.
#[derive(Debug, Clone)]
pub struct PolygonPlacement {
    pub feature: u32,
    pub height: f64,
    pub outer: Vec<Point2>,
    pub holes: Vec<Vec<Point2>>,
}

/// An open or closed polyline placement.
#[derive(Debug, Clone)]
pub struct StringPlacement {
    pub feature: u32,
    pub closed: bool,
    /// Whether this run hugs a grounded road (useful) or mere boundary.
    pub against_road: bool,
    pub points: Vec<Point2>,
}

/// A forest ring set with its sampled terrain class.
#[derive(Debug, Clone)]
pub struct ForestPlacement {
    pub terrain: TerrainClass,
    pub outers: Vec<Vec<Point2>>,
    pub holes: Vec<Vec<Point2>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractStats {
    /// Placements dropped for exceeding [`MAX_HOLE_RINGS`].
    pub skipped_hole_overflow: usize,
    /// Number of forest placements emitted.
    pub forest_parts: usize,
}

/// Everything one block produces.
#[derive(Debug, Default)]
pub struct Extraction {
    pub polygons: Vec<PolygonPlacement>,
    pub strings: Vec<StringPlacement>,
    pub forests: Vec<ForestPlacement>,
    pub stats: ExtractStats,
}

/// Walks every tagged face and emits placements.
#[must_use]
pub fn extract_features(
    arr: &Arrangement,
    frame: &Frame,
    terrain: &dyn TerrainClassifier,
    params: &ExtractParams,
) -> Extraction {
    let mut out = Extraction::default();
    // Forest faces in local coordinates, merged after the face loop.
    let mut forest: Vec<(Vec<Point2>, Vec<Vec<Point2>>, f64)> = Vec::new();

    for (fid, face) in &arr.faces {
        if fid == arr.unbounded {
            continue;
        }
        let Some(rep) = face.outer else { continue };

        match face.data.usage {
            Usage::Forest => {
                let outer = arr.cycle_points(rep);
                let holes: Vec<Vec<Point2>> =
                    face.holes.iter().map(|&h| arr.cycle_points(h)).collect();
                let area = signed_area(&outer);
                forest.push((outer, holes, area));
            }
            Usage::PolygonalFeature | Usage::PointFeature => match face.data.family {
                FeatureFamily::StringLine => extract_strings(arr, fid, frame, &mut out),
                FeatureFamily::BoxLot => extract_box(arr, fid, frame, params, &mut out),
                FeatureFamily::General => extract_polygon(arr, fid, frame, &mut out),
            },
            _ => {}
        }
    }

    emit_forest(&forest, frame, terrain, params, &mut out);
    out
}

fn to_caller(frame: &Frame, pts: &[Point2]) -> Vec<Point2> {
    pts.iter().map(|&p| frame.reverse(p)).collect()
}

fn extract_polygon(arr: &Arrangement, fid: FaceId, frame: &Frame, out: &mut Extraction) {
    let face = &arr.faces[fid];
    let Some(feature) = face.data.feature else {
        return;
    };
    let Some(rep) = face.outer else { return };
    if face.holes.len() > MAX_HOLE_RINGS {
        warn!(
            holes = face.holes.len(),
            feature, "placement exceeds hole limit, skipped"
        );
        out.stats.skipped_hole_overflow += 1;
        return;
    }
    out.polygons.push(PolygonPlacement {
        feature,
        height: face.data.height,
        outer: to_caller(frame, &arr.cycle_points(rep)),
        holes: face
            .holes
            .iter()
            .map(|&h| to_caller(frame, &arr.cycle_points(h)))
            .collect(),
    });
}

/// True when the edge's far side is road surface.
fn against_road(arr: &Arrangement, h: HalfedgeId) -> bool {
    let twin_face = arr.halfedges[arr.halfedges[h].twin].face;
    matches!(
        arr.faces[twin_face].data.usage,
        Usage::Road | Usage::RoadEnd
    )
}

/// Emits strings for a face's outer boundary and each of its hole
/// boundaries.
fn extract_strings(arr: &Arrangement, fid: FaceId, frame: &Frame, out: &mut Extraction) {
    let face = &arr.faces[fid];
    let Some(feature) = face.data.feature else {
        return;
    };
    let Some(rep) = face.outer else { return };

    string_runs(arr, rep, feature, frame, out);
    for &hole in &face.holes {
        string_runs(arr, hole, feature, frame, out);
    }
}

/// Splits one boundary cycle into maximal same-classification runs,
/// each emitted as one open polyline; a uniform ring emits one closed
/// string instead.
fn string_runs(
    arr: &Arrangement,
    rep: HalfedgeId,
    feature: u32,
    frame: &Frame,
    out: &mut Extraction,
) {
    let hs = arr.cycle(rep);
    let n = hs.len();
    let flags: Vec<bool> = hs.iter().map(|&h| against_road(arr, h)).collect();

    if flags.iter().all(|&f| f == flags[0]) {
        out.strings.push(StringPlacement {
            feature,
            closed: true,
            against_road: flags[0],
            points: to_caller(frame, &arr.cycle_points(rep)),
        });
        return;
    }

    // Start each walk at a classification change so runs never wrap.
    let start = (0..n)
        .find(|&i| flags[i] != flags[(i + n - 1) % n])
        .unwrap_or(0);
    let mut k = 0;
    while k < n {
        let i0 = (start + k) % n;
        let flag = flags[i0];
        let mut len = 1;
        while k + len < n && flags[(start + k + len) % n] == flag {
            len += 1;
        }
        let mut pts: Vec<Point2> = (0..len)
            .map(|d| {
                let h = hs[(start + k + d) % n];
                arr.vertices[arr.halfedges[h].origin].loc
            })
            .collect();
        let last = hs[(start + k + len - 1) % n];
        pts.push(arr.vertices[arr.halfedges[arr.halfedges[last].twin].origin].loc);
        out.strings.push(StringPlacement {
            feature,
            closed: false,
            against_road: flag,
            points: to_caller(frame, &pts),
        });
        k += len;
    }
}

/// Extracts a 4-corner box anchored on the boundary edge best aligned
/// with the face's major axis, preferring road-touching edges, shrinking
/// sides shared with another box by half the configured gap.
fn extract_box(
    arr: &Arrangement,
    fid: FaceId,
    frame: &Frame,
    params: &ExtractParams,
    out: &mut Extraction,
) {
    let face = &arr.faces[fid];
    let Some(feature) = face.data.feature else {
        return;
    };
    let Some(rep) = face.outer else { return };

    let hs = arr.cycle(rep);
    let axis = face.data.major_axis.unwrap_or_else(|| Vector2::new(1.0, 0.0));
    let edge_dir = |h: HalfedgeId| {
        let a = arr.vertices[arr.halfedges[h].origin].loc;
        let b = arr.vertices[arr.halfedges[arr.halfedges[h].twin].origin].loc;
        (b - a).try_normalize(1e-12).unwrap_or(axis)
    };
    let alignment = |h: HalfedgeId| edge_dir(h).dot(&axis).abs();

    let anchor = hs
        .iter()
        .copied()
        .filter(|&h| against_road(arr, h))
        .max_by(|&a, &b| alignment(a).total_cmp(&alignment(b)))
        .or_else(|| {
            hs.iter()
                .copied()
                .max_by(|&a, &b| alignment(a).total_cmp(&alignment(b)))
        });
    let Some(anchor) = anchor else { return };

    let u = edge_dir(anchor);
    let v = left_normal(u);
    let origin = arr.vertices[arr.halfedges[anchor].origin].loc;
    let pts = arr.cycle_points(rep);
    let mut u0 = f64::MAX;
    let mut u1 = f64::MIN;
    let mut v0 = f64::MAX;
    let mut v1 = f64::MIN;
    for p in &pts {
        let rel = p - origin;
        u0 = u0.min(rel.dot(&u));
        u1 = u1.max(rel.dot(&u));
        v0 = v0.min(rel.dot(&v));
        v1 = v1.max(rel.dot(&v));
    }

    // Shrink any side whose far side holds another box.
    let inset = params.box_gap * 0.5;
    let mut shrink = [false; 4]; // u0, u1, v0, v1
    for &h in &hs {
        let twin_face = arr.halfedges[arr.halfedges[h].twin].face;
        let other = &arr.faces[twin_face].data;
        if twin_face == fid
            || other.family != FeatureFamily::BoxLot
            || other.usage != Usage::PolygonalFeature
        {
            continue;
        }
        let a = arr.vertices[arr.halfedges[h].origin].loc;
        let b = arr.vertices[arr.halfedges[arr.halfedges[h].twin].origin].loc;
        let m = Point2::from((a.coords + b.coords) * 0.5) - origin;
        let (mu, mv) = (m.dot(&u), m.dot(&v));
        let d = [
            (mu - u0).abs(),
            (u1 - mu).abs(),
            (mv - v0).abs(),
            (v1 - mv).abs(),
        ];
        let side = (0..4).min_by(|&x, &y| d[x].total_cmp(&d[y])).unwrap_or(0);
        shrink[side] = true;
    }
    if shrink[0] && u1 - u0 > 2.0 * inset {
        u0 += inset;
    }
    if shrink[1] && u1 - u0 > 2.0 * inset {
        u1 -= inset;
    }
    if shrink[2] && v1 - v0 > 2.0 * inset {
        v0 += inset;
    }
    if shrink[3] && v1 - v0 > 2.0 * inset {
        v1 -= inset;
    }

    let corner = |cu: f64, cv: f64| origin + u * cu + v * cv;
    out.polygons.push(PolygonPlacement {
        feature,
        height: face.data.height,
        outer: to_caller(
            frame,
            &[corner(u0, v0), corner(u1, v0), corner(u1, v1), corner(u0, v1)],
        ),
        holes: Vec::new(),
    });
}

/// Merges forest faces into one placement, or one per face when the
/// combined hole count or area crosses the split thresholds. Samples
/// the terrain classifier per placement; out-of-bounds samples suppress
/// the placement.
fn emit_forest(
    faces: &[(Vec<Point2>, Vec<Vec<Point2>>, f64)],
    frame: &Frame,
    terrain: &dyn TerrainClassifier,
    params: &ExtractParams,
    out: &mut Extraction,
) {
    if faces.is_empty() {
        return;
    }
    let total_holes: usize = faces.iter().map(|f| f.1.len()).sum();
    let total_area: f64 = faces.iter().map(|f| f.2).sum();
    let split = total_holes > MAX_HOLE_RINGS || total_area > params.forest_area_max;

    let groups: Vec<&[(Vec<Point2>, Vec<Vec<Point2>>, f64)]> = if split {
        faces.chunks(1).collect()
    } else {
        vec![faces]
    };

    for group in groups {
        let Some(sample_ring) = group.first().map(|g| &g.0) else {
            continue;
        };
        let sample = frame.reverse(centroid(sample_ring));
        let class = terrain.classify(sample);
        if class == TerrainClass::OutOfBounds {
            continue;
        }
        let mut placement = ForestPlacement {
            terrain: class,
            outers: Vec::new(),
            holes: Vec::new(),
        };
        for (outer, holes, _) in group {
            placement.outers.push(to_caller(frame, outer));
            for h in holes {
                placement.holes.push(to_caller(frame, h));
            }
        }
        if placement.holes.len() > MAX_HOLE_RINGS {
            warn!(holes = placement.holes.len(), "forest part exceeds hole limit, skipped");
            out.stats.skipped_hole_overflow += 1;
            continue;
        }
        out.stats.forest_parts += 1;
        out.forests.push(placement);
    }
}

fn centroid(pts: &[Point2]) -> Point2 {
    if pts.is_empty() {
        return Point2::origin();
    }
    let sum = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / pts.len() as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arrangement::{create_block, Curve, FaceData};
    use crate::rules::ConstTerrain;

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

    fn general(feature: u32) -> FaceData {
        FaceData {
            usage: Usage::PolygonalFeature,
            feature: Some(feature),
            ..FaceData::default()
        }
    }

    fn extract(arr: &Arrangement) -> Extraction {
        extract_features(
            arr,
            &Frame::identity(),
            &ConstTerrain(TerrainClass::Forest),
            &ExtractParams::default(),
        )
    }

    #[test]
    fn polygon_with_hole_round_trips() {
        let mut curves = ring_curves(&square(0.0, 0.0, 20.0), vec![0]);
        curves.extend(ring_curves(&square(5.0, 5.0, 4.0), vec![0]));
        let arr = create_block(&curves, &[general(9)], None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.polygons.len(), 1);
        let p = &got.polygons[0];
        assert_eq!(p.feature, 9);
        assert_eq!(p.outer.len(), 4);
        assert_eq!(p.holes.len(), 1);
        assert_eq!(p.holes[0].len(), 4);
    }

    #[test]
    fn string_face_splits_at_road_boundary() {
        // Road quad left of a string face: the shared edge is the only
        // against-road run.
        let mut curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        curves.extend(ring_curves(&square(10.0, 0.0, 10.0), vec![1]));
        let map = vec![
            FaceData::road(1),
            FaceData {
                family: FeatureFamily::StringLine,
                ..general(5)
            },
        ];
        let arr = create_block(&curves, &map, None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.strings.len(), 2);
        let hugging: Vec<&StringPlacement> =
            got.strings.iter().filter(|s| s.against_road).collect();
        assert_eq!(hugging.len(), 1);
        assert!(!hugging[0].closed);
        assert_eq!(hugging[0].points.len(), 2);
        let free = got.strings.iter().find(|s| !s.against_road).unwrap();
        assert_eq!(free.points.len(), 4);
    }

    #[test]
    fn uniform_string_ring_stays_closed() {
        let curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        let map = vec![FaceData {
            family: FeatureFamily::StringLine,
            ..general(5)
        }];
        let arr = create_block(&curves, &map, None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.strings.len(), 1);
        assert!(got.strings[0].closed);
        assert!(!got.strings[0].against_road);
        assert_eq!(got.strings[0].points.len(), 4);
    }

    #[test]
    fn string_face_hole_emits_its_own_ring() {
        let mut curves = ring_curves(&square(0.0, 0.0, 20.0), vec![0]);
        curves.extend(ring_curves(&square(5.0, 5.0, 4.0), vec![0]));
        let map = vec![FaceData {
            family: FeatureFamily::StringLine,
            ..general(5)
        }];
        let arr = create_block(&curves, &map, None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.strings.len(), 2, "outer ring plus hole ring");
        assert!(got.strings.iter().all(|s| s.closed && !s.against_road));
        let inner = got
            .strings
            .iter()
            .find(|s| s.points.iter().all(|p| p.x > 4.0 && p.x < 10.0))
            .unwrap();
        assert_eq!(inner.points.len(), 4);
    }

    #[test]
    fn lone_box_fills_its_face() {
        let curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        let map = vec![FaceData {
            family: FeatureFamily::BoxLot,
            major_axis: Some(Vector2::new(1.0, 0.0)),
            ..general(7)
        }];
        let arr = create_block(&curves, &map, None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.polygons.len(), 1);
        let p = &got.polygons[0];
        assert_eq!(p.outer.len(), 4);
        let area = signed_area(&p.outer).abs();
        assert!((area - 100.0).abs() < 1e-6, "box covers the face: {area}");
    }

    #[test]
    fn adjacent_boxes_shrink_their_shared_side() {
        let mut curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        curves.extend(ring_curves(&square(10.0, 0.0, 10.0), vec![1]));
        let boxed = |f| FaceData {
            family: FeatureFamily::BoxLot,
            major_axis: Some(Vector2::new(1.0, 0.0)),
            ..general(f)
        };
        let arr = create_block(&curves, &[boxed(7), boxed(8)], None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.polygons.len(), 2);
        for p in &got.polygons {
            let area = signed_area(&p.outer).abs();
            assert!((area - 90.0).abs() < 1e-6, "one side shrank by 1: {area}");
        }
    }

    #[test]
    fn forest_faces_merge_into_one_placement() {
        let mut curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        curves.extend(ring_curves(&square(30.0, 0.0, 10.0), vec![1]));
        let forest = FaceData {
            usage: Usage::Forest,
            ..FaceData::default()
        };
        let arr = create_block(&curves, &[forest.clone(), forest], None).unwrap();

        let got = extract(&arr);
        assert_eq!(got.forests.len(), 1);
        assert_eq!(got.forests[0].outers.len(), 2);
        assert_eq!(got.forests[0].terrain, TerrainClass::Forest);
    }

    #[test]
    fn oversized_forest_splits_per_face() {
        let mut curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        curves.extend(ring_curves(&square(30.0, 0.0, 10.0), vec![1]));
        let forest = FaceData {
            usage: Usage::Forest,
            ..FaceData::default()
        };
        let arr = create_block(&curves, &[forest.clone(), forest], None).unwrap();

        let got = extract_features(
            &arr,
            &Frame::identity(),
            &ConstTerrain(TerrainClass::Forest),
            &ExtractParams {
                forest_area_max: 150.0,
                ..ExtractParams::default()
            },
        );
        assert_eq!(got.forests.len(), 2);
        assert_eq!(got.stats.forest_parts, 2);
    }

    #[test]
    fn out_of_bounds_terrain_suppresses_forest() {
        let curves = ring_curves(&square(0.0, 0.0, 10.0), vec![0]);
        let forest = FaceData {
            usage: Usage::Forest,
            ..FaceData::default()
        };
        let arr = create_block(&curves, &[forest], None).unwrap();

        let got = extract_features(
            &arr,
            &Frame::identity(),
            &ConstTerrain(TerrainClass::OutOfBounds),
            &ExtractParams::default(),
        );
        assert!(got.forests.is_empty());
    }
}
