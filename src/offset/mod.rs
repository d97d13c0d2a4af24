//! Road-edge offset construction.
//!
//! Every boundary edge owns a shallow offset quad (the road shoulder)
//! and, when an edge rule applies, a deep quad behind it. Corners are
//! classified per vertex: continuous corners join the two offsets at a
//! line intersection, reflex corners cap each side with extended rays so
//! the overlapping quads cover the wedge, and discontinuous corners
//! leave the offsets unjoined and fill the gap with a small road-end
//! bridge face. A final pass forces a discontinuity whenever the turn
//! accumulated across continuous corners reaches a half revolution, so
//! the offset of a long shallow arc cannot wrap back over itself.

use std::f64::consts::PI;

use tracing::trace;

use crate::arrangement::{Curve, FaceData, FeatureFamily, Usage};
use crate::block::Block;
use crate::boundary::BoundaryVertex;
use crate::math::intersect_2d::{line_line_intersect, point_at};
use crate::math::{cross2, left_normal, Point2, Vector2};
use crate::rules::EdgeRules;

/// Placeholder key for the out-of-bounds side of core boundary curves.
/// The pipeline replaces it with the ring's real out-of-bounds index.
pub const OOB_KEY: usize = usize::MAX;

/// Reflex corners with a dot product above this are shallow enough to
/// join by intersection instead of ray extension.
const SHALLOW_REFLEX_DOT: f64 = 0.9;

/// Curves shorter than this are dropped instead of emitted.
const MIN_CURVE_MTR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    /// Offsets joined at a shared point.
    Continuous,
    /// Interior turn past 180 degrees; sides capped with extended rays.
    Reflex,
    /// Locked vertex, road change, or forced break; sides independent.
    Discontinuous,
}

/// Resolved offset geometry at one vertex.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CornerJoin {
    pub corner: Corner,
    /// End point of the incoming edge's offset.
    pub prev_end: Point2,
    /// Start point of the outgoing edge's offset.
    pub next_start: Point2,
}

/// Offset curves plus the face data their local keys refer to.
#[derive(Debug, Default)]
pub struct OffsetOutput {
    pub curves: Vec<Curve>,
    pub features: Vec<FaceData>,
}

struct EdgeGeom {
    dir: Vector2,
    width: f64,
    /// Shallow offset endpoints before corner joining.
    off0: Point2,
    off1: Point2,
}

/// Builds offset curves for one boundary ring.
///
/// Output keys are local (0-based into `features`) except [`OOB_KEY`];
/// the caller rebases them into the block-wide feature map.
pub fn build_offsets(
    block: &Block,
    verts: &[BoundaryVertex],
    edge_rules: &dyn EdgeRules,
) -> OffsetOutput {
    let n = verts.len();
    let mut out = OffsetOutput::default();
    if n < 2 {
        return out;
    }

    let edges: Vec<EdgeGeom> = (0..n)
        .map(|i| {
            let a = verts[i].loc;
            let b = verts[(i + 1) % n].loc;
            let dir = (b - a).try_normalize(1e-12).unwrap_or_else(|| Vector2::new(1.0, 0.0));
            let width = verts[i].road.map_or(1.0, |r| r.width.max(1.0));
            let shift = left_normal(dir) * width;
            EdgeGeom {
                dir,
                width,
                off0: a + shift,
                off1: b + shift,
            }
        })
        .collect();

    let mut corners = classify_corners(verts);
    force_turn_breaks(verts, &edges, &mut corners);
    let joins = compute_joins(verts, &edges, &corners);

    // Per-edge road tags, so the cleaner can fuse same-type shoulder
    // quads while road-type changes stay segmented.
    let road_tags: Vec<usize> = (0..n)
        .map(|i| {
            let feature = verts[i].road.map(|r| r.road_type).unwrap_or(0);
            alloc(
                &mut out.features,
                FaceData {
                    usage: Usage::Road,
                    feature: Some(feature),
                    family: FeatureFamily::General,
                    major_axis: None,
                    height: block.height,
                    group: 0,
                },
            )
        })
        .collect();

    for i in 0..n {
        let j = (i + 1) % n;
        let v0 = verts[i].loc;
        let v1 = verts[j].loc;
        let start = joins[i].next_start;
        let end = joins[j].prev_end;
        let t = road_tags[i];

        // Core curve: out-of-bounds beyond it, unless both sides of the
        // edge face block interior (antenna).
        let core_keys = if verts[i].antenna {
            vec![t]
        } else {
            vec![OOB_KEY, t]
        };
        push_curve(&mut out.curves, v0, v1, core_keys);
        push_curve(&mut out.curves, v1, end, vec![t]);
        push_curve(&mut out.curves, end, start, vec![t]);
        push_curve(&mut out.curves, start, v0, vec![t]);

        if let (Some(road), false) = (verts[i].road, verts[i].antenna) {
            if let Some(rule) =
                edge_rules.edge_rule_for(road.road_type, block.zoning, block.variant, block.height)
            {
                let shift = left_normal(edges[i].dir) * rule.width;
                let deep = alloc(
                    &mut out.features,
                    FaceData {
                        usage: Usage::PolygonalFeature,
                        feature: Some(rule.resource_id),
                        family: FeatureFamily::General,
                        major_axis: Some(edges[i].dir),
                        height: block.height,
                        group: i as u32 + 1,
                    },
                );
                let d0 = start + shift;
                let d1 = end + shift;
                push_curve(&mut out.curves, start, end, vec![deep]);
                push_curve(&mut out.curves, end, d1, vec![deep]);
                push_curve(&mut out.curves, d1, d0, vec![deep]);
                push_curve(&mut out.curves, d0, start, vec![deep]);
            }
        }
    }

    // Road-end bridges across discontinuous corners.
    for j in 0..n {
        if joins[j].corner != Corner::Discontinuous {
            continue;
        }
        let gap = joins[j].next_start - joins[j].prev_end;
        if gap.norm() < MIN_CURVE_MTR {
            continue;
        }
        let feature = verts[j].road.or(verts[(j + n - 1) % n].road);
        let bridge = alloc(
            &mut out.features,
            FaceData {
                usage: Usage::RoadEnd,
                feature: feature.map(|r| r.road_type),
                family: FeatureFamily::General,
                major_axis: None,
                height: block.height,
                group: j as u32 + 1,
            },
        );
        let v = verts[j].loc;
        push_curve(&mut out.curves, v, joins[j].prev_end, vec![bridge]);
        push_curve(&mut out.curves, joins[j].prev_end, joins[j].next_start, vec![bridge]);
        push_curve(&mut out.curves, joins[j].next_start, v, vec![bridge]);
    }

    trace!(curves = out.curves.len(), features = out.features.len(), "offsets built");
    out
}

fn alloc(features: &mut Vec<FaceData>, data: FaceData) -> usize {
    features.push(data);
    features.len() - 1
}

fn push_curve(curves: &mut Vec<Curve>, a: Point2, b: Point2, keys: Vec<usize>) {
    if (b - a).norm() >= MIN_CURVE_MTR {
        curves.push(Curve::new(a, b, keys));
    }
}

/// First classification pass, before turn accumulation.
fn classify_corners(verts: &[BoundaryVertex]) -> Vec<Corner> {
    let n = verts.len();
    (0..n)
        .map(|j| {
            let i = (j + n - 1) % n;
            let road_break = match (verts[i].road, verts[j].road) {
                (None, None) => false,
                (Some(a), Some(b)) => !a.matches(&b),
                _ => true,
            };
            if verts[j].locked || road_break {
                Corner::Discontinuous
            } else if (verts[j].reflex || verts[j].dot < 0.0)
                && verts[j].dot <= SHALLOW_REFLEX_DOT
            {
                Corner::Reflex
            } else {
                Corner::Continuous
            }
        })
        .collect()
}

/// Forces a discontinuity wherever the signed turn accumulated across a
/// run of continuous corners reaches half a revolution.
fn force_turn_breaks(verts: &[BoundaryVertex], edges: &[EdgeGeom], corners: &mut [Corner]) {
    let n = verts.len();
    let start = corners
        .iter()
        .position(|&c| c != Corner::Continuous)
        .unwrap_or(0);
    let mut acc = 0.0;
    for k in 0..n {
        let j = (start + k) % n;
        if corners[j] != Corner::Continuous {
            acc = 0.0;
            continue;
        }
        let i = (j + n - 1) % n;
        let turn = cross2(edges[i].dir, edges[j].dir).atan2(edges[i].dir.dot(&edges[j].dir));
        acc += turn;
        if acc.abs() >= PI {
            corners[j] = Corner::Discontinuous;
            acc = 0.0;
        }
    }
}

/// Resolves the offset join geometry at every vertex.
pub(crate) fn compute_joins(
    verts: &[BoundaryVertex],
    edges: &[EdgeGeom],
    corners: &[Corner],
) -> Vec<CornerJoin> {
    let n = verts.len();
    let mut joins: Vec<CornerJoin> = (0..n)
        .map(|j| {
            let i = (j + n - 1) % n;
            CornerJoin {
                corner: corners[j],
                prev_end: edges[i].off1,
                next_start: edges[j].off0,
            }
        })
        .collect();

    for j in 0..n {
        let i = (j + n - 1) % n;
        match joins[j].corner {
            Corner::Discontinuous => {}
            Corner::Reflex => {
                // Extend each side past the corner by the other side's
                // width; the overlapping quads cover the wedge.
                joins[j].prev_end = edges[i].off1 + edges[i].dir * edges[j].width;
                joins[j].next_start = edges[j].off0 - edges[j].dir * edges[i].width;
            }
            Corner::Continuous => {
                let p = match line_line_intersect(edges[i].off0, edges[i].dir, edges[j].off0, edges[j].dir)
                {
                    Some((t, _)) => point_at(edges[i].off0, edges[i].dir, t),
                    // Parallel offsets: meet halfway.
                    None => Point2::from((edges[i].off1.coords + edges[j].off0.coords) * 0.5),
                };
                // A join behind either edge's offset start means the
                // offset segment reversed; break instead of crossing.
                let rev_in = edges[i].dir.dot(&(p - edges[i].off0)) < 0.0;
                let rev_out = edges[j].dir.dot(&(edges[j].off1 - p)) < 0.0;
                if rev_in || rev_out {
                    joins[j].corner = Corner::Discontinuous;
                } else {
                    joins[j].prev_end = p;
                    joins[j].next_start = p;
                }
            }
        }
    }
    joins
}
