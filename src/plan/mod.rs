//! Major-axis region planning.
//!
//! Picks the dominant road edge as an axis, re-projects the boundary
//! into (axis, depth) coordinates, scans the top and bottom chains for
//! maximal intervals of constant behavior against three reference
//! depths, classifies and consolidates the resulting regions, and lays
//! facade spellings and AGB blocks into a candy-bar grid whose emitted
//! curves feed the arrangement.

pub mod candy_bar;
pub mod region;

use tracing::debug;

use crate::arrangement::{Curve, FaceData, FeatureFamily, Usage};
use crate::block::{Block, RoadSpec};
use crate::boundary::BoundaryVertex;
use crate::error::{Result, RuleError};
use crate::math::{cross2, left_normal, Point2, Vector2};
use crate::rules::{FacadeRules, FillRule};

use candy_bar::CandyBarGrid;
use region::{Region, RegionBand, RegionClass};

/// Tuning knobs for the planner scan.
#[derive(Debug, Clone, Copy)]
pub struct PlanParams {
    /// Chain slope (depth change per axis meter) above which an interval
    /// is side-facing slop.
    pub steep_slope: f64,
    /// Sides whose projected width is below this snap to exactly vertical.
    pub vertical_snap: f64,
    /// Grid runs shorter than this are dropped at emission.
    pub small_cut: f64,
}

impl Default for PlanParams {
    fn default() -> Self {
        Self {
            steep_slope: 1.5,
            vertical_snap: 0.5,
            small_cut: 0.1,
        }
    }
}

/// Planner result: curves for the arrangement plus the face data each
/// local curve key refers to.
#[derive(Debug, Default)]
pub struct PlanOutput {
    pub curves: Vec<Curve>,
    pub features: Vec<FaceData>,
}

/// One chain point in axis coordinates. `road` annotates the segment
/// toward the next (higher-axis) point.
#[derive(Debug, Clone, Copy)]
struct ChainPt {
    a: f64,
    b: f64,
    road: Option<RoadSpec>,
}

/// A boundary chain, monotone non-decreasing in `a`.
struct Chain {
    pts: Vec<ChainPt>,
}

impl Chain {
    fn monotone(&self) -> bool {
        self.pts.windows(2).all(|w| w[1].a >= w[0].a - 1e-9)
    }

    /// Depth, slope, and road at axis position `a`.
    fn sample(&self, a: f64) -> (f64, f64, Option<RoadSpec>) {
        if let Some(first) = self.pts.first() {
            if a <= first.a {
                return (first.b, 0.0, first.road);
            }
        }
        for w in self.pts.windows(2) {
            let da = w[1].a - w[0].a;
            if a <= w[1].a && da > 1e-12 {
                let t = (a - w[0].a) / da;
                let b = w[0].b + t * (w[1].b - w[0].b);
                return (b, ((w[1].b - w[0].b) / da).abs(), w[0].road);
            }
        }
        match self.pts.last() {
            Some(last) => (last.b, 0.0, last.road),
            None => (0.0, 0.0, None),
        }
    }

    /// Axis positions where the chain crosses a reference depth.
    fn crossings(&self, level: f64, out: &mut Vec<f64>) {
        for w in self.pts.windows(2) {
            let da = w[1].a - w[0].a;
            if da <= 1e-12 {
                continue;
            }
            if (w[0].b < level) != (w[1].b < level) {
                let t = (level - w[0].b) / (w[1].b - w[0].b);
                out.push(w[0].a + t * da);
            }
        }
    }
}

/// Plans facade and AGB regions for a block without holes.
///
/// # Errors
///
/// Returns [`RuleError::FillFailure`] when the boundary is not monotone
/// against the chosen axis, and [`RuleError::NoSpelling`] when the
/// facade oracle has no layout for a required width. Both are treated by
/// the pipeline as "fall back to plain road offsetting".
pub fn plan_regions(
    block: &Block,
    verts: &[BoundaryVertex],
    rule: &FillRule,
    facades: &dyn FacadeRules,
    params: &PlanParams,
) -> Result<PlanOutput> {
    let n = verts.len();
    if n < 3 {
        return Err(RuleError::FillFailure("boundary too small".into()).into());
    }

    let (origin, dir) = pick_axis(verts);

    // Project into (axis, depth), snapping near-vertical sides.
    let mut proj: Vec<(f64, f64)> = verts
        .iter()
        .map(|v| {
            let rel = v.loc - origin;
            (rel.dot(&dir), cross2(dir, rel))
        })
        .collect();
    for i in 0..n {
        let j = (i + 1) % n;
        if (proj[j].0 - proj[i].0).abs() < params.vertical_snap {
            proj[j].0 = proj[i].0;
        }
    }

    let (bottom, top) = split_chains(verts, &proj);
    if !bottom.monotone() || !top.monotone() {
        return Err(RuleError::FillFailure("boundary not axis-monotone".into()).into());
    }

    let a_min = proj.iter().map(|p| p.0).fold(f64::MAX, f64::min);
    let a_max = proj.iter().map(|p| p.0).fold(f64::MIN, f64::max);
    let b_min = proj.iter().map(|p| p.1).fold(f64::MAX, f64::min);
    let b_max = proj.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    if a_max - a_min < 1e-6 || b_max - b_min < 1e-6 {
        return Err(RuleError::FillFailure("degenerate projection".into()).into());
    }

    let mid = 0.5 * (b_min + b_max);
    let safe_lo = mid - 0.5 * rule.agb_slop_depth;
    let safe_hi = mid + 0.5 * rule.agb_slop_depth;

    // Event positions: chain vertices plus reference-line crossings.
    let mut events: Vec<f64> = bottom.pts.iter().chain(top.pts.iter()).map(|p| p.a).collect();
    for level in [mid, safe_lo, safe_hi] {
        bottom.crossings(level, &mut events);
        top.crossings(level, &mut events);
    }
    events.push(a_min);
    events.push(a_max);
    events.sort_by(f64::total_cmp);
    events.dedup_by(|a, b| (*a - *b).abs() < 1e-6);

    let mut regions = classify_intervals(
        &events, &bottom, &top, rule, params, safe_lo, safe_hi,
    );
    region::consolidate(&mut regions, rule, params.steep_slope);
    debug!(regions = regions.len(), "planned regions");

    emit(block, rule, facades, params, &regions, origin, dir, a_min, a_max, b_min, b_max, mid)
}

/// Longest grounded-road edge with non-reflex endpoints; fallback
/// longest edge of any kind.
fn pick_axis(verts: &[BoundaryVertex]) -> (Point2, Vector2) {
    let n = verts.len();
    let len = |i: usize| (verts[(i + 1) % n].loc - verts[i].loc).norm();
    let best = (0..n)
        .filter(|&i| {
            verts[i].road.is_some_and(|r| r.grounded)
                && !verts[i].reflex
                && !verts[(i + 1) % n].reflex
        })
        .max_by(|&a, &b| len(a).total_cmp(&len(b)))
        .or_else(|| (0..n).max_by(|&a, &b| len(a).total_cmp(&len(b))));
    let i = best.unwrap_or(0);
    let d = verts[(i + 1) % n].loc - verts[i].loc;
    let dir = d.try_normalize(1e-12).unwrap_or_else(|| Vector2::new(1.0, 0.0));
    (verts[i].loc, dir)
}

/// Splits the projected ring into its bottom (axis-side) and top chains,
/// both ascending in `a`.
fn split_chains(verts: &[BoundaryVertex], proj: &[(f64, f64)]) -> (Chain, Chain) {
    let n = verts.len();
    let imin = (0..n)
        .min_by(|&x, &y| proj[x].0.total_cmp(&proj[y].0))
        .unwrap_or(0);
    let imax = (0..n)
        .max_by(|&x, &y| proj[x].0.total_cmp(&proj[y].0))
        .unwrap_or(0);

    // Counter-clockwise ring: the walk min -> max runs along the road
    // side; the rest is the top chain, reversed to ascend.
    let mut bottom = Vec::new();
    let mut i = imin;
    loop {
        bottom.push(ChainPt {
            a: proj[i].0,
            b: proj[i].1,
            road: verts[i].road,
        });
        if i == imax {
            break;
        }
        i = (i + 1) % n;
    }

    let mut walk = Vec::new();
    let mut i = imax;
    loop {
        walk.push(i);
        if i == imin {
            break;
        }
        i = (i + 1) % n;
    }
    let top: Vec<ChainPt> = walk
        .iter()
        .rev()
        .enumerate()
        .map(|(j, &v)| {
            // The ring edge between ascending neighbors j and j+1 was
            // walked from the higher-a vertex, which carries its road.
            let road_src = if j + 1 < walk.len() {
                walk[walk.len() - 2 - j]
            } else {
                v
            };
            ChainPt {
                a: proj[v].0,
                b: proj[v].1,
                road: verts[road_src].road,
            }
        })
        .collect();

    (Chain { pts: bottom }, Chain { pts: top })
}

#[allow(clippy::too_many_arguments)]
fn classify_intervals(
    events: &[f64],
    bottom: &Chain,
    top: &Chain,
    rule: &FillRule,
    params: &PlanParams,
    safe_lo: f64,
    safe_hi: f64,
) -> Vec<Region> {
    let mut regions: Vec<Region> = Vec::new();
    for w in events.windows(2) {
        let (a0, a1) = (w[0], w[1]);
        if a1 - a0 < 1e-6 {
            continue;
        }
        let am = 0.5 * (a0 + a1);
        let (b_bot, slope_bot, road) = bottom.sample(am);
        let (b_top, slope_top, _) = top.sample(am);
        let depth = b_top - b_bot;
        let slope = slope_bot.max(slope_top);
        let grounded = road.is_some_and(|r| r.grounded);

        let class = if !grounded {
            RegionClass::None
        } else if slope > params.steep_slope {
            RegionClass::Slop
        } else if rule.agb_id.is_some() && b_bot <= safe_lo + 1e-9 && b_top >= safe_hi - 1e-9 {
            RegionClass::Agb
        } else if depth >= rule.fac_min_depth {
            RegionClass::Facade
        } else {
            RegionClass::Junk
        };

        let d0 = top.sample(a0 + 1e-6).0 - bottom.sample(a0 + 1e-6).0;
        let d1 = top.sample(a1 - 1e-6).0 - bottom.sample(a1 - 1e-6).0;
        let block_dir = if d1 - d0 > 0.1 {
            1
        } else if d0 - d1 > 0.1 {
            -1
        } else {
            0
        };

        match regions.last_mut() {
            Some(last) if last.class == class => {
                last.a1 = a1;
                last.depth = last.depth.min(depth);
                last.slope = last.slope.max(slope);
                last.slope_bottom = last.slope_bottom.max(slope_bot);
                last.slope_top = last.slope_top.max(slope_top);
            }
            _ => regions.push(Region {
                class,
                band: RegionBand::Full,
                a0,
                a1,
                depth,
                slope,
                slope_bottom: slope_bot,
                slope_top,
                block_dir,
            }),
        }
    }
    regions
}

#[allow(clippy::too_many_arguments)]
fn emit(
    block: &Block,
    rule: &FillRule,
    facades: &dyn FacadeRules,
    params: &PlanParams,
    regions: &[Region],
    origin: Point2,
    dir: Vector2,
    a_min: f64,
    a_max: f64,
    b_min: f64,
    b_max: f64,
    mid: f64,
) -> Result<PlanOutput> {
    let mut out = PlanOutput::default();
    if regions.is_empty() {
        return Ok(out);
    }

    let mut grid = CandyBarGrid::new(a_min, a_max, vec![b_min, mid, b_max], params.small_cut);
    let normal = left_normal(dir);
    let mut alloc =
        |features: &mut Vec<FaceData>, usage: Usage, feature: Option<u32>, family: FeatureFamily| {
            let tag = features.len();
            features.push(FaceData {
                usage,
                feature,
                family,
                major_axis: Some(dir),
                height: block.height,
                group: tag as u32,
            });
            tag
        };
    // Grid rows covered by each band: row 0 is the road-side half.
    let rows = |band: RegionBand| match band {
        RegionBand::Full => (0, 2),
        RegionBand::Bottom => (0, 1),
        RegionBand::Top => (1, 2),
    };

    for r in regions {
        let (row0, row1) = rows(r.band);
        match r.class {
            RegionClass::Agb => {
                let Some(agb) = rule.agb_id else { continue };
                let tag = alloc(
                    &mut out.features,
                    Usage::PolygonalFeature,
                    Some(agb),
                    FeatureFamily::BoxLot,
                );
                grid.insert_block(tag, row0, row1, r.a0, r.a1);
            }
            RegionClass::Facade => {
                if rule.fac_id.is_none() {
                    continue;
                }
                let width = r.width();
                let spelling = facades
                    .facade_rule_for(block.zoning, block.variant, width, block.height, r.depth)
                    .ok_or(RuleError::NoSpelling { width })?;
                let total = spelling.total_width();
                if total <= 1e-9 {
                    return Err(RuleError::NoSpelling { width }.into());
                }
                let scale = width / total;
                let mut cursor = r.a0;
                for (k, seg) in spelling.segments.iter().enumerate() {
                    let end = if k + 1 == spelling.segments.len() {
                        r.a1
                    } else {
                        cursor + seg.width * scale
                    };
                    match r.band {
                        RegionBand::Full if rule.fac_depth_split > 0 => {
                            let tag = alloc(
                                &mut out.features,
                                Usage::PolygonalFeature,
                                Some(seg.fac_id_front),
                                FeatureFamily::General,
                            );
                            grid.insert_block(tag, 0, 1, cursor, end);
                            if let Some((id, family)) = back_row(seg.fac_id_back, rule) {
                                let back = alloc(
                                    &mut out.features,
                                    Usage::PolygonalFeature,
                                    Some(id),
                                    family,
                                );
                                grid.insert_block(back, 1, 2, cursor, end);
                            }
                        }
                        RegionBand::Full | RegionBand::Bottom => {
                            let tag = alloc(
                                &mut out.features,
                                Usage::PolygonalFeature,
                                Some(seg.fac_id_front),
                                FeatureFamily::General,
                            );
                            grid.insert_block(tag, row0, row1, cursor, end);
                        }
                        RegionBand::Top => {
                            if let Some((id, family)) = back_row(seg.fac_id_back, rule) {
                                let back = alloc(
                                    &mut out.features,
                                    Usage::PolygonalFeature,
                                    Some(id),
                                    family,
                                );
                                grid.insert_block(back, 1, 2, cursor, end);
                            }
                        }
                    }
                    cursor = end;
                }
            }
            // A steep row of a split region keeps a tagged face so the
            // extractor knows the area is spoken for.
            RegionClass::Slop if r.band != RegionBand::Full => {
                let tag = alloc(&mut out.features, Usage::Steep, None, FeatureFamily::General);
                grid.insert_block(tag, row0, row1, r.a0, r.a1);
            }
            _ => {}
        }
    }

    for seg in grid.emit_curves() {
        let world = |p: Point2| origin + dir * p.x + normal * p.y;
        out.curves
            .push(Curve::new(world(seg.from), world(seg.to), seg.keys()));
    }
    Ok(out)
}

/// Back-row feature for a split facade segment: the segment's own back
/// facade when it names one, else the rule's autogen string.
fn back_row(fac_id_back: u32, rule: &FillRule) -> Option<(u32, FeatureFamily)> {
    if fac_id_back != 0 {
        Some((fac_id_back, FeatureFamily::General))
    } else {
        rule.ags_id.map(|ags| (ags, FeatureFamily::StringLine))
    }
}
