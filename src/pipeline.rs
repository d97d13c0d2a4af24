//! End-to-end block processing.
//!
//! One invocation takes a block, consults the rule oracles, and returns
//! placements: boundaries are extracted and simplified, the region
//! planner lays facades and autogen blocks along the major axis (falling
//! back to plain road offsetting when no fill applies), road-edge
//! offsets are built per ring, everything is inserted into one planar
//! subdivision, faces are tagged and cleaned, leftover interior is
//! promoted to fill forest, and the tagged faces are extracted back into
//! the caller's frame.
//!
//! Blocks are independent; the engine keeps no state between calls, so
//! callers may process many blocks in parallel with one shared oracle
//! set.

use tracing::{debug, info_span};

use crate::arrangement::{self, clean::CleanStats, Curve, FaceData, FeatureFamily, Usage};
use crate::block::Block;
use crate::boundary::{extract_boundary, simplify_boundary, BoundaryVertex};
use crate::error::{LotfillError, Result};
use crate::extract::{extract_features, ExtractParams, Extraction};
use crate::math::polygon_2d::bounding_box;
use crate::math::{Frame, Point2, Vector2};
use crate::offset::{build_offsets, OOB_KEY};
use crate::plan::{plan_regions, PlanOutput, PlanParams};
use crate::rules::Oracles;

/// Engine tuning for one invocation.
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Boundary simplification error bound, meters.
    pub block_err: f64,
    pub plan: PlanParams,
    pub extract: ExtractParams,
    /// Feature ids the cleaner must keep segmented.
    pub keep_features: Vec<u32>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            block_err: 1.0,
            plan: PlanParams::default(),
            extract: ExtractParams::default(),
            keep_features: Vec::new(),
        }
    }
}

/// Per-block processing counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockStats {
    /// The region planner produced the interior layout.
    pub planned: bool,
    /// A fill rule existed but planning failed and the block fell back
    /// to plain road offsetting.
    pub fill_fallback: bool,
    pub curves_inserted: usize,
    pub clean: CleanStats,
}

/// Placements plus counters for one block.
#[derive(Debug)]
pub struct BlockOutput {
    pub placements: Extraction,
    pub stats: BlockStats,
}

/// Builds the local metric frame for a block: anchored at the outer
/// ring's bounding-box minimum with the given per-axis scale.
///
/// # Errors
///
/// Returns [`InputError::InvalidBlock`] for an empty outer ring.
///
/// [`InputError::InvalidBlock`]: crate::error::InputError::InvalidBlock
pub fn local_frame(block: &Block, scale: Vector2) -> Result<Frame> {
    let (min, _) = bounding_box(&block.outer.points).ok_or_else(|| {
        crate::error::InputError::InvalidBlock("outer ring has no points".into())
    })?;
    Ok(Frame::from_bounds(min, scale))
}

/// Processes one block into placements.
///
/// # Errors
///
/// Input and arrangement errors abort the block. Rule errors never
/// surface here; they demote the block to plain road offsetting and are
/// reported through [`BlockStats::fill_fallback`].
pub fn process_block(
    block: &Block,
    frame: &Frame,
    oracles: &Oracles<'_>,
    params: &EngineParams,
) -> Result<BlockOutput> {
    let span = info_span!("block", zoning = block.zoning, variant = block.variant);
    let _enter = span.enter();

    let outer = simplify_boundary(
        &extract_boundary(&block.outer, frame, false)?,
        params.block_err,
    );
    let holes: Vec<Vec<BoundaryVertex>> = block
        .holes
        .iter()
        .map(|h| {
            extract_boundary(h, frame, true).map(|v| simplify_boundary(&v, params.block_err))
        })
        .collect::<Result<_>>()?;

    let mut stats = BlockStats::default();
    let mut curves: Vec<Curve> = Vec::new();
    let mut features: Vec<FaceData> = Vec::new();

    // Interior layout first, so its keys sit lowest and every later ring
    // tag shadows it where they overlap.
    let fill_rule = oracles.fill.fill_rule_for(block);
    if let Some(rule) = &fill_rule {
        if block.holes.is_empty() {
            match plan_regions(block, &outer, rule, oracles.facades, &params.plan) {
                Ok(PlanOutput {
                    curves: planned,
                    features: tags,
                }) => {
                    stats.planned = !planned.is_empty();
                    curves.extend(planned);
                    features.extend(tags);
                }
                Err(LotfillError::Rule(err)) => {
                    debug!(%err, "fill planning failed, plain offsets only");
                    stats.fill_fallback = true;
                }
                Err(err) => return Err(err),
            }
        }
    }

    insert_point_features(block, frame, oracles, &mut curves, &mut features);

    // Road offsets per ring. Each ring's curves arrive with local keys;
    // rebase them onto the shared feature map and remember where the
    // ring's out-of-bounds placeholder must point.
    let mut ring_spans: Vec<(usize, usize)> = Vec::new();
    for verts in std::iter::once(&outer).chain(holes.iter()) {
        let offsets = build_offsets(block, verts, oracles.edges);
        let base = features.len();
        let start = curves.len();
        features.extend(offsets.features);
        curves.extend(offsets.curves.into_iter().map(|mut c| {
            for k in &mut c.keys {
                if *k != OOB_KEY {
                    *k += base;
                }
            }
            c
        }));
        ring_spans.push((start, curves.len()));
    }

    // Out-of-bounds entries allocate after everything else, holes first
    // and the outer ring last, so the outer tag wins wherever rings
    // overlap and hole interiors still read as out of bounds.
    let mut oob_indices: Vec<usize> = Vec::with_capacity(ring_spans.len());
    for _ in 1..ring_spans.len() {
        features.push(FaceData::out_of_bounds());
        oob_indices.push(features.len() - 1);
    }
    features.push(FaceData::out_of_bounds());
    let outer_oob = features.len() - 1;
    oob_indices.insert(0, outer_oob);
    for (ring, &(start, end)) in ring_spans.iter().enumerate() {
        for c in &mut curves[start..end] {
            for k in &mut c.keys {
                if *k == OOB_KEY {
                    *k = oob_indices[ring];
                }
            }
            c.keys.sort_unstable();
            c.keys.dedup();
        }
    }

    stats.curves_inserted = curves.len();
    let mut arr = arrangement::create_block(&curves, &features, Some(outer_oob))?;
    stats.clean = arrangement::clean_block(&mut arr, &params.keep_features);

    // Whatever interior neither the planner nor the offsets claimed
    // becomes fill forest, then adjacent fill faces fuse.
    if let Some(fil) = fill_rule.as_ref().and_then(|r| r.fil_id) {
        let mut promoted = false;
        for (fid, face) in &mut arr.faces {
            if fid != arr.unbounded && face.data.usage == Usage::Empty {
                face.data = FaceData {
                    usage: Usage::Forest,
                    feature: Some(fil),
                    family: FeatureFamily::General,
                    major_axis: None,
                    height: block.height,
                    group: 0,
                };
                promoted = true;
            }
        }
        if promoted {
            let second = arrangement::clean_block(&mut arr, &params.keep_features);
            stats.clean.edges_removed += second.edges_removed;
            stats.clean.vertices_merged += second.vertices_merged;
        }
    }

    let placements = extract_features(&arr, frame, oracles.terrain, &params.extract);
    Ok(BlockOutput { placements, stats })
}

/// Processes a batch, one result per block. A failing block never
/// affects its neighbors.
#[must_use]
pub fn process_blocks(
    blocks: &[Block],
    frame: &Frame,
    oracles: &Oracles<'_>,
    params: &EngineParams,
) -> Vec<Result<BlockOutput>> {
    blocks
        .iter()
        .map(|b| process_block(b, frame, oracles, params))
        .collect()
}

/// Inserts an axis-aligned footprint rectangle for every point feature
/// with a matching point rule.
fn insert_point_features(
    block: &Block,
    frame: &Frame,
    oracles: &Oracles<'_>,
    curves: &mut Vec<Curve>,
    features: &mut Vec<FaceData>,
) {
    for pf in &block.points {
        let Some(rule) = oracles.points.point_rule_for(block.zoning, pf.feature) else {
            continue;
        };
        let c = frame.forward(pf.loc);
        let (hw, hd) = (rule.width * 0.5, rule.depth * 0.5);
        if hw <= 0.0 || hd <= 0.0 {
            continue;
        }
        let tag = features.len();
        features.push(FaceData {
            usage: Usage::PointFeature,
            feature: Some(pf.feature),
            family: FeatureFamily::General,
            major_axis: None,
            height: pf.height,
            group: tag as u32,
        });
        let corners = [
            Point2::new(c.x - hw, c.y - hd),
            Point2::new(c.x + hw, c.y - hd),
            Point2::new(c.x + hw, c.y + hd),
            Point2::new(c.x - hw, c.y + hd),
        ];
        for i in 0..4 {
            curves.push(Curve::new(corners[i], corners[(i + 1) % 4], vec![tag]));
        }
    }
}
