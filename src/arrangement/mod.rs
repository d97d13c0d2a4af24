//! Tagged planar subdivision.
//!
//! Vertices, directed half-edges, and faces live in typed-key arenas;
//! twin/next/prev/face relationships are stored as keys, never as
//! pointers, so structural mutation (edge removal, vertex merge) cannot
//! leave dangling references.

pub mod build;
pub mod clean;
pub mod tag;

pub use build::{create_block, Curve};
pub use clean::clean_block;

use slotmap::SlotMap;

use crate::math::{Point2, Vector2};

slotmap::new_key_type! {
    /// Unique identifier for a vertex of the subdivision.
    pub struct VertexId;
    /// Unique identifier for a directed half-edge.
    pub struct HalfedgeId;
    /// Unique identifier for a face.
    pub struct FaceId;
}

/// Usage classification of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Empty,
    Road,
    RoadEnd,
    Steep,
    PointFeature,
    PolygonalFeature,
    Forest,
    OutOfBounds,
}

/// How the feature extractor walks a face of this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureFamily {
    /// General polygon-with-holes placement.
    General,
    /// Open/closed polyline placement (autogen string).
    StringLine,
    /// Rectangular footprint anchored on the major axis (autogen building).
    BoxLot,
}

/// Per-face tag data.
#[derive(Debug, Clone)]
pub struct FaceData {
    pub usage: Usage,
    /// Opaque feature-catalog id; required for `PolygonalFeature` faces.
    pub feature: Option<u32>,
    pub family: FeatureFamily,
    /// Dominant direction used to anchor box footprints.
    pub major_axis: Option<Vector2>,
    /// Target height handed through to placements.
    pub height: f64,
    /// Simplify group: the cleaner only merges faces sharing this id.
    pub group: u32,
}

impl Default for FaceData {
    fn default() -> Self {
        Self {
            usage: Usage::Empty,
            feature: None,
            family: FeatureFamily::General,
            major_axis: None,
            height: 0.0,
            group: 0,
        }
    }
}

impl FaceData {
    #[must_use]
    pub fn out_of_bounds() -> Self {
        Self {
            usage: Usage::OutOfBounds,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn road(feature: u32) -> Self {
        Self {
            usage: Usage::Road,
            feature: Some(feature),
            ..Self::default()
        }
    }

    /// Identical tag data for the cleaner's mergeability test.
    #[must_use]
    pub fn merges_with(&self, other: &FaceData) -> bool {
        self.usage == other.usage && self.feature == other.feature && self.group == other.group
    }
}

#[derive(Debug)]
pub struct Vertex {
    pub loc: Point2,
    /// Outgoing half-edges, sorted counter-clockwise by angle.
    pub out: Vec<HalfedgeId>,
}

#[derive(Debug)]
pub struct Halfedge {
    pub origin: VertexId,
    pub twin: HalfedgeId,
    pub next: HalfedgeId,
    pub prev: HalfedgeId,
    pub face: FaceId,
    /// Tag keys of the source curve, sorted ascending.
    pub keys: Vec<usize>,
}

#[derive(Debug)]
pub struct Face {
    /// Representative half-edge of the outer boundary cycle; `None` for
    /// the unbounded face.
    pub outer: Option<HalfedgeId>,
    /// Representative half-edges of hole cycles.
    pub holes: Vec<HalfedgeId>,
    pub data: FaceData,
}

/// A planar subdivision owned by one block invocation.
#[derive(Debug)]
pub struct Arrangement {
    pub vertices: SlotMap<VertexId, Vertex>,
    pub halfedges: SlotMap<HalfedgeId, Halfedge>,
    pub faces: SlotMap<FaceId, Face>,
    pub unbounded: FaceId,
}

impl Arrangement {
    /// Creates an empty subdivision with only the unbounded face.
    #[must_use]
    pub fn new() -> Self {
        let mut faces = SlotMap::with_key();
        let unbounded = faces.insert(Face {
            outer: None,
            holes: Vec::new(),
            data: FaceData::default(),
        });
        Self {
            vertices: SlotMap::with_key(),
            halfedges: SlotMap::with_key(),
            faces,
            unbounded,
        }
    }

    /// Target vertex of a half-edge.
    #[must_use]
    pub fn target(&self, h: HalfedgeId) -> VertexId {
        self.halfedges[self.halfedges[h].twin].origin
    }

    /// All half-edges of the cycle containing `start`, in walk order.
    #[must_use]
    pub fn cycle(&self, start: HalfedgeId) -> Vec<HalfedgeId> {
        let mut out = Vec::new();
        let mut h = start;
        loop {
            out.push(h);
            h = self.halfedges[h].next;
            if h == start {
                break;
            }
            debug_assert!(out.len() <= self.halfedges.len(), "broken next cycle");
        }
        out
    }

    /// Origin locations of a cycle, in walk order.
    #[must_use]
    pub fn cycle_points(&self, start: HalfedgeId) -> Vec<Point2> {
        self.cycle(start)
            .iter()
            .map(|&h| self.vertices[self.halfedges[h].origin].loc)
            .collect()
    }

    /// Every half-edge bounding a face: outer cycle then hole cycles.
    #[must_use]
    pub fn face_halfedges(&self, f: FaceId) -> Vec<HalfedgeId> {
        let face = &self.faces[f];
        let mut out = Vec::new();
        if let Some(rep) = face.outer {
            out.extend(self.cycle(rep));
        }
        for &rep in &face.holes {
            out.extend(self.cycle(rep));
        }
        out
    }

    /// One half-edge per undirected edge.
    #[must_use]
    pub fn edges(&self) -> Vec<HalfedgeId> {
        self.halfedges
            .iter()
            .filter(|(h, he)| h.0.as_ffi() < he.twin.0.as_ffi())
            .map(|(h, _)| h)
            .collect()
    }

    /// Recomputes a face's outer/hole cycle representatives from the
    /// half-edges currently assigned to it. Used after structural edits.
    pub(crate) fn rebuild_face_cycles(&mut self, f: FaceId) {
        let members: Vec<HalfedgeId> = self
            .halfedges
            .iter()
            .filter(|(_, he)| he.face == f)
            .map(|(h, _)| h)
            .collect();

        let mut seen: std::collections::HashSet<HalfedgeId> = std::collections::HashSet::new();
        let mut cycles: Vec<(HalfedgeId, f64)> = Vec::new();
        for h in members {
            if seen.contains(&h) {
                continue;
            }
            let cyc = self.cycle(h);
            for &c in &cyc {
                seen.insert(c);
            }
            let pts: Vec<Point2> = cyc
                .iter()
                .map(|&c| self.vertices[self.halfedges[c].origin].loc)
                .collect();
            cycles.push((h, crate::math::polygon_2d::signed_area(&pts)));
        }

        let face = &mut self.faces[f];
        face.holes.clear();
        face.outer = None;
        if f == self.unbounded {
            face.holes = cycles.into_iter().map(|(h, _)| h).collect();
            return;
        }
        if let Some(best) = cycles
            .iter()
            .enumerate()
            .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
            .map(|(i, _)| i)
        {
            for (i, (h, _)) in cycles.into_iter().enumerate() {
                if i == best {
                    self.faces[f].outer = Some(h);
                } else {
                    self.faces[f].holes.push(h);
                }
            }
        }
    }
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new()
    }
}
