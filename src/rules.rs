//! External rule oracles.
//!
//! The engine treats zoning tables, facade spellings, edge rules, point
//! rules, and the terrain classifier as opaque, synchronous, read-only
//! collaborators behind traits. Table-backed implementations are provided
//! for tests and demos; production callers bring their own.

use crate::block::Block;
use crate::math::Point2;

/// Fill parameters for one zoning class.
///
/// Field set mirrors the zoning fill-rule table: autogen-building (AGB),
/// facade, fill, and autogen-string art ids plus the width/depth envelope
/// that drives region planning.
#[derive(Debug, Clone)]
pub struct FillRule {
    pub agb_id: Option<u32>,
    pub fac_id: Option<u32>,
    pub fil_id: Option<u32>,
    pub ags_id: Option<u32>,
    /// AGB regions narrower than this are demoted to facades.
    pub agb_min_width: f64,
    /// Sliver tolerance along the major axis.
    pub agb_slop_width: f64,
    /// Sliver tolerance across the major axis; also sets the safe envelope.
    pub agb_slop_depth: f64,
    /// Minimum facade segment width the spelling catalog supports.
    pub fac_min_width: f64,
    /// Regions shallower than this cannot hold a facade row.
    pub fac_min_depth: f64,
    /// Number of facade depth rows: 0 = no split, >0 = front/back rows.
    pub fac_depth_split: u32,
    /// Extra width a facade region may borrow from an adjacent AGB.
    pub fac_extra: f64,
}

/// One segment of a facade spelling.
#[derive(Debug, Clone, Copy)]
pub struct FacadeChoice {
    pub fac_id_front: u32,
    /// 0 when the spelling has no back row for this segment.
    pub fac_id_back: u32,
    pub width: f64,
}

/// A discrete facade layout for one region width.
#[derive(Debug, Clone)]
pub struct FacadeSpelling {
    pub segments: Vec<FacadeChoice>,
}

impl FacadeSpelling {
    /// Sum of the nominal segment widths.
    #[must_use]
    pub fn total_width(&self) -> f64 {
        self.segments.iter().map(|s| s.width).sum()
    }
}

/// A road-edge rule: a strip of the given width placed behind the road
/// shoulder along edges of a matching type.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRule {
    pub width: f64,
    pub resource_id: u32,
}

/// Footprint parameters for a point feature.
#[derive(Debug, Clone, Copy)]
pub struct PointRule {
    pub width: f64,
    pub depth: f64,
}

/// Terrain classification at a sample point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainClass {
    Urban,
    Forest,
    Flat,
    OutOfBounds,
}

pub trait FillRules {
    fn fill_rule_for(&self, block: &Block) -> Option<FillRule>;
}

pub trait FacadeRules {
    fn facade_rule_for(
        &self,
        zoning: u32,
        variant: u32,
        width: f64,
        height: f64,
        depth: f64,
    ) -> Option<FacadeSpelling>;
}

pub trait EdgeRules {
    fn edge_rule_for(&self, road_type: u32, zoning: u32, variant: u32, height: f64)
        -> Option<EdgeRule>;
}

pub trait PointRules {
    fn point_rule_for(&self, zoning: u32, feature: u32) -> Option<PointRule>;
}

pub trait TerrainClassifier {
    fn classify(&self, p: Point2) -> TerrainClass;
}

/// All oracles a block invocation consults, bundled for call sites.
#[derive(Clone, Copy)]
pub struct Oracles<'a> {
    pub fill: &'a dyn FillRules,
    pub facades: &'a dyn FacadeRules,
    pub edges: &'a dyn EdgeRules,
    pub points: &'a dyn PointRules,
    pub terrain: &'a dyn TerrainClassifier,
}

// --- Table-backed reference implementations ---

/// Fill rules keyed by zoning id.
#[derive(Debug, Default)]
pub struct TableFillRules {
    pub rules: Vec<(u32, FillRule)>,
}

impl FillRules for TableFillRules {
    fn fill_rule_for(&self, block: &Block) -> Option<FillRule> {
        self.rules
            .iter()
            .find(|(z, _)| *z == block.zoning)
            .map(|(_, r)| r.clone())
    }
}

/// One spelling table row: a width range and the segments it lays down.
#[derive(Debug, Clone)]
pub struct SpellingEntry {
    pub zoning: u32,
    pub variant: u32,
    pub width_min: f64,
    pub width_max: f64,
    pub height_min: f64,
    pub height_max: f64,
    pub segments: Vec<FacadeChoice>,
}

#[derive(Debug, Default)]
pub struct TableFacadeRules {
    pub spellings: Vec<SpellingEntry>,
}

impl FacadeRules for TableFacadeRules {
    fn facade_rule_for(
        &self,
        zoning: u32,
        variant: u32,
        width: f64,
        height: f64,
        _depth: f64,
    ) -> Option<FacadeSpelling> {
        self.spellings
            .iter()
            .find(|s| {
                s.zoning == zoning
                    && s.variant == variant
                    && width >= s.width_min
                    && width <= s.width_max
                    && height >= s.height_min
                    && height <= s.height_max
            })
            .map(|s| FacadeSpelling {
                segments: s.segments.clone(),
            })
    }
}

#[derive(Debug, Default)]
pub struct TableEdgeRules {
    pub rules: Vec<(u32, u32, EdgeRule)>,
}

impl EdgeRules for TableEdgeRules {
    fn edge_rule_for(
        &self,
        road_type: u32,
        zoning: u32,
        _variant: u32,
        _height: f64,
    ) -> Option<EdgeRule> {
        self.rules
            .iter()
            .find(|(rt, z, _)| *rt == road_type && *z == zoning)
            .map(|(_, _, r)| *r)
    }
}

#[derive(Debug, Default)]
pub struct TablePointRules {
    pub rules: Vec<(u32, u32, PointRule)>,
}

impl PointRules for TablePointRules {
    fn point_rule_for(&self, zoning: u32, feature: u32) -> Option<PointRule> {
        self.rules
            .iter()
            .find(|(z, f, _)| *z == zoning && *f == feature)
            .map(|(_, _, r)| *r)
    }
}

/// Classifies every point the same way. Good enough for tests and for
/// callers without terrain data.
#[derive(Debug, Clone, Copy)]
pub struct ConstTerrain(pub TerrainClass);

impl TerrainClassifier for ConstTerrain {
    fn classify(&self, _p: Point2) -> TerrainClass {
        self.0
    }
}

/// An oracle set with no rules at all; every block falls back to plain
/// road-edge offsetting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl FillRules for NoRules {
    fn fill_rule_for(&self, _block: &Block) -> Option<FillRule> {
        None
    }
}

impl FacadeRules for NoRules {
    fn facade_rule_for(
        &self,
        _zoning: u32,
        _variant: u32,
        _width: f64,
        _height: f64,
        _depth: f64,
    ) -> Option<FacadeSpelling> {
        None
    }
}

impl EdgeRules for NoRules {
    fn edge_rule_for(
        &self,
        _road_type: u32,
        _zoning: u32,
        _variant: u32,
        _height: f64,
    ) -> Option<EdgeRule> {
        None
    }
}

impl PointRules for NoRules {
    fn point_rule_for(&self, _zoning: u32, _feature: u32) -> Option<PointRule> {
        None
    }
}

impl TerrainClassifier for NoRules {
    fn classify(&self, _p: Point2) -> TerrainClass {
        TerrainClass::Flat
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::block::Ring;

    #[test]
    fn table_fill_rules_match_zoning() {
        let rules = TableFillRules {
            rules: vec![(
                7,
                FillRule {
                    agb_id: Some(1),
                    fac_id: Some(2),
                    fil_id: Some(3),
                    ags_id: None,
                    agb_min_width: 20.0,
                    agb_slop_width: 4.0,
                    agb_slop_depth: 8.0,
                    fac_min_width: 6.0,
                    fac_min_depth: 10.0,
                    fac_depth_split: 0,
                    fac_extra: 4.0,
                },
            )],
        };
        let block = Block::simple(Ring::bare(vec![]), 7, 10.0);
        assert!(rules.fill_rule_for(&block).is_some());
        let other = Block::simple(Ring::bare(vec![]), 8, 10.0);
        assert!(rules.fill_rule_for(&other).is_none());
    }

    #[test]
    fn spelling_width_range() {
        let t = TableFacadeRules {
            spellings: vec![SpellingEntry {
                zoning: 1,
                variant: 0,
                width_min: 10.0,
                width_max: 20.0,
                height_min: 0.0,
                height_max: 100.0,
                segments: vec![FacadeChoice {
                    fac_id_front: 9,
                    fac_id_back: 0,
                    width: 15.0,
                }],
            }],
        };
        assert!(t.facade_rule_for(1, 0, 15.0, 10.0, 12.0).is_some());
        assert!(t.facade_rule_for(1, 0, 25.0, 10.0, 12.0).is_none());
    }
}
