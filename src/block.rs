use crate::math::Point2;

/// Road annotation for one boundary edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSpec {
    pub road_type: u32,
    pub width: f64,
    /// At-grade road. Bridges and embankments never anchor facades.
    pub grounded: bool,
}

impl RoadSpec {
    /// Reduces a set of network segments sharing one edge to the widest,
    /// which is the one that drives offsets and locking.
    #[must_use]
    pub fn widest(candidates: &[RoadSpec]) -> Option<RoadSpec> {
        candidates
            .iter()
            .copied()
            .max_by(|a, b| a.width.total_cmp(&b.width))
    }

    /// Same road type and width, within a metric tolerance.
    #[must_use]
    pub fn matches(&self, other: &RoadSpec) -> bool {
        self.road_type == other.road_type && (self.width - other.width).abs() < 1e-6
    }
}

/// One closed boundary loop. Edge `i` runs from `points[i]` to
/// `points[(i + 1) % n]`; `roads[i]` and `degrees[i]` annotate that edge's
/// road and the source vertex's topology degree in the enclosing map.
#[derive(Debug, Clone)]
pub struct Ring {
    pub points: Vec<Point2>,
    pub roads: Vec<Option<RoadSpec>>,
    pub degrees: Vec<u32>,
}

impl Ring {
    /// Builds a ring with all vertices at topology degree 2.
    #[must_use]
    pub fn new(points: Vec<Point2>, roads: Vec<Option<RoadSpec>>) -> Self {
        let degrees = vec![2; points.len()];
        Self {
            points,
            roads,
            degrees,
        }
    }

    /// Builds a ring with no road annotations.
    #[must_use]
    pub fn bare(points: Vec<Point2>) -> Self {
        let n = points.len();
        Self {
            points,
            roads: vec![None; n],
            degrees: vec![2; n],
        }
    }

    /// Builds a ring with the same road on every edge.
    #[must_use]
    pub fn uniform(points: Vec<Point2>, road: RoadSpec) -> Self {
        let n = points.len();
        Self {
            points,
            roads: vec![Some(road); n],
            degrees: vec![2; n],
        }
    }
}

/// A point feature inside the block whose footprint enters the partition.
#[derive(Debug, Clone, Copy)]
pub struct PointFeature {
    pub loc: Point2,
    pub feature: u32,
    pub height: f64,
}

/// Input value for one engine invocation: a parcel bounded by road edges.
///
/// Owns no other entity; every invocation gets its own block and the
/// engine keeps no state across blocks.
#[derive(Debug, Clone)]
pub struct Block {
    pub outer: Ring,
    pub holes: Vec<Ring>,
    pub zoning: u32,
    pub variant: u32,
    pub height: f64,
    pub points: Vec<PointFeature>,
}

impl Block {
    /// A block with no holes and no point features.
    #[must_use]
    pub fn simple(outer: Ring, zoning: u32, height: f64) -> Self {
        Self {
            outer,
            holes: Vec::new(),
            zoning,
            variant: 0,
            height,
            points: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn widest_picks_max_width() {
        let r = RoadSpec::widest(&[
            RoadSpec {
                road_type: 1,
                width: 8.0,
                grounded: true,
            },
            RoadSpec {
                road_type: 2,
                width: 14.0,
                grounded: true,
            },
        ])
        .unwrap();
        assert_eq!(r.road_type, 2);
    }

    #[test]
    fn widest_empty_is_none() {
        assert!(RoadSpec::widest(&[]).is_none());
    }
}
