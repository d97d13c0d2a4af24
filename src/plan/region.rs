//! Depth-band region classification and consolidation.
//!
//! The planner scans the axis-projected block into a run of regions,
//! each spanning an axis interval and classified by how much usable
//! depth it has. Consolidation then repairs the run: slivers merge into
//! neighbors, adjacent compatible regions fuse, depth-split rules
//! reclassify the front and back rows independently, and unusable spans
//! donate their width in the direction the block widens.

use crate::rules::FillRule;

/// What a region can hold, ordered by desirability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionClass {
    /// Not against a grounded road; nothing anchors here.
    None,
    /// A chain is too steep; side-facing sliver.
    Slop,
    /// Too shallow for a facade row.
    Junk,
    /// Deep enough for facades, not regular enough for an AGB.
    Facade,
    /// Both chains clear the safe envelope; a full autogen block fits.
    Agb,
}

/// Which depth rows a region occupies. Split regions carry one entry
/// per row; unsplit regions span the whole depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionBand {
    Full,
    /// Road-side row of a split region.
    Bottom,
    /// Far row of a split region.
    Top,
}

/// One classified axis interval.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub class: RegionClass,
    pub band: RegionBand,
    pub a0: f64,
    pub a1: f64,
    /// Usable depth (top chain minus bottom chain) at the interval middle.
    pub depth: f64,
    /// Steeper of the two chain slopes over the interval.
    pub slope: f64,
    pub slope_bottom: f64,
    pub slope_top: f64,
    /// +1 widening toward higher axis positions, -1 toward lower, 0 flat.
    pub block_dir: i8,
}

impl Region {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.a1 - self.a0
    }
}

/// Applies the consolidation rules in order. The output run covers a
/// subset of the input span with only `Facade`, `Agb`, and (in split
/// rows) `Slop` regions left.
pub fn consolidate(regions: &mut Vec<Region>, rule: &FillRule, steep_slope: f64) {
    merge_end_slivers(regions, rule);
    merge_adjacent_agb(regions);
    borrow_for_narrow_facades(regions, rule);
    demote_narrow_agb(regions, rule);
    split_depth_bands(regions, rule, steep_slope);
    merge_same_class(regions);
    drop_unusable(regions);
}

/// Rule (a): a slop/junk sliver at an open end of the block folds into
/// the AGB region beside it.
fn merge_end_slivers(regions: &mut Vec<Region>, rule: &FillRule) {
    let sliver = |r: &Region| {
        (r.class == RegionClass::Slop || r.class == RegionClass::Junk)
            && r.width() <= rule.agb_slop_width
    };
    if regions.len() >= 2 && sliver(&regions[0]) && regions[1].class == RegionClass::Agb {
        regions[1].a0 = regions[0].a0;
        regions.remove(0);
    }
    let n = regions.len();
    if n >= 2 && sliver(&regions[n - 1]) && regions[n - 2].class == RegionClass::Agb {
        regions[n - 2].a1 = regions[n - 1].a1;
        regions.remove(n - 1);
    }
}

/// Rule (b): adjacent AGB regions fuse, keeping the flatter slope.
fn merge_adjacent_agb(regions: &mut Vec<Region>) {
    let mut i = 0;
    while i + 1 < regions.len() {
        if regions[i].class == RegionClass::Agb && regions[i + 1].class == RegionClass::Agb {
            regions[i].a1 = regions[i + 1].a1;
            regions[i].slope = regions[i].slope.min(regions[i + 1].slope);
            regions[i].slope_bottom = regions[i].slope_bottom.min(regions[i + 1].slope_bottom);
            regions[i].slope_top = regions[i].slope_top.min(regions[i + 1].slope_top);
            regions[i].depth = regions[i].depth.max(regions[i + 1].depth);
            regions.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// Rule (c): a too-narrow facade next to an AGB borrows width from it,
/// up to `fac_extra` and never leaving the AGB below its own minimum.
fn borrow_for_narrow_facades(regions: &mut Vec<Region>, rule: &FillRule) {
    for i in 0..regions.len() {
        if regions[i].class != RegionClass::Facade || regions[i].width() >= rule.fac_min_width {
            continue;
        }
        let want = (rule.fac_min_width - regions[i].width()).min(rule.fac_extra);

        if i > 0 && regions[i - 1].class == RegionClass::Agb {
            let spare = (regions[i - 1].width() - rule.agb_min_width).max(0.0);
            let take = want.min(spare);
            regions[i - 1].a1 -= take;
            regions[i].a0 -= take;
        }
        if regions[i].width() >= rule.fac_min_width {
            continue;
        }
        let want = (rule.fac_min_width - regions[i].width()).min(rule.fac_extra);
        if i + 1 < regions.len() && regions[i + 1].class == RegionClass::Agb {
            let spare = (regions[i + 1].width() - rule.agb_min_width).max(0.0);
            let take = want.min(spare);
            regions[i + 1].a0 += take;
            regions[i].a1 += take;
        }
    }
}

/// Rule (d): an AGB narrower than the minimum AGB width becomes facade.
fn demote_narrow_agb(regions: &mut Vec<Region>, rule: &FillRule) {
    for r in regions.iter_mut() {
        if r.class == RegionClass::Agb && r.width() < rule.agb_min_width {
            r.class = RegionClass::Facade;
        }
    }
}

/// Rule (e): with depth splitting enabled, each region's front and back
/// rows are reclassified against their own chain slope. When the rows
/// come out different the region splits into independent bottom and top
/// sub-regions; when they agree it stays unsplit. A flat chain stays
/// usable even when the opposite chain is steep.
fn split_depth_bands(regions: &mut Vec<Region>, rule: &FillRule, steep_slope: f64) {
    if rule.fac_depth_split == 0 {
        return;
    }
    let prior = std::mem::take(regions);
    for r in prior {
        if r.class == RegionClass::None {
            regions.push(r);
            continue;
        }
        let row_class = |slope: f64| {
            if slope > steep_slope {
                RegionClass::Slop
            } else if r.class == RegionClass::Agb {
                RegionClass::Agb
            } else if r.depth >= rule.fac_min_depth {
                RegionClass::Facade
            } else {
                RegionClass::Junk
            }
        };
        let bottom = row_class(r.slope_bottom);
        let top = row_class(r.slope_top);
        if bottom == top {
            regions.push(Region { class: bottom, ..r });
        } else {
            regions.push(Region {
                class: bottom,
                band: RegionBand::Bottom,
                slope: r.slope_bottom,
                ..r
            });
            regions.push(Region {
                class: top,
                band: RegionBand::Top,
                slope: r.slope_top,
                ..r
            });
        }
    }
}

/// Rule (f): adjacent same-class regions in the same band fuse.
fn merge_same_class(regions: &mut Vec<Region>) {
    let mut i = 0;
    while i + 1 < regions.len() {
        if regions[i].class == regions[i + 1].class
            && regions[i].band == regions[i + 1].band
            && regions[i].class != RegionClass::Facade
        {
            regions[i].a1 = regions[i + 1].a1;
            regions[i].slope = regions[i].slope.max(regions[i + 1].slope);
            regions[i].slope_bottom = regions[i].slope_bottom.max(regions[i + 1].slope_bottom);
            regions[i].slope_top = regions[i].slope_top.max(regions[i + 1].slope_top);
            regions[i].depth = regions[i].depth.min(regions[i + 1].depth);
            regions.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// Rule (g): none/junk regions and unsplit slop are deleted, donating
/// their span to the nearest same-band neighbor in the direction the
/// block widens. Slop rows of split regions survive so the steep side
/// still gets a tagged face.
fn drop_unusable(regions: &mut Vec<Region>) {
    let mut i = 0;
    while i < regions.len() {
        let r = regions[i];
        let doomed = match r.class {
            RegionClass::Facade | RegionClass::Agb => false,
            RegionClass::Slop => r.band == RegionBand::Full,
            RegionClass::None | RegionClass::Junk => true,
        };
        if !doomed {
            i += 1;
            continue;
        }
        if r.block_dir < 0 {
            if let Some(j) = (0..i).rev().find(|&j| regions[j].band == r.band) {
                regions[j].a1 = r.a1;
            }
        } else if r.block_dir > 0 {
            if let Some(j) = (i + 1..regions.len()).find(|&j| regions[j].band == r.band) {
                regions[j].a0 = r.a0;
            }
        }
        regions.remove(i);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STEEP: f64 = 1.5;

    fn rule() -> FillRule {
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
        }
    }

    fn region(class: RegionClass, a0: f64, a1: f64) -> Region {
        Region {
            class,
            band: RegionBand::Full,
            a0,
            a1,
            depth: 30.0,
            slope: 0.0,
            slope_bottom: 0.0,
            slope_top: 0.0,
            block_dir: 0,
        }
    }

    #[test]
    fn end_sliver_folds_into_agb() {
        let mut rs = vec![
            region(RegionClass::Junk, 0.0, 3.0),
            region(RegionClass::Agb, 3.0, 50.0),
        ];
        consolidate(&mut rs, &rule(), STEEP);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].class, RegionClass::Agb);
        assert!((rs[0].a0 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn wide_junk_is_not_a_sliver() {
        let mut rs = vec![
            region(RegionClass::Junk, 0.0, 10.0),
            region(RegionClass::Agb, 10.0, 60.0),
        ];
        consolidate(&mut rs, &rule(), STEEP);
        // The junk span is dropped, not merged; the AGB keeps its start.
        assert_eq!(rs.len(), 1);
        assert!((rs[0].a0 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn adjacent_agb_merge_keeps_flatter_slope() {
        let mut a = region(RegionClass::Agb, 0.0, 30.0);
        a.slope = 0.3;
        let mut b = region(RegionClass::Agb, 30.0, 70.0);
        b.slope = 0.1;
        let mut rs = vec![a, b];
        consolidate(&mut rs, &rule(), STEEP);
        assert_eq!(rs.len(), 1);
        assert!((rs[0].slope - 0.1).abs() < 1e-9);
        assert!((rs[0].width() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn narrow_facade_borrows_from_agb() {
        let mut rs = vec![
            region(RegionClass::Agb, 0.0, 50.0),
            region(RegionClass::Facade, 50.0, 54.0),
        ];
        consolidate(&mut rs, &rule(), STEEP);
        assert_eq!(rs.len(), 2);
        assert!((rs[1].width() - 6.0).abs() < 1e-9, "facade widened to minimum");
        assert!((rs[0].a1 - 48.0).abs() < 1e-9, "agb gave up the difference");
    }

    #[test]
    fn borrow_never_starves_the_agb() {
        let mut rs = vec![
            region(RegionClass::Agb, 0.0, 21.0),
            region(RegionClass::Facade, 21.0, 25.0),
        ];
        consolidate(&mut rs, &rule(), STEEP);
        // Only 1.0 of spare width exists above the AGB minimum.
        assert!(rs[0].width() >= 20.0 - 1e-9);
        assert!(rs[1].width() < 6.0);
    }

    #[test]
    fn narrow_agb_demoted_to_facade() {
        let mut rs = vec![region(RegionClass::Agb, 0.0, 12.0)];
        consolidate(&mut rs, &rule(), STEEP);
        assert_eq!(rs[0].class, RegionClass::Facade);
    }

    #[test]
    fn facade_between_agbs_never_zero_width() {
        let mut rs = vec![
            region(RegionClass::Agb, 0.0, 40.0),
            region(RegionClass::Facade, 40.0, 41.0),
            region(RegionClass::Agb, 41.0, 80.0),
        ];
        consolidate(&mut rs, &rule(), STEEP);
        for r in &rs {
            assert!(r.width() > 0.0, "degenerate region {r:?}");
        }
    }

    #[test]
    fn unusable_span_donates_toward_widening() {
        let mut mid = region(RegionClass::Slop, 30.0, 40.0);
        mid.block_dir = 1;
        let mut rs = vec![
            region(RegionClass::Agb, 0.0, 30.0),
            mid,
            region(RegionClass::Agb, 40.0, 80.0),
        ];
        consolidate(&mut rs, &rule(), STEEP);
        assert_eq!(rs.len(), 2, "slop deleted, span donated: {rs:?}");
        assert!((rs[1].a0 - 30.0).abs() < 1e-9, "right neighbor absorbed the span");
        assert!((rs[0].a1 - 30.0).abs() < 1e-9);
    }

    #[test]
    fn steep_back_row_splits_off_the_flat_front() {
        let mut r = rule();
        r.fac_depth_split = 1;
        // The whole-interval class is slop because the back chain is
        // steep; the flat front row comes back usable after the split.
        let mut steep_top = region(RegionClass::Slop, 0.0, 40.0);
        steep_top.slope = 3.0;
        steep_top.slope_top = 3.0;
        let mut rs = vec![steep_top];
        consolidate(&mut rs, &r, STEEP);
        assert_eq!(rs.len(), 2, "{rs:?}");
        assert_eq!(rs[0].band, RegionBand::Bottom);
        assert_eq!(rs[0].class, RegionClass::Facade);
        assert_eq!(rs[1].band, RegionBand::Top);
        assert_eq!(rs[1].class, RegionClass::Slop, "steep row survives for tagging");
    }

    #[test]
    fn uniform_rows_stay_unsplit() {
        let mut r = rule();
        r.fac_depth_split = 1;
        let mut rs = vec![region(RegionClass::Agb, 0.0, 50.0)];
        consolidate(&mut rs, &r, STEEP);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].band, RegionBand::Full);
        assert_eq!(rs[0].class, RegionClass::Agb);
    }

    #[test]
    fn fully_steep_region_still_deleted_when_split() {
        let mut r = rule();
        r.fac_depth_split = 1;
        let mut slop = region(RegionClass::Slop, 50.0, 60.0);
        slop.slope = 3.0;
        slop.slope_bottom = 3.0;
        slop.slope_top = 3.0;
        let mut rs = vec![region(RegionClass::Agb, 0.0, 50.0), slop];
        consolidate(&mut rs, &r, STEEP);
        assert_eq!(rs.len(), 1, "{rs:?}");
        assert_eq!(rs[0].class, RegionClass::Agb);
    }
}
