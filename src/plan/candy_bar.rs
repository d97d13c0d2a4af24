//! Axis-aligned assignment grid with minimal curve emission.
//!
//! The region planner assigns tags to rectangles of a bands-by-columns
//! grid over the axis-projected block. Emission walks every internal and
//! boundary grid line and merges maximal runs of cells sharing the same
//! neighbor-tag pair into one curve per run, so arrangement insertion
//! cost scales with the number of distinct runs, not cells.

use std::collections::BTreeMap;

use tracing::trace;

use crate::math::Point2;

/// Quantum for axis-cut positions, matching the arrangement vertex snap.
const CUT_QUANT: f64 = 1e-6;

fn quant(a: f64) -> i64 {
    (a / CUT_QUANT).round() as i64
}

fn unquant(q: i64) -> f64 {
    q as f64 * CUT_QUANT
}

/// One emitted grid curve, in the planner's (axis, depth) plane.
///
/// `neighbors[0]` is the tag on the low side of the line (left of a
/// vertical cut, below a horizontal one), `neighbors[1]` the high side.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSegment {
    pub from: Point2,
    pub to: Point2,
    pub neighbors: [Option<usize>; 2],
}

impl GridSegment {
    /// Toggle keys for this curve: the symmetric difference of the two
    /// neighbor tags, so crossing it switches one assignment for the
    /// other under even-odd fill.
    #[must_use]
    pub fn keys(&self) -> Vec<usize> {
        match self.neighbors {
            [Some(a), Some(b)] if a == b => Vec::new(),
            [Some(a), Some(b)] => vec![a.min(b), a.max(b)],
            [Some(a), None] | [None, Some(a)] => vec![a],
            [None, None] => Vec::new(),
        }
    }
}

/// A bands-by-columns tag grid over the axis-aligned block.
///
/// Band boundaries are fixed at construction; axis cuts are inserted
/// dynamically, each new cut duplicating the column it splits. Growing
/// beyond the initial extremes is not supported; out-of-range cuts clamp.
#[derive(Debug)]
pub struct CandyBarGrid {
    /// Depth boundaries, ascending. `bands.len() - 1` bands.
    bands: Vec<f64>,
    /// Column tag vectors keyed by quantized start position.
    columns: BTreeMap<i64, Vec<Option<usize>>>,
    start_q: i64,
    end_q: i64,
    /// Runs shorter than this are dropped at emission.
    small_cut: f64,
}

impl CandyBarGrid {
    /// Creates a grid spanning `a_start..a_end` with the given depth
    /// boundaries (at least 2, ascending).
    #[must_use]
    pub fn new(a_start: f64, a_end: f64, bands: Vec<f64>, small_cut: f64) -> Self {
        debug_assert!(bands.len() >= 2);
        debug_assert!(bands.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(a_start < a_end);
        let n_bands = bands.len() - 1;
        let start_q = quant(a_start);
        let mut columns = BTreeMap::new();
        columns.insert(start_q, vec![None; n_bands]);
        Self {
            bands,
            columns,
            start_q,
            end_q: quant(a_end),
            small_cut,
        }
    }

    /// Inserts a vertical cut, splitting the column containing `a` and
    /// duplicating its assignments. Returns the quantized cut position.
    /// Positions outside the extremes clamp to them.
    pub fn insert_axis_cut(&mut self, a: f64) -> i64 {
        let q = quant(a).clamp(self.start_q, self.end_q);
        debug_assert!(
            quant(a) >= self.start_q && quant(a) <= self.end_q,
            "cut outside grid extremes"
        );
        if q == self.end_q || self.columns.contains_key(&q) {
            return q;
        }
        let donor = self
            .columns
            .range(..q)
            .next_back()
            .map(|(_, c)| c.clone())
            .unwrap_or_else(|| vec![None; self.bands.len() - 1]);
        self.columns.insert(q, donor);
        q
    }

    /// Assigns `tag` to every cell of the rectangle spanning bands
    /// `band_start..band_end` and axis positions `a0..a1`.
    pub fn insert_block(&mut self, tag: usize, band_start: usize, band_end: usize, a0: f64, a1: f64) {
        debug_assert!(band_end <= self.bands.len() - 1);
        let q0 = self.insert_axis_cut(a0);
        let q1 = self.insert_axis_cut(a1);
        if q0 >= q1 {
            return;
        }
        for (_, col) in self.columns.range_mut(q0..q1) {
            for cell in col
                .iter_mut()
                .take(band_end.min(self.bands.len() - 1))
                .skip(band_start)
            {
                *cell = Some(tag);
            }
        }
    }

    fn tag_at(&self, col_start: i64, band: usize) -> Option<usize> {
        if col_start < self.start_q || col_start >= self.end_q {
            return None;
        }
        self.columns
            .range(..=col_start)
            .next_back()
            .and_then(|(_, c)| c.get(band).copied().flatten())
    }

    /// Emits the minimal curve set separating distinct assignments.
    #[must_use]
    pub fn emit_curves(&self) -> Vec<GridSegment> {
        let n_bands = self.bands.len() - 1;
        let mut out = Vec::new();

        // Vertical lines: every column boundary plus both extremes.
        let mut cuts: Vec<i64> = self.columns.keys().copied().collect();
        cuts.push(self.end_q);
        for &q in &cuts {
            let a = unquant(q);
            let mut run: Option<(usize, [Option<usize>; 2])> = None;
            for band in 0..=n_bands {
                let pair = if band < n_bands {
                    [self.tag_at(q - 1, band), self.tag_at(q, band)]
                } else {
                    [None, None] // closes any open run
                };
                match run {
                    Some((_, p)) if band < n_bands && p == pair => {}
                    _ => {
                        if let Some((start, p)) = run.take() {
                            self.push_run(
                                &mut out,
                                Point2::new(a, self.bands[start]),
                                Point2::new(a, self.bands[band]),
                                p,
                            );
                        }
                        if band < n_bands && pair[0] != pair[1] {
                            run = Some((band, pair));
                        }
                    }
                }
            }
        }

        // Horizontal lines: every band boundary, walked column by column.
        for j in 0..=n_bands {
            let b = self.bands[j];
            let mut bounds: Vec<i64> = self.columns.keys().copied().collect();
            bounds.push(self.end_q);
            let mut run: Option<(f64, [Option<usize>; 2])> = None;
            for w in bounds.windows(2) {
                let below = if j > 0 { self.tag_at(w[0], j - 1) } else { None };
                let above = if j < n_bands { self.tag_at(w[0], j) } else { None };
                let pair = [below, above];
                match run {
                    Some((_, p)) if p == pair => {}
                    _ => {
                        if let Some((start, p)) = run.take() {
                            self.push_run(
                                &mut out,
                                Point2::new(start, b),
                                Point2::new(unquant(w[0]), b),
                                p,
                            );
                        }
                        if pair[0] != pair[1] {
                            run = Some((unquant(w[0]), pair));
                        }
                    }
                }
            }
            if let Some((start, p)) = run.take() {
                self.push_run(
                    &mut out,
                    Point2::new(start, b),
                    Point2::new(unquant(self.end_q), b),
                    p,
                );
            }
        }

        trace!(curves = out.len(), "candy-bar emission");
        out
    }

    fn push_run(&self, out: &mut Vec<GridSegment>, from: Point2, to: Point2, p: [Option<usize>; 2]) {
        if (to - from).norm() < self.small_cut {
            return;
        }
        out.push(GridSegment {
            from,
            to,
            neighbors: p,
        });
    }
}
