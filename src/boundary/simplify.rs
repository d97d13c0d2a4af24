//! Polyline and ring reduction under an error bound.
//!
//! Two variants share the same contract (output is a subsequence of the
//! input, locked points always survive, every removed point deviates from
//! its surviving neighbor segment by less than the bound):
//!
//! - [`simplify_ring`] — priority-queue driven closed-ring reduction.
//!   Rings have no fixed endpoints, so points are retired cheapest-first
//!   with errors recomputed lazily as neighbors change.
//! - [`douglas_peucker`] — one-shot recursive reduction for open paths
//!   with fixed endpoints.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Heap entry ordered by error, then index for determinism.
#[derive(Debug, PartialEq)]
struct QueueEntry {
    err: f64,
    idx: usize,
    stamp: u64,
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.err
            .total_cmp(&other.err)
            .then(self.idx.cmp(&other.idx))
    }
}

/// Reduces a closed ring, never removing locked points.
///
/// `measure(a, b, x)` is the squared error induced by removing `x` when
/// `a` and `b` become its surviving neighbors; `eps_sq` is the squared
/// bound. At least 3 points always survive.
pub fn simplify_ring<T: Clone>(
    ring: &[T],
    eps_sq: f64,
    locked: &dyn Fn(&T) -> bool,
    measure: &dyn Fn(&T, &T, &T) -> f64,
) -> Vec<T> {
    let n = ring.len();
    if n <= 3 {
        return ring.to_vec();
    }

    let mut prev: Vec<usize> = (0..n).map(|i| (i + n - 1) % n).collect();
    let mut next: Vec<usize> = (0..n).map(|i| (i + 1) % n).collect();
    let mut alive = vec![true; n];
    let mut stamp = vec![0_u64; n];
    let mut alive_count = n;

    let mut heap: BinaryHeap<Reverse<QueueEntry>> = BinaryHeap::new();
    let push = |heap: &mut BinaryHeap<Reverse<QueueEntry>>,
                ring: &[T],
                prev: &[usize],
                next: &[usize],
                stamp: &[u64],
                i: usize| {
        heap.push(Reverse(QueueEntry {
            err: measure(&ring[prev[i]], &ring[next[i]], &ring[i]),
            idx: i,
            stamp: stamp[i],
        }));
    };

    for i in 0..n {
        if !locked(&ring[i]) {
            push(&mut heap, ring, &prev, &next, &stamp, i);
        }
    }

    while let Some(Reverse(entry)) = heap.pop() {
        let i = entry.idx;
        if !alive[i] || entry.stamp != stamp[i] {
            continue; // stale entry, error was recomputed
        }
        if entry.err >= eps_sq || alive_count <= 3 {
            break;
        }

        alive[i] = false;
        alive_count -= 1;
        let (p, q) = (prev[i], next[i]);
        next[p] = q;
        prev[q] = p;

        for j in [p, q] {
            if alive[j] && !locked(&ring[j]) {
                stamp[j] += 1;
                push(&mut heap, ring, &prev, &next, &stamp, j);
            }
        }
    }

    ring.iter()
        .zip(&alive)
        .filter(|(_, a)| **a)
        .map(|(t, _)| t.clone())
        .collect()
}

/// Recursive Douglas-Peucker reduction of `pts[start..=stop]`, emitting
/// the reduced interval starts into `out` (the final point of the whole
/// path is never emitted; ring callers rely on that to drop the closing
/// duplicate).
fn dp_recurse<T: Clone>(
    pts: &[T],
    start: usize,
    stop: usize,
    out: &mut Vec<T>,
    eps_sq: f64,
    locked: &dyn Fn(&T) -> bool,
    measure: &dyn Fn(&T, &T, &T) -> f64,
    equal: &dyn Fn(&T, &T) -> bool,
) {
    if start == stop {
        return;
    }

    if equal(&pts[start], &pts[stop]) {
        // Closed sub-loop: split it so it cannot collapse to one point.
        // Prefer a locked split point; otherwise use the midpoint.
        let n = stop - start;
        if n == 1 {
            return;
        }
        for p in start + 1..stop {
            if locked(&pts[p]) {
                dp_recurse(pts, start, p, out, eps_sq, locked, measure, equal);
                dp_recurse(pts, p, stop, out, eps_sq, locked, measure, equal);
                return;
            }
        }
        let mid = start + n / 2;
        dp_recurse(pts, start, mid, out, eps_sq, locked, measure, equal);
        dp_recurse(pts, mid, stop, out, eps_sq, locked, measure, equal);
        return;
    }

    let mut max_d = 0.0;
    let mut worst = stop;
    for p in start + 1..stop {
        if locked(&pts[p]) {
            dp_recurse(pts, start, p, out, eps_sq, locked, measure, equal);
            dp_recurse(pts, p, stop, out, eps_sq, locked, measure, equal);
            return;
        }
        let d = measure(&pts[start], &pts[stop], &pts[p]);
        if d > max_d {
            max_d = d;
            worst = p;
        }
    }

    if max_d >= eps_sq {
        dp_recurse(pts, start, worst, out, eps_sq, locked, measure, equal);
        dp_recurse(pts, worst, stop, out, eps_sq, locked, measure, equal);
    } else {
        out.push(pts[start].clone());
    }
}

/// One-shot open-path reduction with fixed endpoints.
///
/// The input's first and last points always survive. If the path is a
/// closed loop (`equal(first, last)`) with no locked interior point, it is
/// split at its midpoint before recursing so the loop never collapses to
/// a single point.
pub fn douglas_peucker<T: Clone>(
    pts: &[T],
    eps_sq: f64,
    locked: &dyn Fn(&T) -> bool,
    measure: &dyn Fn(&T, &T, &T) -> f64,
    equal: &dyn Fn(&T, &T) -> bool,
) -> Vec<T> {
    if pts.len() < 3 {
        return pts.to_vec();
    }
    let mut out = Vec::with_capacity(pts.len());
    dp_recurse(
        pts,
        0,
        pts.len() - 1,
        &mut out,
        eps_sq,
        locked,
        measure,
        equal,
    );
    out.push(pts[pts.len() - 1].clone());
    out
}
