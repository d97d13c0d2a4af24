//! Subdivision cleanup.
//!
//! Two passes. First, edges separating faces with identical tag data are
//! deleted and the faces merged, with dangling (antenna) edges removed
//! as they appear. Second, degree-2 vertices joining two collinear edges
//! with identical keys are merged away. Both passes are idempotent and
//! safe to re-run after later tag mutations.

use tracing::trace;

use crate::math::polygon_2d::collinear;

use super::{Arrangement, FaceData, FaceId, HalfedgeId};

/// Counters reported by one cleanup run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanStats {
    pub edges_removed: usize,
    pub vertices_merged: usize,
}

/// Merges faces with identical tags and simplifies edge chains.
///
/// `keep_features` lists feature ids that must remain segmented even
/// when both sides carry identical tags.
pub fn clean_block(arr: &mut Arrangement, keep_features: &[u32]) -> CleanStats {
    let mut stats = CleanStats::default();

    let kept = |d: &FaceData| d.feature.is_some_and(|id| keep_features.contains(&id));

    loop {
        let mut changed = false;

        for h in arr.edges() {
            if !arr.halfedges.contains_key(h) {
                continue;
            }
            let t = arr.halfedges[h].twin;
            let f1 = arr.halfedges[h].face;
            let f2 = arr.halfedges[t].face;

            if f1 == f2 {
                if kept(&arr.faces[f1].data) {
                    continue;
                }
                // A same-face edge is removable only when it dangles; a
                // bridge between two cycles of one face must stay.
                if arr.halfedges[h].next == t || arr.halfedges[t].next == h {
                    remove_dangling(arr, h);
                    stats.edges_removed += 1;
                    changed = true;
                }
            } else if arr.faces[f1].data.merges_with(&arr.faces[f2].data)
                && !kept(&arr.faces[f1].data)
            {
                remove_separating(arr, h);
                stats.edges_removed += 1;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    stats.vertices_merged = merge_degree_two(arr);
    trace!(
        edges_removed = stats.edges_removed,
        vertices_merged = stats.vertices_merged,
        "cleaned subdivision"
    );
    stats
}

/// Removes an edge bounding the same face on both sides, where at least
/// one endpoint is a leaf.
fn remove_dangling(arr: &mut Arrangement, mut h: HalfedgeId) {
    let mut t = arr.halfedges[h].twin;
    let f = arr.halfedges[h].face;

    let target_leaf = arr.halfedges[h].next == t;
    let source_leaf = arr.halfedges[t].next == h;

    if target_leaf && source_leaf {
        // Isolated segment: its cycle is a hole of f.
        let vo = arr.halfedges[h].origin;
        let vd = arr.halfedges[t].origin;
        arr.halfedges.remove(h);
        arr.halfedges.remove(t);
        arr.vertices.remove(vo);
        arr.vertices.remove(vd);
        arr.rebuild_face_cycles(f);
        return;
    }

    if !target_leaf {
        std::mem::swap(&mut h, &mut t);
    }
    // Now target(h) is the leaf.
    let p = arr.halfedges[h].prev;
    let n = arr.halfedges[t].next;
    arr.halfedges[p].next = n;
    arr.halfedges[n].prev = p;

    let vo = arr.halfedges[h].origin;
    let vd = arr.halfedges[t].origin;
    arr.vertices[vo].out.retain(|&x| x != h);
    arr.vertices.remove(vd);
    arr.halfedges.remove(h);
    arr.halfedges.remove(t);
    arr.rebuild_face_cycles(f);
}

/// Removes an edge separating two distinct faces and merges them. The
/// unbounded face, when involved, is always the survivor.
fn remove_separating(arr: &mut Arrangement, mut h: HalfedgeId) {
    let mut t = arr.halfedges[h].twin;
    if arr.halfedges[t].face == arr.unbounded {
        std::mem::swap(&mut h, &mut t);
    }
    let survivor = arr.halfedges[h].face;
    let doomed = arr.halfedges[t].face;
    debug_assert_ne!(survivor, doomed);

    let ph = arr.halfedges[h].prev;
    let nh = arr.halfedges[h].next;
    let pt = arr.halfedges[t].prev;
    let nt = arr.halfedges[t].next;
    arr.halfedges[ph].next = nt;
    arr.halfedges[nt].prev = ph;
    arr.halfedges[pt].next = nh;
    arr.halfedges[nh].prev = pt;

    let reassign: Vec<HalfedgeId> = arr
        .halfedges
        .iter()
        .filter(|(_, he)| he.face == doomed)
        .map(|(id, _)| id)
        .collect();
    for id in reassign {
        arr.halfedges[id].face = survivor;
    }

    for he in [h, t] {
        let vo = arr.halfedges[he].origin;
        arr.vertices[vo].out.retain(|&x| x != he);
        if arr.vertices[vo].out.is_empty() {
            arr.vertices.remove(vo);
        }
    }
    arr.halfedges.remove(h);
    arr.halfedges.remove(t);
    arr.faces.remove(doomed);
    arr.rebuild_face_cycles(survivor);
}

/// Merges away degree-2 vertices whose two incident edges are collinear
/// and carry identical keys. One pass over the vertex set.
fn merge_degree_two(arr: &mut Arrangement) -> usize {
    let mut merged = 0;
    let vids: Vec<_> = arr.vertices.keys().collect();

    for v in vids {
        if !arr.vertices.contains_key(v) || arr.vertices[v].out.len() != 2 {
            continue;
        }
        let o1 = arr.vertices[v].out[0];
        let o2 = arr.vertices[v].out[1];
        let e1 = arr.halfedges[o1].twin; // a -> v
        let t2 = arr.halfedges[o2].twin; // b -> v
        let a = arr.halfedges[e1].origin;
        let b = arr.halfedges[t2].origin;
        if a == v || b == v || a == b {
            continue;
        }
        if arr.halfedges[e1].keys != arr.halfedges[o2].keys {
            continue;
        }
        if !collinear(arr.vertices[a].loc, arr.vertices[v].loc, arr.vertices[b].loc) {
            continue;
        }

        // e1 absorbs o2 (v -> b); t2 absorbs o1 (v -> a).
        let n2 = arr.halfedges[o2].next;
        let n1 = arr.halfedges[o1].next;
        arr.halfedges[e1].next = n2;
        arr.halfedges[n2].prev = e1;
        arr.halfedges[t2].next = n1;
        arr.halfedges[n1].prev = t2;
        arr.halfedges[e1].twin = t2;
        arr.halfedges[t2].twin = e1;

        let fa = arr.halfedges[e1].face;
        let fb = arr.halfedges[t2].face;
        arr.halfedges.remove(o1);
        arr.halfedges.remove(o2);
        arr.vertices.remove(v);
        arr.rebuild_face_cycles(fa);
        if fb != fa {
            arr.rebuild_face_cycles(fb);
        }
        merged += 1;
    }
    merged
}
