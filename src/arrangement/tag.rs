//! Toggle-fill face tagging.
//!
//! Generalized even-odd fill over any number of possibly-overlapping
//! source polygons, each identified by its curve key. A breadth-first
//! walk from the unbounded face carries a set of toggled-on keys across
//! edges; each face is tagged from the highest key still on when the
//! walk first reaches it, so later-inserted polygons shadow earlier ones.

use std::collections::{BTreeSet, HashSet, VecDeque};

use super::{Arrangement, FaceData, FaceId};

pub fn apply_tags(arr: &mut Arrangement, feature_map: &[FaceData], unbounded_idx: Option<usize>) {
    let mut seed: BTreeSet<usize> = BTreeSet::new();
    if let Some(i) = unbounded_idx {
        if i < feature_map.len() {
            seed.insert(i);
        }
    }

    let mut visited: HashSet<FaceId> = HashSet::new();
    let mut queue: VecDeque<(FaceId, BTreeSet<usize>)> = VecDeque::new();
    visited.insert(arr.unbounded);
    queue.push_back((arr.unbounded, seed));

    while let Some((f, set)) = queue.pop_front() {
        arr.faces[f].data = set
            .iter()
            .next_back()
            .and_then(|&i| feature_map.get(i))
            .cloned()
            .unwrap_or_default();

        for h in arr.face_halfedges(f) {
            let g = arr.halfedges[arr.halfedges[h].twin].face;
            if g == f || visited.contains(&g) || !arr.faces.contains_key(g) {
                continue;
            }
            let mut crossed = set.clone();
            for &k in &arr.halfedges[h].keys {
                if !crossed.remove(&k) {
                    crossed.insert(k);
                }
            }
            visited.insert(g);
            queue.push_back((g, crossed));
        }
    }
    // Faces disconnected from the seed keep their default empty tag.
}
