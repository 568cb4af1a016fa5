// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Extents: the concrete result of resolving a region.

An extent is a sorted cable list in which overlapping or touching cables on
one branch have been merged. Zero-length cables survive unless another
cable covers them.
*/

use crate::morphology::Morphology;
use crate::primitives::{dist_loc, prox_loc, Cable, CableList, Location};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    cables: CableList,
}

impl Extent {
    /// Canonicalize an arbitrary cable list
    pub fn new(mut cables: CableList) -> Self {
        cables.sort();
        let mut merged: CableList = Vec::with_capacity(cables.len());
        for c in cables {
            match merged.last_mut() {
                Some(last) if last.branch == c.branch && c.prox_pos <= last.dist_pos => {
                    last.dist_pos = last.dist_pos.max(c.dist_pos);
                }
                _ => merged.push(c),
            }
        }
        Self { cables: merged }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Every branch of the morphology, end to end
    pub fn whole(m: &Morphology) -> Self {
        Self {
            cables: (0..m.num_branches() as u32).map(Cable::whole).collect(),
        }
    }

    pub fn cables(&self) -> &[Cable] {
        &self.cables
    }

    pub fn into_cables(self) -> CableList {
        self.cables
    }

    pub fn is_empty(&self) -> bool {
        self.cables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cables.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cable> {
        self.cables.iter()
    }

    /// True if some cable covers the location
    pub fn contains(&self, loc: &Location) -> bool {
        self.cables.iter().any(|c| c.contains(loc))
    }
}

impl<'a> IntoIterator for &'a Extent {
    type Item = &'a Cable;
    type IntoIter = std::slice::Iter<'a, Cable>;

    fn into_iter(self) -> Self::IntoIter {
        self.cables.iter()
    }
}

/// The head of a non-top-level branch is the same point as its parent's tail
pub fn canonical(m: &Morphology, loc: Location) -> Location {
    let parent = m.branch_parent(loc.branch);
    if loc.pos == 0.0 && parent != crate::primitives::NPOS {
        Location::new_unchecked(parent, 1.0)
    } else {
        loc
    }
}

/// Split an extent into connected components.
///
/// A cable joins an existing component when its canonical head matches the
/// canonical tail of a cable already placed. Two sibling branches meeting
/// at a fork that the extent does not cover stay in separate components.
pub fn components(m: &Morphology, ext: &Extent) -> Vec<Extent> {
    let mut tail_index: AHashMap<Location, usize> = AHashMap::new();
    let mut parts: Vec<CableList> = Vec::new();

    for c in ext {
        let head = canonical(m, prox_loc(c));
        let index = match tail_index.get(&head) {
            Some(&i) => i,
            None => {
                parts.push(Vec::new());
                parts.len() - 1
            }
        };
        parts[index].push(*c);
        tail_index.insert(canonical(m, dist_loc(c)), index);
    }

    parts.into_iter().map(|cables| Extent { cables }).collect()
}

pub fn intersect(a: &Extent, b: &Extent) -> Extent {
    let precedes = |x: &Cable, y: &Cable| {
        x.branch < y.branch || (x.branch == y.branch && x.dist_pos < y.prox_pos)
    };

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while let (Some(x), Some(y)) = (a.cables.get(i), b.cables.get(j)) {
        if precedes(x, y) {
            i += 1;
        } else if precedes(y, x) {
            j += 1;
        } else {
            out.push(Cable::new_unchecked(
                x.branch,
                x.prox_pos.max(y.prox_pos),
                x.dist_pos.min(y.dist_pos),
            ));
            if x.dist_pos < y.dist_pos {
                i += 1;
            } else {
                j += 1;
            }
        }
    }
    Extent::new(out)
}

pub fn join(a: &Extent, b: &Extent) -> Extent {
    let mut cables = a.cables.clone();
    cables.extend_from_slice(&b.cables);
    Extent::new(cables)
}

/// Closure of everything on the morphology not covered by the extent
pub fn complement(m: &Morphology, ext: &Extent) -> Extent {
    let mut out = Vec::new();
    let mut cables = ext.cables.iter().peekable();
    for b in 0..m.num_branches() as u32 {
        let mut pos = 0.0;
        while let Some(c) = cables.next_if(|c| c.branch == b) {
            if c.prox_pos > pos {
                out.push(Cable::new_unchecked(b, pos, c.prox_pos));
            }
            pos = c.dist_pos;
        }
        if pos < 1.0 {
            out.push(Cable::new_unchecked(b, pos, 1.0));
        }
    }
    Extent::new(out)
}

pub fn difference(m: &Morphology, a: &Extent, b: &Extent) -> Extent {
    intersect(a, &complement(m, b))
}
