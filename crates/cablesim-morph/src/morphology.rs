// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Branch-level view of a segment tree.

A branch is a maximal chain of segments with no fork inside it. A segment
starts a new branch when it is a root segment or its parent segment has
more than one child. Branch ids are handed out depth-first, so a parent
branch always has a smaller id than its children.
*/

use crate::primitives::{Location, LocationList, NPOS};
use crate::segment_tree::{Segment, SegmentTree};
use ahash::AHashSet;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct MorphologyInner {
    tree: SegmentTree,
    branch_parents: Vec<u32>,
    branch_children: Vec<Vec<u32>>,
    root_children: Vec<u32>,
    terminal_branches: Vec<u32>,
    branch_segments: Vec<Vec<u32>>,
    segment_branch: Vec<u32>,
}

/// Immutable branch description of a cell, cheap to clone and share across threads
#[derive(Debug, Clone)]
pub struct Morphology {
    inner: Arc<MorphologyInner>,
}

impl Morphology {
    pub fn new(tree: SegmentTree) -> Self {
        let nseg = tree.size();
        let parents = tree.parents();

        let mut seg_children: Vec<Vec<u32>> = vec![Vec::new(); nseg];
        let mut roots = Vec::new();
        for (i, &p) in parents.iter().enumerate() {
            if p == NPOS {
                roots.push(i as u32);
            } else {
                seg_children[p as usize].push(i as u32);
            }
        }

        let mut branch_parents = Vec::new();
        let mut branch_segments: Vec<Vec<u32>> = Vec::new();
        let mut segment_branch = vec![NPOS; nseg];

        // (head segment, parent branch)
        let mut stack: Vec<(u32, u32)> = roots.iter().rev().map(|&s| (s, NPOS)).collect();
        while let Some((head, parent)) = stack.pop() {
            let id = branch_parents.len() as u32;
            branch_parents.push(parent);

            let mut segs = Vec::new();
            let mut cur = head;
            loop {
                segs.push(cur);
                segment_branch[cur as usize] = id;
                match seg_children[cur as usize].as_slice() {
                    [only] => cur = *only,
                    children => {
                        stack.extend(children.iter().rev().map(|&c| (c, id)));
                        break;
                    }
                }
            }
            branch_segments.push(segs);
        }

        let nbranch = branch_parents.len();
        let mut branch_children: Vec<Vec<u32>> = vec![Vec::new(); nbranch];
        let mut root_children = Vec::new();
        for (b, &p) in branch_parents.iter().enumerate() {
            if p == NPOS {
                root_children.push(b as u32);
            } else {
                branch_children[p as usize].push(b as u32);
            }
        }
        let terminal_branches = (0..nbranch as u32)
            .filter(|&b| branch_children[b as usize].is_empty())
            .collect();

        trace!(
            target: "cablesim-morph",
            segments = nseg,
            branches = nbranch,
            "built morphology"
        );

        Self {
            inner: Arc::new(MorphologyInner {
                tree,
                branch_parents,
                branch_children,
                root_children,
                terminal_branches,
                branch_segments,
                segment_branch,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.branch_parents.is_empty()
    }

    pub fn num_branches(&self) -> usize {
        self.inner.branch_parents.len()
    }

    pub fn num_segments(&self) -> usize {
        self.inner.tree.size()
    }

    /// Parent branch, `NPOS` for a top-level branch
    pub fn branch_parent(&self, b: u32) -> u32 {
        self.inner
            .branch_parents
            .get(b as usize)
            .copied()
            .unwrap_or(NPOS)
    }

    /// Children of a branch; `NPOS` gives the top-level branches
    pub fn branch_children(&self, b: u32) -> &[u32] {
        if b == NPOS {
            return &self.inner.root_children;
        }
        self.inner
            .branch_children
            .get(b as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn branch_parents(&self) -> &[u32] {
        &self.inner.branch_parents
    }

    pub fn terminal_branches(&self) -> &[u32] {
        &self.inner.terminal_branches
    }

    /// Segment ids of a branch, proximal to distal
    pub fn branch_segments(&self, b: u32) -> &[u32] {
        self.inner
            .branch_segments
            .get(b as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn segment_branch(&self, seg: u32) -> Option<u32> {
        self.inner.segment_branch.get(seg as usize).copied()
    }

    pub fn segments(&self) -> &[Segment] {
        self.inner.tree.segments()
    }

    pub fn segment_tree(&self) -> &SegmentTree {
        &self.inner.tree
    }

    /// True if `anc` is `b` or one of its ancestors
    pub fn is_ancestor_or_self(&self, anc: u32, mut b: u32) -> bool {
        while b != NPOS {
            if b == anc {
                return true;
            }
            b = self.branch_parent(b);
        }
        false
    }
}

/// Most proximal subset: drop every location with an ancestor in the list
pub fn minset(m: &Morphology, input: &[Location]) -> LocationList {
    let mut sorted = input.to_vec();
    sorted.sort();

    let mut out = Vec::new();
    let mut stack: Vec<u32> = m.branch_children(NPOS).to_vec();
    while let Some(branch) = stack.pop() {
        let idx = sorted.partition_point(|l| *l < Location::new_unchecked(branch, 0.0));
        match sorted.get(idx) {
            Some(loc) if loc.branch == branch => out.push(*loc),
            _ => stack.extend_from_slice(m.branch_children(branch)),
        }
    }
    out.sort();
    out
}

/// Most distal subset: drop every location with a descendant in the list
pub fn maxset(m: &Morphology, input: &[Location]) -> LocationList {
    let mut sorted = input.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));

    let mut out = Vec::new();
    let mut seen: AHashSet<u32> = AHashSet::new();
    for loc in sorted {
        if seen.contains(&loc.branch) {
            continue;
        }
        out.push(loc);
        let mut b = loc.branch;
        while b != NPOS && seen.insert(b) {
            b = m.branch_parent(b);
        }
    }
    out.reverse();
    out
}

/// True if `a` lies on the path from the root to `b`
pub fn location_precedes(m: &Morphology, a: &Location, b: &Location) -> bool {
    if a.branch == b.branch {
        return a.pos <= b.pos;
    }
    m.is_ancestor_or_self(a.branch, m.branch_parent(b.branch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Point;

    fn p(x: f64) -> Point {
        Point::new(x, 0.0, 0.0, 1.0)
    }

    //   seg 0 -> seg 1 -> {seg 2 -> seg 3, seg 4}
    fn forked() -> Morphology {
        let mut t = SegmentTree::new();
        let s0 = t.append(NPOS, p(0.0), p(1.0), 1).unwrap();
        let s1 = t.append_from_parent(s0, p(2.0), 3).unwrap();
        let s2 = t.append_from_parent(s1, p(3.0), 3).unwrap();
        t.append_from_parent(s2, p(4.0), 3).unwrap();
        t.append_from_parent(s1, p(5.0), 3).unwrap();
        Morphology::new(t)
    }

    #[test]
    fn test_branch_assignment() {
        let m = forked();
        assert_eq!(m.num_branches(), 3);
        assert_eq!(m.branch_segments(0), &[0, 1]);
        assert_eq!(m.branch_segments(1), &[2, 3]);
        assert_eq!(m.branch_segments(2), &[4]);
        assert_eq!(m.branch_parents(), &[NPOS, 0, 0]);
        assert_eq!(m.branch_children(0), &[1, 2]);
        assert_eq!(m.branch_children(NPOS), &[0]);
        assert_eq!(m.terminal_branches(), &[1, 2]);
        assert_eq!(m.segment_branch(3), Some(1));
    }

    #[test]
    fn test_multiple_roots() {
        let mut t = SegmentTree::new();
        t.append(NPOS, p(0.0), p(1.0), 1).unwrap();
        t.append(NPOS, p(0.0), p(-1.0), 1).unwrap();
        let m = Morphology::new(t);
        assert_eq!(m.num_branches(), 2);
        assert_eq!(m.branch_children(NPOS), &[0, 1]);
    }

    #[test]
    fn test_empty() {
        let m = Morphology::new(SegmentTree::new());
        assert!(m.is_empty());
        assert!(m.terminal_branches().is_empty());
    }

    #[test]
    fn test_minset_maxset() {
        let m = forked();
        let l = |b, p| Location::new_unchecked(b, p);
        let input = vec![l(2, 0.5), l(0, 0.3), l(1, 0.2), l(0, 0.6), l(1, 0.9)];

        assert_eq!(minset(&m, &input), vec![l(0, 0.3)]);
        assert_eq!(maxset(&m, &input), vec![l(1, 0.9), l(2, 0.5)]);

        let siblings = vec![l(1, 0.1), l(2, 0.1)];
        assert_eq!(minset(&m, &siblings), siblings);
        assert_eq!(maxset(&m, &siblings), siblings);
    }

    #[test]
    fn test_precedes() {
        let m = forked();
        let l = |b, p| Location::new_unchecked(b, p);
        assert!(location_precedes(&m, &l(0, 0.2), &l(0, 0.4)));
        assert!(location_precedes(&m, &l(0, 0.2), &l(2, 0.0)));
        assert!(!location_precedes(&m, &l(1, 0.2), &l(2, 0.5)));
    }
}
