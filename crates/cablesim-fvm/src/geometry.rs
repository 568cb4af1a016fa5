// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Control volume geometry.

Every boundary point becomes the head of a CV. A CV grows distally from its
head and stops at the next head on the same branch. At a branch end it
continues into each child branch that does not start a CV of its own.

Two adjustments keep every CV non-trivial:
- a head at the distal end of a terminal branch would own nothing and is
  dropped;
- a head at the distal end of a branch with children is moved to the start
  of each child, so CV boundaries fall on forks.

All top-level branches share the root point and start in the root CV.
*/

use crate::cell::CableCell;
use crate::error::{FvmError, FvmResult};
use cablesim_morph::{Cable, Location, MorphError, Morphology, NPOS};
use std::ops::Range;
use tracing::trace;

/// Tie-break for locations on a CV boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvPrefer {
    /// The CV distal to the boundary
    Distal,
    /// The CV proximal to the boundary
    Proximal,
    /// Distal unless that CV has zero length
    Nonempty,
    /// Distal only if that CV has zero length
    Empty,
}

/// Proportional range of a branch owned by one CV (cell-local index)
#[derive(Debug, Clone, Copy, PartialEq)]
struct CvPiece {
    prox: f64,
    dist: f64,
    cv: u32,
}

/// Per-branch CV pieces of one cell, plus the adjacency needed at forks
#[derive(Debug, Clone, Default, PartialEq)]
struct BranchCvMap {
    parent: Vec<u32>,
    first_child: Vec<u32>,
    pieces: Vec<Vec<CvPiece>>,
}

/// CV layout of a group of cells; CV indices are global across the group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvGeometry {
    pub cv_cables: Vec<Cable>,
    /// `cv_cables[cv_cables_divs[i]..cv_cables_divs[i + 1]]` belong to CV `i`
    pub cv_cables_divs: Vec<usize>,
    /// Parent CV, `NPOS` for the root CV of a cell
    pub cv_parent: Vec<u32>,
    pub cv_head: Vec<Location>,
    pub cv_to_cell: Vec<u32>,
    /// CVs of cell `c` are `cell_cv_divs[c]..cell_cv_divs[c + 1]`
    pub cell_cv_divs: Vec<usize>,
    cv_empty: Vec<bool>,
    branch_cv_map: Vec<BranchCvMap>,
}

impl CvGeometry {
    pub fn new() -> Self {
        Self {
            cv_cables_divs: vec![0],
            cell_cv_divs: vec![0],
            ..Default::default()
        }
    }

    /// Number of CVs
    pub fn size(&self) -> usize {
        self.cv_parent.len()
    }

    pub fn n_cell(&self) -> usize {
        self.cell_cv_divs.len().saturating_sub(1)
    }

    pub fn cell_cvs(&self, cell: usize) -> Range<usize> {
        self.cell_cv_divs[cell]..self.cell_cv_divs[cell + 1]
    }

    pub fn cables(&self, cv: usize) -> &[Cable] {
        &self.cv_cables[self.cv_cables_divs[cv]..self.cv_cables_divs[cv + 1]]
    }

    /// Whether every cable of the CV has zero physical length
    pub fn is_empty_cv(&self, cv: usize) -> bool {
        self.cv_empty[cv]
    }

    /// Append the CVs of another group, renumbering its CVs and cells
    pub fn append(&mut self, other: &CvGeometry) {
        let cv_offset = self.size() as u32;
        let cable_offset = self.cv_cables.len();
        let cell_offset = self.n_cell() as u32;
        let cv_base = *self.cell_cv_divs.last().unwrap_or(&0);

        self.cv_cables.extend_from_slice(&other.cv_cables);
        self.cv_cables_divs
            .extend(other.cv_cables_divs.iter().skip(1).map(|d| d + cable_offset));
        self.cv_parent.extend(
            other
                .cv_parent
                .iter()
                .map(|&p| if p == NPOS { NPOS } else { p + cv_offset }),
        );
        self.cv_head.extend_from_slice(&other.cv_head);
        self.cv_to_cell
            .extend(other.cv_to_cell.iter().map(|c| c + cell_offset));
        self.cell_cv_divs
            .extend(other.cell_cv_divs.iter().skip(1).map(|d| d + cv_base));
        self.cv_empty.extend_from_slice(&other.cv_empty);
        self.branch_cv_map.extend(other.branch_cv_map.iter().cloned());
    }

    /// The CV owning a location on the given cell
    pub fn location_cv(&self, cell: usize, loc: &Location, prefer: CvPrefer) -> FvmResult<u32> {
        let map = self
            .branch_cv_map
            .get(cell)
            .ok_or(FvmError::CellIndexOutOfRange {
                index: cell,
                count: self.n_cell(),
            })?;
        let pieces = map
            .pieces
            .get(loc.branch as usize)
            .ok_or(MorphError::NoSuchBranch(loc.branch))?;
        let base = self.cell_cv_divs[cell] as u32;

        if let Some(pc) = pieces.iter().find(|pc| pc.prox < loc.pos && loc.pos < pc.dist) {
            return Ok(base + pc.cv);
        }

        // On a piece boundary: find the CVs on either side.
        let mut proximal = pieces.iter().find(|pc| pc.dist == loc.pos).map(|pc| pc.cv);
        let mut distal = pieces.iter().find(|pc| pc.prox == loc.pos).map(|pc| pc.cv);
        if proximal.is_none() && loc.pos == 0.0 {
            proximal = map.parent_tail_cv(loc.branch);
        }
        if distal.is_none() && loc.pos == 1.0 {
            distal = map.child_head_cv(loc.branch);
        }

        let choice = match (proximal, distal) {
            (Some(p), Some(d)) if p != d => {
                let d_empty = self.cv_empty[(base + d) as usize];
                match prefer {
                    CvPrefer::Distal => d,
                    CvPrefer::Proximal => p,
                    CvPrefer::Nonempty => {
                        if d_empty {
                            p
                        } else {
                            d
                        }
                    }
                    CvPrefer::Empty => {
                        if d_empty {
                            d
                        } else {
                            p
                        }
                    }
                }
            }
            (Some(cv), _) | (None, Some(cv)) => cv,
            (None, None) => return Err(MorphError::InvalidLocation(*loc).into()),
        };
        Ok(base + choice)
    }
}

impl BranchCvMap {
    fn parent_tail_cv(&self, branch: u32) -> Option<u32> {
        let parent = *self.parent.get(branch as usize)?;
        self.pieces.get(parent as usize)?.last().map(|pc| pc.cv)
    }

    fn child_head_cv(&self, branch: u32) -> Option<u32> {
        let child = *self.first_child.get(branch as usize)?;
        self.pieces.get(child as usize)?.first().map(|pc| pc.cv)
    }
}

/// CV geometry of a single cell from its boundary points
pub fn cv_geometry(cell: &CableCell, boundaries: &[Location]) -> FvmResult<CvGeometry> {
    let m = cell.morphology();
    let embedding = cell.embedding();
    let nb = m.num_branches();

    let mut geom = CvGeometry::new();
    let mut map = BranchCvMap {
        parent: m.branch_parents().to_vec(),
        first_child: (0..nb as u32)
            .map(|b| m.branch_children(b).first().copied().unwrap_or(NPOS))
            .collect(),
        pieces: vec![Vec::new(); nb],
    };

    let top_level = m.branch_children(NPOS);
    let Some(&first_top) = top_level.first() else {
        geom.branch_cv_map.push(map);
        geom.cell_cv_divs.push(0);
        return Ok(geom);
    };

    let heads = cv_heads(m, boundaries)?;
    let is_head = |l: &Location| heads.binary_search(l).is_ok();
    let next_head = |b: u32, pos: f64| {
        let i = heads.partition_point(|h| h.branch < b || (h.branch == b && h.pos <= pos));
        heads.get(i).filter(|h| h.branch == b).map(|h| h.pos)
    };

    // Depth first, so a CV is numbered after its parent.
    let mut stack = vec![(Location::new_unchecked(first_top, 0.0), NPOS)];
    while let Some((head, parent)) = stack.pop() {
        let cv = geom.cv_parent.len() as u32;
        let mut fronts: Vec<Location> = if parent == NPOS {
            top_level
                .iter()
                .map(|&t| Location::new_unchecked(t, 0.0))
                .collect()
        } else {
            vec![head]
        };

        let mut cables = Vec::new();
        let mut child_heads = Vec::new();
        while let Some(front) = fronts.pop() {
            let b = front.branch;
            match next_head(b, front.pos) {
                Some(pos) => {
                    cables.push(Cable::new_unchecked(b, front.pos, pos));
                    child_heads.push(Location::new_unchecked(b, pos));
                }
                None => {
                    cables.push(Cable::new_unchecked(b, front.pos, 1.0));
                    for &c in m.branch_children(b) {
                        let start = Location::new_unchecked(c, 0.0);
                        if is_head(&start) {
                            child_heads.push(start);
                        } else {
                            fronts.push(start);
                        }
                    }
                }
            }
        }
        cables.sort();

        for c in &cables {
            map.pieces[c.branch as usize].push(CvPiece {
                prox: c.prox_pos,
                dist: c.dist_pos,
                cv,
            });
        }
        geom.cv_empty
            .push(cables.iter().all(|c| embedding.integrate_length(c) == 0.0));
        geom.cv_cables.extend(cables);
        geom.cv_cables_divs.push(geom.cv_cables.len());
        geom.cv_parent.push(parent);
        geom.cv_head.push(head);
        geom.cv_to_cell.push(0);

        child_heads.sort();
        stack.extend(child_heads.into_iter().rev().map(|h| (h, cv)));
    }

    for pieces in &mut map.pieces {
        pieces.sort_by(|a, b| a.prox.total_cmp(&b.prox));
    }
    geom.branch_cv_map.push(map);
    geom.cell_cv_divs.push(geom.cv_parent.len());

    trace!(target: "cablesim-fvm", "CV geometry: {} heads, {} CVs", heads.len(), geom.size());
    Ok(geom)
}

/// Normalized CV heads: root points removed, fork tails moved onto the
/// children, terminal tails dropped
fn cv_heads(m: &Morphology, boundaries: &[Location]) -> FvmResult<Vec<Location>> {
    let nb = m.num_branches();
    let mut heads = Vec::with_capacity(boundaries.len());
    for loc in boundaries {
        if loc.branch as usize >= nb {
            return Err(MorphError::NoSuchBranch(loc.branch).into());
        }
        if loc.pos == 0.0 && m.branch_parent(loc.branch) == NPOS {
            continue;
        }
        if loc.pos == 1.0 {
            heads.extend(
                m.branch_children(loc.branch)
                    .iter()
                    .map(|&c| Location::new_unchecked(c, 0.0)),
            );
        } else {
            heads.push(*loc);
        }
    }
    heads.sort();
    heads.dedup();
    Ok(heads)
}
