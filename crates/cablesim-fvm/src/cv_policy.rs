// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
CV policies choose where control volume boundaries fall.

A policy produces a set of boundary points. The CV geometry builder turns
each point into the head of a CV and walks distally from it; see
[`crate::geometry`].
*/

use crate::cell::CableCell;
use crate::error::{FvmError, FvmResult};
use cablesim_config::{CvPolicyKind, CvPolicySpec};
use cablesim_morph::{primitives, Location, LocationList, Locset, Provider, Thingify};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CvPolicy {
    /// One CV for the whole cell
    Single,
    /// `n` CVs of equal proportional length per branch
    FixedPerBranch(u32),
    /// Enough CVs per branch that none is longer than the given length in µm
    MaxExtent(f64),
    /// One CV per segment
    EverySegment,
    /// Boundaries at the points of a locset
    Explicit(Locset),
}

impl Default for CvPolicy {
    fn default() -> Self {
        CvPolicy::FixedPerBranch(1)
    }
}

impl From<&CvPolicySpec> for CvPolicy {
    fn from(spec: &CvPolicySpec) -> Self {
        match spec.policy {
            CvPolicyKind::Single => CvPolicy::Single,
            CvPolicyKind::FixedPerBranch => CvPolicy::FixedPerBranch(spec.per_branch),
            CvPolicyKind::MaxExtent => CvPolicy::MaxExtent(spec.max_extent),
            CvPolicyKind::EverySegment => CvPolicy::EverySegment,
        }
    }
}

impl fmt::Display for CvPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvPolicy::Single => write!(f, "(single)"),
            CvPolicy::FixedPerBranch(n) => write!(f, "(fixed-per-branch {})", n),
            CvPolicy::MaxExtent(len) => write!(f, "(max-extent {})", len),
            CvPolicy::EverySegment => write!(f, "(every-segment)"),
            CvPolicy::Explicit(ls) => write!(f, "(explicit {})", ls),
        }
    }
}

impl CvPolicy {
    /// Sorted, deduplicated boundary points on the cell
    pub fn cv_boundary_points(&self, cell: &CableCell) -> FvmResult<LocationList> {
        let morphology = cell.morphology();
        let embedding = cell.embedding();
        let nb = morphology.num_branches() as u32;

        let points = match self {
            CvPolicy::Single => vec![Location::new_unchecked(0, 0.0)],
            CvPolicy::FixedPerBranch(n) => {
                if *n == 0 {
                    return Err(FvmError::InvalidCvPolicy(
                        "fixed-per-branch needs at least one CV per branch".to_string(),
                    ));
                }
                (0..nb).flat_map(|b| evenly_spaced(b, *n)).collect()
            }
            CvPolicy::MaxExtent(len) => {
                if !(*len > 0.0 && len.is_finite()) {
                    return Err(FvmError::InvalidCvPolicy(format!(
                        "max-extent must be positive, got {}",
                        len
                    )));
                }
                (0..nb)
                    .flat_map(|b| {
                        let n = (embedding.branch_length(b) / len).ceil().max(1.0) as u32;
                        evenly_spaced(b, n)
                    })
                    .collect()
            }
            CvPolicy::EverySegment => embedding.segment_ends().to_vec(),
            CvPolicy::Explicit(ls) => ls.thingify(cell.provider())?,
        };

        Ok(primitives::support(points))
    }
}

fn evenly_spaced(branch: u32, n: u32) -> impl Iterator<Item = Location> {
    (0..n).map(move |i| Location::new_unchecked(branch, i as f64 / n as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Decor;
    use cablesim_morph::{LabelDict, Morphology, Point, SegmentTree, NPOS};

    fn two_branch_cell() -> CableCell {
        let mut t = SegmentTree::new();
        let s = t
            .append(NPOS, Point::new(0.0, 0.0, 0.0, 1.0), Point::new(30.0, 0.0, 0.0, 1.0), 3)
            .unwrap();
        let s = t.append_from_parent(s, Point::new(45.0, 0.0, 0.0, 1.0), 3).unwrap();
        t.append_from_parent(s, Point::new(45.0, 10.0, 0.0, 1.0), 3).unwrap();
        t.append_from_parent(s, Point::new(45.0, -10.0, 0.0, 1.0), 3).unwrap();
        CableCell::new(Morphology::new(t), &LabelDict::new(), Decor::new()).unwrap()
    }

    #[test]
    fn test_fixed_per_branch_points() {
        let cell = two_branch_cell();
        let points = CvPolicy::FixedPerBranch(3).cv_boundary_points(&cell).unwrap();
        assert_eq!(points.len(), 9);
        assert_eq!(points[1], Location::new_unchecked(0, 1.0 / 3.0));
        assert!(CvPolicy::FixedPerBranch(0).cv_boundary_points(&cell).is_err());
    }

    #[test]
    fn test_max_extent_points() {
        let cell = two_branch_cell();
        // branch 0 is 45 µm long, the two children 10 µm
        let points = CvPolicy::MaxExtent(20.0).cv_boundary_points(&cell).unwrap();
        assert_eq!(points.iter().filter(|l| l.branch == 0).count(), 3);
        assert_eq!(points.iter().filter(|l| l.branch == 1).count(), 1);
        assert!(CvPolicy::MaxExtent(-1.0).cv_boundary_points(&cell).is_err());
    }

    #[test]
    fn test_every_segment_points() {
        let cell = two_branch_cell();
        let points = CvPolicy::EverySegment.cv_boundary_points(&cell).unwrap();
        assert!(points.contains(&Location::new_unchecked(0, 30.0 / 45.0)));
    }

    #[test]
    fn test_from_spec() {
        let spec = CvPolicySpec::default();
        assert_eq!(CvPolicy::from(&spec), CvPolicy::FixedPerBranch(1));
        assert_eq!(CvPolicy::MaxExtent(10.0).to_string(), "(max-extent 10)");
    }
}
