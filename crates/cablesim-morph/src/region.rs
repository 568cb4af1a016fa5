// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Region expressions.

A region describes a set of sub-intervals of a morphology. Expressions are
immutable trees that share sub-expressions through `Arc`; they only touch a
concrete morphology when resolved through a [`Provider`].
*/

use crate::embedding::RadiusCmp;
use crate::error::{MorphError, MorphResult};
use crate::extent::{self, Extent};
use crate::locset::Locset;
use crate::morphology::Morphology;
use crate::primitives::{test_cable_invariants, Cable, FmtReal, NPOS};
use crate::provider::{Provider, Thingify};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Region {
    #[default]
    Nil,
    Cable(Cable),
    CableList(Vec<Cable>),
    Branch(u32),
    Segment(u32),
    Tagged(i32),
    All,
    Named(String),
    DistalInterval { start: Arc<Locset>, distance: f64 },
    ProximalInterval { end: Arc<Locset>, distance: f64 },
    Radius {
        region: Arc<Region>,
        op: RadiusCmp,
        value: f64,
    },
    Complete(Arc<Region>),
    Intersect(Arc<Region>, Arc<Region>),
    Join(Arc<Region>, Arc<Region>),
    Complement(Arc<Region>),
    Difference(Arc<Region>, Arc<Region>),
}

impl Region {
    pub fn nil() -> Self {
        Region::Nil
    }

    pub fn cable(branch: u32, prox: f64, dist: f64) -> MorphResult<Self> {
        Cable::new(branch, prox, dist).map(Region::Cable)
    }

    pub fn cable_list(cables: Vec<Cable>) -> MorphResult<Self> {
        cables.iter().try_for_each(test_cable_invariants)?;
        Ok(Region::CableList(cables))
    }

    pub fn branch(b: u32) -> Self {
        Region::Branch(b)
    }

    pub fn segment(s: u32) -> Self {
        Region::Segment(s)
    }

    pub fn tagged(tag: i32) -> Self {
        Region::Tagged(tag)
    }

    pub fn all() -> Self {
        Region::All
    }

    pub fn named(name: impl Into<String>) -> Self {
        Region::Named(name.into())
    }

    /// Everything within `distance` µm distal of each start point
    pub fn distal_interval(start: Locset, distance: f64) -> Self {
        Region::DistalInterval {
            start: Arc::new(start),
            distance,
        }
    }

    /// Everything within `distance` µm proximal of each end point
    pub fn proximal_interval(end: Locset, distance: f64) -> Self {
        Region::ProximalInterval {
            end: Arc::new(end),
            distance,
        }
    }

    pub fn radius(region: Region, op: RadiusCmp, value: f64) -> Self {
        Region::Radius {
            region: Arc::new(region),
            op,
            value,
        }
    }

    pub fn radius_lt(region: Region, value: f64) -> Self {
        Self::radius(region, RadiusCmp::Lt, value)
    }

    pub fn radius_le(region: Region, value: f64) -> Self {
        Self::radius(region, RadiusCmp::Le, value)
    }

    pub fn radius_gt(region: Region, value: f64) -> Self {
        Self::radius(region, RadiusCmp::Gt, value)
    }

    pub fn radius_ge(region: Region, value: f64) -> Self {
        Self::radius(region, RadiusCmp::Ge, value)
    }

    pub fn complete(region: Region) -> Self {
        Region::Complete(Arc::new(region))
    }

    pub fn intersect(lhs: Region, rhs: Region) -> Self {
        Region::Intersect(Arc::new(lhs), Arc::new(rhs))
    }

    pub fn join(lhs: Region, rhs: Region) -> Self {
        Region::Join(Arc::new(lhs), Arc::new(rhs))
    }

    pub fn complement(region: Region) -> Self {
        Region::Complement(Arc::new(region))
    }

    pub fn difference(lhs: Region, rhs: Region) -> Self {
        Region::Difference(Arc::new(lhs), Arc::new(rhs))
    }
}

impl From<Cable> for Region {
    fn from(c: Cable) -> Self {
        Region::Cable(c)
    }
}

/// A resolved extent used as a literal
impl From<Extent> for Region {
    fn from(e: Extent) -> Self {
        Region::CableList(e.into_cables())
    }
}

impl std::ops::BitAnd for Region {
    type Output = Region;

    fn bitand(self, rhs: Region) -> Region {
        Region::intersect(self, rhs)
    }
}

impl std::ops::BitOr for Region {
    type Output = Region;

    fn bitor(self, rhs: Region) -> Region {
        Region::join(self, rhs)
    }
}

fn check_branch(m: &Morphology, b: u32) -> MorphResult<()> {
    if (b as usize) < m.num_branches() {
        Ok(())
    } else {
        Err(MorphError::NoSuchBranch(b))
    }
}

/// Add the zero-length cables at every point adjacent to the extent
pub fn complete(m: &Morphology, ext: &Extent) -> Extent {
    let mut out = Vec::with_capacity(ext.len());
    for c in ext {
        out.push(*c);
        if c.prox_pos == 0.0 {
            let parent = m.branch_parent(c.branch);
            if parent != NPOS {
                out.push(Cable::new_unchecked(parent, 1.0, 1.0));
            }
            out.extend(
                m.branch_children(parent)
                    .iter()
                    .map(|&s| Cable::new_unchecked(s, 0.0, 0.0)),
            );
        }
        if c.dist_pos == 1.0 {
            out.extend(
                m.branch_children(c.branch)
                    .iter()
                    .map(|&s| Cable::new_unchecked(s, 0.0, 0.0)),
            );
        }
    }
    Extent::new(out)
}

impl Thingify for Region {
    type Output = Extent;

    fn thingify<P: Provider + ?Sized>(&self, p: &P) -> MorphResult<Extent> {
        let m = p.morphology();
        match self {
            Region::Nil => Ok(Extent::empty()),
            Region::Cable(c) => {
                check_branch(m, c.branch)?;
                Ok(Extent::new(vec![*c]))
            }
            Region::CableList(cables) => {
                for c in cables {
                    check_branch(m, c.branch)?;
                }
                Ok(Extent::new(cables.clone()))
            }
            Region::Branch(b) => {
                check_branch(m, *b)?;
                Ok(Extent::new(vec![Cable::whole(*b)]))
            }
            Region::Segment(s) => p
                .embedding()
                .segment_cable(*s)
                .map(|c| Extent::new(vec![c]))
                .ok_or(MorphError::NoSuchSegment(*s)),
            Region::Tagged(tag) => {
                let e = p.embedding();
                let cables = m
                    .segments()
                    .iter()
                    .filter(|seg| seg.tag == *tag)
                    .filter_map(|seg| e.segment_cable(seg.id))
                    .collect();
                Ok(Extent::new(cables))
            }
            Region::All => Ok(Extent::whole(m)),
            Region::Named(name) => p.region(name),
            Region::DistalInterval { start, distance } => {
                let starts = start.thingify(p)?;
                let mut cables = Vec::new();
                let e = p.embedding();
                for loc in starts {
                    let mut stack = vec![(loc.branch, loc.pos, distance.max(0.0))];
                    while let Some((b, pos, remaining)) = stack.pop() {
                        let len = e.branch_length(b);
                        let available = len * (1.0 - pos);
                        if len > 0.0 && available >= remaining {
                            cables.push(Cable::new_unchecked(b, pos, (pos + remaining / len).min(1.0)));
                        } else {
                            cables.push(Cable::new_unchecked(b, pos, 1.0));
                            let rest = remaining - available;
                            stack.extend(m.branch_children(b).iter().map(|&c| (c, 0.0, rest)));
                        }
                    }
                }
                Ok(Extent::new(cables))
            }
            Region::ProximalInterval { end, distance } => {
                let ends = end.thingify(p)?;
                let mut cables = Vec::new();
                let e = p.embedding();
                for loc in ends {
                    let (mut b, mut pos, mut remaining) = (loc.branch, loc.pos, distance.max(0.0));
                    loop {
                        let len = e.branch_length(b);
                        let available = len * pos;
                        if len > 0.0 && available >= remaining {
                            cables.push(Cable::new_unchecked(b, (pos - remaining / len).max(0.0), pos));
                            break;
                        }
                        cables.push(Cable::new_unchecked(b, 0.0, pos));
                        remaining -= available;
                        let parent = m.branch_parent(b);
                        if parent == NPOS {
                            break;
                        }
                        b = parent;
                        pos = 1.0;
                    }
                }
                Ok(Extent::new(cables))
            }
            Region::Radius { region, op, value } => {
                let e = p.embedding();
                let cables = region
                    .thingify(p)?
                    .iter()
                    .flat_map(|c| e.radius_cmp(c, *op, *value))
                    .collect();
                Ok(Extent::new(cables))
            }
            Region::Complete(r) => Ok(complete(m, &r.thingify(p)?)),
            Region::Intersect(a, b) => Ok(extent::intersect(&a.thingify(p)?, &b.thingify(p)?)),
            Region::Join(a, b) => Ok(extent::join(&a.thingify(p)?, &b.thingify(p)?)),
            Region::Complement(r) => Ok(extent::complement(m, &r.thingify(p)?)),
            Region::Difference(a, b) => Ok(extent::difference(
                m,
                &a.thingify(p)?,
                &b.thingify(p)?,
            )),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Nil => write!(f, "(region-nil)"),
            Region::Cable(c) => write!(f, "{}", c),
            Region::CableList(cables) => match cables.split_first() {
                None => write!(f, "(region-nil)"),
                Some((first, rest)) => {
                    let mut s = first.to_string();
                    for c in rest {
                        s = format!("(join {} {})", s, c);
                    }
                    write!(f, "{}", s)
                }
            },
            Region::Branch(b) => write!(f, "(branch {})", b),
            Region::Segment(s) => write!(f, "(segment {})", s),
            Region::Tagged(t) => write!(f, "(tag {})", t),
            Region::All => write!(f, "(all)"),
            Region::Named(name) => write!(f, "(region \"{}\")", name),
            Region::DistalInterval { start, distance } => {
                write!(f, "(distal-interval {} {})", start, FmtReal(*distance))
            }
            Region::ProximalInterval { end, distance } => {
                write!(f, "(proximal-interval {} {})", end, FmtReal(*distance))
            }
            Region::Radius { region, op, value } => {
                write!(f, "({} {} {})", op.name(), region, FmtReal(*value))
            }
            Region::Complete(r) => write!(f, "(complete {})", r),
            Region::Intersect(a, b) => write!(f, "(intersect {} {})", a, b),
            Region::Join(a, b) => write!(f, "(join {} {})", a, b),
            Region::Complement(r) => write!(f, "(complement {})", r),
            Region::Difference(a, b) => write!(f, "(difference {} {})", a, b),
        }
    }
}
