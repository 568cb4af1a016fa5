// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Locset expressions.

A locset describes a set of discrete points on a morphology. Results are
sorted location lists; set-like operators deduplicate, `sum` keeps every
copy.
*/

use crate::error::{MorphError, MorphResult};
use crate::extent::{components, Extent};
use crate::morphology::{maxset, minset, Morphology};
use crate::primitives::{
    self, dist_loc, prox_loc, test_invariants, FmtReal, Location, LocationList,
};
use crate::provider::{Provider, Thingify};
use crate::region::{complete, Region};
use crate::sampling;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Locset {
    #[default]
    Nil,
    Location(Location),
    LocationList(Vec<Location>),
    Terminal,
    Root,
    SegmentBoundaries,
    OnBranches(f64),
    Named(String),
    MostDistal(Arc<Region>),
    MostProximal(Arc<Region>),
    Boundary(Arc<Region>),
    CBoundary(Arc<Region>),
    OnComponents { relpos: f64, region: Arc<Region> },
    Uniform {
        region: Arc<Region>,
        left: u32,
        right: u32,
        seed: u64,
    },
    Intersect(Arc<Locset>, Arc<Locset>),
    Join(Arc<Locset>, Arc<Locset>),
    Sum(Arc<Locset>, Arc<Locset>),
    Support(Arc<Locset>),
    Restrict(Arc<Locset>, Arc<Region>),
}

impl Locset {
    pub fn nil() -> Self {
        Locset::Nil
    }

    pub fn location(branch: u32, pos: f64) -> MorphResult<Self> {
        Location::new(branch, pos).map(Locset::Location)
    }

    pub fn location_list(locs: Vec<Location>) -> MorphResult<Self> {
        locs.iter().try_for_each(test_invariants)?;
        Ok(Locset::LocationList(locs))
    }

    pub fn terminal() -> Self {
        Locset::Terminal
    }

    pub fn root() -> Self {
        Locset::Root
    }

    pub fn segment_boundaries() -> Self {
        Locset::SegmentBoundaries
    }

    /// One point at proportional position `pos` on every branch
    pub fn on_branches(pos: f64) -> MorphResult<Self> {
        test_invariants(&Location::new_unchecked(0, pos))?;
        Ok(Locset::OnBranches(pos))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Locset::Named(name.into())
    }

    pub fn most_distal(region: Region) -> Self {
        Locset::MostDistal(Arc::new(region))
    }

    pub fn most_proximal(region: Region) -> Self {
        Locset::MostProximal(Arc::new(region))
    }

    pub fn boundary(region: Region) -> Self {
        Locset::Boundary(Arc::new(region))
    }

    pub fn cboundary(region: Region) -> Self {
        Locset::CBoundary(Arc::new(region))
    }

    /// Points at relative distance `relpos` from the proximal end of each component
    pub fn on_components(relpos: f64, region: Region) -> Self {
        Locset::OnComponents {
            relpos,
            region: Arc::new(region),
        }
    }

    /// Draws `left..=right` of the uniform stream `seed` over the region
    pub fn uniform(region: Region, left: u32, right: u32, seed: u64) -> Self {
        Locset::Uniform {
            region: Arc::new(region),
            left,
            right,
            seed,
        }
    }

    pub fn intersect(lhs: Locset, rhs: Locset) -> Self {
        Locset::Intersect(Arc::new(lhs), Arc::new(rhs))
    }

    pub fn join(lhs: Locset, rhs: Locset) -> Self {
        Locset::Join(Arc::new(lhs), Arc::new(rhs))
    }

    pub fn sum(lhs: Locset, rhs: Locset) -> Self {
        Locset::Sum(Arc::new(lhs), Arc::new(rhs))
    }

    pub fn support(ls: Locset) -> Self {
        Locset::Support(Arc::new(ls))
    }

    pub fn restrict(ls: Locset, region: Region) -> Self {
        Locset::Restrict(Arc::new(ls), Arc::new(region))
    }
}

impl From<Location> for Locset {
    fn from(loc: Location) -> Self {
        Locset::Location(loc)
    }
}

impl std::ops::BitAnd for Locset {
    type Output = Locset;

    fn bitand(self, rhs: Locset) -> Locset {
        Locset::intersect(self, rhs)
    }
}

impl std::ops::BitOr for Locset {
    type Output = Locset;

    fn bitor(self, rhs: Locset) -> Locset {
        Locset::join(self, rhs)
    }
}

impl std::ops::Add for Locset {
    type Output = Locset;

    fn add(self, rhs: Locset) -> Locset {
        Locset::sum(self, rhs)
    }
}

fn check_location(m: &Morphology, loc: &Location) -> MorphResult<()> {
    if (loc.branch as usize) < m.num_branches() {
        Ok(())
    } else {
        Err(MorphError::NoSuchBranch(loc.branch))
    }
}

fn boundary_points(m: &Morphology, ext: Extent) -> LocationList {
    let mut out = Vec::new();
    for comp in components(m, &ext) {
        if let Some(first) = comp.cables().first() {
            out.push(prox_loc(first));
        }
        let distal: Vec<Location> = comp.iter().map(dist_loc).collect();
        out.extend(maxset(m, &distal));
    }
    primitives::support(out)
}

fn cboundary_points(m: &Morphology, ext: Extent) -> LocationList {
    let mut out = Vec::new();
    for comp in components(m, &ext) {
        // completing a component that touches a top-level head can
        // disconnect it
        let completed = complete(m, &comp);
        let proximal: Vec<Location> = completed.iter().map(prox_loc).collect();
        let distal: Vec<Location> = completed.iter().map(dist_loc).collect();
        out.extend(minset(m, &proximal));
        out.extend(maxset(m, &distal));
    }
    primitives::support(out)
}

fn on_components<P: Provider + ?Sized>(p: &P, relpos: f64, ext: Extent) -> LocationList {
    if !(0.0..=1.0).contains(&relpos) {
        return Vec::new();
    }

    let m = p.morphology();
    let e = p.embedding();
    let mut out = Vec::new();

    for comp in components(m, &ext) {
        let Some(first) = comp.cables().first() else {
            continue;
        };
        let prox = prox_loc(first);
        let from_prox = |x: &Location| e.integrate_length_between(&prox, x);

        if relpos == 0.0 {
            out.push(prox);
        } else if relpos == 1.0 {
            let mut diameter = 0.0;
            let mut most_distal = vec![prox];
            for c in &comp {
                let x = dist_loc(c);
                let d = from_prox(&x);
                if d > diameter {
                    most_distal = vec![x];
                    diameter = d;
                } else if d == diameter {
                    most_distal.push(x);
                }
            }
            out.extend(most_distal);
        } else {
            let diameter = comp
                .iter()
                .map(|c| from_prox(&dist_loc(c)))
                .fold(f64::NEG_INFINITY, f64::max);
            let d = relpos * diameter;
            for c in &comp {
                let d0 = from_prox(&prox_loc(c));
                let d1 = from_prox(&dist_loc(c));
                if d0 <= d && d <= d1 {
                    let s = if d0 == d1 { 0.0 } else { (d - d0) / (d1 - d0) };
                    let pos = s.mul_add(c.dist_pos - c.prox_pos, c.prox_pos).min(1.0);
                    out.push(Location::new_unchecked(c.branch, pos));
                }
            }
        }
    }

    out.sort();
    out
}

fn uniform<P: Provider + ?Sized>(
    p: &P,
    ext: Extent,
    left: u32,
    right: u32,
    seed: u64,
) -> LocationList {
    let cables = ext.cables();
    if cables.is_empty() {
        return Vec::new();
    }

    let e = p.embedding();
    // cumulative length at the distal end of each cable
    let mut bounds = Vec::with_capacity(cables.len());
    let mut total = 0.0;
    for c in cables {
        total += e.integrate_length(c);
        bounds.push(total);
    }

    let mut samples: Vec<f64> = sampling::uniform(seed, left, right)
        .into_iter()
        .map(|x| x * total)
        .collect();
    samples.sort_by(f64::total_cmp);

    let last = cables.len() - 1;
    let mut idx = 0;
    let mut lo = 0.0;
    let mut out = Vec::with_capacity(samples.len());
    for s in samples {
        while s > bounds[idx] && idx < last {
            lo = bounds[idx];
            idx += 1;
        }
        let c = &cables[idx];
        let width = bounds[idx] - lo;
        let t = if width > 0.0 {
            ((s - lo) / width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.push(Location::new_unchecked(
            c.branch,
            crate::embedding::lerp(c.prox_pos, c.dist_pos, t),
        ));
    }
    out
}

/// Keep the points covered by some cable of the extent
fn restrict(locs: LocationList, ext: &Extent) -> LocationList {
    let cables = ext.cables();
    locs.into_iter()
        .filter(|l| {
            let i = cables.partition_point(|c| dist_loc(c) < *l);
            cables
                .get(i)
                .is_some_and(|c| c.branch == l.branch && c.prox_pos <= l.pos)
        })
        .collect()
}

impl Thingify for Locset {
    type Output = LocationList;

    fn thingify<P: Provider + ?Sized>(&self, p: &P) -> MorphResult<LocationList> {
        let m = p.morphology();
        match self {
            Locset::Nil => Ok(Vec::new()),
            Locset::Location(loc) => {
                check_location(m, loc)?;
                Ok(vec![*loc])
            }
            Locset::LocationList(locs) => {
                for loc in locs {
                    check_location(m, loc)?;
                }
                let mut out = locs.clone();
                out.sort();
                Ok(out)
            }
            Locset::Terminal => Ok(m
                .terminal_branches()
                .iter()
                .map(|&b| Location::new_unchecked(b, 1.0))
                .collect()),
            Locset::Root => Ok(vec![Location::new_unchecked(0, 0.0)]),
            Locset::SegmentBoundaries => Ok(p.embedding().segment_ends().to_vec()),
            Locset::OnBranches(pos) => Ok((0..m.num_branches() as u32)
                .map(|b| Location::new_unchecked(b, *pos))
                .collect()),
            Locset::Named(name) => p.locset(name),
            Locset::MostDistal(r) => {
                let ends: Vec<Location> = r.thingify(p)?.iter().map(dist_loc).collect();
                Ok(maxset(m, &ends))
            }
            Locset::MostProximal(r) => {
                let heads: Vec<Location> = r.thingify(p)?.iter().map(prox_loc).collect();
                Ok(minset(m, &heads))
            }
            Locset::Boundary(r) => Ok(boundary_points(m, r.thingify(p)?)),
            Locset::CBoundary(r) => Ok(cboundary_points(m, r.thingify(p)?)),
            Locset::OnComponents { relpos, region } => {
                Ok(on_components(p, *relpos, region.thingify(p)?))
            }
            Locset::Uniform {
                region,
                left,
                right,
                seed,
            } => Ok(uniform(p, region.thingify(p)?, *left, *right, *seed)),
            Locset::Intersect(a, b) => Ok(primitives::intersection(&a.thingify(p)?, &b.thingify(p)?)),
            Locset::Join(a, b) => Ok(primitives::join(&a.thingify(p)?, &b.thingify(p)?)),
            Locset::Sum(a, b) => Ok(primitives::sum(&a.thingify(p)?, &b.thingify(p)?)),
            Locset::Support(ls) => Ok(primitives::support(ls.thingify(p)?)),
            Locset::Restrict(ls, r) => Ok(restrict(ls.thingify(p)?, &r.thingify(p)?)),
        }
    }
}

impl fmt::Display for Locset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locset::Nil => write!(f, "(locset-nil)"),
            Locset::Location(loc) => write!(f, "{}", loc),
            Locset::LocationList(locs) => match locs.split_first() {
                None => write!(f, "(locset-nil)"),
                Some((first, rest)) => {
                    let mut s = first.to_string();
                    for loc in rest {
                        s = format!("(sum {} {})", s, loc);
                    }
                    write!(f, "{}", s)
                }
            },
            Locset::Terminal => write!(f, "(terminal)"),
            Locset::Root => write!(f, "(root)"),
            Locset::SegmentBoundaries => write!(f, "(segment-boundaries)"),
            Locset::OnBranches(pos) => write!(f, "(on-branches {})", FmtReal(*pos)),
            Locset::Named(name) => write!(f, "(locset \"{}\")", name),
            Locset::MostDistal(r) => write!(f, "(distal {})", r),
            Locset::MostProximal(r) => write!(f, "(proximal {})", r),
            Locset::Boundary(r) => write!(f, "(boundary {})", r),
            Locset::CBoundary(r) => write!(f, "(cboundary {})", r),
            Locset::OnComponents { relpos, region } => {
                write!(f, "(on-components {} {})", FmtReal(*relpos), region)
            }
            Locset::Uniform {
                region,
                left,
                right,
                seed,
            } => write!(f, "(uniform {} {} {} {})", region, left, right, seed),
            Locset::Intersect(a, b) => write!(f, "(intersect {} {})", a, b),
            Locset::Join(a, b) => write!(f, "(join {} {})", a, b),
            Locset::Sum(a, b) => write!(f, "(sum {} {})", a, b),
            Locset::Support(ls) => write!(f, "(support {})", ls),
            Locset::Restrict(ls, r) => write!(f, "(restrict {} {})", ls, r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Cable;

    #[test]
    fn test_constructor_validation() {
        assert!(Locset::location(0, 0.5).is_ok());
        assert_eq!(
            Locset::location(0, 1.5),
            Err(MorphError::InvalidLocation(Location::new_unchecked(0, 1.5)))
        );
        assert!(Locset::on_branches(-0.5).is_err());
        assert!(Locset::location_list(vec![Location::new_unchecked(1, 2.0)]).is_err());
    }

    #[test]
    fn test_print() {
        let ls = Locset::restrict(
            Locset::uniform(Region::tagged(3), 0, 9, 42),
            Region::cable(0, 0.0, 0.5).unwrap(),
        );
        assert_eq!(
            ls.to_string(),
            "(restrict (uniform (tag 3) 0 9 42) (cable 0 0.0 0.5))"
        );

        let list = Locset::location_list(vec![
            Location::new_unchecked(0, 0.5),
            Location::new_unchecked(1, 1.0),
            Location::new_unchecked(2, 0.0),
        ])
        .unwrap();
        assert_eq!(
            list.to_string(),
            "(sum (sum (location 0 0.5) (location 1 1.0)) (location 2 0.0))"
        );
        assert_eq!(Locset::LocationList(Vec::new()).to_string(), "(locset-nil)");
        assert_eq!(
            Locset::on_components(0.5, Region::all()).to_string(),
            "(on-components 0.5 (all))"
        );
    }

    #[test]
    fn test_restrict_search() {
        let ext = Extent::new(vec![
            Cable::new_unchecked(0, 0.0, 0.5),
            Cable::new_unchecked(1, 0.2, 0.4),
        ]);
        let l = |b, p| Location::new_unchecked(b, p);
        assert_eq!(
            restrict(vec![l(0, 0.5), l(0, 0.7), l(1, 0.1), l(1, 0.3)], &ext),
            vec![l(0, 0.5), l(1, 0.3)]
        );
    }
}
