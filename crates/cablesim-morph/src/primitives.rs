// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Geometry primitives: locations, cables and sample points, plus the
sorted location-list operations shared by the locset algebra.
*/

use crate::error::{MorphError, MorphResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Sentinel for "no parent" / "no such index"
pub const NPOS: u32 = u32::MAX;

/// A point on a branch, `pos` is the proportional distance from the proximal end
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub branch: u32,
    pub pos: f64,
}

impl Location {
    /// Build a location, rejecting positions outside [0, 1]
    pub fn new(branch: u32, pos: f64) -> MorphResult<Self> {
        let loc = Self { branch, pos };
        test_invariants(&loc)?;
        Ok(loc)
    }

    /// Build a location without validating the position
    pub const fn new_unchecked(branch: u32, pos: f64) -> Self {
        Self { branch, pos }
    }

    /// True if the position is in range and the branch exists
    pub fn valid(&self, num_branches: usize) -> bool {
        location_in_range(self) && (self.branch as usize) < num_branches
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Location {}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.branch
            .cmp(&other.branch)
            .then_with(|| normalize(self.pos).total_cmp(&normalize(other.pos)))
    }
}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.branch.hash(state);
        normalize(self.pos).to_bits().hash(state);
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(location {} {})", self.branch, FmtReal(self.pos))
    }
}

/// A sub-interval `[prox_pos, dist_pos]` of one branch
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cable {
    pub branch: u32,
    pub prox_pos: f64,
    pub dist_pos: f64,
}

impl Cable {
    /// Build a cable, rejecting ranges outside [0, 1] or with prox > dist
    pub fn new(branch: u32, prox_pos: f64, dist_pos: f64) -> MorphResult<Self> {
        let cable = Self {
            branch,
            prox_pos,
            dist_pos,
        };
        test_cable_invariants(&cable)?;
        Ok(cable)
    }

    pub const fn new_unchecked(branch: u32, prox_pos: f64, dist_pos: f64) -> Self {
        Self {
            branch,
            prox_pos,
            dist_pos,
        }
    }

    /// The whole branch
    pub const fn whole(branch: u32) -> Self {
        Self::new_unchecked(branch, 0.0, 1.0)
    }

    /// Proportional length of the cable
    pub fn extent(&self) -> f64 {
        self.dist_pos - self.prox_pos
    }

    pub fn contains(&self, loc: &Location) -> bool {
        loc.branch == self.branch && self.prox_pos <= loc.pos && loc.pos <= self.dist_pos
    }
}

impl PartialEq for Cable {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cable {}

impl PartialOrd for Cable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cables order by branch, then proximal end, then distal end, which is
/// consistent with ordering their proximal locations.
impl Ord for Cable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.branch
            .cmp(&other.branch)
            .then_with(|| normalize(self.prox_pos).total_cmp(&normalize(other.prox_pos)))
            .then_with(|| normalize(self.dist_pos).total_cmp(&normalize(other.dist_pos)))
    }
}

impl Hash for Cable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.branch.hash(state);
        normalize(self.prox_pos).to_bits().hash(state);
        normalize(self.dist_pos).to_bits().hash(state);
    }
}

impl std::fmt::Display for Cable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(cable {} {} {})",
            self.branch,
            FmtReal(self.prox_pos),
            FmtReal(self.dist_pos)
        )
    }
}

/// A sample point in 3-d space with radius (µm)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64, radius: f64) -> Self {
        Self { x, y, z, radius }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Sorted list of locations, possibly with duplicates
pub type LocationList = Vec<Location>;

/// Sorted list of cables
pub type CableList = Vec<Cable>;

// -0.0 and 0.0 must compare and hash the same.
#[inline]
fn normalize(x: f64) -> f64 {
    x + 0.0
}

fn location_in_range(loc: &Location) -> bool {
    (0.0..=1.0).contains(&loc.pos)
}

/// Check that a location's position lies in [0, 1]
pub fn test_invariants(loc: &Location) -> MorphResult<()> {
    if location_in_range(loc) {
        Ok(())
    } else {
        Err(MorphError::InvalidLocation(*loc))
    }
}

/// Check that a cable's range is ordered and inside [0, 1]
pub fn test_cable_invariants(cable: &Cable) -> MorphResult<()> {
    let ok = (0.0..=1.0).contains(&cable.prox_pos)
        && (0.0..=1.0).contains(&cable.dist_pos)
        && cable.prox_pos <= cable.dist_pos;
    if ok {
        Ok(())
    } else {
        Err(MorphError::InvalidCable(*cable))
    }
}

pub fn prox_loc(cable: &Cable) -> Location {
    Location::new_unchecked(cable.branch, cable.prox_pos)
}

pub fn dist_loc(cable: &Cable) -> Location {
    Location::new_unchecked(cable.branch, cable.dist_pos)
}

/// Multiset concatenation of two location lists, sorted
pub fn sum(lhs: &[Location], rhs: &[Location]) -> LocationList {
    let mut out = Vec::with_capacity(lhs.len() + rhs.len());
    out.extend_from_slice(lhs);
    out.extend_from_slice(rhs);
    out.sort();
    out
}

/// Set union of two location lists, sorted and deduplicated
pub fn join(lhs: &[Location], rhs: &[Location]) -> LocationList {
    let mut out = sum(lhs, rhs);
    out.dedup();
    out
}

/// Multiset intersection: each location appears min(count_a, count_b) times
pub fn intersection(lhs: &[Location], rhs: &[Location]) -> LocationList {
    let mut a = lhs.to_vec();
    let mut b = rhs.to_vec();
    a.sort();
    b.sort();

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Sort and deduplicate
pub fn support(mut list: LocationList) -> LocationList {
    list.sort();
    list.dedup();
    list
}

/// Real numbers print with a decimal point so the parser reads them back
/// as reals rather than integers.
pub(crate) struct FmtReal(pub f64);

impl std::fmt::Display for FmtReal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let x = self.0;
        if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
            write!(f, "{:.1}", x)
        } else {
            write!(f, "{}", x)
        }
    }
}
