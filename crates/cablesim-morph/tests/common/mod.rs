// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared morphologies for the integration tests

#![allow(dead_code)]

use cablesim_morph::{Location, Morphology, Point, SegmentTree, NPOS};

pub fn pt(x: f64, y: f64, r: f64) -> Point {
    Point::new(x, y, 0.0, r)
}

pub fn loc(branch: u32, pos: f64) -> Location {
    Location::new_unchecked(branch, pos)
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Soma with two dendrites and an axon.
///
/// ```text
/// branch  parent  tag  length  segments
///   0       -      1     10      1  (r = 5)
///   1       0      3    100      2  (r = 1, then 1 -> 0.5)
///   2       0      3     50      1  (r = 0.8)
///   3       2      3     30      1  (r = 0.5)
///   4       2      3     30      1  (r = 0.5)
///   5       0      2    100      1  (r = 0.5)
/// ```
pub fn ball_and_sticks() -> Morphology {
    let mut t = SegmentTree::new();
    let soma = t.append(NPOS, pt(0.0, 0.0, 5.0), pt(10.0, 0.0, 5.0), 1).unwrap();

    let d1a = t.append(soma, pt(10.0, 0.0, 1.0), pt(60.0, 0.0, 1.0), 3).unwrap();
    t.append(d1a, pt(60.0, 0.0, 1.0), pt(110.0, 0.0, 0.5), 3).unwrap();

    let d2 = t.append(soma, pt(10.0, 0.0, 0.8), pt(10.0, 50.0, 0.8), 3).unwrap();
    t.append(d2, pt(10.0, 50.0, 0.5), pt(10.0, 80.0, 0.5), 3).unwrap();
    t.append(d2, pt(10.0, 50.0, 0.5), pt(40.0, 50.0, 0.5), 3).unwrap();

    t.append(soma, pt(10.0, 0.0, 0.5), pt(10.0, -100.0, 0.5), 2).unwrap();
    Morphology::new(t)
}

/// Branch 0 of length 60 forking into branch 1 (length 40) and branch 2 (length 20)
pub fn fork_60_40_20() -> Morphology {
    let mut t = SegmentTree::new();
    let s0 = t.append(NPOS, pt(0.0, 0.0, 1.0), pt(60.0, 0.0, 1.0), 3).unwrap();
    t.append_from_parent(s0, pt(100.0, 0.0, 1.0), 3).unwrap();
    t.append_from_parent(s0, pt(60.0, 20.0, 1.0), 3).unwrap();
    Morphology::new(t)
}
