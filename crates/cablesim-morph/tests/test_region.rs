// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Region resolution tests
*/

mod common;

use cablesim_morph::{Cable, Locset, MProvider, MorphError, Region, Thingify};
use common::{approx, ball_and_sticks};

fn provider() -> MProvider {
    MProvider::unlabelled(ball_and_sticks())
}

fn c(b: u32, p: f64, d: f64) -> Cable {
    Cable::new_unchecked(b, p, d)
}

fn cables(r: Region) -> Vec<Cable> {
    r.thingify(&provider()).unwrap().into_cables()
}

#[test]
fn test_structural_regions() {
    assert_eq!(cables(Region::tagged(1)), vec![c(0, 0.0, 1.0)]);
    assert_eq!(cables(Region::tagged(2)), vec![c(5, 0.0, 1.0)]);
    assert_eq!(
        cables(Region::tagged(3)),
        vec![c(1, 0.0, 1.0), c(2, 0.0, 1.0), c(3, 0.0, 1.0), c(4, 0.0, 1.0)]
    );
    assert!(cables(Region::tagged(7)).is_empty());

    assert_eq!(cables(Region::segment(1)), vec![c(1, 0.0, 0.5)]);
    assert_eq!(cables(Region::segment(2)), vec![c(1, 0.5, 1.0)]);
    assert_eq!(cables(Region::all()).len(), 6);
    assert!(cables(Region::nil()).is_empty());
}

#[test]
fn test_literals_are_canonicalized() {
    let r = Region::cable_list(vec![c(2, 0.5, 0.9), c(1, 0.0, 0.2), c(2, 0.1, 0.6)]).unwrap();
    assert_eq!(cables(r), vec![c(1, 0.0, 0.2), c(2, 0.1, 0.9)]);
}

#[test]
fn test_distal_interval() {
    let within = Region::distal_interval(Locset::location(1, 0.5).unwrap(), 20.0);
    let got = cables(within);
    assert_eq!(got.len(), 1);
    assert!(approx(got[0].dist_pos, 0.7));

    // 25 µm left on branch 2, the remaining 15 µm spill into both children
    let spill = Region::distal_interval(Locset::location(2, 0.5).unwrap(), 40.0);
    assert_eq!(
        cables(spill),
        vec![c(2, 0.5, 1.0), c(3, 0.0, 0.5), c(4, 0.0, 0.5)]
    );
}

#[test]
fn test_proximal_interval() {
    let r = Region::proximal_interval(Locset::location(3, 0.5).unwrap(), 40.0);
    assert_eq!(cables(r), vec![c(2, 0.5, 1.0), c(3, 0.0, 0.5)]);

    // stops at the root
    let r = Region::proximal_interval(Locset::location(1, 0.1).unwrap(), 100.0);
    let got = cables(r);
    assert_eq!(got[0], c(0, 0.0, 1.0));
    assert_eq!(got[1].branch, 1);
    assert!(approx(got[1].dist_pos, 0.1));
}

#[test]
fn test_radius_bounds() {
    let thin = cables(Region::radius_lt(Region::all(), 0.9));
    assert_eq!(thin.len(), 5);
    assert_eq!(thin[0].branch, 1);
    assert!(approx(thin[0].prox_pos, 0.6));
    assert_eq!(&thin[1..], &[c(2, 0.0, 1.0), c(3, 0.0, 1.0), c(4, 0.0, 1.0), c(5, 0.0, 1.0)]);

    let thick = cables(Region::radius_ge(Region::all(), 0.9));
    assert_eq!(thick[0], c(0, 0.0, 1.0));
    assert_eq!(thick[1].branch, 1);
    assert!(approx(thick[1].dist_pos, 0.6));
}

#[test]
fn test_complete() {
    let r = Region::complete(Region::cable(2, 0.0, 0.5).unwrap());
    assert_eq!(
        cables(r),
        vec![c(0, 1.0, 1.0), c(1, 0.0, 0.0), c(2, 0.0, 0.5), c(5, 0.0, 0.0)]
    );

    // a top-level cable picks up the other top-level heads, of which there are none
    let r = Region::complete(Region::cable(0, 0.0, 0.2).unwrap());
    assert_eq!(cables(r), vec![c(0, 0.0, 0.2)]);
}

#[test]
fn test_set_algebra() {
    assert_eq!(
        cables(Region::complement(Region::tagged(3))),
        vec![c(0, 0.0, 1.0), c(5, 0.0, 1.0)]
    );
    assert_eq!(
        cables(Region::difference(Region::all(), Region::tagged(1))).len(),
        5
    );
    assert_eq!(
        cables(Region::intersect(
            Region::tagged(3),
            Region::distal_interval(Locset::location(2, 0.5).unwrap(), 40.0)
        )),
        vec![c(2, 0.5, 1.0), c(3, 0.0, 0.5), c(4, 0.0, 0.5)]
    );
    assert_eq!(
        cables(Region::join(Region::tagged(1), Region::tagged(2))),
        vec![c(0, 0.0, 1.0), c(5, 0.0, 1.0)]
    );
}

#[test]
fn test_missing_references() {
    let p = provider();
    assert_eq!(
        Region::branch(9).thingify(&p),
        Err(MorphError::NoSuchBranch(9))
    );
    assert_eq!(
        Region::cable(6, 0.0, 1.0).unwrap().thingify(&p),
        Err(MorphError::NoSuchBranch(6))
    );
    assert_eq!(
        Region::segment(99).thingify(&p),
        Err(MorphError::NoSuchSegment(99))
    );
    assert!(matches!(
        Region::named("dend").thingify(&p),
        Err(MorphError::UnknownLabel { .. })
    ));
}
