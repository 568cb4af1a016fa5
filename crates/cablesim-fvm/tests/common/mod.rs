// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cells, recipes and mechanism kernels shared by the integration tests

#![allow(dead_code)]

use cablesim_fvm::{
    CableCell, CableRecipe, CellMember, Decor, DeliverableEvent, FieldHandle, FvmResult,
    GapJunctionConnection, IonDependency, MechanismCatalogue, MechanismInfo, MechanismKernel,
    MechanismKind, MechanismView, SharedState,
};
use cablesim_morph::{LabelDict, Morphology, Point, SegmentTree, NPOS};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

/// A single branch of length 100 and radius 1
pub fn cylinder() -> Morphology {
    let mut t = SegmentTree::new();
    t.append(NPOS, Point::new(0.0, 0.0, 0.0, 1.0), Point::new(100.0, 0.0, 0.0, 1.0), 3)
        .unwrap();
    Morphology::new(t)
}

pub fn cylinder_cell(decor: Decor) -> CableCell {
    CableCell::new(cylinder(), &LabelDict::new(), decor).unwrap()
}

/// Area of a length of the unit radius cylinder
pub fn cylinder_area(length: f64) -> f64 {
    2.0 * std::f64::consts::PI * length
}

/// Cells built from a decor per gid, with gap junctions listed per gid
pub struct TestRecipe {
    pub n_cells: usize,
    pub decor: Box<dyn Fn(u32) -> Decor>,
    pub gap_junctions: BTreeMap<u32, Vec<GapJunctionConnection>>,
}

impl TestRecipe {
    pub fn new(n_cells: usize, decor: impl Fn(u32) -> Decor + 'static) -> Self {
        Self {
            n_cells,
            decor: Box::new(decor),
            gap_junctions: BTreeMap::new(),
        }
    }

    /// Both directions of a junction between site 0 of each cell
    pub fn connect(&mut self, a: u32, b: u32, ggap: f64) -> &mut Self {
        self.gap_junctions
            .entry(a)
            .or_default()
            .push(GapJunctionConnection::new(CellMember::new(b, 0), 0, ggap));
        self.gap_junctions
            .entry(b)
            .or_default()
            .push(GapJunctionConnection::new(CellMember::new(a, 0), 0, ggap));
        self
    }
}

impl CableRecipe for TestRecipe {
    fn num_cells(&self) -> usize {
        self.n_cells
    }

    fn cell_description(&self, gid: u32) -> FvmResult<CableCell> {
        CableCell::new(cylinder(), &LabelDict::new(), (self.decor)(gid))
    }

    fn gap_junctions_on(&self, gid: u32) -> Vec<GapJunctionConnection> {
        self.gap_junctions.get(&gid).cloned().unwrap_or_default()
    }
}

/// `i = w·g·(v - e)` into every CV of the mechanism
pub struct Passive;

impl MechanismKernel for Passive {
    fn compute_currents(&self, mech: &mut MechanismView<'_>, state: &mut SharedState) {
        let g = mech.field(FieldHandle::new(0)).to_vec();
        let e = mech.global(0);
        for (i, &cv) in mech.node_index().iter().enumerate() {
            let cv = cv as usize;
            state.current_density[cv] += mech.weight()[i] * g[i] * (state.voltage[cv] - e);
        }
    }
}

/// Accumulates event weights into its `g` field
pub struct Accumulate;

impl MechanismKernel for Accumulate {
    fn compute_currents(&self, _mech: &mut MechanismView<'_>, _state: &mut SharedState) {}

    fn apply_events(&self, mech: &mut MechanismView<'_>, events: &[DeliverableEvent]) {
        let g = mech.field_mut(FieldHandle::new(0));
        for e in events {
            g[e.handle.mech_index as usize] += e.weight as f64;
        }
    }
}

/// Inert kernel for mechanisms only checked for layout
pub struct Inert;

impl MechanismKernel for Inert {
    fn compute_currents(&self, _mech: &mut MechanismView<'_>, _state: &mut SharedState) {}
}

pub fn catalogue() -> MechanismCatalogue {
    let mut cat = MechanismCatalogue::new();
    cat.add(
        MechanismInfo::new("pas", MechanismKind::Density)
            .with_field("g", Some(0.001))
            .with_global("e", -70.0),
        Arc::new(Passive),
    )
    .unwrap();
    cat.add(
        MechanismInfo::new("expsyn", MechanismKind::Point)
            .with_field("g", Some(0.0))
            .with_global("tau", 2.0),
        Arc::new(Accumulate),
    )
    .unwrap();
    cat.add(
        MechanismInfo::new("exp2syn", MechanismKind::Point).with_field("g", Some(0.0)),
        Arc::new(Accumulate),
    )
    .unwrap();

    let mut writer = IonDependency::new("ca");
    writer.write_int_concentration = true;
    cat.add(
        MechanismInfo::new("cad", MechanismKind::Density).with_ion(writer),
        Arc::new(Inert),
    )
    .unwrap();
    cat.add(
        MechanismInfo::new("cav", MechanismKind::Density)
            .with_field("gbar", Some(1e-4))
            .with_ion(IonDependency::new("ca")),
        Arc::new(Inert),
    )
    .unwrap();
    cat.add(
        MechanismInfo::new("zap", MechanismKind::Density).with_ion(IonDependency::new("zz")),
        Arc::new(Inert),
    )
    .unwrap();
    cat
}
