// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! From a TOML config and labelled morphologies to a lowered cell group

use cablesim::fvm::{FieldHandle, MechanismView};
use cablesim::morph::MorphError;
use cablesim::prelude::*;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[cable]
init_membrane_potential = -70.0
temperature_k = 296.15

[discretization]
policy = "max-extent"
max_extent = 25.0

[resolution]
recursion_limit = 8

[system]
threads = 2
"#;

const CATALOGUE: &str = r#"[
    {"name": "pas", "kind": "density",
     "fields": [{"name": "g", "default": 0.001}],
     "globals": [{"name": "e", "default": -70.0}]},
    {"name": "expsyn", "kind": "point",
     "fields": [{"name": "g", "default": 0.0}]}
]"#;

struct Leak;

impl MechanismKernel for Leak {
    fn compute_currents(&self, mech: &mut MechanismView<'_>, state: &mut SharedState) {
        let g = mech.field(FieldHandle::new(0)).to_vec();
        let e = mech.global(0);
        for (i, &cv) in mech.node_index().iter().enumerate() {
            let cv = cv as usize;
            state.current_density[cv] += mech.weight()[i] * g[i] * (state.voltage[cv] - e);
        }
    }
}

fn load(contents: &str) -> CablesimConfig {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    let config = load_config(Some(file.path()), None).unwrap();
    validate_config(&config).unwrap();
    config
}

/// Soma (tag 1, 10 µm, r = 5) with two 100 µm dendrites (tag 3, r = 1)
fn ball_and_two_sticks() -> Morphology {
    let mut t = SegmentTree::new();
    let soma = t
        .append(NPOS, Point::new(0.0, 0.0, 0.0, 5.0), Point::new(10.0, 0.0, 0.0, 5.0), 1)
        .unwrap();
    t.append(soma, Point::new(10.0, 0.0, 0.0, 1.0), Point::new(110.0, 0.0, 0.0, 1.0), 3)
        .unwrap();
    t.append(soma, Point::new(10.0, 0.0, 0.0, 1.0), Point::new(10.0, 100.0, 0.0, 1.0), 3)
        .unwrap();
    Morphology::new(t)
}

struct BallAndSticks {
    labels: LabelDict,
    recursion_limit: usize,
}

impl BallAndSticks {
    fn new(recursion_limit: usize) -> Self {
        let mut labels = LabelDict::new();
        labels.set("dend", "(tag 3)").unwrap();
        labels.set("soma", "(tag 1)").unwrap();
        labels
            .set("synapses", "(sum (location 1 0.6) (location 2 0.6))")
            .unwrap();
        labels.set("centre", "(location 0 0.5)").unwrap();
        Self {
            labels,
            recursion_limit,
        }
    }
}

impl CableRecipe for BallAndSticks {
    fn num_cells(&self) -> usize {
        2
    }

    fn cell_description(&self, _gid: u32) -> FvmResult<CableCell> {
        let provider =
            MProvider::with_recursion_limit(ball_and_two_sticks(), &self.labels, self.recursion_limit)?;
        let mut decor = Decor::new();
        decor
            .paint(Region::named("dend"), MechanismDesc::new("pas"))
            .paint(Region::named("soma"), MechanismDesc::new("pas").with("g", 0.002))
            .place(Locset::named("synapses"), Placeable::Synapse("expsyn".into()))
            .place(Locset::named("centre"), Placeable::GapJunctionSite);
        CableCell::from_provider(provider, decor)
    }

    fn gap_junctions_on(&self, gid: u32) -> Vec<GapJunctionConnection> {
        vec![GapJunctionConnection::new(CellMember::new(1 - gid, 0), 0, 0.3)]
    }
}

#[test]
fn test_config_drives_lowering() {
    let config = load(CONFIG);
    let params = CableParameters::from_config(&config);
    assert_eq!(params.cv_policy, CvPolicy::MaxExtent(25.0));

    let mut catalogue = MechanismCatalogue::new();
    assert_eq!(catalogue.load_json(CATALOGUE, |_| Arc::new(Leak)).unwrap(), 2);

    let recipe = BallAndSticks::new(config.resolution.recursion_limit);
    let context = ExecutionContext::from_config(&config.system).unwrap();
    let mut lowered = FvmLoweredCell::new(context);
    lowered
        .initialize(&[0, 1], &recipe, &catalogue, &params)
        .unwrap();

    // Soma in one CV, each dendrite in four
    let d = lowered.discretization();
    assert_eq!(d.size(), 18);
    assert_eq!(d.geometry.cell_cv_divs, vec![0, 9, 18]);
    assert_eq!(lowered.num_intdom(), 1);

    let state = lowered.state().unwrap();
    assert!(state.voltage.iter().all(|&v| (v + 70.0).abs() < 1e-9));
    assert!(state
        .temperature_degc
        .iter()
        .all(|&t| (t - 23.0).abs() < 1e-9));

    let soma_area = 2.0 * std::f64::consts::PI * 5.0 * 10.0;
    assert_eq!(state.gap_junctions.len(), 2);
    assert_eq!(state.gap_junctions[0].loc, (0, 9));
    assert!((state.gap_junctions[0].weight - 0.3 * 1e3 / soma_area).abs() < 1e-9);

    let pas = lowered.find_mechanism("pas").unwrap();
    assert_eq!(pas.width(), 18);
    let g = pas.field("g").unwrap();
    // One instance per CV; each cell's soma CV starts its block
    for (cv, &g) in g.iter().enumerate() {
        let expected = if cv == 0 || cv == 9 { 0.002 } else { 0.001 };
        assert!((g - expected).abs() < 1e-12, "cv {}: g = {}", cv, g);
    }
    assert_eq!(lowered.target_handles().len(), 4);

    lowered.compute_currents();
    let state = lowered.state().unwrap();
    // Equal potentials: no gap junction current, and pas sits at its reversal
    assert!(state.current_density.iter().all(|&i| i.abs() < 1e-12));
}

#[test]
fn test_label_errors_surface_through_recipe() {
    let mut recipe = BallAndSticks::new(64);
    recipe.labels.set("loop-a", "(region \"loop-b\")").unwrap();
    recipe.labels.set("loop-b", "(region \"loop-a\")").unwrap();

    let mut lowered = FvmLoweredCell::new(ExecutionContext::serial());
    let err = lowered
        .initialize(&[0, 1], &recipe, &MechanismCatalogue::new(), &CableParameters::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FvmError::Morph(MorphError::CircularDefinition { .. })
    ));
}
