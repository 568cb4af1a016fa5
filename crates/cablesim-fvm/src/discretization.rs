// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Per-CV electrical quantities.

Units follow the usual cable conventions: lengths in µm, areas in µm²,
capacitance in pF, conductance in µS, potential in mV, resistivity in Ω·cm.
Painted properties override the cell defaults, which override the global
parameters. Where paintings overlap, the later one wins.
*/

use crate::cell::{CableCell, Paintable};
use crate::cv_policy::CvPolicy;
use crate::error::FvmResult;
use crate::execution::ExecutionContext;
use crate::geometry::{cv_geometry, CvGeometry};
use cablesim_config::{CableDefaults, CablesimConfig, IonDefaults};
use cablesim_morph::{extent, Cable, Embedding, Extent, Location, Morphology, NPOS};
use tracing::{debug, info};

/// Global cable parameters used where a cell sets nothing else
#[derive(Debug, Clone, PartialEq)]
pub struct CableParameters {
    pub cable: CableDefaults,
    pub ions: Vec<IonDefaults>,
    pub cv_policy: CvPolicy,
}

impl Default for CableParameters {
    fn default() -> Self {
        Self::from_config(&CablesimConfig::default())
    }
}

impl CableParameters {
    pub fn from_config(config: &CablesimConfig) -> Self {
        Self {
            cable: config.cable.clone(),
            ions: config.ions.clone(),
            cv_policy: CvPolicy::from(&config.discretization),
        }
    }

    pub fn ion(&self, name: &str) -> Option<&IonDefaults> {
        self.ions.iter().find(|ion| ion.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvDiscretization {
    pub geometry: CvGeometry,
    /// µm²
    pub cv_area: Vec<f64>,
    /// µm³
    pub cv_volume: Vec<f64>,
    /// µm
    pub cv_length: Vec<f64>,
    /// Equivalent diameter `4V/A`, µm
    pub cv_diameter: Vec<f64>,
    /// pF
    pub cv_capacitance: Vec<f64>,
    /// Conductance between a CV and its parent, µS
    pub face_conductance: Vec<f64>,
    /// mV
    pub init_membrane_potential: Vec<f64>,
    pub temperature_k: Vec<f64>,
}

impl CvDiscretization {
    pub fn new() -> Self {
        Self {
            geometry: CvGeometry::new(),
            ..Default::default()
        }
    }

    pub fn size(&self) -> usize {
        self.geometry.size()
    }

    pub fn append(&mut self, other: &CvDiscretization) {
        self.geometry.append(&other.geometry);
        self.cv_area.extend_from_slice(&other.cv_area);
        self.cv_volume.extend_from_slice(&other.cv_volume);
        self.cv_length.extend_from_slice(&other.cv_length);
        self.cv_diameter.extend_from_slice(&other.cv_diameter);
        self.cv_capacitance.extend_from_slice(&other.cv_capacitance);
        self.face_conductance.extend_from_slice(&other.face_conductance);
        self.init_membrane_potential
            .extend_from_slice(&other.init_membrane_potential);
        self.temperature_k.extend_from_slice(&other.temperature_k);
    }
}

/// A scalar property: a default plus paintings applied in order
struct PaintedScalar<'a> {
    default: f64,
    paints: Vec<(&'a Extent, f64)>,
}

impl<'a> PaintedScalar<'a> {
    fn new(
        cell: &'a CableCell,
        default: f64,
        select: impl Fn(&Paintable) -> Option<f64>,
    ) -> Self {
        let paints = cell
            .paintings()
            .iter()
            .filter_map(|(ext, p)| select(p).map(|v| (ext, v)))
            .collect();
        Self { default, paints }
    }

    /// Integral of `value · f` over a cable, `f` being additive over sub-cables
    fn integrate(&self, m: &Morphology, cable: &Cable, f: impl Fn(&Cable) -> f64) -> f64 {
        let mut remaining = Extent::new(vec![*cable]);
        let mut total = 0.0;
        for (ext, value) in self.paints.iter().rev() {
            if remaining.is_empty() {
                break;
            }
            let covered = extent::intersect(&remaining, ext);
            total += value * covered.iter().map(&f).sum::<f64>();
            remaining = extent::difference(m, &remaining, ext);
        }
        total + self.default * remaining.iter().map(&f).sum::<f64>()
    }

    fn value_at(&self, loc: &Location) -> f64 {
        self.paints
            .iter()
            .rev()
            .find(|(ext, _)| ext.contains(loc))
            .map_or(self.default, |(_, v)| *v)
    }
}

/// Discretize one cell
pub fn fvm_cv_discretize_cell(
    cell: &CableCell,
    params: &CableParameters,
) -> FvmResult<CvDiscretization> {
    let m = cell.morphology();
    let embedding = cell.embedding();
    let defaults = cell.defaults();

    let policy = defaults.cv_policy.as_ref().unwrap_or(&params.cv_policy);
    let boundaries = policy.cv_boundary_points(cell)?;
    let geometry = cv_geometry(cell, &boundaries)?;

    let cm = PaintedScalar::new(
        cell,
        defaults
            .membrane_capacitance
            .unwrap_or(params.cable.membrane_capacitance),
        |p| match p {
            Paintable::MembraneCapacitance(v) => Some(*v),
            _ => None,
        },
    );
    let rl = PaintedScalar::new(
        cell,
        defaults
            .axial_resistivity
            .unwrap_or(params.cable.axial_resistivity),
        |p| match p {
            Paintable::AxialResistivity(v) => Some(*v),
            _ => None,
        },
    );
    let vm = PaintedScalar::new(
        cell,
        defaults
            .init_membrane_potential
            .unwrap_or(params.cable.init_membrane_potential),
        |p| match p {
            Paintable::InitMembranePotential(v) => Some(*v),
            _ => None,
        },
    );
    let temp = PaintedScalar::new(
        cell,
        defaults.temperature_k.unwrap_or(params.cable.temperature_k),
        |p| match p {
            Paintable::Temperature(v) => Some(*v),
            _ => None,
        },
    );

    let n = geometry.size();
    let mut d = CvDiscretization {
        cv_area: Vec::with_capacity(n),
        cv_volume: Vec::with_capacity(n),
        cv_length: Vec::with_capacity(n),
        cv_diameter: Vec::with_capacity(n),
        cv_capacitance: Vec::with_capacity(n),
        face_conductance: Vec::with_capacity(n),
        init_membrane_potential: Vec::with_capacity(n),
        temperature_k: Vec::with_capacity(n),
        geometry: CvGeometry::new(),
    };

    for cv in 0..n {
        let cables = geometry.cables(cv);
        let area: f64 = cables.iter().map(|c| embedding.integrate_area(c)).sum();
        let volume: f64 = cables.iter().map(|c| embedding.integrate_volume(c)).sum();
        let length: f64 = cables.iter().map(|c| embedding.integrate_length(c)).sum();
        let area_of = |c: &Cable| embedding.integrate_area(c);

        d.cv_area.push(area);
        d.cv_volume.push(volume);
        d.cv_length.push(length);
        d.cv_diameter
            .push(if area > 0.0 { 4.0 * volume / area } else { 0.0 });
        d.cv_capacitance
            .push(cables.iter().map(|c| cm.integrate(m, c, area_of)).sum());

        let head = geometry.cv_head[cv];
        let area_average = |field: &PaintedScalar| {
            if area > 0.0 {
                cables.iter().map(|c| field.integrate(m, c, area_of)).sum::<f64>() / area
            } else {
                field.value_at(&head)
            }
        };
        d.init_membrane_potential.push(area_average(&vm));
        d.temperature_k.push(area_average(&temp));

        d.face_conductance
            .push(face_conductance(m, embedding, &geometry, cv, &rl));
    }
    d.geometry = geometry;

    debug!(
        target: "cablesim-fvm",
        "Discretized cell with {} policy: {} CVs, total area {:.3} µm²",
        policy,
        n,
        d.cv_area.iter().sum::<f64>()
    );
    Ok(d)
}

/// `100 / (rL · ∫ixa)` over the half cables either side of the CV head
fn face_conductance(
    m: &Morphology,
    embedding: &Embedding,
    geometry: &CvGeometry,
    cv: usize,
    rl: &PaintedScalar,
) -> f64 {
    let parent = geometry.cv_parent[cv];
    if parent == NPOS {
        return 0.0;
    }
    let head = geometry.cv_head[cv];

    let (parent_branch, parent_pos) = if head.pos == 0.0 {
        (m.branch_parent(head.branch), 1.0)
    } else {
        (head.branch, head.pos)
    };
    let upstream = geometry
        .cables(parent as usize)
        .iter()
        .find(|c| c.branch == parent_branch && c.dist_pos == parent_pos)
        .map(|c| Cable::new_unchecked(c.branch, 0.5 * (c.prox_pos + c.dist_pos), c.dist_pos));
    let downstream = geometry
        .cables(cv)
        .iter()
        .find(|c| c.branch == head.branch && c.prox_pos == head.pos)
        .map(|c| Cable::new_unchecked(c.branch, c.prox_pos, 0.5 * (c.prox_pos + c.dist_pos)));

    let ixa = |c: &Cable| embedding.integrate_ixa(c);
    let resistance: f64 = upstream
        .iter()
        .chain(downstream.iter())
        .map(|c| rl.integrate(m, c, ixa))
        .sum();

    if resistance > 0.0 {
        100.0 / resistance
    } else {
        0.0
    }
}

/// Discretize a group of cells, numbering CVs in cell order
pub fn fvm_cv_discretize(
    cells: &[CableCell],
    params: &CableParameters,
    context: &ExecutionContext,
) -> FvmResult<CvDiscretization> {
    let parts = context.map_cells(cells.len(), |i| fvm_cv_discretize_cell(&cells[i], params))?;

    let mut combined = CvDiscretization::new();
    for part in &parts {
        combined.append(part);
    }

    info!(
        target: "cablesim-fvm",
        "Discretized {} cells into {} CVs",
        cells.len(),
        combined.size()
    );
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Decor;
    use cablesim_morph::{LabelDict, Point, Region, SegmentTree};
    use std::f64::consts::PI;

    /// A 100 µm cylinder of radius 1
    fn cylinder(decor: Decor) -> CableCell {
        let mut t = SegmentTree::new();
        t.append(NPOS, Point::new(0.0, 0.0, 0.0, 1.0), Point::new(100.0, 0.0, 0.0, 1.0), 3)
            .unwrap();
        CableCell::new(Morphology::new(t), &LabelDict::new(), decor).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_cylinder_quantities() {
        let mut decor = Decor::new();
        decor.set_cv_policy(CvPolicy::FixedPerBranch(4));
        let d = fvm_cv_discretize_cell(&cylinder(decor), &CableParameters::default()).unwrap();

        assert_eq!(d.size(), 4);
        for cv in 0..4 {
            assert!(approx(d.cv_area[cv], 2.0 * PI * 25.0));
            assert!(approx(d.cv_volume[cv], PI * 25.0));
            assert!(approx(d.cv_diameter[cv], 2.0));
            assert!(approx(d.cv_capacitance[cv], 0.01 * 2.0 * PI * 25.0));
            assert!(approx(d.init_membrane_potential[cv], -65.0));
        }
        assert_eq!(d.face_conductance[0], 0.0);
        // 25 µm between CV midpoints: rL·L/(πr²) = 35.4·25/π Ω·cm/µm
        let expected = 100.0 / (35.4 * 25.0 / PI);
        assert!(approx(d.face_conductance[1], expected));
    }

    #[test]
    fn test_later_paint_wins() {
        let mut decor = Decor::new();
        decor
            .set_cv_policy(CvPolicy::Single)
            .paint(Region::all(), Paintable::MembraneCapacitance(0.02))
            .paint(Region::cable(0, 0.5, 1.0).unwrap(), Paintable::MembraneCapacitance(0.04))
            .paint(Region::cable(0, 0.0, 0.25).unwrap(), Paintable::InitMembranePotential(-85.0));
        let d = fvm_cv_discretize_cell(&cylinder(decor), &CableParameters::default()).unwrap();

        let half = PI * 100.0;
        assert!(approx(d.cv_capacitance[0], 0.02 * half + 0.04 * half));
        assert!(approx(d.init_membrane_potential[0], 0.25 * -85.0 + 0.75 * -65.0));
    }

    #[test]
    fn test_cell_defaults_override_parameters() {
        let mut decor = Decor::new();
        decor.set_default(crate::cell::CellDefaults {
            temperature_k: Some(300.0),
            cv_policy: Some(CvPolicy::Single),
            ..Default::default()
        });
        let d = fvm_cv_discretize_cell(&cylinder(decor), &CableParameters::default()).unwrap();
        assert_eq!(d.size(), 1);
        assert!(approx(d.temperature_k[0], 300.0));
    }

    #[test]
    fn test_group_numbering_matches_serial() {
        let cells: Vec<CableCell> = (0..5).map(|_| cylinder(Decor::new())).collect();
        let params = CableParameters {
            cv_policy: CvPolicy::FixedPerBranch(3),
            ..Default::default()
        };
        let serial = fvm_cv_discretize(&cells, &params, &ExecutionContext::serial()).unwrap();
        let threaded =
            fvm_cv_discretize(&cells, &params, &ExecutionContext::with_threads(2).unwrap()).unwrap();

        assert_eq!(serial, threaded);
        assert_eq!(serial.size(), 15);
        assert_eq!(serial.geometry.cv_parent[3..6], [NPOS, 3, 4]);
        assert_eq!(serial.geometry.cell_cv_divs, vec![0, 3, 6, 9, 12, 15]);
    }
}
