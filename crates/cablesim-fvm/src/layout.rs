// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Mechanism placement on the CV grid.

Density mechanisms get one instance per CV they cover, weighted by the
fraction of the CV area covered. Point mechanisms get one instance per
placed location, ordered by CV; instances on the same CV keep their
placement order. Ion species are set up on the union of CVs of the
mechanisms that use them.
*/

use crate::catalogue::MechanismCatalogue;
use crate::cell::{CableCell, MechanismDesc, Paintable};
use crate::discretization::{CableParameters, CvDiscretization};
use crate::error::{FvmError, FvmResult};
use crate::geometry::CvPrefer;
use crate::mechanism::{MechanismInfo, MechanismKind};
use crate::shared_state::IonConfig;
use cablesim_morph::{extent, Extent};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct FvmMechanismConfig {
    pub kind: MechanismKind,
    pub cv: Vec<u32>,
    /// Density: covered fraction of the CV area. Point: `1e3 / area`,
    /// converting a current in nA to a density in A/m².
    pub norm_area: Vec<f64>,
    /// Parameters set by some placement, one value per instance
    pub param_values: Vec<(String, Vec<f64>)>,
    /// Point mechanisms: target number of each instance
    pub target: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FvmMechanismData {
    pub mechanisms: BTreeMap<String, FvmMechanismConfig>,
    pub ions: BTreeMap<String, IonConfig>,
    /// Targets over all cells, numbered per cell in placement order
    pub n_target: usize,
}

struct DensityPaint<'a> {
    cell: usize,
    extent: &'a Extent,
    desc: &'a MechanismDesc,
}

struct PointInstance<'a> {
    cv: u32,
    target: u32,
    desc: &'a MechanismDesc,
}

fn expect_kind(name: &str, info: &MechanismInfo, expected: MechanismKind) -> FvmResult<()> {
    if info.kind == expected {
        Ok(())
    } else {
        Err(FvmError::MechanismKindMismatch {
            name: name.to_string(),
            expected,
            found: info.kind,
        })
    }
}

/// Union of parameter names set by the descriptions, checked against the
/// mechanism's fields
fn parameter_names<'a>(
    name: &str,
    info: &MechanismInfo,
    descs: impl Iterator<Item = &'a MechanismDesc>,
) -> FvmResult<Vec<&'a str>> {
    let mut names = BTreeSet::new();
    for desc in descs {
        for key in desc.params.keys() {
            if info.field_index(key).is_none() {
                return Err(FvmError::NoSuchParameter {
                    mechanism: name.to_string(),
                    key: key.clone(),
                });
            }
            names.insert(key.as_str());
        }
    }
    Ok(names.into_iter().collect())
}

/// Explicit value, else the field default, else NaN
fn parameter_value(info: &MechanismInfo, desc: &MechanismDesc, key: &str) -> f64 {
    desc.get(key)
        .or_else(|| info.field_index(key).and_then(|i| info.fields[i].default))
        .unwrap_or(f64::NAN)
}

fn build_density(
    name: &str,
    info: &MechanismInfo,
    paints: &[DensityPaint<'_>],
    cells: &[CableCell],
    d: &CvDiscretization,
) -> FvmResult<FvmMechanismConfig> {
    expect_kind(name, info, MechanismKind::Density)?;
    let keys = parameter_names(name, info, paints.iter().map(|p| p.desc))?;

    for (i, a) in paints.iter().enumerate() {
        let embedding = cells[a.cell].embedding();
        for b in paints[i + 1..].iter().filter(|b| b.cell == a.cell) {
            let overlap: f64 = extent::intersect(a.extent, b.extent)
                .iter()
                .map(|c| embedding.integrate_length(c))
                .sum();
            if overlap > 0.0 {
                return Err(FvmError::Overpaint {
                    mechanism: name.to_string(),
                });
            }
        }
    }

    // cv -> (covered area, area-weighted parameter sums)
    let mut coverage: BTreeMap<u32, (f64, Vec<f64>)> = BTreeMap::new();
    for paint in paints {
        let embedding = cells[paint.cell].embedding();
        let values: Vec<f64> = keys
            .iter()
            .map(|k| parameter_value(info, paint.desc, k))
            .collect();

        for cv in d.geometry.cell_cvs(paint.cell) {
            let cv_extent = Extent::new(d.geometry.cables(cv).to_vec());
            let area: f64 = extent::intersect(&cv_extent, paint.extent)
                .iter()
                .map(|c| embedding.integrate_area(c))
                .sum();
            if area <= 0.0 {
                continue;
            }
            let entry = coverage
                .entry(cv as u32)
                .or_insert_with(|| (0.0, vec![0.0; keys.len()]));
            entry.0 += area;
            for (sum, v) in entry.1.iter_mut().zip(&values) {
                *sum += area * v;
            }
        }
    }

    let cv: Vec<u32> = coverage.keys().copied().collect();
    let norm_area = coverage
        .iter()
        .map(|(&cv, (area, _))| (area / d.cv_area[cv as usize]).min(1.0))
        .collect();
    let param_values = keys
        .iter()
        .enumerate()
        .map(|(k, key)| {
            let values = coverage.values().map(|(area, sums)| sums[k] / area).collect();
            (key.to_string(), values)
        })
        .collect();

    Ok(FvmMechanismConfig {
        kind: MechanismKind::Density,
        cv,
        norm_area,
        param_values,
        target: Vec::new(),
    })
}

fn build_point(
    name: &str,
    info: &MechanismInfo,
    mut instances: Vec<PointInstance<'_>>,
    d: &CvDiscretization,
) -> FvmResult<FvmMechanismConfig> {
    expect_kind(name, info, MechanismKind::Point)?;
    let keys = parameter_names(name, info, instances.iter().map(|p| p.desc))?;

    instances.sort_by_key(|p| p.cv);

    let cv: Vec<u32> = instances.iter().map(|p| p.cv).collect();
    let norm_area = cv
        .iter()
        .map(|&cv| {
            let area = d.cv_area[cv as usize];
            if area > 0.0 {
                1e3 / area
            } else {
                0.0
            }
        })
        .collect();
    let param_values = keys
        .iter()
        .map(|key| {
            let values = instances
                .iter()
                .map(|p| parameter_value(info, p.desc, key))
                .collect();
            (key.to_string(), values)
        })
        .collect();

    Ok(FvmMechanismConfig {
        kind: MechanismKind::Point,
        cv,
        norm_area,
        param_values,
        target: instances.iter().map(|p| p.target).collect(),
    })
}

fn build_ions(
    params: &CableParameters,
    mechanisms: &BTreeMap<String, FvmMechanismConfig>,
    catalogue: &MechanismCatalogue,
) -> FvmResult<BTreeMap<String, IonConfig>> {
    #[derive(Default)]
    struct IonUse {
        cvs: BTreeSet<u32>,
        int_writers: BTreeMap<u32, f64>,
        ext_writers: BTreeMap<u32, f64>,
    }

    let mut uses: BTreeMap<String, IonUse> = BTreeMap::new();
    for (name, config) in mechanisms {
        let info = catalogue.info(name)?;
        for (dep, ion) in info.ions.iter().zip(catalogue.ion_names(name)?) {
            let entry = uses.entry(ion).or_default();
            entry.cvs.extend(config.cv.iter().copied());
            if config.kind != MechanismKind::Density {
                continue;
            }
            for (&cv, &w) in config.cv.iter().zip(&config.norm_area) {
                if dep.write_int_concentration {
                    *entry.int_writers.entry(cv).or_default() += w;
                }
                if dep.write_ext_concentration {
                    *entry.ext_writers.entry(cv).or_default() += w;
                }
            }
        }
    }

    let mut ions = BTreeMap::new();
    for (name, used) in uses {
        let defaults = params
            .ion(&name)
            .ok_or_else(|| FvmError::UnknownIon(name.clone()))?;
        let cv: Vec<u32> = used.cvs.into_iter().collect();
        // Concentration writers own their share of the CV.
        let unwritten = |writers: &BTreeMap<u32, f64>, cv: &u32| {
            1.0 - writers.get(cv).copied().unwrap_or(0.0).min(1.0)
        };
        let n = cv.len();
        let config = IonConfig {
            init_iconc: cv
                .iter()
                .map(|c| defaults.internal_concentration * unwritten(&used.int_writers, c))
                .collect(),
            init_econc: cv
                .iter()
                .map(|c| defaults.external_concentration * unwritten(&used.ext_writers, c))
                .collect(),
            reset_iconc: vec![defaults.internal_concentration; n],
            reset_econc: vec![defaults.external_concentration; n],
            init_revpot: vec![defaults.reversal_potential; n],
            cv,
        };
        ions.insert(name, config);
    }
    Ok(ions)
}

/// Mechanism and ion layout of a discretized cell group
pub fn fvm_build_mechanism_data(
    params: &CableParameters,
    cells: &[CableCell],
    d: &CvDiscretization,
    catalogue: &MechanismCatalogue,
) -> FvmResult<FvmMechanismData> {
    let mut density: BTreeMap<&str, Vec<DensityPaint<'_>>> = BTreeMap::new();
    let mut point: BTreeMap<&str, Vec<PointInstance<'_>>> = BTreeMap::new();
    let mut n_target = 0usize;

    for (ci, cell) in cells.iter().enumerate() {
        for (ext, what) in cell.paintings() {
            if let Paintable::Density(desc) = what {
                density.entry(desc.name.as_str()).or_default().push(DensityPaint {
                    cell: ci,
                    extent: ext,
                    desc,
                });
            }
        }
        for syn in cell.synapses() {
            let cv = d.geometry.location_cv(ci, &syn.loc, CvPrefer::Nonempty)?;
            point.entry(syn.item.name.as_str()).or_default().push(PointInstance {
                cv,
                target: (n_target + syn.lid as usize) as u32,
                desc: &syn.item,
            });
        }
        n_target += cell.num_targets();
    }

    let mut mechanisms = BTreeMap::new();
    for (name, paints) in &density {
        let info = catalogue.info(name)?;
        let config = build_density(name, info, paints, cells, d)?;
        debug!(target: "cablesim-fvm", "Density mechanism {} on {} CVs", name, config.cv.len());
        mechanisms.insert(name.to_string(), config);
    }
    for (name, instances) in point {
        let info = catalogue.info(name)?;
        let config = build_point(name, info, instances, d)?;
        debug!(target: "cablesim-fvm", "Point mechanism {} with {} instances", name, config.cv.len());
        mechanisms.insert(name.to_string(), config);
    }

    let ions = build_ions(params, &mechanisms, catalogue)?;
    info!(
        target: "cablesim-fvm",
        "Mechanism layout: {} mechanisms, {} ions, {} targets",
        mechanisms.len(),
        ions.len(),
        n_target
    );

    Ok(FvmMechanismData {
        mechanisms,
        ions,
        n_target,
    })
}
