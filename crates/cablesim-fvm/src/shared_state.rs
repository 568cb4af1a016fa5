// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
State shared by every mechanism of a cell group.

Per-CV arrays (voltage, current density, conductivity, ...) are indexed by
global CV; time is kept per integration domain. Mechanisms read and write
these arrays through their node and ion index rows rather than owning any
of them.
*/

use crate::error::{FvmError, FvmResult};
use crate::gap_junctions::FvmGapJunction;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default alignment in bytes of mechanism data rows
pub const DEFAULT_ALIGNMENT: usize = 64;

/// Where an event lands: mechanism, instance and integration domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetHandle {
    pub mech_id: u32,
    pub mech_index: u32,
    pub intdom_index: u32,
}

impl TargetHandle {
    pub const fn new(mech_id: u32, mech_index: u32, intdom_index: u32) -> Self {
        Self {
            mech_id,
            mech_index,
            intdom_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliverableEvent {
    pub time: f64,
    pub handle: TargetHandle,
    pub weight: f32,
}

/// Per-CV layout and start values of one ion species
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IonConfig {
    /// CVs where some mechanism uses the ion, ascending
    pub cv: Vec<u32>,
    pub init_iconc: Vec<f64>,
    pub init_econc: Vec<f64>,
    pub reset_iconc: Vec<f64>,
    pub reset_econc: Vec<f64>,
    pub init_revpot: Vec<f64>,
}

/// Ion species state over the CVs in `node_index`
#[derive(Debug, Clone, PartialEq)]
pub struct IonState {
    pub charge: i32,
    pub node_index: Vec<u32>,
    /// Current density, A/m²
    pub i_x: Vec<f64>,
    /// Reversal potential, mV
    pub e_x: Vec<f64>,
    /// Internal concentration, mM
    pub x_i: Vec<f64>,
    /// External concentration, mM
    pub x_o: Vec<f64>,
    pub init_xi: Vec<f64>,
    pub init_xo: Vec<f64>,
    pub reset_xi: Vec<f64>,
    pub reset_xo: Vec<f64>,
    pub init_ex: Vec<f64>,
}

impl IonState {
    pub fn new(name: &str, charge: i32, config: &IonConfig) -> FvmResult<Self> {
        let n = config.cv.len();
        for (field, len) in [
            ("init_iconc", config.init_iconc.len()),
            ("init_econc", config.init_econc.len()),
            ("reset_iconc", config.reset_iconc.len()),
            ("reset_econc", config.reset_econc.len()),
            ("init_revpot", config.init_revpot.len()),
        ] {
            if len != n {
                return Err(FvmError::StateSizeMismatch {
                    name: format!("{}.{}", name, field),
                    expected: n,
                    actual: len,
                });
            }
        }

        let mut state = Self {
            charge,
            node_index: config.cv.clone(),
            i_x: vec![0.0; n],
            e_x: config.init_revpot.clone(),
            x_i: config.reset_iconc.clone(),
            x_o: config.reset_econc.clone(),
            init_xi: config.init_iconc.clone(),
            init_xo: config.init_econc.clone(),
            reset_xi: config.reset_iconc.clone(),
            reset_xo: config.reset_econc.clone(),
            init_ex: config.init_revpot.clone(),
        };
        state.reset();
        Ok(state)
    }

    pub fn size(&self) -> usize {
        self.node_index.len()
    }

    /// Set concentrations to their initial values; concentration writers
    /// add their contributions on top
    pub fn init_concentration(&mut self) {
        self.x_i.copy_from_slice(&self.init_xi);
        self.x_o.copy_from_slice(&self.init_xo);
    }

    pub fn reset(&mut self) {
        self.i_x.fill(0.0);
        self.e_x.copy_from_slice(&self.init_ex);
        self.x_i.copy_from_slice(&self.reset_xi);
        self.x_o.copy_from_slice(&self.reset_xo);
    }
}

#[derive(Debug, Clone)]
pub struct SharedState {
    n_intdom: usize,
    n_cv: usize,
    alignment: usize,

    pub cv_to_intdom: Vec<u32>,
    /// Current time per integration domain, ms
    pub time: Vec<f64>,
    /// End of the current step per integration domain, ms
    pub time_to: Vec<f64>,
    /// Step size per CV, ms
    pub dt_cv: Vec<f64>,
    /// mV
    pub voltage: Vec<f64>,
    /// A/m²
    pub current_density: Vec<f64>,
    /// kS/m²
    pub conductivity: Vec<f64>,
    pub init_voltage: Vec<f64>,
    pub temperature_degc: Vec<f64>,
    /// µm
    pub diameter: Vec<f64>,
    pub gap_junctions: Vec<FvmGapJunction>,
    pub ion_data: AHashMap<String, IonState>,
    pub deliverable_events: Vec<DeliverableEvent>,
}

impl SharedState {
    pub fn new(
        n_intdom: usize,
        cv_to_intdom: Vec<u32>,
        gap_junctions: Vec<FvmGapJunction>,
        init_voltage: Vec<f64>,
        temperature_k: &[f64],
        diameter: Vec<f64>,
        alignment: usize,
    ) -> FvmResult<Self> {
        let n_cv = cv_to_intdom.len();
        for (name, len) in [
            ("init_voltage", init_voltage.len()),
            ("temperature", temperature_k.len()),
            ("diameter", diameter.len()),
        ] {
            if len != n_cv {
                return Err(FvmError::StateSizeMismatch {
                    name: name.to_string(),
                    expected: n_cv,
                    actual: len,
                });
            }
        }
        if let Some(&d) = cv_to_intdom.iter().find(|&&d| d as usize >= n_intdom) {
            return Err(FvmError::StateSizeMismatch {
                name: "cv_to_intdom".to_string(),
                expected: n_intdom,
                actual: d as usize + 1,
            });
        }

        let mut state = Self {
            n_intdom,
            n_cv,
            alignment: alignment.max(std::mem::size_of::<f64>()),
            cv_to_intdom,
            time: vec![0.0; n_intdom],
            time_to: vec![0.0; n_intdom],
            dt_cv: vec![0.0; n_cv],
            voltage: init_voltage.clone(),
            current_density: vec![0.0; n_cv],
            conductivity: vec![0.0; n_cv],
            init_voltage,
            temperature_degc: temperature_k.iter().map(|t| t - 273.15).collect(),
            diameter,
            gap_junctions,
            ion_data: AHashMap::new(),
            deliverable_events: Vec::new(),
        };
        state.reset();
        Ok(state)
    }

    pub fn add_ion(&mut self, name: &str, charge: i32, config: &IonConfig) -> FvmResult<()> {
        if let Some(&cv) = config.cv.iter().find(|&&cv| cv as usize >= self.n_cv) {
            return Err(FvmError::StateSizeMismatch {
                name: format!("{}.cv", name),
                expected: self.n_cv,
                actual: cv as usize + 1,
            });
        }
        debug!(
            target: "cablesim-fvm",
            "Ion {} (charge {}) on {} CVs",
            name,
            charge,
            config.cv.len()
        );
        self.ion_data
            .insert(name.to_string(), IonState::new(name, charge, config)?);
        Ok(())
    }

    pub fn ion(&self, name: &str) -> Option<&IonState> {
        self.ion_data.get(name)
    }

    pub fn ion_mut(&mut self, name: &str) -> Option<&mut IonState> {
        self.ion_data.get_mut(name)
    }

    /// Alignment in bytes for mechanism data rows
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn n_intdom(&self) -> usize {
        self.n_intdom
    }

    pub fn size(&self) -> usize {
        self.n_cv
    }

    /// Back to the initial state at time zero
    pub fn reset(&mut self) {
        self.voltage.copy_from_slice(&self.init_voltage);
        self.current_density.fill(0.0);
        self.conductivity.fill(0.0);
        self.time.fill(0.0);
        self.time_to.fill(0.0);
        self.dt_cv.fill(0.0);
        self.deliverable_events.clear();
        for ion in self.ion_data.values_mut() {
            ion.reset();
        }
    }

    /// Clear current and conductivity before mechanisms contribute
    pub fn zero_currents(&mut self) {
        self.current_density.fill(0.0);
        self.conductivity.fill(0.0);
        for ion in self.ion_data.values_mut() {
            ion.i_x.fill(0.0);
        }
    }

    /// Next step end per domain: `min(time + dt, tmax)`
    pub fn update_time_to(&mut self, dt: f64, tmax: f64) {
        for (to, t) in self.time_to.iter_mut().zip(&self.time) {
            *to = (t + dt).min(tmax);
        }
    }

    /// Step size of every CV from its domain's time window
    pub fn set_dt(&mut self) {
        for (dt, &d) in self.dt_cv.iter_mut().zip(&self.cv_to_intdom) {
            let d = d as usize;
            *dt = self.time_to[d] - self.time[d];
        }
    }

    /// Gap junction currents, `weight · (v - v_peer)` into the local CV
    pub fn add_gj_current(&mut self) {
        for gj in &self.gap_junctions {
            let (cv, peer) = (gj.loc.0 as usize, gj.loc.1 as usize);
            self.current_density[cv] += gj.weight * (self.voltage[cv] - self.voltage[peer]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ion_config(cv: Vec<u32>) -> IonConfig {
        let n = cv.len();
        IonConfig {
            cv,
            init_iconc: vec![1.0; n],
            init_econc: vec![2.0; n],
            reset_iconc: vec![3.0; n],
            reset_econc: vec![4.0; n],
            init_revpot: vec![5.0; n],
        }
    }

    fn state() -> SharedState {
        SharedState::new(
            2,
            vec![0, 0, 1],
            vec![FvmGapJunction {
                loc: (0, 2),
                weight: 0.5,
            }],
            vec![-65.0, -60.0, -70.0],
            &[300.0; 3],
            vec![1.0; 3],
            DEFAULT_ALIGNMENT,
        )
        .unwrap()
    }

    #[test]
    fn test_ion_reset_and_init() {
        let mut s = state();
        s.add_ion("ca", 2, &ion_config(vec![0, 2])).unwrap();

        let ca = s.ion_mut("ca").unwrap();
        assert_eq!(ca.x_i, vec![3.0, 3.0]);
        ca.init_concentration();
        assert_eq!(ca.x_i, vec![1.0, 1.0]);
        assert_eq!(ca.x_o, vec![2.0, 2.0]);

        ca.i_x[1] = 7.0;
        s.reset();
        let ca = s.ion("ca").unwrap();
        assert_eq!(ca.i_x, vec![0.0, 0.0]);
        assert_eq!(ca.x_i, vec![3.0, 3.0]);
        assert_eq!(ca.e_x, vec![5.0, 5.0]);
    }

    #[test]
    fn test_bad_ion_config() {
        let mut s = state();
        assert!(s.add_ion("na", 1, &ion_config(vec![3])).is_err());

        let mut config = ion_config(vec![0]);
        config.init_revpot.clear();
        assert!(matches!(
            s.add_ion("na", 1, &config),
            Err(FvmError::StateSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_time_and_dt() {
        let mut s = state();
        s.time[1] = 0.95;
        s.update_time_to(0.1, 1.0);
        s.set_dt();
        assert_eq!(s.time_to, vec![0.1, 1.0]);
        assert!((s.dt_cv[2] - 0.05).abs() < 1e-12);
        assert_eq!(s.dt_cv[0], 0.1);
    }

    #[test]
    fn test_gap_junction_current() {
        let mut s = state();
        s.add_gj_current();
        assert_eq!(s.current_density, vec![2.5, 0.0, 0.0]);
        assert!((s.temperature_degc[0] - 26.85).abs() < 1e-9);
    }

    #[test]
    fn test_size_checks() {
        assert!(SharedState::new(1, vec![0, 1], vec![], vec![0.0; 2], &[0.0; 2], vec![0.0; 2], 64)
            .is_err());
        assert!(SharedState::new(1, vec![0, 0], vec![], vec![0.0; 1], &[0.0; 2], vec![0.0; 2], 64)
            .is_err());
    }
}
