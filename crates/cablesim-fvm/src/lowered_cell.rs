// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
A group of cells lowered onto the finite-volume grid.

[`FvmLoweredCell::initialize`] runs the whole pipeline: integration domains,
discretization, gap junctions, shared state and mechanism instantiation.
Mechanism ids follow the sorted mechanism names.
*/

use crate::catalogue::MechanismCatalogue;
use crate::discretization::{fvm_cv_discretize, CableParameters, CvDiscretization};
use crate::error::{FvmError, FvmResult};
use crate::execution::ExecutionContext;
use crate::gap_junctions::{fvm_gap_junctions, fvm_intdom};
use crate::layout::fvm_build_mechanism_data;
use crate::mechanism::{Mechanism, MechanismKind, MechanismLayout};
use crate::recipe::CableRecipe;
use crate::shared_state::{DeliverableEvent, SharedState, TargetHandle, DEFAULT_ALIGNMENT};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct FvmLoweredCell {
    context: ExecutionContext,
    state: Option<SharedState>,
    mechanisms: Vec<Mechanism>,
    discretization: CvDiscretization,
    target_handles: Vec<TargetHandle>,
    cell_to_intdom: Vec<u32>,
}

impl FvmLoweredCell {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            state: None,
            mechanisms: Vec::new(),
            discretization: CvDiscretization::new(),
            target_handles: Vec::new(),
            cell_to_intdom: Vec::new(),
        }
    }

    pub fn initialize<R: CableRecipe + ?Sized>(
        &mut self,
        gids: &[u32],
        recipe: &R,
        catalogue: &MechanismCatalogue,
        params: &CableParameters,
    ) -> FvmResult<()> {
        let start = Instant::now();

        let cells = gids
            .iter()
            .map(|&gid| recipe.cell_description(gid))
            .collect::<FvmResult<Vec<_>>>()?;

        let (cell_to_intdom, n_intdom) = fvm_intdom(recipe, gids)?;
        let d = fvm_cv_discretize(&cells, params, &self.context)?;
        let gap_junctions = fvm_gap_junctions(&cells, gids, recipe, &d)?;
        let mech_data = fvm_build_mechanism_data(params, &cells, &d, catalogue)?;

        let cv_to_intdom = d
            .geometry
            .cv_to_cell
            .iter()
            .map(|&c| cell_to_intdom[c as usize])
            .collect();
        let mut state = SharedState::new(
            n_intdom,
            cv_to_intdom,
            gap_junctions,
            d.init_membrane_potential.clone(),
            &d.temperature_k,
            d.cv_diameter.clone(),
            DEFAULT_ALIGNMENT,
        )?;

        for (name, config) in &mech_data.ions {
            let charge = params
                .ion(name)
                .map(|ion| ion.valence)
                .ok_or_else(|| FvmError::UnknownIon(name.clone()))?;
            state.add_ion(name, charge, config)?;
        }

        let mut target_handles = vec![TargetHandle::default(); mech_data.n_target];
        let mut mechanisms = Vec::with_capacity(mech_data.mechanisms.len());
        for (id, (name, config)) in mech_data.mechanisms.iter().enumerate() {
            let id = id as u32;
            let (mut mech, overrides) = catalogue.instance(name)?;
            let layout = MechanismLayout {
                cv: config.cv.clone(),
                weight: config.norm_area.clone(),
            };
            mech.instantiate(id, &state, &overrides, &layout)?;
            for (key, values) in &config.param_values {
                mech.set_parameter(key, values)?;
            }

            if config.kind == MechanismKind::Point {
                for (index, (&target, &cv)) in config.target.iter().zip(&config.cv).enumerate() {
                    let cell = d.geometry.cv_to_cell[cv as usize] as usize;
                    target_handles[target as usize] =
                        TargetHandle::new(id, index as u32, cell_to_intdom[cell]);
                }
            }
            mechanisms.push(mech);
        }

        info!(
            target: "cablesim-fvm",
            "Lowered {} cells: {} CVs, {} integration domains, {} mechanisms in {:?}",
            gids.len(),
            d.size(),
            n_intdom,
            mechanisms.len(),
            start.elapsed()
        );

        self.state = Some(state);
        self.mechanisms = mechanisms;
        self.discretization = d;
        self.target_handles = target_handles;
        self.cell_to_intdom = cell_to_intdom;
        self.reset();
        Ok(())
    }

    /// Back to time zero: reset the shared state, then initialize every mechanism
    pub fn reset(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.reset();
        for ion in state.ion_data.values_mut() {
            ion.init_concentration();
        }
        for mech in &mut self.mechanisms {
            mech.initialize(state);
        }
        debug!(target: "cablesim-fvm", "Reset {} mechanisms", self.mechanisms.len());
    }

    /// Queue events and hand them to the mechanisms they target
    pub fn deliver_events(&mut self, events: &[DeliverableEvent]) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.deliverable_events.extend_from_slice(events);
        for mech in &mut self.mechanisms {
            mech.deliver_events(state);
        }
        state.deliverable_events.clear();
    }

    /// Zero the currents, then add gap junction and mechanism contributions
    pub fn compute_currents(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.zero_currents();
        state.add_gj_current();
        for mech in &mut self.mechanisms {
            mech.compute_currents(state);
        }
    }

    pub fn state(&self) -> Option<&SharedState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut SharedState> {
        self.state.as_mut()
    }

    pub fn mechanisms(&self) -> &[Mechanism] {
        &self.mechanisms
    }

    pub fn find_mechanism(&self, name: &str) -> Option<&Mechanism> {
        self.mechanisms.iter().find(|m| m.name() == name)
    }

    pub fn discretization(&self) -> &CvDiscretization {
        &self.discretization
    }

    /// Handles of every target, numbered per cell in placement order
    pub fn target_handles(&self) -> &[TargetHandle] {
        &self.target_handles
    }

    pub fn cell_to_intdom(&self) -> &[u32] {
        &self.cell_to_intdom
    }

    pub fn num_intdom(&self) -> usize {
        self.state.as_ref().map_or(0, SharedState::n_intdom)
    }
}
