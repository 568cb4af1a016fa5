// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Mechanism instances and their data arena.

A mechanism owns two flat blocks, each split into rows of `padded_width`
entries:

| block   | row 0        | row `1 + i`           |
|---------|--------------|-----------------------|
| data    | weights      | field `i`             |
| indices | CV per slot  | slot into ion `i`     |

Field rows start as NaN except where the field declares a default, so an
unset parameter is visible as such. Kernels see the arena through a
[`MechanismView`]; nothing holds pointers into it.
*/

use crate::error::{FvmError, FvmResult};
use crate::shared_state::{DeliverableEvent, SharedState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MechanismKind {
    /// Painted over regions, one instance per covered CV
    Density,
    /// Placed on locations, one instance per location
    Point,
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MechanismKind::Density => write!(f, "density"),
            MechanismKind::Point => write!(f, "point"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    /// `None` leaves the field NaN until it is set
    #[serde(default)]
    pub default: Option<f64>,
    #[serde(default)]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalInfo {
    pub name: String,
    pub default: f64,
    #[serde(default)]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonDependency {
    pub ion: String,
    #[serde(default)]
    pub write_int_concentration: bool,
    #[serde(default)]
    pub write_ext_concentration: bool,
    /// Required charge of the ion, if the mechanism relies on one
    #[serde(default)]
    pub verify_valence: Option<i32>,
}

impl IonDependency {
    pub fn new(ion: impl Into<String>) -> Self {
        Self {
            ion: ion.into(),
            write_int_concentration: false,
            write_ext_concentration: false,
            verify_valence: None,
        }
    }
}

/// Static description of a mechanism: its fields, globals and ions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanismInfo {
    pub name: String,
    pub kind: MechanismKind,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub globals: Vec<GlobalInfo>,
    #[serde(default)]
    pub ions: Vec<IonDependency>,
}

impl MechanismInfo {
    pub fn new(name: impl Into<String>, kind: MechanismKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            globals: Vec::new(),
            ions: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, default: Option<f64>) -> Self {
        self.fields.push(FieldInfo {
            name: name.into(),
            default,
            units: String::new(),
        });
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, default: f64) -> Self {
        self.globals.push(GlobalInfo {
            name: name.into(),
            default,
            units: String::new(),
        });
        self
    }

    pub fn with_ion(mut self, dependency: IonDependency) -> Self {
        self.ions.push(dependency);
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn global_index(&self, name: &str) -> Option<usize> {
        self.globals.iter().position(|g| g.name == name)
    }

    pub fn ion_index(&self, ion: &str) -> Option<usize> {
        self.ions.iter().position(|d| d.ion == ion)
    }
}

/// CVs and weights of the instances of one mechanism
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MechanismLayout {
    pub cv: Vec<u32>,
    pub weight: Vec<f64>,
}

/// Global values and ion renaming applied at instantiation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MechanismOverrides {
    pub globals: BTreeMap<String, f64>,
    /// Declared ion name -> ion in the shared state
    pub ion_rebind: BTreeMap<String, String>,
}

/// Row of a field in the data block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(usize);

impl FieldHandle {
    /// Handle of the field at `index` in [`MechanismInfo::fields`]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Kernel-side access to a mechanism's arena
pub struct MechanismView<'a> {
    width: usize,
    padded: usize,
    data: &'a mut [f64],
    indices: &'a [u32],
    globals: &'a [f64],
    ion_names: &'a [String],
}

impl<'a> MechanismView<'a> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn weight(&self) -> &[f64] {
        &self.data[..self.width]
    }

    pub fn field(&self, handle: FieldHandle) -> &[f64] {
        let start = (handle.0 + 1) * self.padded;
        &self.data[start..start + self.width]
    }

    pub fn field_mut(&mut self, handle: FieldHandle) -> &mut [f64] {
        let start = (handle.0 + 1) * self.padded;
        &mut self.data[start..start + self.width]
    }

    /// Two distinct field rows at once
    pub fn field_pair_mut(&mut self, a: FieldHandle, b: FieldHandle) -> (&mut [f64], &mut [f64]) {
        assert_ne!(a, b, "field_pair_mut needs two different fields");
        let (w, p) = (self.width, self.padded);
        let (lo, hi, swap) = if a.0 < b.0 { (a.0, b.0, false) } else { (b.0, a.0, true) };
        let (head, tail) = self.data.split_at_mut((hi + 1) * p);
        let first = &mut head[(lo + 1) * p..(lo + 1) * p + w];
        let second = &mut tail[..w];
        if swap {
            (second, first)
        } else {
            (first, second)
        }
    }

    pub fn node_index(&self) -> &[u32] {
        &self.indices[..self.width]
    }

    /// Slots into the `i`-th ion's arrays
    pub fn ion_index(&self, i: usize) -> &[u32] {
        let start = (i + 1) * self.padded;
        &self.indices[start..start + self.width]
    }

    /// Name of the `i`-th ion in the shared state
    pub fn ion_name(&self, i: usize) -> &str {
        &self.ion_names[i]
    }

    pub fn global(&self, i: usize) -> f64 {
        self.globals[i]
    }
}

/// The numerical part of a mechanism, supplied from outside this crate
pub trait MechanismKernel: Send + Sync {
    fn initialize(&self, _mech: &mut MechanismView<'_>, _state: &SharedState) {}

    fn compute_currents(&self, mech: &mut MechanismView<'_>, state: &mut SharedState);

    fn apply_events(&self, _mech: &mut MechanismView<'_>, _events: &[DeliverableEvent]) {}
}

pub struct Mechanism {
    name: String,
    info: Arc<MechanismInfo>,
    kernel: Arc<dyn MechanismKernel>,
    mechanism_id: Option<u32>,
    width: usize,
    padded: usize,
    data: Vec<f64>,
    indices: Vec<u32>,
    globals: Vec<f64>,
    ion_names: Vec<String>,
}

impl fmt::Debug for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mechanism")
            .field("name", &self.name)
            .field("kind", &self.info.kind)
            .field("mechanism_id", &self.mechanism_id)
            .field("width", &self.width)
            .finish()
    }
}

impl Mechanism {
    pub fn new(
        name: impl Into<String>,
        info: Arc<MechanismInfo>,
        kernel: Arc<dyn MechanismKernel>,
    ) -> Self {
        let globals = info.globals.iter().map(|g| g.default).collect();
        let ion_names = info.ions.iter().map(|d| d.ion.clone()).collect();
        Self {
            name: name.into(),
            info,
            kernel,
            mechanism_id: None,
            width: 0,
            padded: 0,
            data: Vec::new(),
            indices: Vec::new(),
            globals,
            ion_names,
        }
    }

    /// Catalogue name, which differs from the info name for derived mechanisms
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &MechanismInfo {
        &self.info
    }

    pub fn kind(&self) -> MechanismKind {
        self.info.kind
    }

    pub fn mechanism_id(&self) -> Option<u32> {
        self.mechanism_id
    }

    /// Number of instances
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn padded_width(&self) -> usize {
        self.padded
    }

    /// Bind to the shared state and lay out the arena
    pub fn instantiate(
        &mut self,
        id: u32,
        state: &SharedState,
        overrides: &MechanismOverrides,
        layout: &MechanismLayout,
    ) -> FvmResult<()> {
        // Nothing is committed to `self` until every check has passed
        let mut globals = self.globals.clone();
        for (key, &value) in &overrides.globals {
            let i = self
                .info
                .global_index(key)
                .ok_or_else(|| FvmError::NoSuchGlobal {
                    mechanism: self.name.clone(),
                    key: key.clone(),
                })?;
            globals[i] = value;
        }
        let mut ion_names = self.ion_names.clone();
        for (from, to) in &overrides.ion_rebind {
            let i = self
                .info
                .ion_index(from)
                .ok_or_else(|| FvmError::NoSuchIonDependency {
                    mechanism: self.name.clone(),
                    ion: from.clone(),
                })?;
            ion_names[i] = to.clone();
        }

        let width = layout.cv.len();
        if layout.weight.len() != width {
            return Err(FvmError::ParameterSizeMismatch {
                mechanism: self.name.clone(),
                key: "weight".to_string(),
                expected: width,
                actual: layout.weight.len(),
            });
        }

        // Ions are checked even with no instances, so a bad binding surfaces early.
        let mut ion_slots = Vec::with_capacity(ion_names.len());
        for (dep, ion_name) in self.info.ions.iter().zip(&ion_names) {
            let ion = state.ion(ion_name).ok_or_else(|| FvmError::MissingIonState {
                mechanism: self.name.clone(),
                ion: ion_name.clone(),
            })?;
            if let Some(expected) = dep.verify_valence {
                if expected != ion.charge {
                    return Err(FvmError::IonValenceMismatch {
                        mechanism: self.name.clone(),
                        ion: ion_name.clone(),
                        expected,
                        found: ion.charge,
                    });
                }
            }
            ion_slots.push(index_into(&layout.cv, &ion.node_index).map_err(|cv| {
                FvmError::IonIndexMismatch {
                    mechanism: self.name.clone(),
                    ion: ion_name.clone(),
                    cv,
                }
            })?);
        }

        self.mechanism_id = Some(id);
        self.globals = globals;
        self.ion_names = ion_names;

        let lanes = (state.alignment() / std::mem::size_of::<f64>()).max(1);
        let padded = width.div_ceil(lanes) * lanes;
        self.width = width;
        self.padded = padded;

        let n_field = self.info.fields.len();
        self.data = vec![f64::NAN; (1 + n_field) * padded];
        self.indices = vec![0; (1 + ion_slots.len()) * padded];
        if width == 0 {
            debug!(target: "cablesim-fvm", "Mechanism {} (id {}) has no instances", self.name, id);
            return Ok(());
        }

        self.data[..width].copy_from_slice(&layout.weight);
        for (i, field) in self.info.fields.iter().enumerate() {
            if let Some(default) = field.default {
                let start = (i + 1) * padded;
                self.data[start..start + width].fill(default);
            }
        }

        self.indices[..width].copy_from_slice(&layout.cv);
        for (i, slots) in ion_slots.iter().enumerate() {
            let start = (i + 1) * padded;
            self.indices[start..start + width].copy_from_slice(slots);
        }

        debug!(
            target: "cablesim-fvm",
            "Instantiated {} (id {}): {} instances, padded to {}",
            self.name,
            id,
            width,
            padded
        );
        Ok(())
    }

    /// Set a field for every instance
    pub fn set_parameter(&mut self, key: &str, values: &[f64]) -> FvmResult<()> {
        let handle = self.field_handle(key).ok_or_else(|| FvmError::NoSuchParameter {
            mechanism: self.name.clone(),
            key: key.to_string(),
        })?;
        if values.len() != self.width {
            return Err(FvmError::ParameterSizeMismatch {
                mechanism: self.name.clone(),
                key: key.to_string(),
                expected: self.width,
                actual: values.len(),
            });
        }
        let start = (handle.0 + 1) * self.padded;
        self.data[start..start + self.width].copy_from_slice(values);
        trace!(target: "cablesim-fvm", "{}.{} set on {} instances", self.name, key, self.width);
        Ok(())
    }

    pub fn set_global(&mut self, key: &str, value: f64) -> FvmResult<()> {
        let i = self
            .info
            .global_index(key)
            .ok_or_else(|| FvmError::NoSuchGlobal {
                mechanism: self.name.clone(),
                key: key.to_string(),
            })?;
        self.globals[i] = value;
        Ok(())
    }

    pub fn field_handle(&self, name: &str) -> Option<FieldHandle> {
        self.info.field_index(name).map(FieldHandle)
    }

    /// Current values of a field, one per instance
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        let handle = self.field_handle(name)?;
        let start = (handle.0 + 1) * self.padded;
        self.data.get(start..start + self.width)
    }

    pub fn global(&self, name: &str) -> Option<f64> {
        self.info.global_index(name).map(|i| self.globals[i])
    }

    pub fn weight(&self) -> &[f64] {
        self.data.get(..self.width).unwrap_or(&[])
    }

    pub fn node_index(&self) -> &[u32] {
        self.indices.get(..self.width).unwrap_or(&[])
    }

    /// Slots into the shared state arrays of a declared ion
    pub fn ion_index(&self, ion: &str) -> Option<&[u32]> {
        let i = self.info.ion_index(ion)?;
        let start = (i + 1) * self.padded;
        self.indices.get(start..start + self.width)
    }

    /// Ion names after rebinding, in declaration order
    pub fn ion_names(&self) -> &[String] {
        &self.ion_names
    }

    pub fn view(&mut self) -> MechanismView<'_> {
        MechanismView {
            width: self.width,
            padded: self.padded,
            data: &mut self.data,
            indices: &self.indices,
            globals: &self.globals,
            ion_names: &self.ion_names,
        }
    }

    pub fn initialize(&mut self, state: &SharedState) {
        let kernel = Arc::clone(&self.kernel);
        kernel.initialize(&mut self.view(), state);
    }

    pub fn compute_currents(&mut self, state: &mut SharedState) {
        let kernel = Arc::clone(&self.kernel);
        kernel.compute_currents(&mut self.view(), state);
    }

    /// Hand this mechanism's pending events to its kernel
    pub fn deliver_events(&mut self, state: &SharedState) {
        let Some(id) = self.mechanism_id else {
            return;
        };
        let events: Vec<DeliverableEvent> = state
            .deliverable_events
            .iter()
            .filter(|e| e.handle.mech_id == id)
            .copied()
            .collect();
        if events.is_empty() {
            return;
        }
        let kernel = Arc::clone(&self.kernel);
        kernel.apply_events(&mut self.view(), &events);
    }
}

/// Position of every element of `sub` in the sorted `sup`; the first missing
/// element is returned as the error
fn index_into(sub: &[u32], sup: &[u32]) -> Result<Vec<u32>, u32> {
    sub.iter()
        .map(|cv| sup.binary_search(cv).map(|i| i as u32).map_err(|_| *cv))
        .collect()
}
