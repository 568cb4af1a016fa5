// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Cable cell descriptions.

A [`Decor`] lists what is painted on regions and placed on locsets. A
[`CableCell`] resolves every entry against its morphology once, so the
discretization only ever sees concrete extents and locations.
*/

use crate::cv_policy::CvPolicy;
use crate::error::{FvmError, FvmResult};
use cablesim_morph::{
    Embedding, Extent, LabelDict, Location, Locset, MProvider, Morphology, Provider, Region,
    Thingify,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A mechanism name plus parameter overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanismDesc {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl MechanismDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder form of [`MechanismDesc::set`]
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }
}

impl From<&str> for MechanismDesc {
    fn from(name: &str) -> Self {
        MechanismDesc::new(name)
    }
}

/// Properties painted over a region
#[derive(Debug, Clone, PartialEq)]
pub enum Paintable {
    Density(MechanismDesc),
    /// F/m²
    MembraneCapacitance(f64),
    /// Ω·cm
    AxialResistivity(f64),
    /// mV
    InitMembranePotential(f64),
    /// K
    Temperature(f64),
}

impl From<MechanismDesc> for Paintable {
    fn from(desc: MechanismDesc) -> Self {
        Paintable::Density(desc)
    }
}

/// Items placed on a locset, one instance per location
#[derive(Debug, Clone, PartialEq)]
pub enum Placeable {
    /// Point mechanism receiving events
    Synapse(MechanismDesc),
    GapJunctionSite,
    /// Spike detector with a threshold in mV
    ThresholdDetector(f64),
}

/// Cell-wide values overriding the global parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellDefaults {
    pub membrane_capacitance: Option<f64>,
    pub axial_resistivity: Option<f64>,
    pub init_membrane_potential: Option<f64>,
    pub temperature_k: Option<f64>,
    pub cv_policy: Option<CvPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decor {
    paintings: Vec<(Region, Paintable)>,
    placements: Vec<(Locset, Placeable)>,
    defaults: CellDefaults,
}

impl Decor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later paintings take precedence where they overlap earlier ones
    pub fn paint(&mut self, region: Region, what: impl Into<Paintable>) -> &mut Self {
        self.paintings.push((region, what.into()));
        self
    }

    pub fn place(&mut self, locset: Locset, what: Placeable) -> &mut Self {
        self.placements.push((locset, what));
        self
    }

    pub fn set_default(&mut self, defaults: CellDefaults) -> &mut Self {
        self.defaults = defaults;
        self
    }

    pub fn set_cv_policy(&mut self, policy: CvPolicy) -> &mut Self {
        self.defaults.cv_policy = Some(policy);
        self
    }

    pub fn paintings(&self) -> &[(Region, Paintable)] {
        &self.paintings
    }

    pub fn placements(&self) -> &[(Locset, Placeable)] {
        &self.placements
    }

    pub fn defaults(&self) -> &CellDefaults {
        &self.defaults
    }
}

/// One placed item with its per-kind local id
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedItem<T> {
    pub loc: Location,
    pub lid: u32,
    pub item: T,
}

/// A morphology with its decor resolved to concrete extents and locations
#[derive(Debug, Clone)]
pub struct CableCell {
    provider: MProvider,
    decor: Decor,
    paintings: Vec<(Extent, Paintable)>,
    synapses: Vec<PlacedItem<MechanismDesc>>,
    gap_junction_sites: Vec<PlacedItem<()>>,
    detectors: Vec<PlacedItem<f64>>,
}

impl CableCell {
    pub fn new(morphology: Morphology, labels: &LabelDict, decor: Decor) -> FvmResult<Self> {
        Self::from_provider(MProvider::new(morphology, labels)?, decor)
    }

    /// Resolve a decor against an already built provider
    pub fn from_provider(provider: MProvider, decor: Decor) -> FvmResult<Self> {
        let defaults = decor.defaults();
        for (property, value) in [
            ("membrane capacitance", defaults.membrane_capacitance),
            ("axial resistivity", defaults.axial_resistivity),
            ("temperature", defaults.temperature_k),
        ] {
            if let Some(v) = value {
                check_positive(property, v)?;
            }
        }

        let mut paintings = Vec::with_capacity(decor.paintings.len());
        for (region, what) in &decor.paintings {
            match what {
                Paintable::MembraneCapacitance(v) => check_positive("membrane capacitance", *v)?,
                Paintable::AxialResistivity(v) => check_positive("axial resistivity", *v)?,
                Paintable::Temperature(v) => check_positive("temperature", *v)?,
                Paintable::InitMembranePotential(_) | Paintable::Density(_) => {}
            }
            paintings.push((region.thingify(&provider)?, what.clone()));
        }

        let mut synapses = Vec::new();
        let mut gap_junction_sites = Vec::new();
        let mut detectors = Vec::new();
        for (locset, what) in &decor.placements {
            let locations = locset.thingify(&provider)?;
            for loc in locations {
                match what {
                    Placeable::Synapse(desc) => synapses.push(PlacedItem {
                        loc,
                        lid: synapses.len() as u32,
                        item: desc.clone(),
                    }),
                    Placeable::GapJunctionSite => gap_junction_sites.push(PlacedItem {
                        loc,
                        lid: gap_junction_sites.len() as u32,
                        item: (),
                    }),
                    Placeable::ThresholdDetector(threshold) => detectors.push(PlacedItem {
                        loc,
                        lid: detectors.len() as u32,
                        item: *threshold,
                    }),
                }
            }
        }

        debug!(
            target: "cablesim-fvm",
            "Cell resolved: {} branches, {} paintings, {} synapses, {} gap junction sites, {} detectors",
            provider.morphology().num_branches(),
            paintings.len(),
            synapses.len(),
            gap_junction_sites.len(),
            detectors.len()
        );

        Ok(Self {
            provider,
            decor,
            paintings,
            synapses,
            gap_junction_sites,
            detectors,
        })
    }

    pub fn morphology(&self) -> &Morphology {
        self.provider.morphology()
    }

    pub fn embedding(&self) -> &Embedding {
        self.provider.embedding()
    }

    pub fn provider(&self) -> &MProvider {
        &self.provider
    }

    pub fn decor(&self) -> &Decor {
        &self.decor
    }

    pub fn defaults(&self) -> &CellDefaults {
        self.decor.defaults()
    }

    /// Resolved paintings in decor order
    pub fn paintings(&self) -> &[(Extent, Paintable)] {
        &self.paintings
    }

    pub fn synapses(&self) -> &[PlacedItem<MechanismDesc>] {
        &self.synapses
    }

    pub fn gap_junction_sites(&self) -> &[PlacedItem<()>] {
        &self.gap_junction_sites
    }

    pub fn detectors(&self) -> &[PlacedItem<f64>] {
        &self.detectors
    }

    pub fn num_targets(&self) -> usize {
        self.synapses.len()
    }

    pub fn num_sources(&self) -> usize {
        self.detectors.len()
    }

    pub fn concrete_region(&self, region: &Region) -> FvmResult<Extent> {
        Ok(region.thingify(&self.provider)?)
    }

    pub fn concrete_locset(&self, locset: &Locset) -> FvmResult<Vec<Location>> {
        Ok(locset.thingify(&self.provider)?)
    }
}

fn check_positive(property: &str, value: f64) -> FvmResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FvmError::InvalidParameter {
            property: property.to_string(),
            value,
        })
    }
}
