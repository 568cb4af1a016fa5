// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `cablesim.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CablesimConfig {
    pub system: SystemConfig,
    pub cable: CableDefaults,
    pub ions: Vec<IonDefaults>,
    pub discretization: CvPolicySpec,
    pub resolution: ResolutionConfig,
}

impl Default for CablesimConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            cable: CableDefaults::default(),
            ions: IonDefaults::standard_set(),
            discretization: CvPolicySpec::default(),
            resolution: ResolutionConfig::default(),
        }
    }
}

impl CablesimConfig {
    /// Defaults for the named ion, if configured
    pub fn ion(&self, name: &str) -> Option<&IonDefaults> {
        self.ions.iter().find(|ion| ion.name == name)
    }
}

/// Process-level settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Worker threads for per-cell discretization (0 = auto-detect)
    pub threads: usize,
    pub log_level: String,
    pub debug: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

/// Cell-wide electrical defaults, overridable per cell and per region
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CableDefaults {
    /// Specific membrane capacitance [F/m²]
    pub membrane_capacitance: f64,
    /// Axial resistivity [Ω·cm]
    pub axial_resistivity: f64,
    /// Initial membrane potential [mV]
    pub init_membrane_potential: f64,
    /// Temperature [K]
    pub temperature_k: f64,
}

impl Default for CableDefaults {
    fn default() -> Self {
        Self {
            membrane_capacitance: 0.01,
            axial_resistivity: 35.4,
            init_membrane_potential: -65.0,
            temperature_k: 6.3 + 273.15,
        }
    }
}

/// Per-species ion defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IonDefaults {
    pub name: String,
    pub valence: i32,
    /// Internal concentration [mM]
    pub internal_concentration: f64,
    /// External concentration [mM]
    pub external_concentration: f64,
    /// Reversal potential [mV]
    pub reversal_potential: f64,
}

impl IonDefaults {
    pub fn new(name: impl Into<String>, valence: i32, xi: f64, xo: f64, ex: f64) -> Self {
        Self {
            name: name.into(),
            valence,
            internal_concentration: xi,
            external_concentration: xo,
            reversal_potential: ex,
        }
    }

    /// Sodium, potassium and calcium with the classic squid-axon values
    pub fn standard_set() -> Vec<IonDefaults> {
        vec![
            IonDefaults::new("na", 1, 10.0, 140.0, 115.0 - 65.0),
            IonDefaults::new("k", 1, 54.4, 2.5, -12.0 - 65.0),
            IonDefaults::new("ca", 2, 5e-5, 2.0, 12.5 * (2.0f64 / 5e-5).ln()),
        ]
    }
}

/// Kind of control-volume policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CvPolicyKind {
    /// One CV for the whole cell
    Single,
    /// `per_branch` CVs of equal length on every branch
    FixedPerBranch,
    /// CVs no longer than `max_extent` µm
    MaxExtent,
    /// One CV per segment
    EverySegment,
}

impl CvPolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CvPolicyKind::Single => "single",
            CvPolicyKind::FixedPerBranch => "fixed-per-branch",
            CvPolicyKind::MaxExtent => "max-extent",
            CvPolicyKind::EverySegment => "every-segment",
        }
    }
}

impl fmt::Display for CvPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CvPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "single" => Ok(CvPolicyKind::Single),
            "fixed-per-branch" => Ok(CvPolicyKind::FixedPerBranch),
            "max-extent" => Ok(CvPolicyKind::MaxExtent),
            "every-segment" => Ok(CvPolicyKind::EverySegment),
            other => Err(format!("unknown cv policy '{}'", other)),
        }
    }
}

/// Default discretization policy (`[discretization]`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CvPolicySpec {
    pub policy: CvPolicyKind,
    pub per_branch: u32,
    /// Upper bound on CV length [µm]
    pub max_extent: f64,
}

impl Default for CvPolicySpec {
    fn default() -> Self {
        Self {
            policy: CvPolicyKind::FixedPerBranch,
            per_branch: 1,
            max_extent: 20.0,
        }
    }
}

/// Label resolution limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Maximum nesting of named references while resolving a label
    pub recursion_limit: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self { recursion_limit: 64 }
    }
}
