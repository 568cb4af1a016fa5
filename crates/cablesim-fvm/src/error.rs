// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error types for discretization and mechanism instantiation.
*/

use crate::mechanism::MechanismKind;
use cablesim_morph::MorphError;

/// Result type for discretization operations
pub type FvmResult<T> = Result<T, FvmError>;

/// Errors raised while lowering cells onto the finite-volume grid
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FvmError {
    #[error(transparent)]
    Morph(#[from] MorphError),

    #[error("No cell with gid {0}")]
    NoSuchCell(u32),

    #[error("Cell index {index} out of range for {count} cells")]
    CellIndexOutOfRange { index: usize, count: usize },

    #[error("Cell {gid} has no gap junction site {lid}")]
    NoSuchGapJunctionSite { gid: u32, lid: u32 },

    #[error("Gap junction on gid {gid} refers to gid {peer} outside the cell group")]
    GapJunctionPeerOutsideGroup { gid: u32, peer: u32 },

    #[error("Invalid CV policy: {0}")]
    InvalidCvPolicy(String),

    #[error("Invalid value for {property}: {value}")]
    InvalidParameter { property: String, value: f64 },

    #[error("No mechanism \"{0}\" in catalogue")]
    NoSuchMechanism(String),

    #[error("Mechanism \"{0}\" is already in the catalogue")]
    DuplicateMechanism(String),

    #[error("Mechanism \"{name}\" is a {found} mechanism, expected {expected}")]
    MechanismKindMismatch {
        name: String,
        expected: MechanismKind,
        found: MechanismKind,
    },

    #[error("Mechanism \"{mechanism}\" has no parameter \"{key}\"")]
    NoSuchParameter { mechanism: String, key: String },

    #[error("Mechanism \"{mechanism}\" has no global \"{key}\"")]
    NoSuchGlobal { mechanism: String, key: String },

    #[error("Mechanism \"{mechanism}\" has no ion dependency \"{ion}\"")]
    NoSuchIonDependency { mechanism: String, ion: String },

    #[error("Parameter \"{key}\" of mechanism \"{mechanism}\" expects {expected} values, got {actual}")]
    ParameterSizeMismatch {
        mechanism: String,
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("Mechanism \"{mechanism}\" uses ion \"{ion}\" which has no shared state")]
    MissingIonState { mechanism: String, ion: String },

    #[error("Mechanism \"{mechanism}\" expects ion \"{ion}\" with valence {expected}, found {found}")]
    IonValenceMismatch {
        mechanism: String,
        ion: String,
        expected: i32,
        found: i32,
    },

    #[error("CV {cv} of mechanism \"{mechanism}\" is not covered by ion \"{ion}\"")]
    IonIndexMismatch {
        mechanism: String,
        ion: String,
        cv: u32,
    },

    #[error("No default concentrations for ion \"{0}\"")]
    UnknownIon(String),

    #[error("Mechanism \"{mechanism}\" is painted more than once on overlapping regions")]
    Overpaint { mechanism: String },

    #[error("Shared state array \"{name}\" has {actual} entries, expected {expected}")]
    StateSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Catalogue parse error: {0}")]
    CatalogueFormat(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<serde_json::Error> for FvmError {
    fn from(err: serde_json::Error) -> Self {
        FvmError::CatalogueFormat(err.to_string())
    }
}
