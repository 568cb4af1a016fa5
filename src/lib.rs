// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cablesim - cable cell morphologies and their finite-volume layout
//!
//! This crate re-exports the workspace members under one roof.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! cablesim = "0.1"  # Default: parallel discretization
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`**: rolling per-crate log files through `tracing-appender`
//!
//! ## Usage Example
//!
//! ```rust
//! use cablesim::prelude::*;
//!
//! let mut tree = SegmentTree::new();
//! let soma = tree
//!     .append(NPOS, Point::new(0.0, 0.0, 0.0, 5.0), Point::new(10.0, 0.0, 0.0, 5.0), 1)?;
//! tree.append_from_parent(soma, Point::new(110.0, 0.0, 0.0, 1.0), 3)?;
//!
//! let mut labels = LabelDict::new();
//! labels.set("dend", "(tag 3)")?;
//!
//! let mut decor = Decor::new();
//! decor
//!     .set_cv_policy(CvPolicy::FixedPerBranch(4))
//!     .paint(Region::named("dend"), Paintable::MembraneCapacitance(0.02));
//!
//! let cell = CableCell::new(Morphology::new(tree), &labels, decor)?;
//! let d = fvm_cv_discretize_cell(&cell, &CableParameters::default())?;
//! assert_eq!(d.size(), 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: cablesim-morph, cablesim-config            │
//! │  (Morphology, Region, Locset, LabelDict, defaults)      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: cablesim-fvm                               │
//! │  (CV geometry, discretization, mechanism layout)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Infrastructure: cablesim-observability                 │
//! │  (tracing initialization, per-crate debug flags)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use cablesim_config as config;
pub use cablesim_fvm as fvm;
pub use cablesim_morph as morph;
pub use cablesim_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::morph::{
        Cable, Embedding, Extent, LabelDict, Location, Locset, MProvider, MorphError,
        MorphResult, Morphology, Point, Provider, Region, SegmentTree, Thingify, NPOS,
    };

    pub use crate::fvm::{
        fvm_cv_discretize, fvm_cv_discretize_cell, CableCell, CableParameters, CableRecipe,
        CellMember, CvDiscretization, CvPolicy, CvPrefer, Decor, ExecutionContext, FvmError,
        FvmLoweredCell, FvmResult, GapJunctionConnection, MechanismCatalogue, MechanismDesc,
        MechanismInfo, MechanismKernel, MechanismKind, Paintable, Placeable, SharedState,
    };

    pub use crate::config::{load_config, validate_config, CablesimConfig};
}
