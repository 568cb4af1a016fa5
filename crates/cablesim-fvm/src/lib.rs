// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# cablesim finite-volume layout

Lowers cable cells onto a finite-volume grid:
- Cell descriptions: morphology, paintings, placements and recipes
- CV policies and the CV geometry they induce
- Per-CV discretization of areas, capacitances and face conductances
- Integration domains and gap junction weights
- Mechanism catalogues, mechanism layout and instantiation over shared state

## Lowering a cell group

```rust,ignore
use cablesim_fvm::{CableParameters, ExecutionContext, FvmLoweredCell, MechanismCatalogue};

let mut lowered = FvmLoweredCell::new(ExecutionContext::serial());
lowered.initialize(&[0, 1, 2], &recipe, &catalogue, &CableParameters::default())?;
let handles = lowered.target_handles();
```

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod catalogue;
pub mod cell;
pub mod cv_policy;
pub mod discretization;
pub mod error;
pub mod execution;
pub mod gap_junctions;
pub mod geometry;
pub mod layout;
pub mod lowered_cell;
pub mod mechanism;
pub mod recipe;
pub mod shared_state;

pub use catalogue::MechanismCatalogue;
pub use cell::{
    CableCell, CellDefaults, Decor, MechanismDesc, Paintable, Placeable, PlacedItem,
};
pub use cv_policy::CvPolicy;
pub use discretization::{
    fvm_cv_discretize, fvm_cv_discretize_cell, CableParameters, CvDiscretization,
};
pub use error::{FvmError, FvmResult};
pub use execution::ExecutionContext;
pub use gap_junctions::{fvm_gap_junctions, fvm_intdom, FvmGapJunction};
pub use geometry::{cv_geometry, CvGeometry, CvPrefer};
pub use layout::{fvm_build_mechanism_data, FvmMechanismConfig, FvmMechanismData};
pub use lowered_cell::FvmLoweredCell;
pub use mechanism::{
    FieldHandle, FieldInfo, GlobalInfo, IonDependency, Mechanism, MechanismInfo,
    MechanismKernel, MechanismKind, MechanismLayout, MechanismOverrides, MechanismView,
};
pub use recipe::{CableRecipe, CellMember, GapJunctionConnection};
pub use shared_state::{
    DeliverableEvent, IonConfig, IonState, SharedState, TargetHandle, DEFAULT_ALIGNMENT,
};
