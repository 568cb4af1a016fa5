// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Recipes describe a network one cell at a time

use crate::cell::CableCell;
use crate::error::FvmResult;
use serde::{Deserialize, Serialize};

/// An item on a particular cell, addressed by gid and per-kind local id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellMember {
    pub gid: u32,
    pub index: u32,
}

impl CellMember {
    pub const fn new(gid: u32, index: u32) -> Self {
        Self { gid, index }
    }
}

/// Gap junction as seen from the local cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapJunctionConnection {
    /// Gap junction site on the peer cell
    pub peer: CellMember,
    /// Local gap junction site id
    pub local: u32,
    /// Conductance in µS
    pub ggap: f64,
}

impl GapJunctionConnection {
    pub const fn new(peer: CellMember, local: u32, ggap: f64) -> Self {
        Self { peer, local, ggap }
    }
}

pub trait CableRecipe {
    fn num_cells(&self) -> usize;

    fn cell_description(&self, gid: u32) -> FvmResult<CableCell>;

    /// Connections must be listed on both cells of a junction
    fn gap_junctions_on(&self, _gid: u32) -> Vec<GapJunctionConnection> {
        Vec::new()
    }
}
