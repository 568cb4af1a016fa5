// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Integration domains and gap junctions.

Cells joined by gap junctions must advance together, so they share an
integration domain. Domains are the connected components of the gap
junction graph, numbered in the order their first cell appears.
*/

use crate::cell::CableCell;
use crate::discretization::CvDiscretization;
use crate::error::{FvmError, FvmResult};
use crate::geometry::CvPrefer;
use crate::recipe::CableRecipe;
use ahash::AHashMap;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// A gap junction between two CVs of the group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FvmGapJunction {
    /// (local CV, peer CV)
    pub loc: (u32, u32),
    /// Conductance scaled by the local CV area, µS/µm² · 1e3
    pub weight: f64,
}

fn gid_index(gids: &[u32]) -> AHashMap<u32, usize> {
    gids.iter().enumerate().map(|(i, &gid)| (gid, i)).collect()
}

/// Integration domain of every cell and the number of domains
pub fn fvm_intdom<R: CableRecipe + ?Sized>(recipe: &R, gids: &[u32]) -> FvmResult<(Vec<u32>, usize)> {
    let index = gid_index(gids);
    let mut cell_to_intdom = vec![0u32; gids.len()];
    let mut visited = vec![false; gids.len()];
    let mut n_intdom = 0usize;
    let mut queue = VecDeque::new();

    for (i, &gid) in gids.iter().enumerate() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        cell_to_intdom[i] = n_intdom as u32;
        queue.push_back(gid);

        while let Some(g) = queue.pop_front() {
            for conn in recipe.gap_junctions_on(g) {
                let peer = conn.peer.gid;
                let &j = index
                    .get(&peer)
                    .ok_or(FvmError::GapJunctionPeerOutsideGroup { gid: g, peer })?;
                if !visited[j] {
                    visited[j] = true;
                    cell_to_intdom[j] = n_intdom as u32;
                    queue.push_back(peer);
                }
            }
        }
        n_intdom += 1;
    }

    debug!(
        target: "cablesim-fvm",
        "{} cells in {} integration domains",
        gids.len(),
        n_intdom
    );
    Ok((cell_to_intdom, n_intdom))
}

/// Gap junctions of the group, per gid in order and per connection in
/// recipe order
pub fn fvm_gap_junctions<R: CableRecipe + ?Sized>(
    cells: &[CableCell],
    gids: &[u32],
    recipe: &R,
    d: &CvDiscretization,
) -> FvmResult<Vec<FvmGapJunction>> {
    let index = gid_index(gids);
    let site_cv = |cell: usize, gid: u32, lid: u32| -> FvmResult<u32> {
        let site = cells[cell]
            .gap_junction_sites()
            .get(lid as usize)
            .ok_or(FvmError::NoSuchGapJunctionSite { gid, lid })?;
        d.geometry.location_cv(cell, &site.loc, CvPrefer::Nonempty)
    };

    let mut junctions = Vec::new();
    for (i, &gid) in gids.iter().enumerate() {
        for conn in recipe.gap_junctions_on(gid) {
            let peer_gid = conn.peer.gid;
            let &j = index
                .get(&peer_gid)
                .ok_or(FvmError::GapJunctionPeerOutsideGroup { gid, peer: peer_gid })?;

            let cv = site_cv(i, gid, conn.local)?;
            let peer_cv = site_cv(j, peer_gid, conn.peer.index)?;
            let area = d.cv_area[cv as usize];
            let weight = if area > 0.0 {
                conn.ggap * 1e3 / area
            } else {
                warn!(
                    target: "cablesim-fvm",
                    "Gap junction on gid {} sits in CV {} with zero area, ignoring its conductance",
                    gid,
                    cv
                );
                0.0
            };
            junctions.push(FvmGapJunction {
                loc: (cv, peer_cv),
                weight,
            });
        }
    }

    debug!(target: "cablesim-fvm", "{} gap junction half-connections", junctions.len());
    Ok(junctions)
}
