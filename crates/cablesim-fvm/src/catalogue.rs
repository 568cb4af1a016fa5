// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named mechanisms and their kernels
//!
//! A catalogue maps a name to a [`MechanismInfo`] plus the kernel that
//! implements it. Derived entries reuse a parent's kernel with different
//! global values or ion bindings.

use crate::error::{FvmError, FvmResult};
use crate::mechanism::{Mechanism, MechanismInfo, MechanismKernel, MechanismOverrides};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
struct CatalogueEntry {
    info: Arc<MechanismInfo>,
    kernel: Arc<dyn MechanismKernel>,
    overrides: MechanismOverrides,
}

#[derive(Clone, Default)]
pub struct MechanismCatalogue {
    entries: AHashMap<String, CatalogueEntry>,
}

impl std::fmt::Debug for MechanismCatalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MechanismCatalogue")
            .field("mechanisms", &self.names())
            .finish()
    }
}

impl MechanismCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, info: MechanismInfo, kernel: Arc<dyn MechanismKernel>) -> FvmResult<()> {
        let name = info.name.clone();
        if self.entries.contains_key(&name) {
            return Err(FvmError::DuplicateMechanism(name));
        }
        self.entries.insert(
            name,
            CatalogueEntry {
                info: Arc::new(info),
                kernel,
                overrides: MechanismOverrides::default(),
            },
        );
        Ok(())
    }

    /// Add every mechanism of a JSON array of [`MechanismInfo`], asking
    /// `kernel_for` for each kernel. Returns the number added.
    pub fn load_json<F>(&mut self, json: &str, kernel_for: F) -> FvmResult<usize>
    where
        F: Fn(&MechanismInfo) -> Arc<dyn MechanismKernel>,
    {
        let infos: Vec<MechanismInfo> = serde_json::from_str(json)?;
        let count = infos.len();
        for info in infos {
            let kernel = kernel_for(&info);
            self.add(info, kernel)?;
        }
        debug!(target: "cablesim-fvm", "Loaded {} mechanisms from JSON", count);
        Ok(count)
    }

    /// A new entry `name` built on `parent` with some globals fixed and ions
    /// renamed. Rebinding keys are ion names as the parent sees them.
    pub fn derive(
        &mut self,
        name: &str,
        parent: &str,
        globals: &[(&str, f64)],
        ion_rebind: &[(&str, &str)],
    ) -> FvmResult<()> {
        if self.entries.contains_key(name) {
            return Err(FvmError::DuplicateMechanism(name.to_string()));
        }
        let base = self.entry(parent)?;
        let mut entry = base.clone();

        for &(key, value) in globals {
            if base.info.global_index(key).is_none() {
                return Err(FvmError::NoSuchGlobal {
                    mechanism: parent.to_string(),
                    key: key.to_string(),
                });
            }
            entry.overrides.globals.insert(key.to_string(), value);
        }

        for &(from, to) in ion_rebind {
            let bound_as = |dep: &str| {
                base.overrides
                    .ion_rebind
                    .get(dep)
                    .map_or(dep, String::as_str)
                    .to_string()
            };
            let dep = base
                .info
                .ions
                .iter()
                .map(|d| d.ion.as_str())
                .find(|d| bound_as(*d) == from)
                .ok_or_else(|| FvmError::NoSuchIonDependency {
                    mechanism: parent.to_string(),
                    ion: from.to_string(),
                })?;
            entry
                .overrides
                .ion_rebind
                .insert(dep.to_string(), to.to_string());
        }

        debug!(target: "cablesim-fvm", "Derived mechanism {} from {}", name, parent);
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    fn entry(&self, name: &str) -> FvmResult<&CatalogueEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| FvmError::NoSuchMechanism(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn info(&self, name: &str) -> FvmResult<&MechanismInfo> {
        Ok(&self.entry(name)?.info)
    }

    /// Ion names the mechanism uses in the shared state, in declaration order
    pub fn ion_names(&self, name: &str) -> FvmResult<Vec<String>> {
        let entry = self.entry(name)?;
        Ok(entry
            .info
            .ions
            .iter()
            .map(|d| {
                entry
                    .overrides
                    .ion_rebind
                    .get(&d.ion)
                    .cloned()
                    .unwrap_or_else(|| d.ion.clone())
            })
            .collect())
    }

    /// Sorted mechanism names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A fresh mechanism plus the overrides to pass to `instantiate`
    pub fn instance(&self, name: &str) -> FvmResult<(Mechanism, MechanismOverrides)> {
        let entry = self.entry(name)?;
        Ok((
            Mechanism::new(name, Arc::clone(&entry.info), Arc::clone(&entry.kernel)),
            entry.overrides.clone(),
        ))
    }
}
