// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{LabelKind, MorphError, MorphResult};
use crate::locset::Locset;
use crate::parse::{parse_label_expression, LabelExpression};
use crate::region::Region;
use std::collections::BTreeMap;

/// Named regions and locsets. A name belongs to exactly one algebra.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelDict {
    regions: BTreeMap<String, Region>,
    locsets: BTreeMap<String, Locset>,
}

impl LabelDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace a region label
    pub fn set_region(&mut self, name: impl Into<String>, region: Region) -> MorphResult<&mut Self> {
        let name = name.into();
        if self.locsets.contains_key(&name) {
            return Err(MorphError::LabelTypeMismatch {
                name,
                existing: LabelKind::Locset,
            });
        }
        self.regions.insert(name, region);
        Ok(self)
    }

    /// Define or replace a locset label
    pub fn set_locset(&mut self, name: impl Into<String>, locset: Locset) -> MorphResult<&mut Self> {
        let name = name.into();
        if self.regions.contains_key(&name) {
            return Err(MorphError::LabelTypeMismatch {
                name,
                existing: LabelKind::Region,
            });
        }
        self.locsets.insert(name, locset);
        Ok(self)
    }

    /// Define a label from its textual form
    pub fn set(&mut self, name: impl Into<String>, expression: &str) -> MorphResult<&mut Self> {
        match parse_label_expression(expression)? {
            LabelExpression::Region(r) => self.set_region(name, r),
            LabelExpression::Locset(l) => self.set_locset(name, l),
        }
    }

    /// Copy every label of `other`, optionally prefixing the names
    pub fn import(&mut self, other: &LabelDict, prefix: Option<&str>) -> MorphResult<&mut Self> {
        let prefixed = |name: &str| format!("{}{}", prefix.unwrap_or(""), name);
        for (name, r) in &other.regions {
            self.set_region(prefixed(name), r.clone())?;
        }
        for (name, l) in &other.locsets {
            self.set_locset(prefixed(name), l.clone())?;
        }
        Ok(self)
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    pub fn locset(&self, name: &str) -> Option<&Locset> {
        self.locsets.get(name)
    }

    pub fn regions(&self) -> &BTreeMap<String, Region> {
        &self.regions
    }

    pub fn locsets(&self) -> &BTreeMap<String, Locset> {
        &self.locsets
    }

    pub fn len(&self) -> usize {
        self.regions.len() + self.locsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.locsets.is_empty()
    }
}
