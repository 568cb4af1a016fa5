// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error types for morphology construction and label resolution.
*/

use crate::primitives::{Cable, Location};

/// Result type for morphology operations
pub type MorphResult<T> = Result<T, MorphError>;

/// Which algebra a label belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Region,
    Locset,
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelKind::Region => write!(f, "region"),
            LabelKind::Locset => write!(f, "locset"),
        }
    }
}

/// Errors that can occur while building morphologies or resolving labels
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MorphError {
    #[error("Invalid location: branch {}, position {} outside [0, 1]", .0.branch, .0.pos)]
    InvalidLocation(Location),

    #[error("Invalid cable: branch {}, [{}, {}]", .0.branch, .0.prox_pos, .0.dist_pos)]
    InvalidCable(Cable),

    #[error("No such branch: {0}")]
    NoSuchBranch(u32),

    #[error("No such segment: {0}")]
    NoSuchSegment(u32),

    #[error("Invalid segment parent: segment {segment} refers to parent {parent}")]
    InvalidSegmentParent { segment: u32, parent: u32 },

    #[error("Unknown {kind} label: \"{name}\"")]
    UnknownLabel { kind: LabelKind, name: String },

    #[error("Label \"{name}\" is already defined as a {existing}")]
    LabelTypeMismatch { name: String, existing: LabelKind },

    #[error("Circular label definition: {}", .chain.join(" -> "))]
    CircularDefinition { chain: Vec<String> },

    #[error("Label recursion limit {limit} exceeded while resolving \"{name}\"")]
    RecursionLimit { name: String, limit: usize },

    #[error("Parse error at offset {position}: {message}")]
    Parse { message: String, position: usize },
}
