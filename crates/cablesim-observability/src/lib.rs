// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cablesim-observability
//!
//! Logging setup shared by the cablesim crates, with per-crate debug flags.
//!
//! Every crate logs under its own target (`cablesim-morph`, `cablesim-fvm`,
//! ...), so `--debug-cablesim-fvm` raises just the discretization layer to
//! `debug`.
//!
//! ## Features
//! - `file-logging`: per-crate JSON log files in timestamped run folders

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Log targets that accept debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "cablesim",
    "cablesim-morph",
    "cablesim-fvm",
    "cablesim-config",
];
