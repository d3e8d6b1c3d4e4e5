// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # impulse-observability
//!
//! Logging initialisation shared by every impulse binary, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: per-run log folders with retention cleanup

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known impulse crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "impulse",
    "impulse-structures",
    "impulse-config",
    "impulse-signal",
    "impulse-command",
    "impulse-driver",
];
