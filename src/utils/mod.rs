// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Utility modules
//!
//! Terminal output helpers shared by the CLI and the progress element.

pub mod colors;
pub mod progress;

pub use colors::*;
pub use progress::*;
