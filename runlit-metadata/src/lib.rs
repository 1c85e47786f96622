// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! This crate contains metadata and exit codes produced by the `runlit` test harness.
//!
//! The data formats here are meant to be consumed by tools that wrap `runlit`, for example CI
//! scripts that read `runlit list -T json`.

mod exit_codes;
mod test_list;

pub use exit_codes::*;
pub use test_list::*;
