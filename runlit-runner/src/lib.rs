// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [runlit](https://crates.io/crates/runlit), a concurrent lit-style test
//! harness.
//!
//! The basic flow of operations is:
//!
//! 1. Load a [`RunlitConfig`](config::RunlitConfig).
//! 2. Discover test files and test binary cases into a [`TestList`](test_list::TestList).
//! 3. Turn the list into [`TestUnit`](runner::TestUnit)s and run them with a
//!    [`TestRunner`](runner::TestRunner), at most a fixed number at once.
//! 4. Feed the resulting events to a [`TestReporter`](reporter::TestReporter).

pub mod config;
pub mod directives;
pub mod errors;
pub mod executor;
pub mod expectation;
pub mod outcome;
pub mod paths;
pub mod reporter;
pub mod runner;
pub mod substitution;
pub mod test_filter;
pub mod test_list;
