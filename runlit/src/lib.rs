// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A concurrent lit-style test harness.
//!
//! This crate is the command-line frontend. The core logic lives in
//! [`runlit-runner`](runlit_runner).

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputContext;
