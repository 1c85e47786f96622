// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for runlit.
//!
//! Configuration is layered: the embedded [default config](RunlitConfig::DEFAULT_CONFIG) is
//! overlaid by `.config/runlit.toml` under the root directory if it exists, or by a config file
//! passed in explicitly. Command-line arguments are applied on top by the caller.

mod imp;
mod test_threads;

pub use imp::*;
pub use test_threads::*;
