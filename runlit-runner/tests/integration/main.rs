// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod basic;
mod binaries;
mod fixtures;
