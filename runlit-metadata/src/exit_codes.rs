// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `runlit` failures.
///
/// `runlit` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum RunlitExitCode {}

impl RunlitExitCode {
    /// No errors occurred and runlit exited normally.
    pub const OK: i32 = 0;

    /// No tests were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a runlit invocation, for example an invalid
    /// configuration file.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more tests failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Discovering tests produced an error, for example a test binary could not be listed.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// The run was aborted because the environment is broken: the shell could not be launched or a
    /// scratch script could not be written.
    pub const RUN_ABORTED: i32 = 105;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
