// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The results of running a single test unit.

use bytes::Bytes;
use std::{fmt, time::Duration};

/// The outcome of one test unit: how it ended plus everything it printed.
#[derive(Clone, Debug)]
pub struct TestOutcome {
    /// How the unit ended.
    pub result: ExecutionResult,

    /// Standard output, captured in full.
    pub stdout: Bytes,

    /// Standard error, captured in full.
    pub stderr: Bytes,

    /// How long the unit took. Zero for units that weren't executed.
    pub time_taken: Duration,
}

impl TestOutcome {
    /// Creates an outcome for a unit that never launched a process.
    pub fn not_executed(result: ExecutionResult) -> Self {
        Self {
            result,
            stdout: Bytes::new(),
            stderr: Bytes::new(),
            time_taken: Duration::ZERO,
        }
    }

    /// Creates an unresolved outcome, recording `message` in the captured standard error.
    pub fn unresolved(reason: UnresolvedReason, message: impl fmt::Display) -> Self {
        Self {
            stderr: Bytes::from(format!("{message}\n")),
            ..Self::not_executed(ExecutionResult::Unresolved { reason })
        }
    }

    /// Returns true if the unit counts as a success.
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// How a test unit ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExecutionResult {
    /// The script or test case exited successfully.
    Pass,

    /// The script or test case failed.
    Fail {
        /// The abort status of the process, if any (for example, the signal on Unix).
        abort_status: Option<AbortStatus>,
    },

    /// The script failed, and `XFAIL:` says that's expected on this target.
    ///
    /// This is treated as a pass.
    ExpectedFail,

    /// The process was killed after running longer than the configured timeout.
    TimedOut,

    /// The test file has no `RUN:` lines, so nothing was executed.
    ///
    /// This is treated as a pass.
    NoRunLines,

    /// Some `REQUIRES:` features aren't available, so nothing was executed.
    ///
    /// This is treated as a pass.
    Unsupported {
        /// The features that are missing.
        missing: Vec<String>,
    },

    /// The test couldn't be prepared for execution.
    Unresolved {
        /// What went wrong.
        reason: UnresolvedReason,
    },
}

impl ExecutionResult {
    /// Returns true if this result counts as a success.
    pub fn is_success(&self) -> bool {
        match self {
            ExecutionResult::Pass
            | ExecutionResult::ExpectedFail
            | ExecutionResult::NoRunLines
            | ExecutionResult::Unsupported { .. } => true,
            ExecutionResult::Fail { .. }
            | ExecutionResult::TimedOut
            | ExecutionResult::Unresolved { .. } => false,
        }
    }
}

/// The reason a test unit is [`ExecutionResult::Unresolved`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnresolvedReason {
    /// The test file couldn't be read.
    Unreadable,

    /// The last `RUN:` line ends with a continuation marker.
    UnterminatedRunLine,

    /// The scratch output directory couldn't be created.
    TempDirCreate,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable => write!(f, "unreadable"),
            Self::UnterminatedRunLine => write!(f, "unterminated RUN line"),
            Self::TempDirCreate => write!(f, "temp dir"),
        }
    }
}

/// The abort status of a failed process.
///
/// Returned as part of the [`ExecutionResult::Fail`] variant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AbortStatus {
    /// The process was killed by a signal on Unix.
    UnixSignal(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ExecutionResult::Pass, true ; "pass")]
    #[test_case(ExecutionResult::Fail { abort_status: None }, false ; "fail")]
    #[test_case(ExecutionResult::Fail { abort_status: Some(AbortStatus::UnixSignal(9)) }, false ; "signal")]
    #[test_case(ExecutionResult::ExpectedFail, true ; "expected fail")]
    #[test_case(ExecutionResult::TimedOut, false ; "timed out")]
    #[test_case(ExecutionResult::NoRunLines, true ; "no run lines")]
    #[test_case(ExecutionResult::Unsupported { missing: vec!["zlib".to_owned()] }, true ; "unsupported")]
    #[test_case(ExecutionResult::Unresolved { reason: UnresolvedReason::Unreadable }, false ; "unresolved")]
    fn success(result: ExecutionResult, expected: bool) {
        assert_eq!(result.is_success(), expected);
    }

    #[test]
    fn unresolved_records_message() {
        let outcome = TestOutcome::unresolved(UnresolvedReason::Unreadable, "no such file");
        assert!(!outcome.is_success());
        assert_eq!(outcome.stderr, "no such file\n");
        assert!(outcome.stdout.is_empty());
    }
}
