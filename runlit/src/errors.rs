// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use runlit_metadata::RunlitExitCode;
use runlit_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that runlit expects might happen, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test filter build error")]
    TestFilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("substitutions build error")]
    SubstitutionsBuildError {
        #[from]
        err: SubstitutionsBuildError,
    },
    #[error("executor build error")]
    ExecutorBuildError {
        #[from]
        err: ExecutorBuildError,
    },
    #[error("test runner build error")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("creating test list failed")]
    TestListError {
        #[from]
        err: TestListError,
    },
    #[error("writing test list to output failed")]
    WriteTestListError {
        #[from]
        err: WriteTestListError,
    },
    #[error("writing event failed")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("test run aborted")]
    RunAborted {
        #[source]
        err: ExecuteError,
    },
    #[error("no tests to run")]
    NoTestsRun { suites: Vec<Utf8PathBuf> },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn from_run_error(err: RunError<WriteEventError>) -> Self {
        match err {
            RunError::Execute(err) => Self::RunAborted { err },
            RunError::Callback(err) => Self::WriteEventError { err },
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::TestFilterBuildError { .. }
            | Self::SubstitutionsBuildError { .. }
            | Self::ExecutorBuildError { .. }
            | Self::TestRunnerBuildError { .. } => RunlitExitCode::SETUP_ERROR,
            Self::TestListError { .. } => RunlitExitCode::TEST_LIST_CREATION_FAILED,
            Self::WriteTestListError { .. } | Self::WriteEventError { .. } => {
                RunlitExitCode::WRITE_OUTPUT_ERROR
            }
            Self::RunAborted { .. } => RunlitExitCode::RUN_ABORTED,
            Self::NoTestsRun { .. } => RunlitExitCode::NO_TESTS_RUN,
            Self::TestRunFailed => RunlitExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    err.as_path().display()
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse runlit config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::TestFilterBuildError { err } => {
                error!("{err}");
                err.source()
            }
            Self::SubstitutionsBuildError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ExecutorBuildError { err } => {
                error!("failed to set up test execution");
                Some(err as &dyn Error)
            }
            Self::TestRunnerBuildError { err } => {
                error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::TestListError { err } => {
                error!("creating test list failed");
                if let TestListError::ListFailed { stderr, .. } = err {
                    if !stderr.is_empty() {
                        error!(target: NO_HEADING_TARGET, "\n{}", stderr.trim_end());
                    }
                }
                Some(err as &dyn Error)
            }
            Self::WriteTestListError { err } => {
                error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::RunAborted { err } => {
                error!("test run aborted: the test environment is broken");
                Some(err as &dyn Error)
            }
            Self::NoTestsRun { suites } => {
                let suites: Vec<_> = suites
                    .iter()
                    .map(|suite| format!("`{}`", suite.style(styles.bold)))
                    .collect();
                error!("no tests to run in {}", suites.join(", "));
                None
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn exit_codes() {
        assert_eq!(
            ExpectedError::TestRunFailed.process_exit_code(),
            RunlitExitCode::TEST_RUN_FAILED
        );
        assert_eq!(
            ExpectedError::NoTestsRun { suites: vec![] }.process_exit_code(),
            RunlitExitCode::NO_TESTS_RUN
        );

        let spawn_error = ExecuteError::Spawn {
            command: "bash script".to_owned(),
            err: io::Error::from(io::ErrorKind::NotFound),
        };
        let err = ExpectedError::from_run_error(RunError::Execute(spawn_error));
        assert!(matches!(err, ExpectedError::RunAborted { .. }));
        assert_eq!(err.process_exit_code(), RunlitExitCode::RUN_ABORTED);

        let write_error = WriteEventError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        let err = ExpectedError::from_run_error(RunError::Callback(write_error));
        assert_eq!(err.process_exit_code(), RunlitExitCode::WRITE_OUTPUT_ERROR);
    }
}
