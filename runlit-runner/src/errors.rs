// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by runlit.

use camino::{FromPathBufError, Utf8PathBuf};
use config::ConfigError;
use std::{error, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse runlit config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<ConfigError>),

    /// A `[substitutions]` entry has an invalid token.
    #[error("invalid substitution token `{token}`: {reason}")]
    InvalidSubstitutionToken {
        /// The token that was rejected.
        token: String,

        /// Why it was rejected.
        reason: &'static str,
    },

    /// `repeat` was set to zero.
    #[error("invalid value for repeat: must be at least 1")]
    ZeroRepeat,
}

/// An error that occurs while parsing a
/// [`TestThreads`](crate::config::TestThreads) value.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for test-threads: {input}")]
pub struct TestThreadsParseError {
    input: String,
}

impl TestThreadsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurs while compiling the substring filter for test names.
#[derive(Clone, Debug, Error)]
#[error("error building test filter")]
pub struct TestFilterBuildError {
    #[from]
    err: aho_corasick::BuildError,
}

/// An error that occurs while compiling the placeholder substitution table.
#[derive(Clone, Debug, Error)]
#[error("error building substitution table")]
pub struct SubstitutionsBuildError {
    #[source]
    err: aho_corasick::BuildError,
}

impl SubstitutionsBuildError {
    pub(crate) fn new(err: aho_corasick::BuildError) -> Self {
        Self { err }
    }
}

/// An error that occurred while discovering tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestListError {
    /// An error occurred while walking a suite directory.
    #[error("error walking suite directory `{root}`")]
    Walk {
        /// The suite root being walked.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A path found during discovery was not valid UTF-8.
    #[error("path is not valid UTF-8")]
    NonUtf8Path {
        /// The underlying error.
        #[source]
        err: FromPathBufError,
    },

    /// A test binary could not be executed to list its cases.
    #[error("failed to execute `{command}`")]
    ListExec {
        /// The command that was run.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A test binary exited with a failure while listing its cases.
    #[error("`{command}` failed{}", display_exit_code(.exit_code.as_ref()))]
    ListFailed {
        /// The command that was run.
        command: String,

        /// The exit code, if the process exited normally.
        exit_code: Option<i32>,

        /// Standard error produced by the process.
        stderr: String,
    },

    /// A test binary produced output that isn't a case listing.
    #[error("`{binary}` produced a malformed case listing: unexpected line `{line}`")]
    MalformedListOutput {
        /// The test binary.
        binary: Utf8PathBuf,

        /// The line that couldn't be parsed.
        line: String,
    },

    /// A test binary produced output that wasn't valid UTF-8.
    #[error("`{binary}` produced a case listing that is not valid UTF-8")]
    ListOutputNotUtf8 {
        /// The test binary.
        binary: Utf8PathBuf,
    },
}

fn display_exit_code(exit_code: Option<&i32>) -> String {
    match exit_code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_owned(),
    }
}

/// A fatal error that occurred while executing a test.
///
/// Unlike test failures, these errors indicate a broken environment and abort the whole run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecuteError {
    /// The scratch script for a test could not be written.
    #[error("failed to write test script to `{path}`")]
    WriteScript {
        /// The path the script was being written to.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The shell interpreter or test binary could not be launched.
    #[error("failed to launch `{command}`")]
    Spawn {
        /// The command that failed to launch.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Waiting for a launched process to exit failed.
    #[error("failed to wait for `{command}` to exit")]
    Wait {
        /// The command being waited on.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

/// An error that occurs while setting up the process executor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorBuildError {
    /// The toolchain bin directory can't be added to `PATH`.
    #[error("bin directory `{bin_dir}` cannot be added to PATH")]
    InvalidBinDir {
        /// The configured bin directory.
        bin_dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::env::JoinPathsError,
    },
}

/// An error that occurs while writing a test list.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteTestListError {
    /// An error occurred while writing the list to the provided output.
    #[error("error writing to output")]
    Io(#[source] io::Error),

    /// An error occurred while serializing JSON, or while writing it to the provided output.
    #[error("error serializing to JSON")]
    Json(#[source] serde_json::Error),
}

/// An error that occurs while building the test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that occurs while writing a test event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] io::Error),
}

/// An error returned by [`TestRunner::try_execute`](crate::runner::TestRunner::try_execute).
#[derive(Debug)]
pub enum RunError<E> {
    /// A test could not be launched, and the run was aborted.
    Execute(ExecuteError),

    /// The event callback returned an error.
    Callback(E),
}

impl<E: fmt::Display> fmt::Display for RunError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute(_) => write!(f, "test run aborted"),
            Self::Callback(err) => write!(f, "error reporting test event: {err}"),
        }
    }
}

impl<E: error::Error + 'static> error::Error for RunError<E> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Execute(err) => Some(err),
            Self::Callback(err) => err.source(),
        }
    }
}
