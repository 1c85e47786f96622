// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`].

use crate::{
    config::TestThreads,
    errors::{ExecuteError, RunError, TestRunnerBuildError},
    outcome::{ExecutionResult, TestOutcome},
};
use bytes::Bytes;
use debug_ignore::DebugIgnore;
use futures::{FutureExt, StreamExt, future::BoxFuture};
use std::{
    any::Any,
    convert::Infallible,
    future::Future,
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};
use tokio::runtime::Runtime;
use tracing::debug;

/// The action run for a [`TestUnit`].
pub type TestAction =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<TestOutcome, ExecuteError>> + Send>;

/// A named, runnable test.
///
/// An `Err` returned by the action means the environment is broken, and aborts the whole run.
#[derive(Debug)]
pub struct TestUnit {
    name: String,
    action: DebugIgnore<TestAction>,
}

impl TestUnit {
    /// Creates a new unit that runs `action` once.
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TestOutcome, ExecuteError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: DebugIgnore(Box::new(move || action().boxed())),
        }
    }
}

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    test_threads: Option<TestThreads>,
}

impl TestRunnerBuilder {
    /// Sets the number of tests to run at once.
    pub fn set_test_threads(&mut self, test_threads: TestThreads) -> &mut Self {
        self.test_threads = Some(test_threads);
        self
    }

    /// Creates a new test runner for the given units.
    pub fn build(&self, units: Vec<TestUnit>) -> Result<TestRunner, TestRunnerBuildError> {
        let test_threads = self
            .test_threads
            .unwrap_or(TestThreads::NumCpus)
            .compute()
            .max(1);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("runlit-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;

        Ok(TestRunner {
            test_threads,
            units,
            runtime,
        })
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner {
    test_threads: usize,
    units: Vec<TestUnit>,
    runtime: Runtime,
}

impl TestRunner {
    /// Returns the maximum number of units run at once.
    pub fn test_threads(&self) -> usize {
        self.test_threads
    }

    /// Executes the units, calling `callback` for each event.
    pub fn execute<F>(self, mut callback: F) -> Result<RunStats, ExecuteError>
    where
        F: FnMut(TestEvent<'_>),
    {
        self.try_execute::<Infallible, _>(|event| {
            callback(event);
            Ok(())
        })
        .map_err(|err| match err {
            RunError::Execute(err) => err,
            RunError::Callback(never) => match never {},
        })
    }

    /// Executes the units, calling `callback` for each event.
    ///
    /// Units are started in order, with at most [`test_threads`](Self::test_threads) in flight,
    /// and may finish in any order. Events are delivered one at a time from a single consumer, so
    /// the callback never observes two units at once.
    ///
    /// If a unit fails to launch or the callback returns an error, no further units are started.
    /// Units already in flight are allowed to finish, and the first error is returned. After the
    /// callback has returned an error it is no longer called.
    pub fn try_execute<E, F>(self, mut callback: F) -> Result<RunStats, RunError<E>>
    where
        F: FnMut(TestEvent<'_>) -> Result<(), E>,
    {
        let TestRunner {
            test_threads,
            units,
            runtime,
        } = self;

        let canceled = AtomicBool::new(false);
        let canceled_ref = &canceled;

        let mut run_stats = RunStats {
            initial_run_count: units.len(),
            ..RunStats::default()
        };

        // Send the initial event.
        // (Don't need to set the canceled atomic if this fails because the run hasn't started
        // yet.)
        callback(TestEvent::RunStarted {
            test_count: units.len(),
            test_threads,
        })
        .map_err(RunError::Callback)?;

        let start = Instant::now();

        // Stores the first error that occurred. This error is propagated up.
        let mut first_error = None;
        let mut callback_failed = false;

        runtime.block_on(async {
            // buffer_unordered means units are started in order but finish in any order.
            let mut finished = futures::stream::iter(units)
                .map(move |unit| async move {
                    if canceled_ref.load(Ordering::Acquire) {
                        return None;
                    }
                    let TestUnit { name, action } = unit;
                    let start = Instant::now();
                    let result = match AssertUnwindSafe((action.0)()).catch_unwind().await {
                        Ok(result) => result,
                        Err(panic) => Ok(panicked_outcome(&*panic, start.elapsed())),
                    };
                    Some((name, result))
                })
                .buffer_unordered(test_threads);

            while let Some(next) = finished.next().await {
                let Some((name, result)) = next else {
                    // This unit was never started.
                    continue;
                };

                match result {
                    Ok(outcome) => {
                        run_stats.on_test_finished(&outcome);
                        if callback_failed {
                            continue;
                        }
                        if let Err(err) = callback(TestEvent::TestFinished {
                            name: &name,
                            outcome: &outcome,
                            run_stats,
                        }) {
                            canceled_ref.store(true, Ordering::Release);
                            callback_failed = true;
                            if first_error.is_none() {
                                first_error = Some(RunError::Callback(err));
                            }
                        }
                    }
                    Err(err) => {
                        debug!(%name, "test could not be launched, canceling run");
                        canceled_ref.store(true, Ordering::Release);
                        if first_error.is_some() {
                            continue;
                        }
                        if !callback_failed {
                            if let Err(callback_err) = callback(TestEvent::RunBeginCancel {
                                reason: CancelReason::ExecuteError,
                            }) {
                                callback_failed = true;
                                first_error = Some(RunError::Callback(callback_err));
                                continue;
                            }
                        }
                        first_error = Some(RunError::Execute(err));
                    }
                }
            }
        });

        if !callback_failed {
            if let Err(err) = callback(TestEvent::RunFinished {
                elapsed: start.elapsed(),
                run_stats,
            }) {
                if first_error.is_none() {
                    first_error = Some(RunError::Callback(err));
                }
            }
        }

        match first_error {
            None => Ok(run_stats),
            Some(err) => Err(err),
        }
    }
}

fn panicked_outcome(panic: &(dyn Any + Send), time_taken: Duration) -> TestOutcome {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "(non-string payload)"
    };
    TestOutcome {
        result: ExecutionResult::Fail { abort_status: None },
        stdout: Bytes::new(),
        stderr: Bytes::from(format!("test panicked: {message}\n")),
        time_taken,
    }
}

/// An event that occurs during a test run.
#[derive(Clone, Debug)]
pub enum TestEvent<'a> {
    /// The test run started.
    RunStarted {
        /// The number of units that will be run.
        test_count: usize,

        /// The maximum number of units run at once.
        test_threads: usize,
    },

    /// A unit finished running.
    TestFinished {
        /// The name of the unit.
        name: &'a str,

        /// How the unit ended.
        outcome: &'a TestOutcome,

        /// Current statistics for the run, including this unit.
        run_stats: RunStats,
    },

    /// No further units will be started. Units already in flight will still finish.
    RunBeginCancel {
        /// Why the run is being canceled.
        reason: CancelReason,
    },

    /// The test run finished.
    RunFinished {
        /// The amount of time it took for the units to run.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The reason why a test run is being canceled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// A test could not be launched.
    ExecuteError,
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of units that were expected to be run at the beginning.
    ///
    /// If the test run is canceled, this will be more than `final_run_count` at the end.
    pub initial_run_count: usize,

    /// The total number of units that finished running.
    pub final_run_count: usize,

    /// The number of units that passed.
    pub passed: usize,

    /// The number of units that failed.
    pub failed: usize,

    /// The number of units that failed as expected.
    pub expected_failures: usize,

    /// The number of units that timed out.
    pub timed_out: usize,

    /// The number of units that couldn't be prepared for execution.
    pub unresolved: usize,

    /// The number of units skipped because required features are missing.
    pub unsupported: usize,

    /// The number of test files without any `RUN:` lines.
    pub no_run_lines: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run is marked as failed if any units failed, or if it was canceled before every unit
    /// finished.
    pub fn is_success(&self) -> bool {
        self.initial_run_count == self.final_run_count && self.fails() == 0
    }

    /// Returns the number of units that count as failures.
    #[inline]
    pub fn fails(&self) -> usize {
        self.failed + self.timed_out + self.unresolved
    }

    fn on_test_finished(&mut self, outcome: &TestOutcome) {
        self.final_run_count += 1;
        match outcome.result {
            ExecutionResult::Pass => self.passed += 1,
            ExecutionResult::Fail { .. } => self.failed += 1,
            ExecutionResult::ExpectedFail => self.expected_failures += 1,
            ExecutionResult::TimedOut => self.timed_out += 1,
            ExecutionResult::NoRunLines => self.no_run_lines += 1,
            ExecutionResult::Unsupported { .. } => self.unsupported += 1,
            ExecutionResult::Unresolved { .. } => self.unresolved += 1,
        }
    }
}
