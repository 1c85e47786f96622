// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out test execution statuses.
//!
//! The main structure in this module is [`TestReporter`].

use crate::{
    errors::WriteEventError,
    outcome::{AbortStatus, ExecutionResult, TestOutcome},
    runner::{CancelReason, RunStats, TestEvent},
};
use owo_colors::{OwoColorize, Style};
use serde::Deserialize;
use std::{
    fmt,
    io::{self, Write},
};

/// When to display the output of failing tests.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureOutput {
    /// Show output as soon as the failing test finishes.
    #[default]
    Immediate,

    /// Never show output.
    Never,
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    failure_output: Option<FailureOutput>,
    verbose: bool,
}

impl TestReporterBuilder {
    /// Sets the conditions under which test failures are output.
    pub fn set_failure_output(&mut self, failure_output: FailureOutput) -> &mut Self {
        self.failure_output = Some(failure_output);
        self
    }

    /// Sets verbose output.
    ///
    /// In verbose mode, a status line is printed for every test, not just for failures.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new test reporter writing to `output`.
    pub fn build<'a>(&self, output: ReporterOutput<'a>) -> TestReporter<'a> {
        TestReporter {
            inner: TestReporterImpl {
                failure_output: self.failure_output.unwrap_or_default(),
                verbose: self.verbose,
                styles: Styles::default(),
            },
            output,
        }
    }
}

/// The destination for reporter output.
#[derive(Debug)]
pub enum ReporterOutput<'a> {
    /// Write to standard output.
    Stdout,

    /// Append to a buffer. Used in tests.
    Buffer(&'a mut Vec<u8>),
}

/// Functionality to report test results to standard output.
#[derive(Debug)]
pub struct TestReporter<'a> {
    inner: TestReporterImpl,
    output: ReporterOutput<'a>,
}

impl TestReporter<'_> {
    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.inner.styles.colorize();
    }

    /// Report a test event.
    ///
    /// Everything written for a single event, including a failing test's captured output, reaches
    /// the destination in one write.
    pub fn report_event(&mut self, event: &TestEvent<'_>) -> Result<(), WriteEventError> {
        let mut buf = Vec::new();
        self.inner
            .write_event(event, &mut buf)
            .map_err(WriteEventError::Io)?;
        if buf.is_empty() {
            return Ok(());
        }

        match &mut self.output {
            ReporterOutput::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(&buf)
                    .and_then(|()| stdout.flush())
                    .map_err(WriteEventError::Io)
            }
            ReporterOutput::Buffer(out) => {
                out.extend_from_slice(&buf);
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
struct TestReporterImpl {
    failure_output: FailureOutput,
    verbose: bool,
    styles: Styles,
}

impl TestReporterImpl {
    fn write_event(&self, event: &TestEvent<'_>, mut writer: impl Write) -> io::Result<()> {
        match event {
            TestEvent::RunStarted {
                test_count,
                test_threads,
            } => {
                writeln!(
                    writer,
                    "{:>12} {} {} with {} {}",
                    "Starting".style(self.styles.pass),
                    test_count.style(self.styles.count),
                    tests_str(*test_count),
                    test_threads.style(self.styles.count),
                    if *test_threads == 1 { "thread" } else { "threads" },
                )?;
            }
            TestEvent::TestFinished { name, outcome, .. } => {
                let failed = !outcome.is_success();
                if failed || self.verbose {
                    self.write_status_line(name, outcome, &mut writer)?;
                }
                if failed && self.failure_output == FailureOutput::Immediate {
                    self.write_captured_output(name, outcome, &mut writer)?;
                }
            }
            TestEvent::RunBeginCancel { reason } => {
                writeln!(
                    writer,
                    "{:>12} due to {}, letting running tests finish",
                    "Canceling".style(self.styles.fail),
                    reason.style(self.styles.count),
                )?;
            }
            TestEvent::RunFinished { elapsed, run_stats } => {
                let summary_style = if run_stats.is_success() {
                    self.styles.pass
                } else {
                    self.styles.fail
                };
                write!(writer, "{:>12} ", "Summary".style(summary_style))?;

                // * > means right-align.
                // * 8 is the number of characters to pad to.
                // * .3 means print three digits after the decimal point.
                write!(writer, "[{:>8.3?}s] ", elapsed.as_secs_f64())?;

                write!(
                    writer,
                    "{}",
                    run_stats.final_run_count.style(self.styles.count)
                )?;
                if run_stats.final_run_count != run_stats.initial_run_count {
                    write!(
                        writer,
                        "/{}",
                        run_stats.initial_run_count.style(self.styles.count)
                    )?;
                }
                writeln!(
                    writer,
                    " {} run: {}",
                    tests_str(run_stats.initial_run_count),
                    self.summary_str(run_stats),
                )?;

                writeln!(
                    writer,
                    "Failed {} / {}",
                    run_stats.fails(),
                    run_stats.initial_run_count
                )?;
            }
        }
        Ok(())
    }

    fn write_status_line(
        &self,
        name: &str,
        outcome: &TestOutcome,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let (label, style) = match &outcome.result {
            ExecutionResult::Pass => ("PASS", self.styles.pass),
            ExecutionResult::Fail { .. } => ("FAIL", self.styles.fail),
            ExecutionResult::ExpectedFail => ("XFAIL", self.styles.pass),
            ExecutionResult::TimedOut => ("TIMEOUT", self.styles.fail),
            ExecutionResult::NoRunLines => ("NO RUN", self.styles.skip),
            ExecutionResult::Unsupported { .. } => ("UNSUPPORTED", self.styles.skip),
            ExecutionResult::Unresolved { .. } => ("UNRESOLVED", self.styles.fail),
        };
        write!(writer, "{:>12} ", label.style(style))?;
        write!(writer, "[{:>8.3?}s] ", outcome.time_taken.as_secs_f64())?;
        write!(writer, "{}", name.style(self.styles.test_name))?;

        match &outcome.result {
            ExecutionResult::Fail {
                abort_status: Some(AbortStatus::UnixSignal(signal)),
            } => write!(writer, " (killed by signal {signal})")?,
            ExecutionResult::Unsupported { missing } => {
                write!(writer, " (missing features: {})", missing.join(", "))?
            }
            ExecutionResult::Unresolved { reason } => write!(writer, " ({reason})")?,
            _ => {}
        }
        writeln!(writer)
    }

    fn write_captured_output(
        &self,
        name: &str,
        outcome: &TestOutcome,
        mut writer: impl Write,
    ) -> io::Result<()> {
        writeln!(
            writer,
            "\n{}",
            format!("--- STDOUT: {name} ---").style(self.styles.fail)
        )?;
        write_with_newline(&outcome.stdout, &mut writer)?;
        writeln!(
            writer,
            "{}",
            format!("--- STDERR: {name} ---").style(self.styles.fail)
        )?;
        write_with_newline(&outcome.stderr, &mut writer)?;
        writeln!(writer)
    }

    fn summary_str(&self, run_stats: &RunStats) -> String {
        let styles = &self.styles;
        let mut parts = vec![format!(
            "{} {}",
            run_stats.passed.style(styles.count),
            "passed".style(styles.pass)
        )];

        let counts = [
            (run_stats.failed, "failed", styles.fail),
            (run_stats.timed_out, "timed out", styles.fail),
            (run_stats.unresolved, "unresolved", styles.fail),
            (run_stats.expected_failures, "expected failures", styles.pass),
            (run_stats.unsupported, "unsupported", styles.skip),
            (run_stats.no_run_lines, "without RUN lines", styles.skip),
        ];
        for (count, label, style) in counts {
            if count > 0 {
                parts.push(format!("{} {}", count.style(styles.count), label.style(style)));
            }
        }
        parts.join(", ")
    }
}

fn write_with_newline(output: &[u8], mut writer: impl Write) -> io::Result<()> {
    writer.write_all(output)?;
    if !output.is_empty() && !output.ends_with(b"\n") {
        writeln!(writer)?;
    }
    Ok(())
}

fn tests_str(count: usize) -> &'static str {
    if count == 1 { "test" } else { "tests" }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::ExecuteError => write!(f, "test launch error"),
        }
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    test_name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.test_name = Style::new().blue().bold();
    }
}
