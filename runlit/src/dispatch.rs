// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use runlit_metadata::RunlitExitCode;
use runlit_runner::{
    config::{RunlitConfig, TestThreads},
    reporter::{FailureOutput, ReporterOutput, TestReporterBuilder},
    runner::TestRunnerBuilder,
    substitution::Substitutions,
    test_filter::TestFilter,
    test_list::{OutputFormat, SerializableFormat, TestContext, TestList},
};
use std::{
    io::{BufWriter, Write},
    num::NonZeroUsize,
    sync::Arc,
    time::Duration,
};
use supports_color::Stream;
use tracing::debug;

/// A concurrent lit-style test harness.
///
/// Discovers test files and gtest-style test binaries under one or more suite directories, runs
/// the commands in their RUN lines in parallel, and reports a `Failed <fails> / <total>` summary.
#[derive(Debug, Parser)]
#[command(version, name = "runlit", styles = crate::output::clap_styles::style())]
pub struct RunlitApp {
    /// Root directory that config paths are resolved against [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl RunlitApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let root = resolve_root(self.root.as_deref())?;
        let config = self.config_opts.make_config(&root)?;

        match self.command {
            Command::List {
                select,
                message_format,
            } => {
                let test_list = select.compute(&config, None)?;

                let stdout = std::io::stdout();
                // Buffer the output to minimize syscalls.
                let mut writer = BufWriter::new(stdout.lock());
                test_list.write(
                    message_format.to_output_format(output.verbose),
                    &mut writer,
                    output.color.should_colorize(Stream::Stdout),
                )?;
                writer
                    .flush()
                    .map_err(|err| ExpectedError::WriteTestListError {
                        err: runlit_runner::errors::WriteTestListError::Io(err),
                    })?;
            }
            Command::Run {
                select,
                runner_opts,
                reporter_opts,
            } => {
                let repeat = runner_opts.repeat.map(NonZeroUsize::get);
                let test_list = select.compute(&config, repeat)?;
                if test_list.is_empty() {
                    return Err(ExpectedError::NoTestsRun {
                        suites: test_list.suites().to_vec(),
                    });
                }

                let ctx = runner_opts.make_context(&config)?;
                let test_threads = runner_opts
                    .test_threads
                    .unwrap_or_else(|| config.test_threads());
                let runner = TestRunnerBuilder::default()
                    .set_test_threads(test_threads)
                    .build(test_list.into_units(Arc::new(ctx)))?;

                let mut reporter = reporter_opts
                    .to_builder()
                    .set_verbose(output.verbose)
                    .build(ReporterOutput::Stdout);
                if output.color.should_colorize(Stream::Stdout) {
                    reporter.colorize();
                }

                let run_stats = runner
                    .try_execute(|event| reporter.report_event(&event))
                    .map_err(ExpectedError::from_run_error)?;
                if !run_stats.is_success() {
                    return Err(ExpectedError::TestRunFailed);
                }
            }
        }

        Ok(RunlitExitCode::OK)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List tests
    ///
    /// Walks the suite directories, lists the cases of any test binaries found, and prints every
    /// test that would be run. Use -T json to get machine-readable output.
    List {
        #[command(flatten)]
        select: TestSelectOpts,

        /// Output format
        #[arg(
            short = 'T',
            long,
            value_enum,
            default_value_t,
            help_heading = "OUTPUT OPTIONS",
            value_name = "FMT"
        )]
        message_format: MessageFormatOpts,
    },
    /// Run tests
    ///
    /// Discovers tests the same way as `list`, then runs them in parallel.
    Run {
        #[command(flatten)]
        select: TestSelectOpts,

        #[command(flatten)]
        runner_opts: TestRunnerOpts,

        #[command(flatten)]
        reporter_opts: TestReporterOpts,
    },
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: <root>/.config/runlit.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, root: &Utf8Path) -> Result<RunlitConfig> {
        Ok(RunlitConfig::from_sources(
            root,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl MessageFormatOpts {
    fn to_output_format(self, verbose: bool) -> OutputFormat {
        match self {
            Self::Human => OutputFormat::Human { verbose },
            Self::Json => OutputFormat::Serializable(SerializableFormat::Json),
            Self::JsonPretty => OutputFormat::Serializable(SerializableFormat::JsonPretty),
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "FILTER OPTIONS")]
struct TestSelectOpts {
    /// Suite directory to search, relative to the root [default: from config]
    #[arg(long = "suite", value_name = "DIR")]
    suites: Vec<Utf8PathBuf>,

    /// Only include tests whose paths contain one of these substrings
    #[arg(name = "FILTERS", help_heading = None)]
    filters: Vec<String>,
}

impl TestSelectOpts {
    fn compute(&self, config: &RunlitConfig, repeat: Option<usize>) -> Result<TestList> {
        let suites = if self.suites.is_empty() {
            config.suites()
        } else {
            self.suites
                .iter()
                .map(|suite| config.root().join(suite))
                .collect()
        };
        let test_filter = TestFilter::new(&self.filters)?;

        let mut options = config.discovery_options();
        if let Some(repeat) = repeat {
            options.repeat = repeat;
        }

        debug!(?suites, "discovering tests");
        Ok(TestList::discover(suites, &test_filter, &options)?)
    }
}

/// Test runner options.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "RUNNER OPTIONS")]
struct TestRunnerOpts {
    /// Number of tests to run simultaneously [default: from config, or logical CPU count]
    #[arg(
        long,
        short = 'j',
        visible_alias = "jobs",
        value_name = "N",
        env = "RUNLIT_TEST_THREADS",
        allow_negative_numbers = true
    )]
    test_threads: Option<TestThreads>,

    /// Kill tests that run longer than this, e.g. "30s" or "2m" [default: from config]
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Number of times to run each test file [default: from config]
    #[arg(long, value_name = "N")]
    repeat: Option<NonZeroUsize>,

    /// Directory to prepend to PATH for tests [default: from config]
    #[arg(long, value_name = "DIR")]
    bin_dir: Option<Utf8PathBuf>,

    /// Target triple matched against XFAIL and XTARGET tags [default: from config]
    #[arg(long, value_name = "TRIPLE")]
    target: Option<String>,

    /// Mark a feature as available, in addition to those in the config
    #[arg(long = "feature", value_name = "NAME")]
    features: Vec<String>,
}

impl TestRunnerOpts {
    fn make_context(&self, config: &RunlitConfig) -> Result<TestContext> {
        let mut executor = config.executor()?;
        if let Some(bin_dir) = &self.bin_dir {
            executor.set_bin_dir(&resolve_root(Some(bin_dir))?)?;
        }
        let timeout = self.timeout.or_else(|| config.timeout());
        debug!(?timeout, "per-test timeout");
        executor.set_timeout(timeout);

        let mut target = config.target_info();
        if let Some(triple) = &self.target {
            target.triple = Some(triple.clone());
        }
        target
            .available_features
            .extend(self.features.iter().cloned());

        Ok(TestContext {
            executor,
            substitutions: Substitutions::new(config.substitutions())?,
            target,
            anchor: config.directive_anchor().clone(),
        })
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "REPORTER OPTIONS")]
struct TestReporterOpts {
    /// Output stdout and stderr on failure
    #[arg(long, value_enum, value_name = "WHEN")]
    failure_output: Option<FailureOutputOpt>,
}

impl TestReporterOpts {
    fn to_builder(&self) -> TestReporterBuilder {
        let mut builder = TestReporterBuilder::default();
        if let Some(failure_output) = self.failure_output {
            builder.set_failure_output(failure_output.into());
        }
        builder
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FailureOutputOpt {
    Immediate,
    Never,
}

impl From<FailureOutputOpt> for FailureOutput {
    fn from(opt: FailureOutputOpt) -> Self {
        match opt {
            FailureOutputOpt::Immediate => FailureOutput::Immediate,
            FailureOutputOpt::Never => FailureOutput::Never,
        }
    }
}

/// Makes `path` absolute relative to the current directory, or returns the current directory if
/// `path` is `None`.
fn resolve_root(path: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    match path {
        Some(path) if path.is_absolute() => Ok(path.to_owned()),
        _ => {
            let current_dir = std::env::current_dir()
                .map_err(|err| ExpectedError::CurrentDirFailed { err })?;
            let current_dir = Utf8PathBuf::try_from(current_dir)
                .map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })?;
            Ok(match path {
                Some(path) => current_dir.join(path),
                None => current_dir,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> RunlitApp {
        RunlitApp::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        RunlitApp::command().debug_assert();
    }

    #[test]
    fn parse_run_options() {
        let app = parse(&[
            "runlit",
            "--root",
            "/src/llvm",
            "run",
            "-j",
            "-2",
            "--timeout",
            "1m 30s",
            "--repeat",
            "3",
            "--feature",
            "asserts",
            "--feature",
            "zlib",
            "--failure-output",
            "never",
            "CodeGen",
            "--suite",
            "test",
        ]);
        assert_eq!(app.root.as_deref(), Some(Utf8Path::new("/src/llvm")));

        let Command::Run {
            select,
            runner_opts,
            reporter_opts,
        } = app.command
        else {
            panic!("expected run command");
        };
        assert_eq!(select.filters, vec!["CodeGen".to_owned()]);
        assert_eq!(select.suites, vec![Utf8PathBuf::from("test")]);
        assert!(matches!(runner_opts.test_threads, Some(TestThreads::Count(_))));
        assert_eq!(runner_opts.timeout, Some(Duration::from_secs(90)));
        assert_eq!(runner_opts.repeat.map(NonZeroUsize::get), Some(3));
        assert_eq!(runner_opts.features, vec!["asserts", "zlib"]);
        assert!(matches!(
            reporter_opts.failure_output,
            Some(FailureOutputOpt::Never)
        ));
    }

    #[test]
    fn parse_list_options() {
        let app = parse(&["runlit", "list", "-T", "json-pretty", "-v"]);
        assert!(app.output.verbose);
        let Command::List { message_format, .. } = app.command else {
            panic!("expected list command");
        };
        assert!(matches!(message_format, MessageFormatOpts::JsonPretty));
    }

    #[test]
    fn invalid_test_threads() {
        assert!(RunlitApp::try_parse_from(["runlit", "run", "-j", "0"]).is_err());
    }

    #[test]
    fn zero_repeat_is_rejected() {
        assert!(RunlitApp::try_parse_from(["runlit", "run", "--repeat", "0"]).is_err());
        assert!(RunlitApp::try_parse_from(["runlit", "run", "--repeat", "-1"]).is_err());
    }

    #[test]
    fn resolve_root_paths() {
        let current_dir = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();
        assert_eq!(resolve_root(None).unwrap(), current_dir);
        assert_eq!(
            resolve_root(Some(Utf8Path::new("test"))).unwrap(),
            current_dir.join("test")
        );
        assert_eq!(
            resolve_root(Some(Utf8Path::new("/abs"))).unwrap(),
            Utf8PathBuf::from("/abs")
        );
    }

    #[cfg(unix)]
    #[test]
    fn run_exit_codes() {
        let root = camino_tempfile::Utf8TempDir::with_prefix("runlit-cli-").unwrap();
        std::fs::write(root.path().join("pass.c"), "// RUN: true\n").unwrap();
        std::fs::write(root.path().join("fail.c"), "// RUN: false\n").unwrap();

        let exec = |args: &[&str]| {
            let mut full_args = vec!["runlit", "--root", root.path().as_str(), "--color", "never"];
            full_args.extend_from_slice(args);
            let app = parse(&full_args);
            let output = app.init_output();
            app.exec(output)
        };

        assert_eq!(exec(&["run", "pass"]).unwrap(), RunlitExitCode::OK);
        assert!(matches!(
            exec(&["run"]).unwrap_err(),
            ExpectedError::TestRunFailed
        ));
        assert!(matches!(
            exec(&["run", "no-such-test"]).unwrap_err(),
            ExpectedError::NoTestsRun { .. }
        ));
    }
}
