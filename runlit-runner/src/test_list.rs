// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of test files and test-binary cases.
//!
//! Discovery produces a [`TestList`], which can be printed or turned into runnable
//! [`TestUnit`]s.

use crate::{
    config::BinariesConfig,
    directives::{DirectiveAnchor, ParsedDirectives},
    errors::{ExecuteError, TestListError, WriteTestListError},
    executor::ShellExecutor,
    expectation::TargetInfo,
    outcome::{ExecutionResult, TestOutcome, UnresolvedReason},
    paths::PathContext,
    runner::TestUnit,
    substitution::Substitutions,
    test_filter::TestFilter,
};
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::{OwoColorize, Style};
use runlit_metadata::{TestListSummary, TestUnitSummary};
use serde::Serialize;
use std::{
    collections::{BTreeSet, HashSet},
    ffi::OsStr,
    io,
    io::Write,
    path::Path,
    sync::Arc,
};
use tracing::debug;
use walkdir::WalkDir;

/// Options controlling which files become test units.
#[derive(Clone, Debug)]
pub struct DiscoveryOptions {
    /// Files with these extensions (without the leading `.`) are parsed for directives.
    pub extensions: BTreeSet<String>,

    /// Files and directories with these names are skipped, along with everything below them.
    pub exclude: BTreeSet<String>,

    /// The number of times each test file is run.
    pub repeat: usize,

    /// How test binaries are recognized, listed and run.
    pub binaries: BinariesConfig,

    /// The working directory test binaries are listed in.
    pub list_dir: Utf8PathBuf,
}

/// A single test unit found during discovery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestEntry {
    /// The unique name of this unit.
    pub name: String,

    /// What this unit runs.
    pub kind: TestEntryKind,
}

/// What a [`TestEntry`] runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestEntryKind {
    /// A test file with embedded directives.
    Directive {
        /// The test file.
        path: Utf8PathBuf,

        /// Disambiguates runs of the same file.
        index: Option<usize>,
    },

    /// One case of a test binary.
    BinaryCase {
        /// The test binary.
        binary: Utf8PathBuf,

        /// The fully qualified case name, e.g. `FooTest.Bar`.
        case: String,

        /// The argument that selects this case.
        filter_arg: String,
    },
}

/// The list of test units found in a set of suite directories.
#[derive(Clone, Debug)]
pub struct TestList {
    suites: Vec<Utf8PathBuf>,
    entries: Vec<TestEntry>,
}

impl TestList {
    /// Walks `suites` in order and collects every test unit whose path matches `filter`.
    ///
    /// Directory entries are visited in sorted order, so the list is deterministic. A file
    /// reachable from more than one suite is only listed the first time it is seen.
    pub fn discover(
        suites: Vec<Utf8PathBuf>,
        filter: &TestFilter,
        options: &DiscoveryOptions,
    ) -> Result<Self, TestListError> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for root in &suites {
            let walker = WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0
                        || !entry
                            .file_name()
                            .to_str()
                            .is_some_and(|name| options.exclude.contains(name))
                });

            for entry in walker {
                let entry = entry.map_err(|err| TestListError::Walk {
                    root: root.clone(),
                    err,
                })?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let Some(kind) = FileKind::classify(entry.path(), options) else {
                    debug!(path = %entry.path().display(), "not a test file, skipping");
                    continue;
                };
                let path = Utf8PathBuf::try_from(entry.into_path())
                    .map_err(|err| TestListError::NonUtf8Path { err })?;

                if !filter.is_match(path.as_str()) {
                    continue;
                }
                if !seen.insert(path.clone()) {
                    debug!(%path, "already discovered through an earlier suite, skipping");
                    continue;
                }
                Self::add_file(path, kind, options, &mut entries)?;
            }
        }

        Ok(Self { suites, entries })
    }

    /// Creates a test list from entries that have already been discovered.
    pub fn new(suites: Vec<Utf8PathBuf>, entries: Vec<TestEntry>) -> Self {
        Self { suites, entries }
    }

    /// Returns the suite directories that were searched.
    pub fn suites(&self) -> &[Utf8PathBuf] {
        &self.suites
    }

    /// Returns the number of test units.
    pub fn test_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no test units were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the test units, in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &TestEntry> + '_ {
        self.entries.iter()
    }

    /// Produces a serializable summary of this list.
    pub fn to_summary(&self) -> TestListSummary {
        let mut summary = TestListSummary::new(self.suites.clone());
        summary.test_count = self.entries.len();
        summary.tests = self
            .entries
            .iter()
            .map(|entry| {
                let unit = match &entry.kind {
                    TestEntryKind::Directive { path, index } => TestUnitSummary::Directive {
                        path: path.clone(),
                        index: *index,
                    },
                    TestEntryKind::BinaryCase { binary, case, .. } => {
                        TestUnitSummary::BinaryCase {
                            binary: binary.clone(),
                            case: case.clone(),
                        }
                    }
                };
                (entry.name.clone(), unit)
            })
            .collect();
        summary
    }

    /// Outputs this list to the given writer.
    pub fn write(
        &self,
        output_format: OutputFormat,
        writer: impl Write,
        colorize: bool,
    ) -> Result<(), WriteTestListError> {
        match output_format {
            OutputFormat::Human { verbose } => self
                .write_human(writer, verbose, colorize)
                .map_err(WriteTestListError::Io),
            OutputFormat::Serializable(format) => format
                .to_writer(&self.to_summary(), writer)
                .map_err(WriteTestListError::Json),
        }
    }

    /// Turns each entry into a runnable unit that shares `ctx`.
    pub fn into_units(self, ctx: Arc<TestContext>) -> Vec<TestUnit> {
        self.entries
            .into_iter()
            .map(|entry| {
                let ctx = ctx.clone();
                match entry.kind {
                    TestEntryKind::Directive { path, index } => {
                        TestUnit::new(entry.name, move || run_directive_test(ctx, path, index))
                    }
                    TestEntryKind::BinaryCase {
                        binary, filter_arg, ..
                    } => TestUnit::new(entry.name, move || async move {
                        ctx.executor.run_binary_case(&binary, &filter_arg).await
                    }),
                }
            })
            .collect()
    }

    // ---
    // Helper methods
    // ---

    fn add_file(
        path: Utf8PathBuf,
        kind: FileKind,
        options: &DiscoveryOptions,
        entries: &mut Vec<TestEntry>,
    ) -> Result<(), TestListError> {
        match kind {
            FileKind::Directive if options.repeat > 1 => {
                entries.extend((0..options.repeat).map(|index| TestEntry {
                    name: format!("{path} [{index}]"),
                    kind: TestEntryKind::Directive {
                        path: path.clone(),
                        index: Some(index),
                    },
                }));
            }
            FileKind::Directive => {
                entries.push(TestEntry {
                    name: path.to_string(),
                    kind: TestEntryKind::Directive { path, index: None },
                });
            }
            FileKind::Binary => {
                let output = list_binary(&path, options)?;
                for case in parse_case_list(&path, &output)? {
                    entries.push(TestEntry {
                        name: format!("{path}#{case}"),
                        kind: TestEntryKind::BinaryCase {
                            filter_arg: format!("{}{case}", options.binaries.filter_arg_prefix),
                            binary: path.clone(),
                            case,
                        },
                    });
                }
            }
        }
        Ok(())
    }

    fn write_human(&self, mut writer: impl Write, verbose: bool, colorize: bool) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        for entry in &self.entries {
            write!(writer, "{}", entry.name.style(styles.test_name))?;
            if verbose {
                match &entry.kind {
                    TestEntryKind::Directive { .. } => {
                        write!(writer, " {}", "(directive)".style(styles.field))?;
                    }
                    TestEntryKind::BinaryCase { filter_arg, .. } => {
                        write!(writer, " {} {filter_arg}", "(binary case)".style(styles.field))?;
                    }
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// How a walked file is turned into test units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum FileKind {
    /// A file with one of the configured extensions.
    Directive,

    /// An extension-less file whose name ends with the binary suffix.
    Binary,
}

impl FileKind {
    /// Works on the raw path, so files with non-UTF-8 names that could never be tests are
    /// skipped rather than rejected.
    fn classify(path: &Path, options: &DiscoveryOptions) -> Option<Self> {
        match path.extension() {
            Some(extension) => extension
                .to_str()
                .filter(|extension| options.extensions.contains(*extension))
                .map(|_| Self::Directive),
            None => path
                .file_name()
                .and_then(OsStr::to_str)
                .filter(|name| name.ends_with(options.binaries.suffix.as_str()))
                .map(|_| Self::Binary),
        }
    }
}

fn list_binary(binary: &Utf8Path, options: &DiscoveryOptions) -> Result<String, TestListError> {
    let list_arg = options.binaries.list_arg.as_str();
    let command = shell_words::join([binary.as_str(), list_arg]);
    debug!(%command, "listing test binary");

    let output = duct::cmd(binary.as_std_path(), [list_arg])
        .dir(options.list_dir.as_std_path())
        .stdin_null()
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|err| TestListError::ListExec {
            command: command.clone(),
            err,
        })?;

    if !output.status.success() {
        return Err(TestListError::ListFailed {
            command,
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| TestListError::ListOutputNotUtf8 {
        binary: binary.to_owned(),
    })
}

/// Parses gtest-style case listings.
///
/// The output is in the form:
///
/// ```text
/// FooTest.
///   Bar
///   Baz  # GetParam() = 1
/// ```
fn parse_case_list(binary: &Utf8Path, output: &str) -> Result<Vec<String>, TestListError> {
    let malformed = |line: &str| TestListError::MalformedListOutput {
        binary: binary.to_owned(),
        line: line.to_owned(),
    };

    let mut cases = Vec::new();
    let mut class = None;
    for raw_line in output.lines() {
        let line = match raw_line.split_once('#') {
            Some((name, _comment)) => name,
            None => raw_line,
        }
        .trim_end();
        if line.trim_start().is_empty() {
            continue;
        }

        match line.strip_prefix("  ") {
            Some(case) => {
                if case.starts_with(char::is_whitespace) {
                    return Err(malformed(raw_line));
                }
                let class = class.ok_or_else(|| malformed(raw_line))?;
                cases.push(format!("{class}{case}"));
            }
            None => class = Some(line.trim_start()),
        }
    }
    Ok(cases)
}

/// State shared by every test unit in a run.
#[derive(Debug)]
pub struct TestContext {
    /// Launches scripts and test binaries.
    pub executor: ShellExecutor,

    /// Rewrites placeholders in `RUN:` lines.
    pub substitutions: Substitutions,

    /// Matched against `XFAIL:`, `XTARGET:` and `REQUIRES:` tags.
    pub target: TargetInfo,

    /// Where directive markers are recognized.
    pub anchor: DirectiveAnchor,
}

async fn run_directive_test(
    ctx: Arc<TestContext>,
    path: Utf8PathBuf,
    index: Option<usize>,
) -> Result<TestOutcome, ExecuteError> {
    let directives = match ParsedDirectives::from_path(&path, &ctx.anchor).await {
        Ok(directives) => directives,
        Err(err) => {
            return Ok(TestOutcome::unresolved(
                UnresolvedReason::Unreadable,
                format_args!("error reading `{path}`: {err}"),
            ));
        }
    };

    if directives.script.is_empty() {
        debug!(%path, "no RUN lines, not executing");
        return Ok(TestOutcome::not_executed(ExecutionResult::NoRunLines));
    }
    if directives.has_unterminated_run_line() {
        return Ok(TestOutcome::unresolved(
            UnresolvedReason::UnterminatedRunLine,
            format_args!("`{path}`: the last RUN line ends with a continuation marker"),
        ));
    }
    let missing = ctx.target.missing_features(&directives.requires);
    if !missing.is_empty() {
        debug!(%path, ?missing, "required features unavailable, not executing");
        return Ok(TestOutcome::not_executed(ExecutionResult::Unsupported {
            missing,
        }));
    }

    let paths = PathContext::new(path, index);
    let mut script = directives.script;
    ctx.substitutions.apply(&mut script, &paths);
    if let Err(err) = paths.create_tmp_dirs().await {
        return Ok(TestOutcome::unresolved(
            UnresolvedReason::TempDirCreate,
            format_args!("error creating `{}`: {err}", paths.tmp_base),
        ));
    }

    let mut outcome = ctx.executor.run_script(&script, &paths).await?;
    if matches!(outcome.result, ExecutionResult::Fail { .. })
        && ctx
            .target
            .is_expected_failure(&directives.xfails, &directives.xtargets)
    {
        outcome.result = ExecutionResult::ExpectedFail;
    }
    Ok(outcome)
}

/// Output formats for test lists.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// A human-readable output format.
    Human {
        /// Whether to produce verbose output.
        verbose: bool,
    },

    /// Machine-readable output format.
    Serializable(SerializableFormat),
}

/// A serialized, machine-readable output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SerializableFormat {
    /// JSON with no whitespace.
    Json,
    /// JSON, prettified.
    JsonPretty,
}

impl SerializableFormat {
    /// Write this data in the given format to the writer.
    pub fn to_writer(
        self,
        value: &impl Serialize,
        writer: impl io::Write,
    ) -> serde_json::Result<()> {
        match self {
            SerializableFormat::Json => serde_json::to_writer(writer, value),
            SerializableFormat::JsonPretty => serde_json::to_writer_pretty(writer, value),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    test_name: Style,
    field: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.test_name = Style::new().blue().bold();
        self.field = Style::new().yellow().bold();
    }
}
