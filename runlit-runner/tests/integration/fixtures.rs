// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, WrapErr};
use runlit_runner::{
    config::{RunlitConfig, TestThreads},
    outcome::ExecutionResult,
    reporter::{ReporterOutput, TestReporterBuilder},
    runner::{RunStats, TestEvent, TestRunnerBuilder},
    substitution::Substitutions,
    test_filter::TestFilter,
    test_list::{TestContext, TestList},
};
use std::{collections::BTreeMap, sync::Arc};
use walkdir::WalkDir;

pub(crate) fn fixture_suite_dir() -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures/runlit-suite")
}

/// Copies the fixture suite into a fresh temporary directory, since running tests creates
/// `Output` directories next to the test files.
pub(crate) fn copy_fixture_suite() -> Result<Utf8TempDir> {
    let temp_dir = Utf8TempDir::with_prefix("runlit-suite-")?;
    let source = fixture_suite_dir();

    for entry in WalkDir::new(&source) {
        let entry = entry?;
        let path = Utf8Path::from_path(entry.path()).expect("fixture paths are UTF-8");
        let relative = path.strip_prefix(&source)?;
        let dest = temp_dir.path().join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(path, &dest).wrap_err_with(|| format!("copying {path} to {dest}"))?;
        }
    }

    Ok(temp_dir)
}

/// The results of running a suite, keyed by unit name relative to the root.
#[derive(Debug)]
pub(crate) struct SuiteRun {
    pub(crate) results: BTreeMap<String, ExecutionResult>,
    pub(crate) run_stats: RunStats,
    pub(crate) output: String,
}

/// Discovers and runs every test under `config`'s suites, reporting to a buffer.
pub(crate) fn run_suite(config: &RunlitConfig, test_threads: usize) -> Result<SuiteRun> {
    let test_list = TestList::discover(
        config.suites(),
        &TestFilter::any(),
        &config.discovery_options(),
    )?;
    let ctx = Arc::new(TestContext {
        executor: config.executor()?,
        substitutions: Substitutions::new(config.substitutions())?,
        target: config.target_info(),
        anchor: config.directive_anchor().clone(),
    });
    let runner = TestRunnerBuilder::default()
        .set_test_threads(TestThreads::Count(test_threads))
        .build(test_list.into_units(ctx))?;

    let root = config.root();
    let mut results = BTreeMap::new();
    let mut buf = Vec::new();
    let mut reporter = TestReporterBuilder::default().build(ReporterOutput::Buffer(&mut buf));
    let run_stats = runner.try_execute(|event| {
        if let TestEvent::TestFinished { name, outcome, .. } = &event {
            let name = name
                .strip_prefix(root.as_str())
                .map_or(*name, |name| name.trim_start_matches('/'));
            results.insert(name.to_owned(), outcome.result.clone());
        }
        reporter.report_event(&event)
    })?;
    drop(reporter);

    Ok(SuiteRun {
        results,
        run_stats,
        output: String::from_utf8(buf)?,
    })
}
