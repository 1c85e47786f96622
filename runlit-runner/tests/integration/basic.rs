// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use runlit_runner::{
    config::RunlitConfig,
    outcome::{ExecutionResult, UnresolvedReason},
};

#[cfg(unix)]
#[test]
fn run_fixture_suite() -> Result<()> {
    let root = copy_fixture_suite()?;
    let config = RunlitConfig::default_config(root.path());
    let run = run_suite(&config, 4)?;

    assert_eq!(
        run.results,
        btreemap! {
            "basic/fail.c".to_owned() => ExecutionResult::Fail { abort_status: None },
            "basic/pass.c".to_owned() => ExecutionResult::Pass,
            "basic/xfail.c".to_owned() => ExecutionResult::ExpectedFail,
            "directives/continuation.c".to_owned() => ExecutionResult::Pass,
            "directives/end.c".to_owned() => ExecutionResult::Pass,
            "directives/unterminated.c".to_owned() => ExecutionResult::Unresolved {
                reason: UnresolvedReason::UnterminatedRunLine,
            },
            "not-executed/comment-only.c".to_owned() => ExecutionResult::NoRunLines,
            "not-executed/unsupported.c".to_owned() => ExecutionResult::Unsupported {
                missing: vec!["not-a-real-feature".to_owned()],
            },
            "substitutions/percent.c".to_owned() => ExecutionResult::Pass,
            "substitutions/source.c".to_owned() => ExecutionResult::Pass,
            "substitutions/write-tmp.c".to_owned() => ExecutionResult::Pass,
        },
        "files under Inputs are never run"
    );

    assert_eq!(run.run_stats.fails(), 2);
    assert!(!run.run_stats.is_success());
    assert!(
        run.output.ends_with("Failed 2 / 11\n"),
        "unexpected output:\n{}",
        run.output
    );
    assert!(run.output.contains("expected output\n"), "failing output is shown");
    Ok(())
}

#[cfg(unix)]
#[test]
fn scratch_directories() -> Result<()> {
    let root = copy_fixture_suite()?;
    let config = RunlitConfig::default_config(root.path());
    run_suite(&config, 2)?;

    let tmp_file = root.path().join("substitutions/Output/write-tmp.c.tmp");
    assert_eq!(std::fs::read_to_string(&tmp_file)?, "hello\n");
    assert!(root.path().join("substitutions/Output/write-tmp.c").is_dir());
    assert!(root.path().join("substitutions/Output/write-tmp.c.script").is_file());

    // Nothing is created for files that aren't executed.
    assert!(!root.path().join("not-executed/Output").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn failure_count_is_exact() -> Result<()> {
    const TOTAL: usize = 40;
    const FAIL_EVERY: usize = 4;

    let root = camino_tempfile::Utf8TempDir::with_prefix("runlit-generated-")?;
    for i in 0..TOTAL {
        let command = if i % FAIL_EVERY == 0 { "false" } else { "true" };
        std::fs::write(
            root.path().join(format!("test-{i:02}.c")),
            format!("// RUN: {command}\n"),
        )?;
    }
    let config = RunlitConfig::default_config(root.path());

    for _ in 0..5 {
        let run = run_suite(&config, 8)?;
        assert_eq!(run.run_stats.final_run_count, TOTAL);
        assert_eq!(run.run_stats.failed, TOTAL / FAIL_EVERY);
        assert!(run.output.ends_with("Failed 10 / 40\n"), "{}", run.output);
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn repeated_runs_use_separate_scratch_space() -> Result<()> {
    let root = copy_fixture_suite()?;
    let config_file = root.path().join("repeat.toml");
    std::fs::write(&config_file, "suites = [\"substitutions\"]\nrepeat = 3\n")?;
    let config = RunlitConfig::from_sources(root.path(), Some(config_file.as_path()))?;

    let run = run_suite(&config, 3)?;
    assert_eq!(run.run_stats.final_run_count, 9);
    assert!(run.run_stats.is_success(), "{}", run.output);
    for index in 0..3 {
        assert!(
            run.results
                .contains_key(&format!("substitutions/write-tmp.c [{index}]"))
        );
        let tmp_file = root
            .path()
            .join(format!("substitutions/Output/write-tmp.c_{index}.tmp"));
        assert_eq!(std::fs::read_to_string(&tmp_file)?, "hello\n");
    }
    Ok(())
}
