// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg(unix)]

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use runlit_runner::{
    config::RunlitConfig, errors::TestListError, outcome::ExecutionResult,
    test_filter::TestFilter, test_list::TestList,
};
use std::os::unix::fs::PermissionsExt;

const HELPER: &str = env!("CARGO_BIN_EXE_runlit-gtest-helper");

fn setup_binary_suite() -> Result<Utf8TempDir> {
    let root = Utf8TempDir::with_prefix("runlit-binaries-")?;
    std::fs::create_dir(root.path().join("unittests"))?;
    std::fs::copy(HELPER, root.path().join("unittests/HelperTests"))?;
    Ok(root)
}

#[test]
fn binary_cases_are_listed_and_run() -> Result<()> {
    let root = setup_binary_suite()?;
    let config = RunlitConfig::default_config(root.path());

    let test_list = TestList::discover(
        config.suites(),
        &TestFilter::any(),
        &config.discovery_options(),
    )?;
    let binary = root.path().join("unittests/HelperTests");
    let names: Vec<_> = test_list.iter().map(|entry| entry.name.clone()).collect();
    assert_eq!(
        names,
        vec![
            format!("{binary}#Math.Adds"),
            format!("{binary}#Math.Overflows"),
            format!("{binary}#Strings.Concat"),
        ]
    );

    let run = run_suite(&config, 2)?;
    assert_eq!(
        run.results,
        btreemap! {
            "unittests/HelperTests#Math.Adds".to_owned() => ExecutionResult::Pass,
            "unittests/HelperTests#Math.Overflows".to_owned() => ExecutionResult::Fail {
                abort_status: None,
            },
            "unittests/HelperTests#Strings.Concat".to_owned() => ExecutionResult::Pass,
        }
    );
    assert!(run.output.contains("expected 0, got 255"), "{}", run.output);
    assert!(run.output.ends_with("Failed 1 / 3\n"), "{}", run.output);
    Ok(())
}

#[test]
fn failed_listing_is_fatal() -> Result<()> {
    let root = setup_binary_suite()?;
    let broken = root.path().join("unittests/BrokenTests");
    std::fs::write(&broken, "#!/bin/sh\necho 'cannot list' >&2\nexit 3\n")?;
    std::fs::set_permissions(&broken, std::fs::Permissions::from_mode(0o755))?;
    let config = RunlitConfig::default_config(root.path());

    let err = TestList::discover(
        config.suites(),
        &TestFilter::any(),
        &config.discovery_options(),
    )
    .expect_err("listing BrokenTests fails");
    match err {
        TestListError::ListFailed {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(stderr, "cannot list\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}
