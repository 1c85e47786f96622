// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A minimal gtest-style test binary used by the runlit integration tests.
//!
//! Supports `--gtest_list_tests` and `--gtest_filter=Class.Case` for a fixed set of cases.

use std::process::ExitCode;

const LISTING: &str = "\
Math.
  Adds
  Overflows  # GetParam() = 255
Strings.
  Concat
";

fn main() -> ExitCode {
    let Some(arg) = std::env::args().nth(1) else {
        eprintln!("usage: runlit-gtest-helper --gtest_list_tests | --gtest_filter=Class.Case");
        return ExitCode::from(2);
    };

    if arg == "--gtest_list_tests" {
        print!("{LISTING}");
        return ExitCode::SUCCESS;
    }

    match arg.strip_prefix("--gtest_filter=") {
        Some("Math.Adds") => {
            println!("[ RUN      ] Math.Adds");
            println!("[       OK ] Math.Adds");
            ExitCode::SUCCESS
        }
        Some("Math.Overflows") => {
            println!("[ RUN      ] Math.Overflows");
            eprintln!("expected 0, got 255");
            println!("[  FAILED  ] Math.Overflows");
            ExitCode::FAILURE
        }
        Some("Strings.Concat") => {
            println!("[ RUN      ] Strings.Concat");
            println!("[       OK ] Strings.Concat");
            ExitCode::SUCCESS
        }
        Some(other) => {
            eprintln!("unknown test: {other}");
            ExitCode::from(2)
        }
        None => {
            eprintln!("unknown argument: {arg}");
            ExitCode::from(2)
        }
    }
}
