// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-run paths derived from a test file's location.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// The name of the scratch directory created next to each test file.
pub const OUTPUT_DIR_NAME: &str = "Output";

/// Paths used to substitute placeholders and to store scratch output for one test run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathContext {
    /// The test file itself.
    pub source_path: Utf8PathBuf,

    /// The directory containing the test file.
    pub source_dir: Utf8PathBuf,

    /// The file name of the test file.
    pub exec_base: String,

    /// The directory the test is considered to execute in. Same as `source_dir`.
    pub exec_dir: Utf8PathBuf,

    /// `<exec_dir>/Output`.
    pub tmp_dir: Utf8PathBuf,

    /// `<tmp_dir>/<exec_base>`, suffixed with `_<index>` for indexed runs.
    pub tmp_base: Utf8PathBuf,
}

impl PathContext {
    /// Derives the paths for a run of `source_path`.
    ///
    /// `index` disambiguates runs when the same file is run more than once.
    pub fn new(source_path: impl Into<Utf8PathBuf>, index: Option<usize>) -> Self {
        let source_path = source_path.into();
        let source_dir = match source_path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        let exec_base = source_path.file_name().unwrap_or_default().to_owned();
        let exec_dir = source_dir.clone();
        let tmp_dir = exec_dir.join(OUTPUT_DIR_NAME);
        let tmp_base = match index {
            Some(index) => tmp_dir.join(format!("{exec_base}_{index}")),
            None => tmp_dir.join(&exec_base),
        };

        Self {
            source_path,
            source_dir,
            exec_base,
            exec_dir,
            tmp_dir,
            tmp_base,
        }
    }

    /// The per-run temporary file, substituted for `%t`.
    pub fn tmp_file(&self) -> Utf8PathBuf {
        with_suffix(&self.tmp_base, ".tmp")
    }

    /// Where the joined script is written before it is run.
    pub fn script_path(&self) -> Utf8PathBuf {
        with_suffix(&self.tmp_base, ".script")
    }

    /// Creates `tmp_base` as a directory, along with `tmp_dir` and any other missing parents.
    ///
    /// Succeeds if the directories already exist.
    pub async fn create_tmp_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.tmp_base).await
    }
}

fn with_suffix(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let mut s = path.as_str().to_owned();
    s.push_str(suffix);
    s.into()
}
