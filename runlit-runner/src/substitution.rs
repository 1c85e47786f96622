// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Placeholder substitution for `RUN:` lines.
//!
//! Substitution is a single left-to-right pass over each line. At every position the longest
//! matching token is replaced, and replaced text is never scanned again. This means `%%` is always
//! recognized before any token it overlaps with (`%%s` becomes `%s`), and a value inserted for one
//! token can never be mistaken for another token.

use crate::{errors::SubstitutionsBuildError, paths::PathContext};
use aho_corasick::{AhoCorasick, MatchKind};
use indexmap::IndexMap;

/// Tokens that are always substituted, in the order their values are supplied.
pub const BUILTIN_TOKENS: &[&str] = &["%%", "%s", "%S", "%p", "%{pathsep}", "%t", "%T"];

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// A compiled substitution table.
///
/// The set of tokens is fixed at construction. Values for builtin tokens are taken from the
/// [`PathContext`] of each run.
#[derive(Clone, Debug)]
pub struct Substitutions {
    matcher: AhoCorasick,
    user_values: Vec<String>,
}

impl Substitutions {
    /// Compiles the builtin tokens together with user-defined `token -> value` pairs.
    ///
    /// User tokens are expected to have been validated against [`BUILTIN_TOKENS`] already.
    pub fn new(user: &IndexMap<String, String>) -> Result<Self, SubstitutionsBuildError> {
        let patterns = BUILTIN_TOKENS
            .iter()
            .copied()
            .chain(user.keys().map(String::as_str));
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(patterns)
            .map_err(SubstitutionsBuildError::new)?;

        Ok(Self {
            matcher,
            user_values: user.values().cloned().collect(),
        })
    }

    /// Rewrites every line of `script` in place.
    pub fn apply(&self, script: &mut [String], paths: &PathContext) {
        let tmp_file = paths.tmp_file();
        let mut values = Vec::with_capacity(BUILTIN_TOKENS.len() + self.user_values.len());
        values.extend([
            "%",
            paths.source_path.as_str(),
            paths.source_dir.as_str(),
            paths.source_dir.as_str(),
            PATH_LIST_SEPARATOR,
            tmp_file.as_str(),
            paths.tmp_dir.as_str(),
        ]);
        values.extend(self.user_values.iter().map(String::as_str));

        for line in script {
            *line = self.matcher.replace_all(line, &values);
        }
    }
}
