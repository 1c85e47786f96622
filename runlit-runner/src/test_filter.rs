// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TestFilterBuildError;
use aho_corasick::AhoCorasick;

/// A filter for test files, matching any of a set of substrings against the file's path.
#[derive(Clone, Debug)]
pub struct TestFilter {
    name_match: NameMatch,
}

#[derive(Clone, Debug)]
enum NameMatch {
    MatchAll,
    MatchSet(Box<AhoCorasick>),
}

impl TestFilter {
    /// Creates a new `TestFilter` from the given patterns.
    ///
    /// If an empty slice is passed, the test filter matches all possible paths.
    pub fn new(patterns: &[impl AsRef<str>]) -> Result<Self, TestFilterBuildError> {
        let name_match = if patterns.is_empty() {
            NameMatch::MatchAll
        } else {
            let patterns = patterns.iter().map(|pattern| pattern.as_ref());
            NameMatch::MatchSet(Box::new(AhoCorasick::new(patterns)?))
        };
        Ok(Self { name_match })
    }

    /// Creates a new `TestFilter` that matches every path.
    pub fn any() -> Self {
        Self {
            name_match: NameMatch::MatchAll,
        }
    }

    /// Returns true if `path` contains any of the patterns.
    pub fn is_match(&self, path: &str) -> bool {
        match &self.name_match {
            NameMatch::MatchAll => true,
            NameMatch::MatchSet(set) => set.is_match(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prelude::*};

    proptest! {
        #[test]
        fn proptest_empty(paths in vec(any::<String>(), 0..16)) {
            let patterns: &[String] = &[];
            let test_filter = TestFilter::new(patterns).unwrap();
            for path in paths {
                prop_assert!(test_filter.is_match(&path));
            }
        }

        // Test that exact names match.
        #[test]
        fn proptest_exact(paths in vec(any::<String>(), 0..16)) {
            let test_filter = TestFilter::new(&paths).unwrap();
            for path in paths {
                prop_assert!(test_filter.is_match(&path));
            }
        }

        // Test that substrings match.
        #[test]
        fn proptest_substring(
            substring_prefix_suffixes in vec([any::<String>(); 3], 0..16),
        ) {
            let mut patterns = Vec::with_capacity(substring_prefix_suffixes.len());
            let mut paths = Vec::with_capacity(substring_prefix_suffixes.len());
            for [substring, prefix, suffix] in substring_prefix_suffixes {
                paths.push(prefix + &substring + &suffix);
                patterns.push(substring);
            }

            let test_filter = TestFilter::new(&patterns).unwrap();
            for path in paths {
                prop_assert!(test_filter.is_match(&path));
            }
        }
    }

    #[test]
    fn no_match() {
        let test_filter = TestFilter::new(&["CodeGen", "Sema/"]).unwrap();
        assert!(test_filter.is_match("/src/test/CodeGen/foo.c"));
        assert!(test_filter.is_match("/src/test/Sema/bar.c"));
        assert!(!test_filter.is_match("/src/test/Semantic/bar.c"));
        assert!(!test_filter.is_match("/src/test/Parser/baz.c"));
    }
}
