// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluation of `XFAIL:`, `XTARGET:` and `REQUIRES:` tags against the target being tested.

use std::collections::BTreeSet;

/// The tag that matches every target.
const WILDCARD: &str = "*";

/// Describes the target being tested, for matching against directive tags.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TargetInfo {
    /// The target triple, e.g. `x86_64-unknown-linux-gnu`. If unset, only `*` and feature names
    /// match `XFAIL:` tags.
    pub triple: Option<String>,

    /// Features that satisfy `REQUIRES:` tags and can be named by `XFAIL:` tags.
    pub available_features: BTreeSet<String>,
}

impl TargetInfo {
    /// Returns true if a test with these tags is expected to fail on this target.
    ///
    /// `XTARGET:` takes precedence: if any of its tags matches, the test is expected to pass
    /// regardless of `XFAIL:`.
    pub fn is_expected_failure(&self, xfails: &[String], xtargets: &[String]) -> bool {
        if xtargets.iter().any(|tag| self.matches_target(tag)) {
            return false;
        }
        xfails
            .iter()
            .any(|tag| self.matches_target(tag) || self.available_features.contains(tag))
    }

    /// Returns the `REQUIRES:` tags that aren't available, in the order they were given.
    pub fn missing_features(&self, requires: &[String]) -> Vec<String> {
        requires
            .iter()
            .filter(|feature| !self.available_features.contains(feature.as_str()))
            .cloned()
            .collect()
    }

    fn matches_target(&self, tag: &str) -> bool {
        tag == WILDCARD
            || self
                .triple
                .as_deref()
                .is_some_and(|triple| triple.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use test_case::test_case;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn linux_target() -> TargetInfo {
        TargetInfo {
            triple: Some("x86_64-unknown-linux-gnu".to_owned()),
            available_features: btreeset! { "asserts".to_owned(), "shell".to_owned() },
        }
    }

    #[test_case(&[], &[], false ; "no tags")]
    #[test_case(&["*"], &[], true ; "wildcard")]
    #[test_case(&["linux"], &[], true ; "triple substring")]
    #[test_case(&["darwin"], &[], false ; "other triple")]
    #[test_case(&["darwin", "asserts"], &[], true ; "available feature")]
    #[test_case(&["*"], &["x86_64"], false ; "xtarget overrides")]
    #[test_case(&["*"], &["*"], false ; "wildcard xtarget")]
    #[test_case(&["*"], &["arm"], true ; "unmatched xtarget")]
    fn expected_failure(xfails: &[&str], xtargets: &[&str], expected: bool) {
        assert_eq!(
            linux_target().is_expected_failure(&tags(xfails), &tags(xtargets)),
            expected
        );
    }

    #[test]
    fn no_triple() {
        let target = TargetInfo::default();
        assert!(target.is_expected_failure(&tags(&["*"]), &[]));
        assert!(!target.is_expected_failure(&tags(&["linux"]), &[]));
        assert!(!target.is_expected_failure(&tags(&["*"]), &tags(&["*"])));
        assert!(target.is_expected_failure(&tags(&["*"]), &tags(&["linux"])));
    }

    #[test]
    fn missing_features() {
        let target = linux_target();
        assert_eq!(
            target.missing_features(&tags(&["zlib", "asserts", "lld"])),
            tags(&["zlib", "lld"])
        );
        assert!(target.missing_features(&tags(&["shell"])).is_empty());
    }
}
