// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root element for a serializable list of discovered tests.
///
/// This is produced by `runlit list --message-format json`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestListSummary {
    /// Number of test units across all suites.
    pub test_count: usize,

    /// The suite roots that were searched, in the order they were searched.
    pub suites: Vec<Utf8PathBuf>,

    /// Test units, keyed by unit name.
    pub tests: BTreeMap<String, TestUnitSummary>,
}

impl TestListSummary {
    /// Creates a new, empty summary for the given suite roots.
    pub fn new(suites: Vec<Utf8PathBuf>) -> Self {
        Self {
            test_count: 0,
            suites,
            tests: BTreeMap::new(),
        }
    }

    /// Parse JSON output from `runlit list --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// A serializable description of a single test unit.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TestUnitSummary {
    /// A test file with embedded `RUN:` directives.
    Directive {
        /// The path to the test file.
        path: Utf8PathBuf,

        /// The disambiguation index, if the file is run more than once.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },

    /// A single case inside a compiled test binary.
    BinaryCase {
        /// The path to the test binary.
        binary: Utf8PathBuf,

        /// The fully qualified case name, e.g. `FooTest.Bar`.
        case: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_list_json() {
        let json = indoc! {r#"
            {
              "test-count": 2,
              "suites": ["/src/test"],
              "tests": {
                "/src/test/a.c": {
                  "kind": "directive",
                  "path": "/src/test/a.c"
                },
                "/src/unittests/FooTests#Foo.Bar": {
                  "kind": "binary-case",
                  "binary": "/src/unittests/FooTests",
                  "case": "Foo.Bar"
                }
              }
            }
        "#};

        let summary = TestListSummary::parse_json(json).expect("valid JSON");
        assert_eq!(summary.test_count, 2);
        assert_eq!(summary.suites, vec![Utf8PathBuf::from("/src/test")]);
        assert_eq!(
            summary.tests["/src/test/a.c"],
            TestUnitSummary::Directive {
                path: "/src/test/a.c".into(),
                index: None,
            }
        );
        assert_eq!(
            summary.tests["/src/unittests/FooTests#Foo.Bar"],
            TestUnitSummary::BinaryCase {
                binary: "/src/unittests/FooTests".into(),
                case: "Foo.Bar".to_owned(),
            }
        );
    }
}
