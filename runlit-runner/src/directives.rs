// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of `RUN:`, `XFAIL:`, `XTARGET:`, `REQUIRES:` and `END.` directives embedded in test files.
//!
//! The main entry point is [`ParsedDirectives::parse`].

use camino::Utf8Path;
use serde::Deserialize;
use std::io;

const RUN_MARKER: &str = "RUN:";
const XFAIL_MARKER: &str = "XFAIL:";
const XTARGET_MARKER: &str = "XTARGET:";
const REQUIRES_MARKER: &str = "REQUIRES:";
const END_MARKER: &str = "END.";

/// The continuation marker at the end of a `RUN:` line.
const CONTINUATION: char = '\\';

/// Where in a line a directive marker is recognized.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveAnchor {
    /// A marker is recognized anywhere in a line, regardless of comment syntax.
    ///
    /// This tolerates any comment-leader convention, but a marker token that appears incidentally
    /// inside ordinary code is also treated as a directive.
    #[default]
    Anywhere,

    /// A marker is only recognized at the start of a comment: after leading whitespace, one of
    /// these leaders (possibly repeated, e.g. `;;`), then optional whitespace.
    CommentLeaders(Vec<String>),
}

impl DirectiveAnchor {
    /// Returns the text following `marker` in `line`, if the marker is recognized.
    fn find<'a>(&self, line: &'a str, marker: &str) -> Option<&'a str> {
        match self {
            Self::Anywhere => line
                .find(marker)
                .map(|index| &line[index + marker.len()..]),
            Self::CommentLeaders(leaders) => {
                let line = line.trim_start();
                leaders
                    .iter()
                    .filter(|leader| !leader.is_empty())
                    .find_map(|leader| {
                        let mut rest = line.strip_prefix(leader.as_str())?;
                        while let Some(next) = rest.strip_prefix(leader.as_str()) {
                            rest = next;
                        }
                        rest.trim_start().strip_prefix(marker)
                    })
            }
        }
    }
}

/// The directives extracted from a single test file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedDirectives {
    /// The commands to run, in order, after continuation lines have been joined.
    pub script: Vec<String>,

    /// Expected-failure tags from `XFAIL:` lines.
    pub xfails: Vec<String>,

    /// Expected-target tags from `XTARGET:` lines.
    pub xtargets: Vec<String>,

    /// Required-feature tags from `REQUIRES:` lines.
    pub requires: Vec<String>,
}

impl ParsedDirectives {
    /// Reads the test file at `path` and parses its directives.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, since directives are ASCII.
    pub async fn from_path(path: &Utf8Path, anchor: &DirectiveAnchor) -> io::Result<Self> {
        let contents = tokio::fs::read(path).await?;
        Ok(Self::parse(&String::from_utf8_lossy(&contents), anchor))
    }

    /// Parses directives out of the contents of a test file.
    pub fn parse(contents: &str, anchor: &DirectiveAnchor) -> Self {
        let mut directives = Self::default();

        for line in contents.lines() {
            if let Some(command) = anchor.find(line, RUN_MARKER) {
                directives.push_run_line(command.trim());
            } else if let Some(tags) = anchor.find(line, XFAIL_MARKER) {
                push_tags(&mut directives.xfails, tags);
            } else if let Some(tags) = anchor.find(line, XTARGET_MARKER) {
                push_tags(&mut directives.xtargets, tags);
            } else if let Some(tags) = anchor.find(line, REQUIRES_MARKER) {
                push_tags(&mut directives.requires, tags);
            } else if let Some(rest) = anchor.find(line, END_MARKER) {
                // Only a bare `END.` terminates the file.
                if rest.trim().is_empty() {
                    break;
                }
            }
        }

        directives
    }

    /// Returns true if the last `RUN:` line ends with a continuation marker that nothing follows.
    pub fn has_unterminated_run_line(&self) -> bool {
        self.script
            .last()
            .is_some_and(|line| line.ends_with(CONTINUATION))
    }

    fn push_run_line(&mut self, command: &str) {
        match self.script.last_mut() {
            Some(last) if last.ends_with(CONTINUATION) => {
                last.pop();
                last.push_str(command);
            }
            _ => self.script.push(command.to_owned()),
        }
    }
}

fn push_tags(tags: &mut Vec<String>, list: &str) {
    tags.extend(
        list.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToOwned::to_owned),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn parse(contents: &str) -> ParsedDirectives {
        ParsedDirectives::parse(contents, &DirectiveAnchor::Anywhere)
    }

    #[test]
    fn basic_directives() {
        let contents = indoc! {r#"
            // RUN: %clang -cc1 -verify %s
            // RUN: not %clang %s 2>&1 | FileCheck %s
            // XFAIL: *
            // REQUIRES: x86-registered-target, asserts
            int main() { return 0; }
        "#};

        assert_eq!(
            parse(contents),
            ParsedDirectives {
                script: vec![
                    "%clang -cc1 -verify %s".to_owned(),
                    "not %clang %s 2>&1 | FileCheck %s".to_owned(),
                ],
                xfails: vec!["*".to_owned()],
                xtargets: vec![],
                requires: vec!["x86-registered-target".to_owned(), "asserts".to_owned()],
            }
        );
    }

    #[test]
    fn continuation_lines_are_joined() {
        let contents = indoc! {r#"
            // RUN: a \
            // RUN: b
        "#};
        assert_eq!(parse(contents).script, vec!["a b".to_owned()]);

        // Nothing is inserted between the two fragments.
        let contents = indoc! {r#"
            ; RUN: echo foo\
            ; RUN:    bar \
            ; RUN: baz
            ; RUN: second
        "#};
        assert_eq!(
            parse(contents).script,
            vec!["echo foobar baz".to_owned(), "second".to_owned()]
        );
    }

    #[test]
    fn unterminated_run_line() {
        let directives = parse("// RUN: echo \\\n");
        assert_eq!(directives.script, vec!["echo \\".to_owned()]);
        assert!(directives.has_unterminated_run_line());

        assert!(!parse("// RUN: echo\n").has_unterminated_run_line());
        assert!(!parse("").has_unterminated_run_line());
    }

    #[test]
    fn tags_accumulate() {
        let contents = indoc! {r#"
            // XFAIL: a, b
            // XTARGET: x86_64
            // XFAIL: c
            // XTARGET: arm ,
            // REQUIRES: shell
        "#};
        let directives = parse(contents);
        assert_eq!(directives.xfails, vec!["a", "b", "c"]);
        assert_eq!(directives.xtargets, vec!["x86_64", "arm"]);
        assert_eq!(directives.requires, vec!["shell"]);
        assert!(directives.script.is_empty());
    }

    #[test_case("// END.", 1 ; "bare end terminates")]
    #[test_case("// END.   ", 1 ; "trailing whitespace terminates")]
    #[test_case("END.", 1 ; "no comment leader terminates")]
    #[test_case("// END. of the world", 2 ; "trailing text does not terminate")]
    fn end_directive(end_line: &str, expected_runs: usize) {
        let contents = format!("// RUN: first\n{end_line}\n// RUN: second\n");
        assert_eq!(parse(&contents).script.len(), expected_runs);
    }

    #[test]
    fn run_takes_precedence() {
        // The first matching marker wins.
        let directives = parse("// RUN: echo 'XFAIL: *' END.\n");
        assert_eq!(directives.script, vec!["echo 'XFAIL: *' END."]);
        assert!(directives.xfails.is_empty());
    }

    #[test]
    fn marker_anywhere_in_line() {
        // Substring matching means incidental markers are picked up.
        let directives = parse("printf(\"RUN: not a directive\");\n");
        assert_eq!(directives.script, vec!["not a directive\");"]);
    }

    #[test]
    fn comment_leader_anchor() {
        let anchor = DirectiveAnchor::CommentLeaders(vec!["//".to_owned(), ";".to_owned()]);
        let contents = indoc! {r#"
            printf("RUN: not a directive");
              // RUN: first
            ;; RUN: second
            # RUN: wrong leader
            // XFAIL: *
            int x; // END.
        "#};
        let directives = ParsedDirectives::parse(contents, &anchor);
        assert_eq!(directives.script, vec!["first", "second"]);
        assert_eq!(directives.xfails, vec!["*"]);

        // An empty leader is ignored rather than matching everything.
        let anchor = DirectiveAnchor::CommentLeaders(vec![String::new()]);
        assert_eq!(ParsedDirectives::parse("RUN: x", &anchor), ParsedDirectives::default());
    }

    #[tokio::test]
    async fn from_path() {
        let dir = camino_tempfile::Utf8TempDir::with_prefix("runlit-directives-").unwrap();
        let path = dir.path().join("latin1.c");
        std::fs::write(&path, b"// RUN: echo \xe9\n// XFAIL: *\n").unwrap();

        let directives = ParsedDirectives::from_path(&path, &DirectiveAnchor::Anywhere)
            .await
            .unwrap();
        assert_eq!(directives.script, vec!["echo \u{fffd}"]);
        assert_eq!(directives.xfails, vec!["*"]);

        let missing = dir.path().join("missing.c");
        let err = ParsedDirectives::from_path(&missing, &DirectiveAnchor::Anywhere)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn crlf_line_endings() {
        let directives = parse("// RUN: a \\\r\n// RUN: b\r\n// XFAIL: *\r\n");
        assert_eq!(directives.script, vec!["a b"]);
        assert_eq!(directives.xfails, vec!["*"]);
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(lines in proptest::collection::vec(
            prop_oneof![
                "[ -~]{0,20}",
                "// RUN: [ -~]{0,10}\\\\?",
                "// XFAIL: [a-z*, ]{0,10}",
                "// XTARGET: [a-z, ]{0,10}",
                "// REQUIRES: [a-z, ]{0,10}",
                Just("// END.".to_owned()),
            ],
            0..16,
        )) {
            let contents = lines.join("\n");
            prop_assert_eq!(parse(&contents), parse(&contents));
        }
    }
}
