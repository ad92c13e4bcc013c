//! Built-in transforms

use crate::node::{CstNode, FieldValue, Node, SimpleStatementLine};
use crate::result::Result;
use crate::sentinel::{MaybeSentinel, Transformed};
use crate::trivia::{SimpleWhitespace, TrailingWhitespace};
use crate::visitor::Transformer;
use std::sync::Arc;
use tracing::trace;

/// Put every small statement of a `;`-separated line on a line of its own
///
/// Semicolons are dropped. The first new line keeps the comments above the
/// original line and the last keeps its trailing whitespace and comment.
#[derive(Debug, Default)]
pub struct SplitSimpleStatements;

impl Transformer for SplitSimpleStatements {
    fn leave_simple_statement_line(
        &mut self,
        _original: &Arc<SimpleStatementLine>,
        updated: Arc<SimpleStatementLine>,
    ) -> Result<Transformed> {
        if updated.body.len() < 2 {
            return Ok(Transformed::Keep(updated.into()));
        }

        let last = updated.body.len() - 1;
        let mut lines = Vec::with_capacity(updated.body.len());
        for (idx, statement) in updated.body.iter().enumerate() {
            let statement = statement
                .with_changes([("semicolon", FieldValue::from(MaybeSentinel::<Node>::Default))])?;
            let line = SimpleStatementLine {
                leading_lines: if idx == 0 {
                    updated.leading_lines.clone()
                } else {
                    Vec::new()
                },
                form_feed: if idx == 0 {
                    updated.form_feed.clone()
                } else {
                    SimpleWhitespace::empty()
                },
                body: vec![statement],
                trailing_whitespace: if idx == last {
                    updated.trailing_whitespace.clone()
                } else {
                    TrailingWhitespace::default()
                },
            };
            lines.push(line.build()?);
        }
        trace!("Split a line of {} small statements", lines.len());
        Ok(Transformed::Flatten(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn split(source: &str) -> String {
        let module = parse_module(source).unwrap();
        module
            .transform_root(&mut SplitSimpleStatements)
            .unwrap()
            .code()
    }

    #[test]
    fn test_split_keeps_comments_at_the_ends() {
        assert_eq!(
            split("# above\na = 1; b(); return  # end\n"),
            "# above\na = 1\nb()\nreturn  # end\n"
        );
    }

    #[test]
    fn test_split_inside_blocks() {
        assert_eq!(
            split("def f():\n  x;y\n  z\n"),
            "def f():\n  x\n  y\n  z\n"
        );
    }

    #[test]
    fn test_single_statement_lines_are_shared() {
        let module = parse_module("a\nb\n").unwrap();
        let result = module.transform_root(&mut SplitSimpleStatements).unwrap();
        assert!(result.ptr_eq(&module));
    }
}
