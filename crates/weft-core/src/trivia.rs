//! Trivia: whitespace, comments and newlines owned by nodes
//!
//! Every byte of source text that is not part of a token lives in one of
//! these values. Trivia carries the literal text it was parsed from, so
//! rendering a tree replays it verbatim.
//!
//! Ownership follows a few fixed rules:
//! - Whitespace between tokens on one logical line is [`SimpleWhitespace`].
//! - Inside brackets whitespace may span lines, which is modelled as
//!   [`ParenthesizedWhitespace`]; fields that can appear there hold a
//!   [`BaseWhitespace`].
//! - The rest of a statement line (spaces, comment, newline) is a
//!   [`TrailingWhitespace`].
//! - Blank and comment-only lines are [`EmptyLine`]s attached to the
//!   following statement, or to the module footer at end of file.

use crate::codegen::CodegenState;

/// Whitespace that never crosses a line break, except through a `\` continuation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SimpleWhitespace(String);

impl SimpleWhitespace {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// No whitespace at all
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// A single space
    pub fn space() -> Self {
        Self(" ".to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that the value only holds blanks and line continuations
    pub fn validate(&self) -> Result<(), String> {
        let mut chars = self.0.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                ' ' | '\t' | '\x0c' => {}
                '\\' => match chars.next() {
                    None | Some('\n') => {}
                    Some('\r') => {
                        if chars.peek() == Some(&'\n') {
                            chars.next();
                        }
                    }
                    Some(other) => {
                        return Err(format!(
                            "invalid character {other:?} after line continuation"
                        ));
                    }
                },
                other => return Err(format!("invalid whitespace character {other:?}")),
            }
        }
        Ok(())
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        state.add_token(&self.0);
    }
}

impl From<&str> for SimpleWhitespace {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A `#` comment, without its line break
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comment(String);

impl Comment {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.0.starts_with('#') {
            return Err("comment must start with '#'".to_string());
        }
        if self.0.contains(['\n', '\r']) {
            return Err("comment must not contain a line break".to_string());
        }
        Ok(())
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        state.add_token(&self.0);
    }
}

/// A line break. `None` renders the module's default newline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Newline(pub Option<String>);

impl Newline {
    /// Render the module's default newline
    pub fn default_newline() -> Self {
        Self(None)
    }

    /// Render exactly `value`
    pub fn explicit(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.0.as_deref() {
            None | Some("\n") | Some("\r\n") | Some("\r") => Ok(()),
            Some(other) => Err(format!("invalid newline {other:?}")),
        }
    }

    /// Store `text` as-is unless it matches the module default
    pub(crate) fn from_source(text: &str, default_newline: &str) -> Self {
        if text == default_newline {
            Self(None)
        } else {
            Self(Some(text.to_string()))
        }
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        state.add_newline(self.0.as_deref());
    }
}

/// Everything after the last token of a line: blanks, an optional comment and the newline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TrailingWhitespace {
    pub whitespace: SimpleWhitespace,
    pub comment: Option<Comment>,
    pub newline: Newline,
}

impl TrailingWhitespace {
    pub fn validate(&self) -> Result<(), String> {
        self.whitespace.validate()?;
        if let Some(comment) = &self.comment {
            comment.validate()?;
        }
        self.newline.validate()
    }

    /// Build from the raw text preceding a line break and the break itself
    pub(crate) fn from_source(raw: &str, newline: &str, default_newline: &str) -> Self {
        let (whitespace, comment) = split_comment(raw);
        Self {
            whitespace,
            comment,
            newline: Newline::from_source(newline, default_newline),
        }
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        self.whitespace.codegen(state);
        if let Some(comment) = &self.comment {
            comment.codegen(state);
        }
        self.newline.codegen(state);
    }
}

/// A blank or comment-only line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmptyLine {
    /// Whether the enclosing block's indentation precedes `whitespace`
    pub indent: bool,
    pub whitespace: SimpleWhitespace,
    pub comment: Option<Comment>,
    pub newline: Newline,
}

impl Default for EmptyLine {
    fn default() -> Self {
        Self {
            indent: true,
            whitespace: SimpleWhitespace::empty(),
            comment: None,
            newline: Newline::default(),
        }
    }
}

impl EmptyLine {
    /// A comment line at the current indentation
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            comment: Some(Comment::new(text)),
            ..Self::default()
        }
    }

    /// Blank lines carry no comment and only whitespace
    pub fn is_blank(&self) -> bool {
        self.comment.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.whitespace.validate()?;
        if let Some(comment) = &self.comment {
            comment.validate()?;
        }
        self.newline.validate()
    }

    pub(crate) fn from_source(
        content: &str,
        newline: &str,
        current_indent: &str,
        default_newline: &str,
    ) -> Self {
        let (indent, rest) = if !current_indent.is_empty() && content.starts_with(current_indent)
        {
            (true, &content[current_indent.len()..])
        } else {
            (false, content)
        };
        let (whitespace, comment) = split_comment(rest);
        Self {
            indent,
            whitespace,
            comment,
            newline: Newline::from_source(newline, default_newline),
        }
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        if self.indent {
            state.add_indent_tokens();
        }
        self.whitespace.codegen(state);
        if let Some(comment) = &self.comment {
            comment.codegen(state);
        }
        self.newline.codegen(state);
    }
}

/// Whitespace inside brackets that spans at least one line break
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParenthesizedWhitespace {
    pub first_line: TrailingWhitespace,
    pub empty_lines: Vec<EmptyLine>,
    pub indent: bool,
    pub last_line: SimpleWhitespace,
}

impl ParenthesizedWhitespace {
    pub fn validate(&self) -> Result<(), String> {
        self.first_line.validate()?;
        for line in &self.empty_lines {
            line.validate()?;
        }
        self.last_line.validate()
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        self.first_line.codegen(state);
        for line in &self.empty_lines {
            line.codegen(state);
        }
        if self.indent {
            state.add_indent_tokens();
        }
        self.last_line.codegen(state);
    }
}

/// Whitespace in a position where brackets may allow it to span lines
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseWhitespace {
    Simple(SimpleWhitespace),
    Parenthesized(ParenthesizedWhitespace),
}

impl Default for BaseWhitespace {
    fn default() -> Self {
        Self::Simple(SimpleWhitespace::empty())
    }
}

impl From<SimpleWhitespace> for BaseWhitespace {
    fn from(value: SimpleWhitespace) -> Self {
        Self::Simple(value)
    }
}

impl From<ParenthesizedWhitespace> for BaseWhitespace {
    fn from(value: ParenthesizedWhitespace) -> Self {
        Self::Parenthesized(value)
    }
}

impl BaseWhitespace {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn space() -> Self {
        Self::Simple(SimpleWhitespace::space())
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Simple(ws) => ws.validate(),
            Self::Parenthesized(ws) => ws.validate(),
        }
    }

    /// Build from raw text; multi-line text is only produced inside brackets
    pub(crate) fn from_source(raw: &str, default_newline: &str) -> Self {
        let (lines, last) = split_lines(raw);
        let mut lines = lines.into_iter();
        let Some((first_content, first_newline)) = lines.next() else {
            return Self::Simple(SimpleWhitespace::new(last));
        };
        let first_line = TrailingWhitespace::from_source(first_content, first_newline, default_newline);
        let empty_lines = lines
            .map(|(content, newline)| EmptyLine::from_source(content, newline, "", default_newline))
            .collect();
        Self::Parenthesized(ParenthesizedWhitespace {
            first_line,
            empty_lines,
            indent: false,
            last_line: SimpleWhitespace::new(last),
        })
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState) {
        match self {
            Self::Simple(ws) => ws.codegen(state),
            Self::Parenthesized(ws) => ws.codegen(state),
        }
    }
}

/// Split raw trivia into complete lines and the trailing partial line
///
/// Each complete line is returned as `(content, newline)`. A backslash
/// continuation keeps its line break inside the content.
pub(crate) fn split_lines(raw: &str) -> (Vec<(&str, &str)>, &str) {
    let bytes = raw.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let width = match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => 2,
            b'\r' | b'\n' => 1,
            _ => {
                i += 1;
                continue;
            }
        };
        if i > start && bytes[i - 1] == b'\\' {
            i += width;
            continue;
        }
        lines.push((&raw[start..i], &raw[i..i + width]));
        i += width;
        start = i;
    }
    (lines, &raw[start..])
}

/// Split a line's content at its comment, if any
fn split_comment(content: &str) -> (SimpleWhitespace, Option<Comment>) {
    match content.find('#') {
        Some(idx) => (
            SimpleWhitespace::new(&content[..idx]),
            Some(Comment::new(&content[idx..])),
        ),
        None => (SimpleWhitespace::new(content), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_whitespace_validation() {
        assert!(SimpleWhitespace::new(" \t").validate().is_ok());
        assert!(SimpleWhitespace::new(" \\\n  ").validate().is_ok());
        assert!(SimpleWhitespace::new("x").validate().is_err());
        assert!(SimpleWhitespace::new("\n").validate().is_err());
    }

    #[test]
    fn test_comment_validation() {
        assert!(Comment::new("# ok").validate().is_ok());
        assert!(Comment::new("nope").validate().is_err());
        assert!(Comment::new("# two\nlines").validate().is_err());
    }

    #[test]
    fn test_split_lines() {
        let (lines, last) = split_lines("  # a\r\n\n    ");
        assert_eq!(lines, vec![("  # a", "\r\n"), ("", "\n")]);
        assert_eq!(last, "    ");

        let (lines, last) = split_lines(" \\\n ");
        assert!(lines.is_empty());
        assert_eq!(last, " \\\n ");
    }

    #[test]
    fn test_empty_line_indent_detection() {
        let line = EmptyLine::from_source("    # note", "\n", "    ", "\n");
        assert!(line.indent);
        assert_eq!(line.whitespace.value(), "");
        assert_eq!(line.comment, Some(Comment::new("# note")));
        assert_eq!(line.newline, Newline(None));

        let line = EmptyLine::from_source("  ", "\r\n", "    ", "\n");
        assert!(!line.indent);
        assert_eq!(line.whitespace.value(), "  ");
        assert_eq!(line.newline, Newline::explicit("\r\n"));
    }

    #[test]
    fn test_base_whitespace_from_source() {
        assert_eq!(
            BaseWhitespace::from_source("  ", "\n"),
            BaseWhitespace::Simple(SimpleWhitespace::new("  "))
        );

        let BaseWhitespace::Parenthesized(ws) = BaseWhitespace::from_source(" # c\n\n    ", "\n")
        else {
            panic!("expected parenthesized whitespace");
        };
        assert_eq!(ws.first_line.whitespace.value(), " ");
        assert_eq!(ws.first_line.comment, Some(Comment::new("# c")));
        assert_eq!(ws.empty_lines.len(), 1);
        assert_eq!(ws.last_line.value(), "    ");
    }
}
