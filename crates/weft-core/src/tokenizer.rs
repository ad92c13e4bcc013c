//! Trivia-preserving tokenizer for the reference grammar
//!
//! Each token carries the raw text that preceded it since the previous token
//! (`whitespace_before`): blanks, line continuations, and at the start of a
//! logical line every blank or comment-only line before it. Inside brackets
//! line breaks and comments are whitespace too. The indentation of a logical
//! line is not stored on any token; the parser rebuilds it from `Indent`
//! tokens, whose text is the indentation added by the new block.
//!
//! At end of input the tokenizer closes the last line with an empty
//! `Newline`, closes open blocks with `Dedent`s and emits an `EndMarker`
//! holding whatever trivia is left.

use crate::error::CstError;
use crate::result::Result;
use rowan::{TextRange, TextSize};
use tracing::trace;

/// Kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Op,
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

/// A token with its literal text and the trivia preceding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub whitespace_before: String,
    pub span: TextRange,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Name && self.text == keyword
    }
}

// Longest first so that `**` wins over `*`
const OPERATORS: &[&str] = &[
    "**", "//", "->", "==", "!=", "<=", ">=", "(", ")", "[", "]", "{", "}", ",", ":", ";", ".",
    "=", "+", "-", "*", "/", "%", "@", "<", ">",
];

/// Split `source` into tokens
///
/// # Errors
///
/// Returns `ParserSyntaxError` for characters outside the grammar,
/// unterminated strings, unbalanced brackets and inconsistent indentation.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(source);
    tokenizer.run()?;
    trace!("Tokenized {} bytes into {} tokens", source.len(), tokenizer.tokens.len());
    Ok(tokenizer.tokens)
}

/// 1-indexed line and 0-indexed character column of a byte offset
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let mut line = 1;
    let mut line_start = 0;
    let bytes = before.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                i += 2;
                line += 1;
                line_start = i;
            }
            b'\r' | b'\n' => {
                i += 1;
                line += 1;
                line_start = i;
            }
            _ => i += 1,
        }
    }
    (line, before[line_start..].chars().count())
}

struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    indents: Vec<String>,
    depth: usize,
    pending: String,
    at_line_start: bool,
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            tokens: Vec::new(),
            indents: vec![String::new()],
            depth: 0,
            pending: String::new(),
            at_line_start: true,
        }
    }

    fn run(&mut self) -> Result<()> {
        loop {
            if self.at_line_start {
                if !self.start_line()? {
                    break;
                }
                self.at_line_start = false;
            }
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                break;
            };
            match ch {
                '#' => self.skip_comment(),
                '\n' | '\r' => {
                    let start = self.pos;
                    self.bump_newline();
                    self.push(TokenKind::Newline, start);
                    self.at_line_start = true;
                }
                _ => self.lex_token()?,
            }
        }
        self.finish()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    fn bump_newline(&mut self) {
        if self.rest().starts_with("\r\n") {
            self.pos += 2;
        } else {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> CstError {
        let (line, column) = line_col(self.source, offset);
        CstError::syntax_error(message, line, column)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = TextRange::new(offset(start), offset(self.pos));
        self.tokens.push(Token {
            kind,
            text: self.source[start..self.pos].to_string(),
            whitespace_before: std::mem::take(&mut self.pending),
            span,
        });
    }

    fn push_empty(&mut self, kind: TokenKind, whitespace_before: String) {
        self.tokens.push(Token {
            kind,
            text: String::new(),
            whitespace_before,
            span: TextRange::empty(offset(self.pos)),
        });
    }

    /// Consume blank and comment-only lines, then the indentation of the
    /// next logical line. Returns `false` at end of input.
    fn start_line(&mut self) -> Result<bool> {
        loop {
            let line_start = self.pos;
            while matches!(self.peek(), Some(' ' | '\t' | '\x0c')) {
                self.bump();
            }
            match self.peek() {
                None => {
                    self.pending.push_str(&self.source[line_start..]);
                    return Ok(false);
                }
                Some('#') => {
                    while !matches!(self.peek(), None | Some('\n' | '\r')) {
                        self.bump();
                    }
                    self.bump_newline();
                    self.pending.push_str(&self.source[line_start..self.pos]);
                }
                Some('\n' | '\r') => {
                    self.bump_newline();
                    self.pending.push_str(&self.source[line_start..self.pos]);
                }
                Some(_) => {
                    // A form feed resets the indentation column
                    let source = self.source;
                    let indent_start = match source[line_start..self.pos].rfind('\x0c') {
                        Some(idx) => {
                            let after = line_start + idx + 1;
                            self.pending.push_str(&source[line_start..after]);
                            after
                        }
                        None => line_start,
                    };
                    self.indent_to(indent_start)?;
                    return Ok(true);
                }
            }
        }
    }

    fn indent_to(&mut self, line_start: usize) -> Result<()> {
        let source = self.source;
        let indent = &source[line_start..self.pos];
        let current = self.indents.last().map(String::as_str).unwrap_or("");
        if indent == current {
            return Ok(());
        }
        if indent.starts_with(current) {
            let added_from = line_start + current.len();
            let span = TextRange::new(offset(added_from), offset(self.pos));
            self.tokens.push(Token {
                kind: TokenKind::Indent,
                text: indent[current.len()..].to_string(),
                whitespace_before: String::new(),
                span,
            });
            self.indents.push(indent.to_string());
            return Ok(());
        }
        if !current.starts_with(indent) {
            return Err(self.error("inconsistent use of tabs and spaces in indentation", self.pos));
        }
        while let Some(top) = self.indents.last() {
            if top == indent {
                return Ok(());
            }
            if self.indents.len() == 1 || !top.starts_with(indent) {
                break;
            }
            self.indents.pop();
            self.push_empty(TokenKind::Dedent, String::new());
        }
        Err(self.error("unindent does not match any outer indentation level", self.pos))
    }

    /// Blanks and line continuations; inside brackets also line breaks and comments
    fn skip_whitespace(&mut self) {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\x0c') => self.bump(),
                Some('\\') if matches!(self.peek_nth(1), Some('\n' | '\r')) => {
                    self.bump();
                    self.bump_newline();
                }
                Some('\n' | '\r') if self.depth > 0 => self.bump_newline(),
                Some('#') if self.depth > 0 => {
                    while !matches!(self.peek(), None | Some('\n' | '\r')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let source = self.source;
        self.pending.push_str(&source[start..self.pos]);
    }

    fn skip_comment(&mut self) {
        let start = self.pos;
        while !matches!(self.peek(), None | Some('\n' | '\r')) {
            self.bump();
        }
        let source = self.source;
        self.pending.push_str(&source[start..self.pos]);
    }

    fn lex_token(&mut self) -> Result<()> {
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(());
        };

        let kind = if ch == '_' || ch.is_alphabetic() {
            while matches!(self.peek(), Some(c) if c == '_' || c.is_alphanumeric()) {
                self.bump();
            }
            let word = &self.source[start..self.pos];
            if is_string_prefix(word) && matches!(self.peek(), Some('\'' | '"')) {
                self.lex_string(start)?;
                TokenKind::String
            } else {
                TokenKind::Name
            }
        } else if ch.is_ascii_digit()
            || (ch == '.' && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()))
        {
            self.lex_number();
            TokenKind::Number
        } else if ch == '\'' || ch == '"' {
            self.lex_string(start)?;
            TokenKind::String
        } else if let Some(op) = OPERATORS.iter().find(|op| self.rest().starts_with(**op)) {
            match *op {
                "(" | "[" | "{" => self.depth += 1,
                ")" | "]" | "}" => {
                    if self.depth == 0 {
                        return Err(self.error(format!("unmatched '{op}'"), start));
                    }
                    self.depth -= 1;
                }
                _ => {}
            }
            self.pos += op.len();
            TokenKind::Op
        } else {
            return Err(self.error(format!("unexpected character {ch:?}"), start));
        };

        self.push(kind, start);
        Ok(())
    }

    fn lex_number(&mut self) {
        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump();
            self.bump();
            while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_hexdigit()) {
                self.bump();
            }
            return;
        }
        self.digits();
        if self.peek() == Some('.') {
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_digit = match self.peek_nth(1) {
                Some('+' | '-') => self.peek_nth(2),
                other => other,
            };
            if exponent_digit.is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.digits();
            }
        }
    }

    fn digits(&mut self) {
        while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<()> {
        let Some(quote) = self.peek() else {
            return Err(self.error("unterminated string literal", start));
        };
        let triple: String = std::iter::repeat_n(quote, 3).collect();
        let is_triple = self.rest().starts_with(&triple);
        self.pos += if is_triple { 3 } else { 1 };

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string literal", start)),
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('\n' | '\r') if !is_triple => {
                    return Err(self.error("unterminated string literal", start));
                }
                Some(c) if c == quote => {
                    if !is_triple {
                        self.bump();
                        return Ok(());
                    }
                    if self.rest().starts_with(&triple) {
                        self.pos += 3;
                        return Ok(());
                    }
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.depth > 0 {
            return Err(self.error("unexpected EOF in multi-line statement", self.pos));
        }
        if !self.at_line_start {
            if let Some(backslash) = dangling_continuation(&self.pending) {
                let at = self.pos - self.pending.len() + backslash;
                return Err(self.error("unexpected end of input after line continuation", at));
            }
            let trailing = std::mem::take(&mut self.pending);
            self.push_empty(TokenKind::Newline, trailing);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_empty(TokenKind::Dedent, String::new());
        }
        let trailing = std::mem::take(&mut self.pending);
        self.push_empty(TokenKind::EndMarker, trailing);
        Ok(())
    }
}

/// Offset of a backslash that joins the logical line to nothing
fn dangling_continuation(pending: &str) -> Option<usize> {
    pending
        .rmatch_indices('\\')
        .map(|(idx, _)| idx)
        .find(|&idx| matches!(pending.as_bytes().get(idx + 1), Some(b'\n' | b'\r')))
}

fn offset(pos: usize) -> TextSize {
    TextSize::from(u32::try_from(pos).unwrap_or(u32::MAX))
}

fn is_string_prefix(word: &str) -> bool {
    word.len() <= 2 && word.chars().all(|c| "rRbBuUfF".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String, String)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text, t.whitespace_before))
            .collect()
    }

    #[test]
    fn test_simple_line() {
        use TokenKind::*;
        assert_eq!(
            kinds("x = 1  # one\n"),
            vec![
                (Name, "x".into(), "".into()),
                (Op, "=".into(), " ".into()),
                (Number, "1".into(), " ".into()),
                (Newline, "\n".into(), "  # one".into()),
                (EndMarker, "".into(), "".into()),
            ]
        );
    }

    #[test]
    fn test_blocks_and_leading_lines() {
        use TokenKind::*;
        let tokens = kinds("def f():\n\n    # c\n    pass\nx\n");
        let summary: Vec<_> = tokens.iter().map(|(k, t, _)| (*k, t.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (Name, "def"),
                (Name, "f"),
                (Op, "("),
                (Op, ")"),
                (Op, ":"),
                (Newline, "\n"),
                (Indent, "    "),
                (Name, "pass"),
                (Newline, "\n"),
                (Dedent, ""),
                (Name, "x"),
                (Newline, "\n"),
                (EndMarker, ""),
            ]
        );
        assert_eq!(tokens[7].2, "\n    # c\n");
    }

    #[test]
    fn test_brackets_swallow_newlines() {
        let tokens = tokenize("f(a,  # note\n  b)\n").unwrap();
        let b = tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!(b.whitespace_before, "  # note\n  ");
    }

    #[test]
    fn test_end_of_input_without_newline() {
        use TokenKind::*;
        let tokens = kinds("if x:\n    y ");
        let tail: Vec<_> = tokens[tokens.len() - 3..].to_vec();
        assert_eq!(
            tail,
            vec![
                (Newline, "".into(), " ".into()),
                (Dedent, "".into(), "".into()),
                (EndMarker, "".into(), "".into()),
            ]
        );
    }

    #[test]
    fn test_strings_and_numbers() {
        let tokens = tokenize("b'x\\'y' 1.5e-3 0xff .5\n").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["b'x\\'y'", "1.5e-3", "0xff", ".5", "\n", ""]);
        assert_eq!(tokens[0].kind, TokenKind::String);
    }

    #[test]
    fn test_errors_carry_positions() {
        let err = tokenize("x = 'open\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error at line 1, column 4: unterminated string literal"
        );

        let err = tokenize("if x:\n    y\n  z\n").unwrap_err();
        assert!(matches!(
            err,
            CstError::ParserSyntaxError { line: 3, column: 2, .. }
        ));

        assert!(tokenize("f(\n").is_err());
        assert!(tokenize("x $ y\n").is_err());
    }
}
