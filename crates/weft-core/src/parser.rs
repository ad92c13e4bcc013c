//! Recursive descent parser for the reference grammar
//!
//! The parser builds trees whose rendering is the source it was given. It
//! never normalises trivia: every blank, comment and line break in the source
//! lands in some node field. Whitespace in front of a token is claimed by the
//! parent production that knows which field it belongs to, so each parse
//! function ignores the whitespace of its own first token.

use crate::config::ParserConfig;
use crate::error::CstError;
use crate::node::{
    Arg, Assign, AssignEqual, AssignTarget, Attribute, BinaryOperation, BinaryOperator, Call,
    Comma, CstNode, Dot, Else, Expr, FieldValue, Float, FunctionDef, If, IndentedBlock, Integer,
    LeftParen, Module, Name, Node, Param, Parameters, Pass, Return, RightParen, Semicolon,
    SimpleStatementLine, SimpleString,
};
use crate::result::Result;
use crate::sentinel::MaybeSentinel;
use crate::tokenizer::{Token, TokenKind, line_col, tokenize};
use crate::trivia::{BaseWhitespace, EmptyLine, SimpleWhitespace, TrailingWhitespace, split_lines};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace};

const KEYWORDS: &[&str] = &["def", "if", "elif", "else", "return", "pass"];

const UTF8_BOM: &str = "\u{feff}";

static CODING_COOKIE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t\x0c]*#.*?coding[:=][ \t]*([-\w.]+)").expect("coding cookie pattern")
});

/// Parse a module with the default configuration
pub fn parse_module(source: &str) -> Result<Node> {
    parse_module_with_config(source, &ParserConfig::default())
}

/// Parse a module, falling back to `config` for the default indent and
/// newline when the source does not establish them
///
/// # Errors
///
/// `ParserSyntaxError` for source outside the grammar and
/// `UnsupportedEncoding` for a coding cookie naming anything but UTF-8.
pub fn parse_module_with_config(source: &str, config: &ParserConfig) -> Result<Node> {
    let (source, encoding) = match source.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, "utf-8-sig"),
        None => (source, "utf-8"),
    };
    check_coding_cookie(source)?;

    let default_newline =
        detect_newline(source).map_or_else(|| config.default_newline.clone(), str::to_string);
    let has_trailing_newline = ends_with_newline(source);
    let text = if has_trailing_newline || source.is_empty() {
        source.to_string()
    } else {
        format!("{source}{default_newline}")
    };

    let tokens = tokenize(&text)?;
    let default_indent = tokens
        .iter()
        .find(|token| token.kind == TokenKind::Indent)
        .map_or_else(|| config.default_indent.clone(), |token| token.text.clone());

    let mut parser = Parser::new(&text, tokens, default_newline, default_indent);
    let module = parser.module(encoding, has_trailing_newline)?;
    debug!(
        "Parsed module of {} bytes into {} statements",
        source.len(),
        module.children().len()
    );
    Ok(module)
}

/// Parse raw bytes, honouring a UTF-8 byte order mark
pub fn parse_module_bytes(bytes: &[u8]) -> Result<Node> {
    let text = std::str::from_utf8(bytes).map_err(|err| {
        debug!("Source is not valid UTF-8: {}", err);
        CstError::UnsupportedEncoding {
            encoding: "non-UTF-8 bytes".to_string(),
        }
    })?;
    parse_module(text)
}

/// Parse exactly one statement
pub fn parse_statement(source: &str) -> Result<Node> {
    let module = parse_module(source)?;
    let Some(inner) = module.as_module() else {
        return Err(CstError::internal_error("parser did not produce a module"));
    };
    match inner.body.as_slice() {
        [statement] => Ok(statement.clone()),
        body => Err(CstError::syntax_error(
            format!("expected a single statement, found {}", body.len()),
            1,
            0,
        )),
    }
}

/// Parse a single expression
pub fn parse_expression(source: &str) -> Result<Node> {
    let text = if ends_with_newline(source) {
        source.to_string()
    } else {
        format!("{source}\n")
    };
    let tokens = tokenize(&text)?;
    let mut parser = Parser::new(&text, tokens, "\n".to_string(), "    ".to_string());
    if parser.peek().kind == TokenKind::Indent {
        return Err(parser.unexpected());
    }
    let expression = parser.expression()?;
    parser.expect_kind(TokenKind::Newline, "expected end of expression")?;
    parser.expect_kind(TokenKind::EndMarker, "expected end of expression")?;
    Ok(expression)
}

fn check_coding_cookie(source: &str) -> Result<()> {
    for line in source.lines().take(2) {
        if let Some(captures) = CODING_COOKIE.captures(line) {
            let name = captures[1].to_ascii_lowercase().replace('_', "-");
            if !matches!(name.as_str(), "utf-8" | "utf8" | "utf-8-sig") {
                return Err(CstError::UnsupportedEncoding {
                    encoding: captures[1].to_string(),
                });
            }
            return Ok(());
        }
    }
    Ok(())
}

fn detect_newline(source: &str) -> Option<&'static str> {
    let idx = source.find(['\r', '\n'])?;
    Some(match &source[idx..] {
        rest if rest.starts_with("\r\n") => "\r\n",
        rest if rest.starts_with('\r') => "\r",
        _ => "\n",
    })
}

fn ends_with_newline(source: &str) -> bool {
    source.ends_with('\n') || source.ends_with('\r')
}

fn is_blank(content: &str) -> bool {
    content.chars().all(|c| matches!(c, ' ' | '\t' | '\x0c'))
}

fn is_float(literal: &str) -> bool {
    let lower = literal.to_ascii_lowercase();
    if lower.starts_with("0x") || lower.starts_with("0o") || lower.starts_with("0b") {
        return false;
    }
    lower.contains(['.', 'e'])
}

type LineStart = (Vec<EmptyLine>, SimpleWhitespace);

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    default_newline: String,
    default_indent: String,
    indents: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(
        source: &'a str,
        tokens: Vec<Token>,
        default_newline: String,
        default_indent: String,
    ) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            default_newline,
            default_indent,
            indents: Vec::new(),
        }
    }

    // Token cursor

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::EndMarker {
            self.pos += 1;
        }
        token
    }

    /// Claim the whitespace in front of the next token
    fn take_ws(&mut self) -> String {
        let last = self.tokens.len().saturating_sub(1);
        let idx = self.pos.min(last);
        std::mem::take(&mut self.tokens[idx].whitespace_before)
    }

    fn take_base_ws(&mut self) -> BaseWhitespace {
        let raw = self.take_ws();
        self.base_ws(&raw)
    }

    fn take_simple_ws(&mut self) -> SimpleWhitespace {
        SimpleWhitespace::new(self.take_ws())
    }

    fn base_ws(&self, raw: &str) -> BaseWhitespace {
        BaseWhitespace::from_source(raw, &self.default_newline)
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> CstError {
        let (line, column) = line_col(self.source, u32::from(token.span.start()) as usize);
        CstError::syntax_error(message, line, column)
    }

    fn unexpected(&self) -> CstError {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::EndMarker => "end of input".to_string(),
            _ => format!("'{}'", token.text),
        };
        self.error_at(token, format!("unexpected {found}"))
    }

    fn expect_op(&mut self, op: &str) -> Result<Token> {
        if !self.peek().is_op(op) {
            let found = self.peek().text.clone();
            return Err(self.error_at(self.peek(), format!("expected '{op}', found '{found}'")));
        }
        Ok(self.advance())
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token> {
        if !self.peek().is_keyword(keyword) {
            return Err(self.error_at(self.peek(), format!("expected '{keyword}'")));
        }
        Ok(self.advance())
    }

    fn expect_kind(&mut self, kind: TokenKind, message: &str) -> Result<Token> {
        if self.peek().kind != kind {
            return Err(self.error_at(self.peek(), message));
        }
        Ok(self.advance())
    }

    fn current_indent(&self) -> String {
        self.indents.concat()
    }

    fn empty_lines(&self, raw: &str) -> Result<Vec<EmptyLine>> {
        let (lines, last) = split_lines(raw);
        if !last.is_empty() {
            return Err(CstError::internal_error(format!(
                "unterminated trivia line {last:?}"
            )));
        }
        let indent = self.current_indent();
        Ok(lines
            .into_iter()
            .map(|(content, newline)| {
                EmptyLine::from_source(content, newline, &indent, &self.default_newline)
            })
            .collect())
    }

    fn trailing(&self, newline: &Token) -> TrailingWhitespace {
        let text = if newline.text.is_empty() {
            self.default_newline.as_str()
        } else {
            newline.text.as_str()
        };
        TrailingWhitespace::from_source(&newline.whitespace_before, text, &self.default_newline)
    }

    // Statements

    fn module(&mut self, encoding: &str, has_trailing_newline: bool) -> Result<Node> {
        let header = self.module_header()?;
        let mut body = Vec::new();
        while self.peek().kind != TokenKind::EndMarker {
            if self.peek().kind == TokenKind::Indent {
                return Err(self.error_at(self.peek(), "unexpected indent"));
            }
            body.push(self.statement()?);
        }
        let raw = self.take_ws();
        let footer = self.empty_lines(&raw)?;

        Module {
            header,
            body,
            footer,
            encoding: encoding.to_string(),
            default_indent: self.default_indent.clone(),
            default_newline: self.default_newline.clone(),
            has_trailing_newline,
        }
        .build()
    }

    /// Lines before the first statement, up to and including the last blank one
    fn module_header(&mut self) -> Result<Vec<EmptyLine>> {
        let raw = self.take_ws();
        if self.peek().kind == TokenKind::EndMarker {
            return self.empty_lines(&raw);
        }
        let (lines, _) = split_lines(&raw);
        let mut split_at = 0;
        let mut offset = 0;
        for (content, newline) in &lines {
            offset += content.len() + newline.len();
            if is_blank(content) {
                split_at = offset;
            }
        }
        let (header, rest) = raw.split_at(split_at);
        let idx = self.pos;
        self.tokens[idx].whitespace_before = rest.to_string();
        self.empty_lines(header)
    }

    /// Comment and blank lines above a statement, plus any form feed
    /// prefix on the statement's own line
    fn leading_lines(&mut self) -> Result<(Vec<EmptyLine>, SimpleWhitespace)> {
        let raw = self.take_ws();
        let (lines, last) = split_lines(&raw);
        if last.is_empty() || !is_blank(last) {
            return Ok((self.empty_lines(&raw)?, SimpleWhitespace::empty()));
        }
        let consumed: usize = lines
            .iter()
            .map(|(content, newline)| content.len() + newline.len())
            .sum();
        let (above, prefix) = raw.split_at(consumed);
        Ok((self.empty_lines(above)?, SimpleWhitespace::new(prefix)))
    }

    fn statement(&mut self) -> Result<Node> {
        let line_start = self.leading_lines()?;
        if self.peek().is_keyword("def") {
            self.function_def(line_start)
        } else if self.peek().is_keyword("if") {
            self.if_statement(line_start, "if")
        } else {
            self.simple_statement_line(line_start)
        }
    }

    fn simple_statement_line(&mut self, line_start: LineStart) -> Result<Node> {
        let (leading_lines, form_feed) = line_start;
        let mut body = Vec::new();
        loop {
            body.push(self.small_statement()?);
            let ended_with_semicolon = self.pos > 0 && self.tokens[self.pos - 1].is_op(";");
            if self.peek().kind == TokenKind::Newline || !ended_with_semicolon {
                break;
            }
        }
        let newline = self.expect_kind(TokenKind::Newline, "expected newline after statement")?;
        SimpleStatementLine {
            leading_lines,
            form_feed,
            body,
            trailing_whitespace: self.trailing(&newline),
        }
        .build()
    }

    fn small_statement(&mut self) -> Result<Node> {
        if self.peek().is_keyword("pass") {
            self.advance();
            let semicolon = self.semicolon()?;
            return Pass { semicolon }.build();
        }
        if self.peek().is_keyword("return") {
            self.advance();
            let at_end = self.peek().kind == TokenKind::Newline || self.peek().is_op(";");
            let (whitespace_after_return, value) = if at_end {
                (MaybeSentinel::Default, None)
            } else {
                let ws = self.take_simple_ws();
                (MaybeSentinel::Present(ws), Some(self.expression()?))
            };
            let semicolon = self.semicolon()?;
            return Return {
                whitespace_after_return,
                value,
                semicolon,
            }
            .build();
        }

        let first = self.expression()?;
        if !self.peek().is_op("=") {
            let semicolon = self.semicolon()?;
            return Expr {
                value: first,
                semicolon,
            }
            .build();
        }

        let mut targets = Vec::new();
        let mut current = first;
        while self.peek().is_op("=") {
            let equal = self.advance();
            let whitespace_after_equal = self.take_simple_ws();
            targets.push(
                AssignTarget {
                    target: current,
                    whitespace_before_equal: SimpleWhitespace::new(equal.whitespace_before),
                    whitespace_after_equal,
                }
                .build()?,
            );
            current = self.expression()?;
        }
        let semicolon = self.semicolon()?;
        Assign {
            targets,
            value: current,
            semicolon,
        }
        .build()
    }

    fn semicolon(&mut self) -> Result<MaybeSentinel<Node>> {
        if !self.peek().is_op(";") {
            return Ok(MaybeSentinel::Default);
        }
        let semicolon = self.advance();
        // Whitespace before the line break belongs to the line's trailing whitespace
        let whitespace_after = if self.peek().kind == TokenKind::Newline {
            SimpleWhitespace::empty()
        } else {
            self.take_simple_ws()
        };
        let node = Semicolon {
            whitespace_before: SimpleWhitespace::new(semicolon.whitespace_before),
            whitespace_after,
        }
        .build()?;
        Ok(MaybeSentinel::Present(node))
    }

    fn function_def(&mut self, line_start: LineStart) -> Result<Node> {
        let (leading_lines, form_feed) = line_start;
        self.expect_keyword("def")?;
        let whitespace_after_def = self.take_simple_ws();
        let name = self.name()?;
        let lparen = self.expect_op("(")?;
        let whitespace_before_params = self.take_base_ws();

        let mut params = Vec::new();
        while !self.peek().is_op(")") {
            let name = self.name()?;
            let (equal, default) = if self.peek().is_op("=") {
                (self.assign_equal()?, Some(self.expression()?))
            } else {
                (MaybeSentinel::Default, None)
            };
            let (comma, whitespace_after_param) = self.comma()?;
            let last = comma.is_default();
            params.push(
                Param {
                    name,
                    equal,
                    default,
                    comma,
                    whitespace_after_param,
                }
                .build()?,
            );
            if last {
                break;
            }
        }
        self.expect_op(")")?;
        let colon = self.expect_op(":")?;
        let body = self.indented_block()?;

        FunctionDef {
            leading_lines,
            form_feed,
            whitespace_after_def,
            name,
            whitespace_after_name: SimpleWhitespace::new(lparen.whitespace_before),
            whitespace_before_params,
            params: Parameters::new(params).build()?,
            whitespace_before_colon: SimpleWhitespace::new(colon.whitespace_before),
            body,
        }
        .build()
    }

    fn if_statement(&mut self, line_start: LineStart, keyword: &str) -> Result<Node> {
        let (leading_lines, form_feed) = line_start;
        self.expect_keyword(keyword)?;
        let whitespace_before_test = self.take_simple_ws();
        let test = self.expression()?;
        let colon = self.expect_op(":")?;
        let body = self.indented_block()?;

        let orelse = if self.peek().is_keyword("elif") {
            let line_start = self.leading_lines()?;
            Some(self.if_statement(line_start, "elif")?)
        } else if self.peek().is_keyword("else") {
            let (leading_lines, form_feed) = self.leading_lines()?;
            self.advance();
            let colon = self.expect_op(":")?;
            let body = self.indented_block()?;
            Some(
                Else {
                    leading_lines,
                    form_feed,
                    whitespace_before_colon: SimpleWhitespace::new(colon.whitespace_before),
                    body,
                }
                .build()?,
            )
        } else {
            None
        };

        If {
            leading_lines,
            form_feed,
            whitespace_before_test,
            test,
            whitespace_after_test: SimpleWhitespace::new(colon.whitespace_before),
            body,
            orelse,
        }
        .build()
    }

    fn indented_block(&mut self) -> Result<Node> {
        let newline = self.expect_kind(TokenKind::Newline, "expected newline after ':'")?;
        let header = self.trailing(&newline);
        let indent = self.expect_kind(TokenKind::Indent, "expected an indented block")?;
        let relative = (indent.text != self.default_indent).then(|| indent.text.clone());
        self.indents.push(indent.text);
        trace!("Entering block at depth {}", self.indents.len());

        let mut body = Vec::new();
        while !matches!(self.peek().kind, TokenKind::Dedent | TokenKind::EndMarker) {
            body.push(self.statement()?);
        }
        self.expect_kind(TokenKind::Dedent, "expected dedent")?;
        let footer = self.block_footer()?;
        self.indents.pop();

        IndentedBlock {
            header,
            indent: relative,
            body,
            footer,
        }
        .build()
    }

    /// Comment lines after a block that are still indented at the block's level
    fn block_footer(&mut self) -> Result<Vec<EmptyLine>> {
        let next = self.tokens[self.pos..]
            .iter()
            .position(|token| token.kind != TokenKind::Dedent)
            .map_or(self.tokens.len().saturating_sub(1), |idx| self.pos + idx);
        let indent = self.current_indent();
        let raw = self.tokens[next].whitespace_before.clone();

        let (lines, _) = split_lines(&raw);
        let mut split_at = 0;
        for (content, newline) in lines {
            let owned = content
                .strip_prefix(indent.as_str())
                .is_some_and(|rest| rest.trim_start_matches([' ', '\t', '\x0c']).starts_with('#'));
            if !owned {
                break;
            }
            split_at += content.len() + newline.len();
        }
        if split_at == 0 {
            return Ok(Vec::new());
        }
        let (footer, rest) = raw.split_at(split_at);
        self.tokens[next].whitespace_before = rest.to_string();
        self.empty_lines(footer)
    }

    // Expressions

    fn expression(&mut self) -> Result<Node> {
        let mut left = self.term()?;
        while self.peek().is_op("+") || self.peek().is_op("-") {
            let operator = self.binary_operator()?;
            let right = self.term()?;
            left = BinaryOperation::new(left, operator, right).build()?;
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Node> {
        let mut left = self.power()?;
        while ["*", "/", "%", "//", "@"].iter().any(|op| self.peek().is_op(op)) {
            let operator = self.binary_operator()?;
            let right = self.power()?;
            left = BinaryOperation::new(left, operator, right).build()?;
        }
        Ok(left)
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.postfix()?;
        if !self.peek().is_op("**") {
            return Ok(base);
        }
        let operator = self.binary_operator()?;
        let exponent = self.power()?;
        BinaryOperation::new(base, operator, exponent).build()
    }

    fn binary_operator(&mut self) -> Result<Node> {
        let op = self.advance();
        let whitespace_after = self.take_base_ws();
        BinaryOperator {
            whitespace_before: self.base_ws(&op.whitespace_before),
            value: op.text,
            whitespace_after,
        }
        .build()
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut node = self.atom()?;
        loop {
            if self.peek().is_op("(") {
                node = self.call(node)?;
            } else if self.peek().is_op(".") {
                let dot = self.advance();
                let whitespace_after = self.take_base_ws();
                let dot = Dot {
                    whitespace_before: self.base_ws(&dot.whitespace_before),
                    whitespace_after,
                }
                .build()?;
                let attr = self.name()?;
                node = Attribute {
                    value: node,
                    dot,
                    attr,
                    lpar: Vec::new(),
                    rpar: Vec::new(),
                }
                .build()?;
            } else {
                return Ok(node);
            }
        }
    }

    fn call(&mut self, func: Node) -> Result<Node> {
        let lparen = self.expect_op("(")?;
        let whitespace_before_args = self.take_base_ws();

        let mut args = Vec::new();
        while !self.peek().is_op(")") {
            let (keyword, equal) =
                if self.peek().kind == TokenKind::Name && self.peek_at(1).is_op("=") {
                    let keyword = self.name()?;
                    (Some(keyword), self.assign_equal()?)
                } else {
                    (None, MaybeSentinel::Default)
                };
            let value = self.expression()?;
            let (comma, whitespace_after_arg) = self.comma()?;
            let last = comma.is_default();
            args.push(
                Arg {
                    keyword,
                    equal,
                    value,
                    comma,
                    whitespace_after_arg,
                }
                .build()?,
            );
            if last {
                break;
            }
        }
        self.expect_op(")")?;

        Call {
            func,
            whitespace_after_func: self.base_ws(&lparen.whitespace_before),
            whitespace_before_args,
            args,
            lpar: Vec::new(),
            rpar: Vec::new(),
        }
        .build()
    }

    fn assign_equal(&mut self) -> Result<MaybeSentinel<Node>> {
        let equal = self.expect_op("=")?;
        let whitespace_after = self.take_base_ws();
        let node = AssignEqual {
            whitespace_before: self.base_ws(&equal.whitespace_before),
            whitespace_after,
        }
        .build()?;
        Ok(MaybeSentinel::Present(node))
    }

    /// A separating comma, or the whitespace before the closing bracket
    fn comma(&mut self) -> Result<(MaybeSentinel<Node>, BaseWhitespace)> {
        if !self.peek().is_op(",") {
            return Ok((MaybeSentinel::Default, self.take_base_ws()));
        }
        let comma = self.advance();
        let whitespace_after = self.take_base_ws();
        let node = Comma {
            whitespace_before: self.base_ws(&comma.whitespace_before),
            whitespace_after,
        }
        .build()?;
        Ok((MaybeSentinel::Present(node), BaseWhitespace::empty()))
    }

    fn atom(&mut self) -> Result<Node> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Name => self.name(),
            TokenKind::Number => {
                self.advance();
                if is_float(&token.text) {
                    Float::new(token.text).build()
                } else {
                    Integer::new(token.text).build()
                }
            }
            TokenKind::String => {
                self.advance();
                SimpleString::new(token.text).build()
            }
            TokenKind::Op if token.text == "(" => {
                self.advance();
                let lpar = LeftParen {
                    whitespace_after: self.take_base_ws(),
                }
                .build()?;
                let inner = self.expression()?;
                let close = self.expect_op(")")?;
                let rpar = RightParen {
                    whitespace_before: self.base_ws(&close.whitespace_before),
                }
                .build()?;
                parenthesize(&inner, lpar, rpar)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn name(&mut self) -> Result<Node> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Name || KEYWORDS.contains(&token.text.as_str()) {
            return Err(self.unexpected());
        }
        self.advance();
        Name::new(token.text).build()
    }
}

/// Wrap an expression in one more pair of parentheses, outermost first
fn parenthesize(node: &Node, lpar: Node, rpar: Node) -> Result<Node> {
    let mut lpars = match node.field("lpar") {
        Some(FieldValue::Nodes(nodes)) => nodes,
        _ => Vec::new(),
    };
    let mut rpars = match node.field("rpar") {
        Some(FieldValue::Nodes(nodes)) => nodes,
        _ => Vec::new(),
    };
    lpars.insert(0, lpar);
    rpars.push(rpar);
    node.with_changes([("lpar", FieldValue::from(lpars)), ("rpar", FieldValue::from(rpars))])
}
