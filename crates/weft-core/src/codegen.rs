//! Codegen: rendering trees back to text
//!
//! Rendering walks the tree emitting tokens and stored trivia into a
//! [`CodegenState`]. For an unmodified parse tree the output is the original
//! source byte-for-byte. Positions are recorded on demand, in the same pass,
//! for the position metadata providers.

use crate::metadata::{CodePosition, CodeRange};
use crate::node::{Module, Node, NodeId};
use std::collections::HashMap;

const DEFAULT_INDENT: &str = "    ";
const DEFAULT_NEWLINE: &str = "\n";

/// Facts a parent passes to a child while rendering it
#[derive(Debug, Clone, Copy, Default)]
pub struct CodegenContext {
    /// Another element follows in the same comma or semicolon separated list
    pub(crate) add_separator: bool,
    /// The `If` hangs off another `If` and renders as `elif`
    pub(crate) is_elif: bool,
}

impl CodegenContext {
    pub(crate) fn separated(add_separator: bool) -> Self {
        Self {
            add_separator,
            ..Self::default()
        }
    }

    pub(crate) fn elif() -> Self {
        Self {
            is_elif: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct Frame {
    id: NodeId,
    inclusive_start: CodePosition,
    start: CodePosition,
    end: Option<CodePosition>,
}

/// Ranges recorded during a rendering pass
#[derive(Debug, Default)]
pub(crate) struct RecordedPositions {
    pub(crate) syntactic: HashMap<NodeId, CodeRange>,
    pub(crate) inclusive: HashMap<NodeId, CodeRange>,
}

/// Token buffer and indentation stack for one rendering pass
#[derive(Debug)]
pub struct CodegenState {
    default_indent: String,
    default_newline: String,
    indent_tokens: Vec<String>,
    tokens: Vec<String>,
    token_starts: Vec<CodePosition>,
    position: CodePosition,
    frames: Vec<Frame>,
    recorded: Option<RecordedPositions>,
}

impl Default for CodegenState {
    fn default() -> Self {
        Self::new(DEFAULT_INDENT, DEFAULT_NEWLINE)
    }
}

impl CodegenState {
    pub fn new(default_indent: impl Into<String>, default_newline: impl Into<String>) -> Self {
        Self {
            default_indent: default_indent.into(),
            default_newline: default_newline.into(),
            indent_tokens: Vec::new(),
            tokens: Vec::new(),
            token_starts: Vec::new(),
            position: CodePosition::new(1, 0),
            frames: Vec::new(),
            recorded: None,
        }
    }

    pub fn for_module(module: &Module) -> Self {
        Self::new(module.default_indent.as_str(), module.default_newline.as_str())
    }

    /// Record node ranges while rendering
    pub(crate) fn recording(mut self) -> Self {
        self.recorded = Some(RecordedPositions::default());
        self
    }

    pub fn default_indent(&self) -> &str {
        &self.default_indent
    }

    pub fn default_newline(&self) -> &str {
        &self.default_newline
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn add_token(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        self.token_starts.push(self.position);
        self.position = advance(self.position, token);
        self.tokens.push(token.to_string());
    }

    /// Emit `explicit`, or the default newline when it is `None`
    pub fn add_newline(&mut self, explicit: Option<&str>) {
        let newline = explicit.unwrap_or(&self.default_newline).to_string();
        self.add_token(&newline);
    }

    pub fn add_indent_tokens(&mut self) {
        let indent = self.indent_tokens.concat();
        self.add_token(&indent);
    }

    /// Push one indentation level; `None` uses the default indent
    pub fn increase_indent(&mut self, value: Option<&str>) {
        let value = value.unwrap_or(&self.default_indent).to_string();
        self.indent_tokens.push(value);
    }

    pub fn decrease_indent(&mut self) {
        self.indent_tokens.pop();
    }

    /// Drop the last token if it is a line break
    pub fn pop_trailing_newline(&mut self) {
        let is_newline = self
            .tokens
            .last()
            .is_some_and(|token| matches!(token.as_str(), "\n" | "\r\n" | "\r"));
        if !is_newline {
            return;
        }
        self.tokens.pop();
        if let Some(start) = self.token_starts.pop() {
            self.position = start;
        }
    }

    pub(crate) fn begin_node(&mut self, id: NodeId) {
        if self.recorded.is_none() {
            return;
        }
        self.frames.push(Frame {
            id,
            inclusive_start: self.position,
            start: self.position,
            end: None,
        });
    }

    /// The syntactic range of the current node starts here
    pub(crate) fn mark_start(&mut self) {
        let position = self.position;
        if let Some(frame) = self.frames.last_mut() {
            frame.start = position;
        }
    }

    /// The syntactic range of the current node ends here
    pub(crate) fn mark_end(&mut self) {
        let position = self.position;
        if let Some(frame) = self.frames.last_mut() {
            frame.end = Some(position);
        }
    }

    pub(crate) fn end_node(&mut self) {
        let Some(recorded) = self.recorded.as_mut() else {
            return;
        };
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let end = frame.end.unwrap_or(self.position);
        recorded
            .syntactic
            .insert(frame.id, CodeRange::new(frame.start, end));
        recorded
            .inclusive
            .insert(frame.id, CodeRange::new(frame.inclusive_start, self.position));
    }

    pub fn finish(self) -> String {
        self.tokens.concat()
    }

    pub(crate) fn into_positions(self) -> RecordedPositions {
        self.recorded.unwrap_or_default()
    }
}

/// Move `position` past `token`; `\r\n`, `\r` and `\n` each end a line
pub(crate) fn advance(mut position: CodePosition, token: &str) -> CodePosition {
    let mut chars = token.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                position = CodePosition::new(position.line + 1, 0);
            }
            '\n' => position = CodePosition::new(position.line + 1, 0),
            _ => position.column += 1,
        }
    }
    position
}

/// Render any tree to text
pub fn render(node: &Node) -> String {
    node.code()
}

/// Render a module while recording the range of every node
pub(crate) fn record_positions(module: &Module, root: &Node) -> RecordedPositions {
    let mut state = CodegenState::for_module(module).recording();
    root.codegen(&mut state, CodegenContext::default());
    state.into_positions()
}
