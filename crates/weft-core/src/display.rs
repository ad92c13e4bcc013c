//! Text dumps of a tree
//!
//! A dump lists every node as `Kind(field=value, ...)`, one field per line,
//! child-holding fields first. Unset optional children print as `None` and
//! unset sentinel fields as `MaybeSentinel.DEFAULT`. Whitespace fields and
//! fields still holding the value a fresh node would have can be left out.
//!
//! ```rust
//! use weft_core::display::DumpOptions;
//! use weft_core::parser::parse_statement;
//!
//! let line = parse_statement("pass\n").unwrap();
//! assert_eq!(
//!     line.dump(&DumpOptions::default()),
//!     "SimpleStatementLine(\n  body=[\n    Pass(),\n  ],\n)"
//! );
//! ```

use crate::node::{FieldRole, FieldValue, Node};
use crate::sentinel::MaybeSentinel;
use crate::trivia::{
    BaseWhitespace, Comment, EmptyLine, Newline, ParenthesizedWhitespace, SimpleWhitespace,
    TrailingWhitespace,
};

const INDENT: &str = "  ";
const DEFAULT_SENTINEL: &str = "MaybeSentinel.DEFAULT";

/// Which fields a dump includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpOptions {
    /// Include fields that still hold their default value
    pub show_defaults: bool,
    /// Include whitespace, comment and newline fields
    pub show_whitespace: bool,
}

impl DumpOptions {
    /// Every field of every node
    pub fn full() -> Self {
        Self {
            show_defaults: true,
            show_whitespace: true,
        }
    }
}

/// Render `node` and its subtree
pub fn dump(node: &Node, options: &DumpOptions) -> String {
    let mut out = String::new();
    print(&node_entry(node, options), 0, &mut out);
    out
}

impl Node {
    /// See [`dump`]
    pub fn dump(&self, options: &DumpOptions) -> String {
        dump(self, options)
    }
}

enum Entry {
    Atom(String),
    Record(&'static str, Vec<(&'static str, Entry)>),
    List(Vec<Entry>),
}

fn node_entry(node: &Node, options: &DumpOptions) -> Entry {
    let specs = node.field_specs();
    let ordered = specs
        .iter()
        .filter(|spec| spec.role.holds_nodes())
        .chain(specs.iter().filter(|spec| !spec.role.holds_nodes()));

    let mut fields = Vec::with_capacity(specs.len());
    for spec in ordered {
        if spec.role == FieldRole::Trivia && !options.show_whitespace {
            continue;
        }
        let Some(value) = node.field(spec.name) else {
            continue;
        };
        if !options.show_defaults && value.is_default_for(spec) {
            continue;
        }
        fields.push((spec.name, value_entry(&value, options)));
    }
    Entry::Record(node.kind().name(), fields)
}

fn value_entry(value: &FieldValue, options: &DumpOptions) -> Entry {
    match value {
        FieldValue::Node(node) => node_entry(node, options),
        FieldValue::OptionalNode(node) => node
            .as_ref()
            .map_or_else(|| atom("None"), |node| node_entry(node, options)),
        FieldValue::MaybeNode(MaybeSentinel::Present(node)) => node_entry(node, options),
        FieldValue::MaybeNode(MaybeSentinel::Default) => atom(DEFAULT_SENTINEL),
        FieldValue::Nodes(nodes) => {
            Entry::List(nodes.iter().map(|node| node_entry(node, options)).collect())
        }
        FieldValue::Whitespace(ws) => base_whitespace(ws),
        FieldValue::SimpleWhitespace(ws) => simple_whitespace(ws),
        FieldValue::MaybeWhitespace(MaybeSentinel::Present(ws)) => simple_whitespace(ws),
        FieldValue::MaybeWhitespace(MaybeSentinel::Default) => atom(DEFAULT_SENTINEL),
        FieldValue::TrailingWhitespace(ws) => trailing_whitespace(ws),
        FieldValue::EmptyLines(lines) => empty_lines(lines),
        FieldValue::Text(text) => quoted(text),
        FieldValue::OptionalText(text) => text.as_deref().map_or_else(|| atom("None"), quoted),
        FieldValue::Flag(flag) => atom(&flag.to_string()),
    }
}

fn atom(text: &str) -> Entry {
    Entry::Atom(text.to_string())
}

fn quoted(text: &str) -> Entry {
    Entry::Atom(format!("{text:?}"))
}

fn simple_whitespace(ws: &SimpleWhitespace) -> Entry {
    Entry::Record("SimpleWhitespace", vec![("value", quoted(ws.value()))])
}

fn base_whitespace(ws: &BaseWhitespace) -> Entry {
    match ws {
        BaseWhitespace::Simple(simple) => simple_whitespace(simple),
        BaseWhitespace::Parenthesized(parenthesized) => parenthesized_whitespace(parenthesized),
    }
}

fn parenthesized_whitespace(ws: &ParenthesizedWhitespace) -> Entry {
    Entry::Record(
        "ParenthesizedWhitespace",
        vec![
            ("first_line", trailing_whitespace(&ws.first_line)),
            ("empty_lines", empty_lines(&ws.empty_lines)),
            ("indent", atom(&ws.indent.to_string())),
            ("last_line", simple_whitespace(&ws.last_line)),
        ],
    )
}

fn trailing_whitespace(ws: &TrailingWhitespace) -> Entry {
    Entry::Record(
        "TrailingWhitespace",
        vec![
            ("whitespace", simple_whitespace(&ws.whitespace)),
            ("comment", comment(ws.comment.as_ref())),
            ("newline", newline(&ws.newline)),
        ],
    )
}

fn empty_lines(lines: &[EmptyLine]) -> Entry {
    Entry::List(
        lines
            .iter()
            .map(|line| {
                Entry::Record(
                    "EmptyLine",
                    vec![
                        ("indent", atom(&line.indent.to_string())),
                        ("whitespace", simple_whitespace(&line.whitespace)),
                        ("comment", comment(line.comment.as_ref())),
                        ("newline", newline(&line.newline)),
                    ],
                )
            })
            .collect(),
    )
}

fn comment(comment: Option<&Comment>) -> Entry {
    comment.map_or_else(
        || atom("None"),
        |comment| Entry::Record("Comment", vec![("value", quoted(comment.value()))]),
    )
}

fn newline(newline: &Newline) -> Entry {
    let value = newline.0.as_deref().map_or_else(|| atom("None"), quoted);
    Entry::Record("Newline", vec![("value", value)])
}

fn print(entry: &Entry, depth: usize, out: &mut String) {
    match entry {
        Entry::Atom(text) => out.push_str(text),
        Entry::Record(name, fields) => {
            out.push_str(name);
            out.push('(');
            if fields.is_empty() {
                out.push(')');
                return;
            }
            for (field, value) in fields {
                line_break(depth + 1, out);
                out.push_str(field);
                out.push('=');
                print(value, depth + 1, out);
                out.push(',');
            }
            line_break(depth, out);
            out.push(')');
        }
        Entry::List(items) => {
            out.push('[');
            if items.is_empty() {
                out.push(']');
                return;
            }
            for item in items {
                line_break(depth + 1, out);
                print(item, depth + 1, out);
                out.push(',');
            }
            line_break(depth, out);
            out.push(']');
        }
    }
}

fn line_break(depth: usize, out: &mut String) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
