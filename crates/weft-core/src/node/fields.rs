//! Field reflection: descriptors and dynamically typed field values

use super::{Node, NodeKind};
use crate::error::CstError;
use crate::result::Result;
use crate::sentinel::MaybeSentinel;
use crate::trivia::{BaseWhitespace, EmptyLine, SimpleWhitespace, TrailingWhitespace};

/// How a field participates in traversal and sentinel resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Exactly one child node
    Required,
    /// Zero or one child node
    Optional,
    /// A child node or `MaybeSentinel::Default`
    Maybe,
    /// Ordered child nodes
    Sequence,
    /// Ordered statements; removable children are compacted away
    Body,
    /// Whitespace, comments and newlines
    Trivia,
    /// Text or flags
    Scalar,
}

impl FieldRole {
    pub fn holds_nodes(self) -> bool {
        !matches!(self, FieldRole::Trivia | FieldRole::Scalar)
    }
}

/// Which node kinds a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Nothing,
    Expression,
    SmallStatement,
    Statement,
    OrElse,
    Kind(NodeKind),
}

impl Accepts {
    pub fn allows(self, kind: NodeKind) -> bool {
        match self {
            Accepts::Nothing => false,
            Accepts::Expression => kind.is_expression(),
            Accepts::SmallStatement => kind.is_small_statement(),
            Accepts::Statement => kind.is_statement(),
            Accepts::OrElse => matches!(kind, NodeKind::If | NodeKind::Else),
            Accepts::Kind(expected) => kind == expected,
        }
    }
}

/// Static description of one node field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
    pub accepts: Accepts,
    /// Text of the value a freshly constructed node holds, when it is not
    /// the empty value
    pub default: Option<&'static str>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, accepts: Accepts) -> Self {
        Self { name, role: FieldRole::Required, accepts, default: None }
    }

    pub const fn optional(name: &'static str, accepts: Accepts) -> Self {
        Self { name, role: FieldRole::Optional, accepts, default: None }
    }

    pub const fn maybe(name: &'static str, accepts: Accepts) -> Self {
        Self { name, role: FieldRole::Maybe, accepts, default: None }
    }

    pub const fn sequence(name: &'static str, accepts: Accepts) -> Self {
        Self { name, role: FieldRole::Sequence, accepts, default: None }
    }

    pub const fn body(name: &'static str, accepts: Accepts) -> Self {
        Self { name, role: FieldRole::Body, accepts, default: None }
    }

    pub const fn trivia(name: &'static str) -> Self {
        Self { name, role: FieldRole::Trivia, accepts: Accepts::Nothing, default: None }
    }

    pub const fn scalar(name: &'static str) -> Self {
        Self { name, role: FieldRole::Scalar, accepts: Accepts::Nothing, default: None }
    }

    pub const fn defaults_to(self, text: &'static str) -> Self {
        Self { default: Some(text), ..self }
    }
}

/// A field value read from or written to a node
#[derive(Debug, Clone)]
pub enum FieldValue {
    Node(Node),
    OptionalNode(Option<Node>),
    MaybeNode(MaybeSentinel<Node>),
    Nodes(Vec<Node>),
    Whitespace(BaseWhitespace),
    SimpleWhitespace(SimpleWhitespace),
    MaybeWhitespace(MaybeSentinel<SimpleWhitespace>),
    TrailingWhitespace(TrailingWhitespace),
    EmptyLines(Vec<EmptyLine>),
    Text(String),
    OptionalText(Option<String>),
    Flag(bool),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Node(_) => "a node",
            FieldValue::OptionalNode(_) => "an optional node",
            FieldValue::MaybeNode(_) => "a sentinel-wrapped node",
            FieldValue::Nodes(_) => "a node sequence",
            FieldValue::Whitespace(_) => "whitespace",
            FieldValue::SimpleWhitespace(_) => "simple whitespace",
            FieldValue::MaybeWhitespace(_) => "sentinel-wrapped whitespace",
            FieldValue::TrailingWhitespace(_) => "trailing whitespace",
            FieldValue::EmptyLines(_) => "empty lines",
            FieldValue::Text(_) => "text",
            FieldValue::OptionalText(_) => "optional text",
            FieldValue::Flag(_) => "a flag",
        }
    }

    /// Whether this is the value `spec`'s field holds on a fresh node
    ///
    /// Required child nodes never count as defaults.
    pub fn is_default_for(&self, spec: &FieldSpec) -> bool {
        let text = spec.default.unwrap_or("");
        match self {
            FieldValue::Node(_) => false,
            FieldValue::OptionalNode(node) => node.is_none(),
            FieldValue::MaybeNode(node) => node.is_default(),
            FieldValue::Nodes(nodes) => nodes.is_empty(),
            FieldValue::Whitespace(BaseWhitespace::Simple(ws)) => ws.value() == text,
            FieldValue::Whitespace(BaseWhitespace::Parenthesized(_)) => false,
            FieldValue::SimpleWhitespace(ws) => ws.value() == text,
            FieldValue::MaybeWhitespace(ws) => ws.is_default(),
            FieldValue::TrailingWhitespace(ws) => *ws == TrailingWhitespace::default(),
            FieldValue::EmptyLines(lines) => lines.is_empty(),
            FieldValue::Text(value) => value == text,
            FieldValue::OptionalText(value) => value.is_none(),
            FieldValue::Flag(flag) => flag.to_string() == spec.default.unwrap_or("false"),
        }
    }

    /// Structural comparison; nodes are compared with `deep_equals`
    pub fn deep_equals(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Node(a), FieldValue::Node(b)) => a.deep_equals(b),
            (FieldValue::OptionalNode(a), FieldValue::OptionalNode(b)) => match (a, b) {
                (Some(a), Some(b)) => a.deep_equals(b),
                (None, None) => true,
                _ => false,
            },
            (FieldValue::MaybeNode(a), FieldValue::MaybeNode(b)) => match (a, b) {
                (MaybeSentinel::Present(a), MaybeSentinel::Present(b)) => a.deep_equals(b),
                (MaybeSentinel::Default, MaybeSentinel::Default) => true,
                _ => false,
            },
            (FieldValue::Nodes(a), FieldValue::Nodes(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.deep_equals(b))
            }
            (FieldValue::Whitespace(a), FieldValue::Whitespace(b)) => a == b,
            (FieldValue::SimpleWhitespace(a), FieldValue::SimpleWhitespace(b)) => a == b,
            (FieldValue::MaybeWhitespace(a), FieldValue::MaybeWhitespace(b)) => a == b,
            (FieldValue::TrailingWhitespace(a), FieldValue::TrailingWhitespace(b)) => a == b,
            (FieldValue::EmptyLines(a), FieldValue::EmptyLines(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::OptionalText(a), FieldValue::OptionalText(b)) => a == b,
            (FieldValue::Flag(a), FieldValue::Flag(b)) => a == b,
            _ => false,
        }
    }

    fn mismatch(&self, owner: NodeKind, spec: &'static FieldSpec, expected: &'static str) -> CstError {
        CstError::InvalidFieldType {
            node: owner,
            field: spec.name,
            expected,
            found: self.type_name(),
        }
    }

    pub(crate) fn into_node(self, owner: NodeKind, spec: &'static FieldSpec) -> Result<Node> {
        match self {
            FieldValue::Node(node) => check_kind(node, owner, spec),
            other => Err(other.mismatch(owner, spec, "a node")),
        }
    }

    pub(crate) fn into_optional_node(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<Option<Node>> {
        match self {
            FieldValue::Node(node) => check_kind(node, owner, spec).map(Some),
            FieldValue::OptionalNode(node) => node.map(|n| check_kind(n, owner, spec)).transpose(),
            other => Err(other.mismatch(owner, spec, "an optional node")),
        }
    }

    pub(crate) fn into_maybe_node(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<MaybeSentinel<Node>> {
        match self {
            FieldValue::Node(node) => check_kind(node, owner, spec).map(MaybeSentinel::Present),
            FieldValue::MaybeNode(MaybeSentinel::Present(node)) => {
                check_kind(node, owner, spec).map(MaybeSentinel::Present)
            }
            FieldValue::MaybeNode(MaybeSentinel::Default) => Ok(MaybeSentinel::Default),
            other => Err(other.mismatch(owner, spec, "a sentinel-wrapped node")),
        }
    }

    pub(crate) fn into_nodes(self, owner: NodeKind, spec: &'static FieldSpec) -> Result<Vec<Node>> {
        match self {
            FieldValue::Nodes(nodes) => nodes
                .into_iter()
                .map(|node| check_kind(node, owner, spec))
                .collect(),
            other => Err(other.mismatch(owner, spec, "a node sequence")),
        }
    }

    pub(crate) fn into_whitespace(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<BaseWhitespace> {
        match self {
            FieldValue::Whitespace(ws) => Ok(ws),
            FieldValue::SimpleWhitespace(ws) => Ok(BaseWhitespace::Simple(ws)),
            other => Err(other.mismatch(owner, spec, "whitespace")),
        }
    }

    pub(crate) fn into_simple_whitespace(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<SimpleWhitespace> {
        match self {
            FieldValue::SimpleWhitespace(ws) | FieldValue::Whitespace(BaseWhitespace::Simple(ws)) => {
                Ok(ws)
            }
            other => Err(other.mismatch(owner, spec, "simple whitespace")),
        }
    }

    pub(crate) fn into_maybe_whitespace(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<MaybeSentinel<SimpleWhitespace>> {
        match self {
            FieldValue::MaybeWhitespace(ws) => Ok(ws),
            FieldValue::SimpleWhitespace(ws) => Ok(MaybeSentinel::Present(ws)),
            other => Err(other.mismatch(owner, spec, "sentinel-wrapped whitespace")),
        }
    }

    pub(crate) fn into_trailing_whitespace(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<TrailingWhitespace> {
        match self {
            FieldValue::TrailingWhitespace(ws) => Ok(ws),
            other => Err(other.mismatch(owner, spec, "trailing whitespace")),
        }
    }

    pub(crate) fn into_empty_lines(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<Vec<EmptyLine>> {
        match self {
            FieldValue::EmptyLines(lines) => Ok(lines),
            other => Err(other.mismatch(owner, spec, "empty lines")),
        }
    }

    pub(crate) fn into_text(self, owner: NodeKind, spec: &'static FieldSpec) -> Result<String> {
        match self {
            FieldValue::Text(text) => Ok(text),
            other => Err(other.mismatch(owner, spec, "text")),
        }
    }

    pub(crate) fn into_optional_text(
        self,
        owner: NodeKind,
        spec: &'static FieldSpec,
    ) -> Result<Option<String>> {
        match self {
            FieldValue::Text(text) => Ok(Some(text)),
            FieldValue::OptionalText(text) => Ok(text),
            other => Err(other.mismatch(owner, spec, "optional text")),
        }
    }

    pub(crate) fn into_flag(self, owner: NodeKind, spec: &'static FieldSpec) -> Result<bool> {
        match self {
            FieldValue::Flag(flag) => Ok(flag),
            other => Err(other.mismatch(owner, spec, "a flag")),
        }
    }
}

fn check_kind(node: Node, owner: NodeKind, spec: &'static FieldSpec) -> Result<Node> {
    if spec.accepts.allows(node.kind()) {
        Ok(node)
    } else {
        Err(CstError::InvalidChildKind {
            node: owner,
            field: spec.name,
            found: node.kind(),
        })
    }
}

impl From<Node> for FieldValue {
    fn from(value: Node) -> Self {
        FieldValue::Node(value)
    }
}

impl From<Option<Node>> for FieldValue {
    fn from(value: Option<Node>) -> Self {
        FieldValue::OptionalNode(value)
    }
}

impl From<MaybeSentinel<Node>> for FieldValue {
    fn from(value: MaybeSentinel<Node>) -> Self {
        FieldValue::MaybeNode(value)
    }
}

impl From<Vec<Node>> for FieldValue {
    fn from(value: Vec<Node>) -> Self {
        FieldValue::Nodes(value)
    }
}

impl From<BaseWhitespace> for FieldValue {
    fn from(value: BaseWhitespace) -> Self {
        FieldValue::Whitespace(value)
    }
}

impl From<SimpleWhitespace> for FieldValue {
    fn from(value: SimpleWhitespace) -> Self {
        FieldValue::SimpleWhitespace(value)
    }
}

impl From<MaybeSentinel<SimpleWhitespace>> for FieldValue {
    fn from(value: MaybeSentinel<SimpleWhitespace>) -> Self {
        FieldValue::MaybeWhitespace(value)
    }
}

impl From<TrailingWhitespace> for FieldValue {
    fn from(value: TrailingWhitespace) -> Self {
        FieldValue::TrailingWhitespace(value)
    }
}

impl From<Vec<EmptyLine>> for FieldValue {
    fn from(value: Vec<EmptyLine>) -> Self {
        FieldValue::EmptyLines(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        FieldValue::OptionalText(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

pub(crate) fn map_all(nodes: &mut [Node], f: &mut dyn FnMut(&Node) -> Node) {
    for node in nodes {
        *node = f(node);
    }
}

pub(crate) fn map_optional(node: &mut Option<Node>, f: &mut dyn FnMut(&Node) -> Node) {
    if let Some(node) = node {
        *node = f(node);
    }
}

pub(crate) fn map_maybe(node: &mut MaybeSentinel<Node>, f: &mut dyn FnMut(&Node) -> Node) {
    if let MaybeSentinel::Present(node) = node {
        *node = f(node);
    }
}
