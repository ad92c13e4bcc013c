//! Immutable node model
//!
//! A tree is built from [`Node`] values: a tagged union over every node kind,
//! where each variant holds an `Arc` of a plain struct with named, ordered
//! fields. Nodes are never mutated in place. [`Node::with_changes`] copies the
//! struct, replaces the named fields and re-validates, so untouched children
//! stay shared between the old and the new tree.
//!
//! Identity is reference identity ([`NodeId`]): two structurally equal nodes
//! are still distinct unless they are the same allocation. Metadata is keyed
//! by identity and never stored on nodes.
//!
//! The per-kind structs live in `statement`, `expression` and `op`; generic
//! operations (`with_changes`, `deep_clone`, `deep_equals`, `children`) work
//! through the field reflection in [`fields`].

mod expression;
mod fields;
mod op;
mod statement;

pub use expression::{
    Arg, Attribute, BinaryOperation, BinaryOperator, Call, Float, Integer, Name, SimpleString,
};
pub use fields::{Accepts, FieldRole, FieldSpec, FieldValue};
pub use op::{AssignEqual, Comma, Dot, LeftParen, RightParen, Semicolon};
pub use statement::{
    Assign, AssignTarget, Else, Expr, FunctionDef, If, IndentedBlock, Module, Param, Parameters,
    Pass, Return, SimpleStatementLine,
};

pub(crate) use fields::{map_all, map_maybe, map_optional};

use crate::codegen::{CodegenContext, CodegenState};
use crate::error::CstError;
use crate::result::Result;
use crate::sentinel::MaybeSentinel;
use crate::trivia::{EmptyLine, SimpleWhitespace};
use std::fmt;
use std::sync::Arc;

/// Invoke `$callback!` with the list of every node kind and its hook names
macro_rules! node_kinds {
    ($callback:ident) => {
        $callback! {
            Module(as_module, visit_module, leave_module),
            SimpleStatementLine(as_simple_statement_line, visit_simple_statement_line, leave_simple_statement_line),
            FunctionDef(as_function_def, visit_function_def, leave_function_def),
            If(as_if, visit_if, leave_if),
            Else(as_else, visit_else, leave_else),
            IndentedBlock(as_indented_block, visit_indented_block, leave_indented_block),
            Expr(as_expr, visit_expr, leave_expr),
            Return(as_return, visit_return, leave_return),
            Pass(as_pass, visit_pass, leave_pass),
            Assign(as_assign, visit_assign, leave_assign),
            AssignTarget(as_assign_target, visit_assign_target, leave_assign_target),
            Name(as_name, visit_name, leave_name),
            Integer(as_integer, visit_integer, leave_integer),
            Float(as_float, visit_float, leave_float),
            SimpleString(as_simple_string, visit_simple_string, leave_simple_string),
            Call(as_call, visit_call, leave_call),
            Arg(as_arg, visit_arg, leave_arg),
            Attribute(as_attribute, visit_attribute, leave_attribute),
            BinaryOperation(as_binary_operation, visit_binary_operation, leave_binary_operation),
            BinaryOperator(as_binary_operator, visit_binary_operator, leave_binary_operator),
            Parameters(as_parameters, visit_parameters, leave_parameters),
            Param(as_param, visit_param, leave_param),
            Comma(as_comma, visit_comma, leave_comma),
            Semicolon(as_semicolon, visit_semicolon, leave_semicolon),
            AssignEqual(as_assign_equal, visit_assign_equal, leave_assign_equal),
            LeftParen(as_left_paren, visit_left_paren, leave_left_paren),
            RightParen(as_right_paren, visit_right_paren, leave_right_paren),
            Dot(as_dot, visit_dot, leave_dot),
        }
    };
}
pub(crate) use node_kinds;

macro_rules! define_nodes {
    ($($kind:ident($as_kind:ident, $visit:ident, $leave:ident)),* $(,)?) => {
        /// Discriminant of a [`Node`]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum NodeKind {
            $($kind,)*
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$kind => stringify!($kind),)*
                }
            }
        }

        /// A node of any kind
        #[derive(Debug, Clone)]
        pub enum Node {
            $($kind(Arc<$kind>),)*
        }

        $(
            impl From<Arc<$kind>> for Node {
                fn from(node: Arc<$kind>) -> Self {
                    Node::$kind(node)
                }
            }

            impl NodeVariant for $kind {
                fn wrap(node: Arc<Self>) -> Node {
                    Node::$kind(node)
                }

                fn downcast(node: &Node) -> Option<&Arc<Self>> {
                    match node {
                        Node::$kind(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*

        impl Node {
            pub fn kind(&self) -> NodeKind {
                match self {
                    $(Node::$kind(_) => NodeKind::$kind,)*
                }
            }

            /// Reference identity of this node
            pub fn id(&self) -> NodeId {
                match self {
                    $(Node::$kind(inner) => NodeId::of(inner),)*
                }
            }

            /// Field descriptors in declared order
            pub fn field_specs(&self) -> &'static [FieldSpec] {
                match self {
                    $(Node::$kind(_) => <$kind as CstNode>::FIELDS,)*
                }
            }

            /// Read a field by name
            pub fn field(&self, name: &str) -> Option<FieldValue> {
                match self {
                    $(Node::$kind(inner) => inner.get_field(name),)*
                }
            }

            /// Return a copy with the named fields replaced
            ///
            /// Unnamed fields are shared with `self`. The copy is validated
            /// before it is returned.
            pub fn with_changes<I, K>(&self, updates: I) -> Result<Node>
            where
                I: IntoIterator<Item = (K, FieldValue)>,
                K: AsRef<str>,
            {
                match self {
                    $(Node::$kind(inner) => {
                        let mut copy = (**inner).clone();
                        for (name, value) in updates {
                            copy.set_field(name.as_ref(), value)?;
                        }
                        copy.build()
                    })*
                }
            }

            /// Copy the whole subtree; every node in the result is a fresh allocation
            pub fn deep_clone(&self) -> Node {
                match self {
                    $(Node::$kind(inner) => {
                        let mut copy = (**inner).clone();
                        copy.map_children(&mut |child: &Node| child.deep_clone());
                        Node::$kind(Arc::new(copy))
                    })*
                }
            }

            fn codegen_kind(&self, state: &mut CodegenState, ctx: CodegenContext) {
                match self {
                    $(Node::$kind(inner) => inner.codegen(state, ctx),)*
                }
            }

            $(
                pub fn $as_kind(&self) -> Option<&Arc<$kind>> {
                    <$kind as NodeVariant>::downcast(self)
                }
            )*
        }
    };
}

node_kinds!(define_nodes);

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl NodeKind {
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            NodeKind::Name
                | NodeKind::Integer
                | NodeKind::Float
                | NodeKind::SimpleString
                | NodeKind::Call
                | NodeKind::Attribute
                | NodeKind::BinaryOperation
        )
    }

    pub fn is_small_statement(self) -> bool {
        matches!(
            self,
            NodeKind::Expr | NodeKind::Return | NodeKind::Pass | NodeKind::Assign
        )
    }

    /// Statements that may appear in a module or block body
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            NodeKind::SimpleStatementLine | NodeKind::FunctionDef | NodeKind::If
        )
    }
}

/// Reference identity of a node, stable while the node is alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn of<T>(node: &Arc<T>) -> Self {
        Self(Arc::as_ptr(node) as *const () as usize)
    }
}

/// Conversion between a node struct and the [`Node`] variant holding it
pub trait NodeVariant: Sized {
    fn wrap(node: Arc<Self>) -> Node;
    fn downcast(node: &Node) -> Option<&Arc<Self>>;
}

/// Behaviour shared by every node struct
pub trait CstNode: NodeVariant + fmt::Debug + Clone + Send + Sync + 'static {
    const KIND: NodeKind;
    const FIELDS: &'static [FieldSpec];

    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Store `value` into the field described by `spec`
    fn assign(&mut self, spec: &'static FieldSpec, value: FieldValue) -> Result<()>;

    /// Replace every child node with `f(child)`
    fn map_children(&mut self, f: &mut dyn FnMut(&Node) -> Node);

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext);

    fn field_spec(name: &str) -> Option<&'static FieldSpec> {
        Self::FIELDS.iter().find(|spec| spec.name == name)
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let spec = Self::field_spec(name).ok_or_else(|| CstError::invalid_field(Self::KIND, name))?;
        self.assign(spec, value)
    }

    /// Validate and wrap into a [`Node`]
    fn build(self) -> Result<Node> {
        self.validate()?;
        Ok(Self::wrap(Arc::new(self)))
    }
}

impl Node {
    /// Whether both values are the same allocation
    pub fn ptr_eq(&self, other: &Node) -> bool {
        self.id() == other.id()
    }

    /// Child nodes in declared field order
    pub fn children(&self) -> Vec<Node> {
        let mut children = Vec::new();
        for spec in self.field_specs() {
            match self.field(spec.name) {
                Some(FieldValue::Node(node)) => children.push(node),
                Some(FieldValue::OptionalNode(Some(node))) => children.push(node),
                Some(FieldValue::MaybeNode(MaybeSentinel::Present(node))) => children.push(node),
                Some(FieldValue::Nodes(nodes)) => children.extend(nodes),
                _ => {}
            }
        }
        children
    }

    /// Structural equality over every field
    pub fn deep_equals(&self, other: &Node) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.kind() != other.kind() {
            return false;
        }
        self.field_specs().iter().all(|spec| {
            match (self.field(spec.name), other.field(spec.name)) {
                (Some(a), Some(b)) => a.deep_equals(&b),
                (None, None) => true,
                _ => false,
            }
        })
    }

    /// A statement line whose small statements were all removed
    pub fn is_removable(&self) -> bool {
        self.as_simple_statement_line()
            .is_some_and(|line| line.body.is_empty())
    }

    /// Render this subtree
    ///
    /// Modules render with their own default indent and newline; other nodes
    /// use four spaces and `\n`.
    pub fn code(&self) -> String {
        let mut state = match self.as_module() {
            Some(module) => CodegenState::for_module(module),
            None => CodegenState::default(),
        };
        self.codegen(&mut state, CodegenContext::default());
        state.finish()
    }

    pub(crate) fn codegen(&self, state: &mut CodegenState, ctx: CodegenContext) {
        state.begin_node(self.id());
        self.codegen_kind(state, ctx);
        state.end_node();
    }

    /// Whether the rendered node can directly follow a keyword without a space
    pub(crate) fn safe_after_keyword(&self) -> bool {
        if let Some(FieldValue::Nodes(lpar)) = self.field("lpar")
            && !lpar.is_empty()
        {
            return true;
        }
        match self {
            Node::SimpleString(string) => string.value.starts_with(['\'', '"']),
            Node::Call(call) => call.func.safe_after_keyword(),
            Node::Attribute(attribute) => attribute.value.safe_after_keyword(),
            Node::BinaryOperation(operation) => operation.left.safe_after_keyword(),
            _ => false,
        }
    }
}

pub(crate) fn check_trivia(kind: NodeKind, result: std::result::Result<(), String>) -> Result<()> {
    result.map_err(|message| CstError::invalid_node(kind, message))
}

pub(crate) fn check_lines(kind: NodeKind, lines: &[EmptyLine]) -> Result<()> {
    for line in lines {
        check_trivia(kind, line.validate())?;
    }
    Ok(())
}

pub(crate) fn check_form_feed(kind: NodeKind, form_feed: &SimpleWhitespace) -> Result<()> {
    let value = form_feed.value();
    let blanks = value.chars().all(|c| matches!(c, ' ' | '\t' | '\x0c'));
    if value.is_empty() || (blanks && value.ends_with('\x0c')) {
        return Ok(());
    }
    Err(CstError::invalid_node(
        kind,
        format!("form feed prefix must be blanks ending in a form feed, got {value:?}"),
    ))
}

pub(crate) fn validate_parens(kind: NodeKind, lpar: &[Node], rpar: &[Node]) -> Result<()> {
    if lpar.len() > rpar.len() {
        return Err(CstError::invalid_node(kind, "left paren without right paren"));
    }
    if rpar.len() > lpar.len() {
        return Err(CstError::invalid_node(kind, "right paren without left paren"));
    }
    Ok(())
}

pub(crate) fn codegen_all(nodes: &[Node], state: &mut CodegenState) {
    for node in nodes {
        node.codegen(state, CodegenContext::default());
    }
}

/// Emit a present separator, or the canonical one when another element follows
pub(crate) fn codegen_separator(
    separator: &MaybeSentinel<Node>,
    default: &str,
    state: &mut CodegenState,
    ctx: CodegenContext,
) {
    match separator {
        MaybeSentinel::Present(node) => node.codegen(state, CodegenContext::default()),
        MaybeSentinel::Default if ctx.add_separator => state.add_token(default),
        MaybeSentinel::Default => {}
    }
}
