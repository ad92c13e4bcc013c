//! Sentinels: placeholder values with engine-defined meaning

use crate::node::Node;

/// A field value that may be left for codegen to synthesize
///
/// `Default` means "absent": codegen emits the canonical form only when the
/// surrounding structure needs it (a comma between arguments, a space after
/// `return` when a value follows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MaybeSentinel<T> {
    #[default]
    Default,
    Present(T),
}

impl<T> MaybeSentinel<T> {
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Default => None,
        }
    }

    pub fn as_ref(&self) -> MaybeSentinel<&T> {
        match self {
            Self::Present(value) => MaybeSentinel::Present(value),
            Self::Default => MaybeSentinel::Default,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MaybeSentinel<U> {
        match self {
            Self::Present(value) => MaybeSentinel::Present(f(value)),
            Self::Default => MaybeSentinel::Default,
        }
    }
}

impl<T> From<Option<T>> for MaybeSentinel<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Present(value),
            None => Self::Default,
        }
    }
}

/// What a transformer's leave hook hands back to the engine
///
/// `Remove` and `Flatten` are the removal and flatten sentinels: the parent
/// decides what they mean for the field holding the node.
#[derive(Debug, Clone)]
pub enum Transformed {
    /// Use this node in place of the original
    Keep(Node),
    /// Drop the node from its parent
    Remove,
    /// Splice these nodes into the parent sequence; empty means remove
    Flatten(Vec<Node>),
}

impl Transformed {
    pub fn keep(node: impl Into<Node>) -> Self {
        Self::Keep(node.into())
    }

    pub fn flatten(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self::Flatten(nodes.into_iter().collect())
    }
}

impl From<Node> for Transformed {
    fn from(node: Node) -> Self {
        Self::Keep(node)
    }
}
