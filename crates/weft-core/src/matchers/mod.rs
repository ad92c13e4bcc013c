//! Declarative tree matching
//!
//! A [`Matcher`] describes the shape of a field value: a node of some kind
//! whose fields match further matchers, literal text, an absent optional, or
//! a combination of these. Sequence fields are matched element by element
//! with [`SequenceItem`]s, where wildcards such as [`SequenceItem::zero_or_more`]
//! consume runs of children with backtracking.
//!
//! Matching is read-only and driven by the field reflection of
//! [`Node`](crate::node::Node): a [`NodeMatcher`] names fields the same way
//! `with_changes` does. Named captures ([`Matcher::save`]) are collected into
//! [`Captures`] by [`extract`] and [`extractall`], and handed to the callback
//! of [`replace`].
//!
//! ```rust
//! use weft_core::matchers::{Matcher, SequenceItem, findall};
//! use weft_core::node::NodeKind;
//! use weft_core::parser::parse_module;
//!
//! let module = parse_module("f(1)\ng(1, 2)\nf()\n").unwrap();
//! // Calls to `f` with at least one argument
//! let calls = Matcher::node(NodeKind::Call)
//!     .field("func", Matcher::name("f"))
//!     .field("args", Matcher::sequence([SequenceItem::at_least(1, Matcher::any())]));
//! let found = findall(&module, &calls.into());
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].code(), "f(1)");
//! ```

mod matching;
mod visitors;

pub use matching::{Matching, extract, extractall, findall, matches, replace};
pub use visitors::{MatchRule, MatcherTransformer, MatcherVisitor};

use crate::metadata::{MetadataProvider, ResolvedMetadata};
use crate::node::{FieldValue, Node, NodeKind};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Values saved by [`Matcher::save`] and [`SequenceItem::save`], by name
///
/// A node field saves the node, a run of sequence elements saves
/// `FieldValue::Nodes`. When a name is saved twice the later match wins.
pub type Captures = IndexMap<String, FieldValue>;

type Predicate = Arc<dyn Fn(&FieldValue) -> bool + Send + Sync>;
type MetadataTest = Arc<dyn Fn(&ResolvedMetadata<'_>, &Node) -> bool + Send + Sync>;

/// A test against one field value
#[derive(Clone)]
pub enum Matcher {
    /// Anything at all
    Any,
    /// An unset optional: `None`, `MaybeSentinel::Default` or absent text
    Absent,
    /// Text, or whitespace, equal to this string
    Text(String),
    Flag(bool),
    /// A node of one kind with matching fields
    Node(NodeMatcher),
    /// A node sequence, element by element
    Sequence(Vec<SequenceItem>),
    /// The first alternative that matches
    OneOf(Vec<Matcher>),
    /// Every matcher, with their captures merged
    AllOf(Vec<Matcher>),
    /// Inverts the inner matcher; captures inside are discarded
    DoesNotMatch(Box<Matcher>),
    /// Text or whitespace the whole of which matches the pattern
    ///
    /// Built by [`Matcher::regex`], which anchors the pattern at both ends.
    Regex(Regex),
    IfTrue(Predicate),
    /// A node whose resolved metadata passes a test
    Metadata {
        provider: &'static str,
        test: MetadataTest,
    },
    /// Saves the matched value under a name
    Save(String, Box<Matcher>),
}

impl Matcher {
    pub fn any() -> Self {
        Matcher::Any
    }

    pub fn absent() -> Self {
        Matcher::Absent
    }

    pub fn text(value: impl Into<String>) -> Self {
        Matcher::Text(value.into())
    }

    pub fn flag(value: bool) -> Self {
        Matcher::Flag(value)
    }

    /// Start a matcher for nodes of `kind`
    pub fn node(kind: NodeKind) -> NodeMatcher {
        NodeMatcher::new(kind)
    }

    /// A `Name` node with exactly this value
    pub fn name(value: impl Into<String>) -> Self {
        Matcher::node(NodeKind::Name)
            .field("value", Matcher::text(value))
            .into()
    }

    pub fn sequence(items: impl IntoIterator<Item = SequenceItem>) -> Self {
        Matcher::Sequence(items.into_iter().collect())
    }

    pub fn one_of(options: impl IntoIterator<Item = Matcher>) -> Self {
        Matcher::OneOf(options.into_iter().collect())
    }

    pub fn all_of(options: impl IntoIterator<Item = Matcher>) -> Self {
        Matcher::AllOf(options.into_iter().collect())
    }

    pub fn does_not_match(inner: Matcher) -> Self {
        Matcher::DoesNotMatch(Box::new(inner))
    }

    /// Text or whitespace matching `pattern` in full
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{pattern})$")).map(Matcher::Regex)
    }

    /// Any value for which `predicate` returns true
    pub fn if_true(predicate: impl Fn(&FieldValue) -> bool + Send + Sync + 'static) -> Self {
        Matcher::IfTrue(Arc::new(predicate))
    }

    /// A node whose `P` value equals `expected`
    ///
    /// Nodes without a `P` value, and any match made without resolved
    /// metadata, do not match.
    pub fn metadata<P>(expected: P::Value) -> Self
    where
        P: MetadataProvider,
        P::Value: PartialEq,
    {
        Matcher::metadata_if::<P>(move |value| *value == expected)
    }

    /// A node whose `P` value passes `test`
    pub fn metadata_if<P: MetadataProvider>(
        test: impl Fn(&P::Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Matcher::Metadata {
            provider: P::NAME,
            test: Arc::new(move |resolved: &ResolvedMetadata<'_>, node: &Node| {
                resolved.get_optional::<P>(node).is_some_and(|value| test(value))
            }),
        }
    }

    /// Save whatever this matcher matches under `name`
    pub fn save(self, name: impl Into<String>) -> Self {
        Matcher::Save(name.into(), Box::new(self))
    }
}

impl From<NodeMatcher> for Matcher {
    fn from(matcher: NodeMatcher) -> Self {
        Matcher::Node(matcher)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("Any"),
            Matcher::Absent => f.write_str("Absent"),
            Matcher::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Matcher::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            Matcher::Node(node) => node.fmt(f),
            Matcher::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Matcher::OneOf(options) => f.debug_tuple("OneOf").field(options).finish(),
            Matcher::AllOf(options) => f.debug_tuple("AllOf").field(options).finish(),
            Matcher::DoesNotMatch(inner) => f.debug_tuple("DoesNotMatch").field(inner).finish(),
            Matcher::Regex(pattern) => f.debug_tuple("Regex").field(&pattern.as_str()).finish(),
            Matcher::IfTrue(_) => f.write_str("IfTrue(..)"),
            Matcher::Metadata { provider, .. } => {
                f.debug_struct("Metadata").field("provider", provider).finish_non_exhaustive()
            }
            Matcher::Save(name, inner) => f.debug_tuple("Save").field(name).field(inner).finish(),
        }
    }
}

/// A node kind plus constraints on some of its fields
///
/// Fields not named are not checked. A field name the kind does not have
/// never matches.
#[derive(Debug, Clone)]
pub struct NodeMatcher {
    pub kind: NodeKind,
    pub fields: Vec<(String, Matcher)>,
}

impl NodeMatcher {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    /// Require field `name` to match `matcher`
    pub fn field(mut self, name: impl Into<String>, matcher: impl Into<Matcher>) -> Self {
        self.fields.push((name.into(), matcher.into()));
        self
    }

    /// Save the matched node under `name`
    pub fn save(self, name: impl Into<String>) -> Matcher {
        Matcher::from(self).save(name)
    }
}

/// One position in a [`Matcher::Sequence`]
#[derive(Debug, Clone)]
pub enum SequenceItem {
    /// Exactly one element
    One(Matcher),
    /// Between `min` and `max` consecutive elements, as many as possible
    Repeat {
        matcher: Matcher,
        min: usize,
        max: Option<usize>,
        save: Option<String>,
    },
}

impl SequenceItem {
    /// Any number of elements matching `matcher`
    pub fn zero_or_more(matcher: Matcher) -> Self {
        Self::repeat(matcher, 0, None)
    }

    /// At least `n` elements matching `matcher`
    pub fn at_least(n: usize, matcher: Matcher) -> Self {
        Self::repeat(matcher, n, None)
    }

    /// At most `n` elements matching `matcher`
    pub fn at_most(n: usize, matcher: Matcher) -> Self {
        Self::repeat(matcher, 0, Some(n))
    }

    pub fn zero_or_one(matcher: Matcher) -> Self {
        Self::at_most(1, matcher)
    }

    fn repeat(matcher: Matcher, min: usize, max: Option<usize>) -> Self {
        SequenceItem::Repeat {
            matcher,
            min,
            max,
            save: None,
        }
    }

    /// Save the matched element, or run of elements, under `name`
    pub fn save(self, name: impl Into<String>) -> Self {
        match self {
            SequenceItem::One(matcher) => SequenceItem::One(matcher.save(name)),
            SequenceItem::Repeat {
                matcher, min, max, ..
            } => SequenceItem::Repeat {
                matcher,
                min,
                max,
                save: Some(name.into()),
            },
        }
    }
}

impl From<Matcher> for SequenceItem {
    fn from(matcher: Matcher) -> Self {
        SequenceItem::One(matcher)
    }
}

impl From<NodeMatcher> for SequenceItem {
    fn from(matcher: NodeMatcher) -> Self {
        SequenceItem::One(matcher.into())
    }
}
