use super::{Captures, Matcher, NodeMatcher, SequenceItem};
use crate::metadata::ResolvedMetadata;
use crate::node::{FieldValue, Node, NodeId};
use crate::result::Result;
use crate::sentinel::{MaybeSentinel, Transformed};
use crate::trivia::BaseWhitespace;
use crate::visitor::{Transformer, Visitor};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Runs matchers, optionally against resolved metadata
///
/// Metadata matchers only match when the metadata was resolved for the tree
/// being searched.
#[derive(Clone, Copy, Default)]
pub struct Matching<'m> {
    metadata: Option<&'m ResolvedMetadata<'m>>,
}

impl<'m> Matching<'m> {
    pub fn new() -> Self {
        Self { metadata: None }
    }

    pub fn with_metadata(metadata: &'m ResolvedMetadata<'m>) -> Self {
        Self {
            metadata: Some(metadata),
        }
    }

    pub fn matches(&self, node: &Node, matcher: &Matcher) -> bool {
        self.extract(node, matcher).is_some()
    }

    /// Match `node` and return what the matcher saved
    pub fn extract(&self, node: &Node, matcher: &Matcher) -> Option<Captures> {
        let mut captures = Captures::new();
        self.value_matches(matcher, &FieldValue::Node(node.clone()), &mut captures)
            .then_some(captures)
    }

    /// Every node in `tree` that matches, in pre-order, `tree` included
    pub fn findall(&self, tree: &Node, matcher: &Matcher) -> Vec<Node> {
        self.search(tree, matcher)
            .into_iter()
            .map(|(node, _)| node)
            .collect()
    }

    /// The captures of every match in `tree`, in pre-order
    pub fn extractall(&self, tree: &Node, matcher: &Matcher) -> Vec<Captures> {
        self.search(tree, matcher)
            .into_iter()
            .map(|(_, captures)| captures)
            .collect()
    }

    /// Rebuild `tree`, handing every matching node to `replacement`
    ///
    /// Nodes are matched as they were in `tree`. The callback receives the
    /// node with its children already replaced, and captures pointing at the
    /// replaced children where one exists.
    pub fn replace<F>(&self, tree: &Node, matcher: &Matcher, replacement: F) -> Result<Transformed>
    where
        F: FnMut(&Node, &Captures) -> Result<Transformed>,
    {
        let mut replacer = Replacer {
            matching: *self,
            matcher,
            replacement,
            updated: HashMap::new(),
        };
        tree.transform(&mut replacer)
    }

    fn search(&self, tree: &Node, matcher: &Matcher) -> Vec<(Node, Captures)> {
        let mut collector = Collector {
            matching: *self,
            matcher,
            found: Vec::new(),
        };
        tree.visit(&mut collector);
        trace!("{} matches for {:?}", collector.found.len(), matcher);
        collector.found
    }

    fn value_matches(&self, matcher: &Matcher, value: &FieldValue, captures: &mut Captures) -> bool {
        match matcher {
            Matcher::Any => true,
            Matcher::Absent => is_absent(value),
            Matcher::Text(expected) => text_of(value) == Some(expected.as_str()),
            Matcher::Flag(expected) => matches!(value, FieldValue::Flag(flag) if flag == expected),
            Matcher::Regex(pattern) => text_of(value).is_some_and(|text| pattern.is_match(text)),
            Matcher::IfTrue(predicate) => predicate(value),
            Matcher::Node(node_matcher) => node_of(value)
                .is_some_and(|node| self.node_matches(node_matcher, node, captures)),
            Matcher::Sequence(items) => match value {
                FieldValue::Nodes(nodes) => self.sequence_matches(items, nodes, captures),
                _ => false,
            },
            Matcher::OneOf(options) => options
                .iter()
                .any(|option| self.try_match(option, value, captures)),
            Matcher::AllOf(options) => {
                let mut scratch = captures.clone();
                let all = options
                    .iter()
                    .all(|option| self.value_matches(option, value, &mut scratch));
                if all {
                    *captures = scratch;
                }
                all
            }
            Matcher::DoesNotMatch(inner) => !self.value_matches(inner, value, &mut captures.clone()),
            Matcher::Metadata { provider, test } => {
                let Some(resolved) = self.metadata else {
                    debug!("{} matcher used without resolved metadata", provider);
                    return false;
                };
                node_of(value).is_some_and(|node| test(resolved, node))
            }
            Matcher::Save(name, inner) => {
                if !self.value_matches(inner, value, captures) {
                    return false;
                }
                let saved = node_of(value).map_or_else(|| value.clone(), |node| node.clone().into());
                captures.insert(name.clone(), saved);
                true
            }
        }
    }

    /// Match on a copy of `captures`, keeping it only on success
    fn try_match(&self, matcher: &Matcher, value: &FieldValue, captures: &mut Captures) -> bool {
        let mut scratch = captures.clone();
        let matched = self.value_matches(matcher, value, &mut scratch);
        if matched {
            *captures = scratch;
        }
        matched
    }

    fn node_matches(&self, matcher: &NodeMatcher, node: &Node, captures: &mut Captures) -> bool {
        if node.kind() != matcher.kind {
            return false;
        }
        let mut scratch = captures.clone();
        for (name, field_matcher) in &matcher.fields {
            let Some(value) = node.field(name) else {
                debug!("{} has no field '{}' to match", node.kind(), name);
                return false;
            };
            if !self.value_matches(field_matcher, &value, &mut scratch) {
                return false;
            }
        }
        *captures = scratch;
        true
    }

    /// Repeats take as many elements as they can, then give them back one
    /// at a time until the rest of the sequence matches
    fn sequence_matches(&self, items: &[SequenceItem], nodes: &[Node], captures: &mut Captures) -> bool {
        let Some((item, rest)) = items.split_first() else {
            return nodes.is_empty();
        };

        match item {
            SequenceItem::One(matcher) => {
                let Some((node, tail)) = nodes.split_first() else {
                    return false;
                };
                let mut scratch = captures.clone();
                let matched = self.value_matches(matcher, &FieldValue::Node(node.clone()), &mut scratch)
                    && self.sequence_matches(rest, tail, &mut scratch);
                if matched {
                    *captures = scratch;
                }
                matched
            }
            SequenceItem::Repeat {
                matcher,
                min,
                max,
                save,
            } => {
                let limit = max.map_or(nodes.len(), |max| max.min(nodes.len()));
                // after[k] holds the captures after matching the first k elements
                let mut after = vec![captures.clone()];
                for node in &nodes[..limit] {
                    let mut next = after[after.len() - 1].clone();
                    if !self.value_matches(matcher, &FieldValue::Node(node.clone()), &mut next) {
                        break;
                    }
                    after.push(next);
                }

                for take in (*min..after.len()).rev() {
                    let mut scratch = after[take].clone();
                    if let Some(name) = save {
                        scratch.insert(name.clone(), FieldValue::Nodes(nodes[..take].to_vec()));
                    }
                    if self.sequence_matches(rest, &nodes[take..], &mut scratch) {
                        *captures = scratch;
                        return true;
                    }
                }
                false
            }
        }
    }
}

fn node_of(value: &FieldValue) -> Option<&Node> {
    match value {
        FieldValue::Node(node)
        | FieldValue::OptionalNode(Some(node))
        | FieldValue::MaybeNode(MaybeSentinel::Present(node)) => Some(node),
        _ => None,
    }
}

fn text_of(value: &FieldValue) -> Option<&str> {
    match value {
        FieldValue::Text(text) | FieldValue::OptionalText(Some(text)) => Some(text),
        FieldValue::SimpleWhitespace(ws)
        | FieldValue::Whitespace(BaseWhitespace::Simple(ws))
        | FieldValue::MaybeWhitespace(MaybeSentinel::Present(ws)) => Some(ws.value()),
        _ => None,
    }
}

fn is_absent(value: &FieldValue) -> bool {
    matches!(
        value,
        FieldValue::OptionalNode(None)
            | FieldValue::MaybeNode(MaybeSentinel::Default)
            | FieldValue::MaybeWhitespace(MaybeSentinel::Default)
            | FieldValue::OptionalText(None)
    )
}

struct Collector<'a, 'm> {
    matching: Matching<'m>,
    matcher: &'a Matcher,
    found: Vec<(Node, Captures)>,
}

impl Visitor for Collector<'_, '_> {
    fn on_visit(&mut self, node: &Node) -> bool {
        if let Some(captures) = self.matching.extract(node, self.matcher) {
            self.found.push((node.clone(), captures));
        }
        true
    }
}

struct Replacer<'a, 'm, F> {
    matching: Matching<'m>,
    matcher: &'a Matcher,
    replacement: F,
    /// Original node to what its leave hook kept
    updated: HashMap<NodeId, Node>,
}

impl<F> Replacer<'_, '_, F> {
    fn updated_node(&self, node: &Node) -> Node {
        self.updated.get(&node.id()).unwrap_or(node).clone()
    }

    fn translate(&self, captures: Captures) -> Captures {
        captures
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Node(node) => FieldValue::Node(self.updated_node(&node)),
                    FieldValue::Nodes(nodes) => {
                        FieldValue::Nodes(nodes.iter().map(|node| self.updated_node(node)).collect())
                    }
                    other => other,
                };
                (name, value)
            })
            .collect()
    }
}

impl<F> Transformer for Replacer<'_, '_, F>
where
    F: FnMut(&Node, &Captures) -> Result<Transformed>,
{
    fn on_leave(&mut self, original: &Node, updated: Node) -> Result<Transformed> {
        let result = match self.matching.extract(original, self.matcher) {
            Some(captures) => {
                let captures = self.translate(captures);
                (self.replacement)(&updated, &captures)?
            }
            None => Transformed::Keep(updated),
        };
        if let Transformed::Keep(node) = &result {
            self.updated.insert(original.id(), node.clone());
        }
        Ok(result)
    }
}

/// Whether `node` matches `matcher`, without metadata
pub fn matches(node: &Node, matcher: &Matcher) -> bool {
    Matching::new().matches(node, matcher)
}

/// See [`Matching::extract`]
pub fn extract(node: &Node, matcher: &Matcher) -> Option<Captures> {
    Matching::new().extract(node, matcher)
}

/// See [`Matching::findall`]
pub fn findall(tree: &Node, matcher: &Matcher) -> Vec<Node> {
    Matching::new().findall(tree, matcher)
}

/// See [`Matching::extractall`]
pub fn extractall(tree: &Node, matcher: &Matcher) -> Vec<Captures> {
    Matching::new().extractall(tree, matcher)
}

/// See [`Matching::replace`]
pub fn replace<F>(tree: &Node, matcher: &Matcher, replacement: F) -> Result<Transformed>
where
    F: FnMut(&Node, &Captures) -> Result<Transformed>,
{
    Matching::new().replace(tree, matcher, replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::parser::{parse_expression, parse_module};

    fn call_with(args: Vec<SequenceItem>) -> Matcher {
        Matcher::node(NodeKind::Call)
            .field("args", Matcher::sequence(args))
            .into()
    }

    fn arg(value: &str) -> SequenceItem {
        Matcher::node(NodeKind::Arg)
            .field("value", Matcher::name(value))
            .into()
    }

    fn any_arg() -> Matcher {
        Matcher::node(NodeKind::Arg).into()
    }

    #[test]
    fn test_node_and_text_fields() {
        let call = parse_expression("f(x)").unwrap();
        assert!(matches(&call, &Matcher::node(NodeKind::Call).field("func", Matcher::name("f")).into()));
        assert!(!matches(&call, &Matcher::node(NodeKind::Call).field("func", Matcher::name("g")).into()));
        assert!(!matches(&call, &Matcher::name("f")));
    }

    #[test]
    fn test_unknown_field_never_matches() {
        let call = parse_expression("f()").unwrap();
        let matcher = Matcher::node(NodeKind::Call).field("callee", Matcher::any()).into();
        assert!(!matches(&call, &matcher));
    }

    #[test]
    fn test_exact_sequences() {
        let call = parse_expression("f(a, b)").unwrap();
        assert!(matches(&call, &call_with(vec![arg("a"), arg("b")])));
        assert!(!matches(&call, &call_with(vec![arg("a")])));
        assert!(!matches(&call, &call_with(vec![arg("b"), arg("a")])));
        assert!(!matches(&call, &call_with(vec![arg("a"), arg("b"), arg("c")])));
    }

    #[test]
    fn test_zero_or_more_around_a_fixed_element() {
        let matcher = call_with(vec![
            SequenceItem::zero_or_more(any_arg()),
            arg("target"),
            SequenceItem::zero_or_more(any_arg()),
        ]);
        for source in ["f(target)", "f(a, target)", "f(target, b)", "f(a, b, target, c)"] {
            let call = parse_expression(source).unwrap();
            assert!(matches(&call, &matcher), "{source}");
        }
        for source in ["f()", "f(a, b)"] {
            let call = parse_expression(source).unwrap();
            assert!(!matches(&call, &matcher), "{source}");
        }
    }

    #[test]
    fn test_repeat_bounds() {
        let at_least_two = call_with(vec![SequenceItem::at_least(2, any_arg())]);
        let at_most_one = call_with(vec![SequenceItem::at_most(1, any_arg())]);
        let optional_then_b = call_with(vec![SequenceItem::zero_or_one(any_arg()), arg("b")]);

        let counts = ["f()", "f(a)", "f(a, b)", "f(a, b, c)"];
        let results: Vec<(bool, bool)> = counts
            .iter()
            .map(|source| {
                let call = parse_expression(source).unwrap();
                (matches(&call, &at_least_two), matches(&call, &at_most_one))
            })
            .collect();
        assert_eq!(results, vec![(false, true), (false, true), (true, false), (true, false)]);

        assert!(matches(&parse_expression("f(b)").unwrap(), &optional_then_b));
        assert!(matches(&parse_expression("f(a, b)").unwrap(), &optional_then_b));
        assert!(!matches(&parse_expression("f(a, c, b)").unwrap(), &optional_then_b));
    }

    #[test]
    fn test_greedy_repeat_gives_back_elements() {
        // The first repeat could take every argument; the match needs it to stop early
        let matcher = call_with(vec![
            SequenceItem::zero_or_more(any_arg()).save("head"),
            SequenceItem::at_least(1, any_arg()).save("tail"),
        ]);
        let call = parse_expression("f(a, b, c)").unwrap();
        let captures = extract(&call, &matcher).unwrap();

        let lengths: Vec<usize> = captures
            .values()
            .map(|value| match value {
                FieldValue::Nodes(nodes) => nodes.len(),
                other => panic!("unexpected capture {other:?}"),
            })
            .collect();
        assert_eq!(lengths, vec![2, 1]);
    }

    #[test]
    fn test_combinators_and_captures() {
        let call = parse_expression("f(x)").unwrap();
        let func = |matcher: Matcher| -> Matcher {
            Matcher::node(NodeKind::Call).field("func", matcher).into()
        };

        assert!(matches(&call, &func(Matcher::one_of([Matcher::name("g"), Matcher::name("f")]))));
        assert!(!matches(&call, &func(Matcher::all_of([Matcher::name("g"), Matcher::name("f")]))));
        assert!(matches(&call, &func(Matcher::does_not_match(Matcher::name("g")))));
        assert!(matches(&call, &func(Matcher::regex("[a-f]").unwrap())));
        assert!(!matches(&call, &func(Matcher::regex("f.").unwrap())));

        // A failed alternative leaves nothing behind
        let matcher = func(Matcher::one_of([
            Matcher::name("g").save("wrong"),
            Matcher::name("f").save("right"),
        ]));
        let captures = extract(&call, &matcher).unwrap();
        assert_eq!(captures.keys().collect::<Vec<_>>(), vec!["right"]);
        assert!(matches!(&captures["right"], FieldValue::Node(node) if node.code() == "f"));
    }

    #[test]
    fn test_regex_and_predicates_on_text() {
        let name = Matcher::node(NodeKind::Name)
            .field("value", Matcher::regex("_?[a-z]+").unwrap())
            .into();
        let long = Matcher::node(NodeKind::Integer)
            .field(
                "value",
                Matcher::if_true(|value| matches!(value, FieldValue::Text(text) if text.len() > 2)),
            )
            .into();

        assert!(matches(&parse_expression("_private").unwrap(), &name));
        assert!(!matches(&parse_expression("Upper").unwrap(), &name));
        assert!(matches(&parse_expression("1000").unwrap(), &long));
        assert!(!matches(&parse_expression("10").unwrap(), &long));
    }

    #[test]
    fn test_absent_optional_fields() {
        let module = parse_module("def f():\n    return\n    return x\n").unwrap();
        let bare = Matcher::node(NodeKind::Return).field("value", Matcher::absent()).into();
        let found = findall(&module, &bare);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code(), "return");
    }

    #[test]
    fn test_findall_and_extractall_in_pre_order() {
        let module = parse_module("f(g(a))\nh(b)\n").unwrap();
        let call = Matcher::node(NodeKind::Call).field("func", Matcher::any().save("func")).into();

        let found: Vec<String> = findall(&module, &call).iter().map(Node::code).collect();
        assert_eq!(found, vec!["f(g(a))", "g(a)", "h(b)"]);

        let funcs: Vec<String> = extractall(&module, &call)
            .iter()
            .map(|captures| match &captures["func"] {
                FieldValue::Node(node) => node.code(),
                other => panic!("unexpected capture {other:?}"),
            })
            .collect();
        assert_eq!(funcs, vec!["f", "g", "h"]);
    }

    #[test]
    fn test_replace_sees_replaced_children() {
        let module = parse_module("f(f(x))\n").unwrap();
        // f(arg) becomes arg
        let matcher = Matcher::node(NodeKind::Call)
            .field("func", Matcher::name("f"))
            .field(
                "args",
                Matcher::sequence([Matcher::node(NodeKind::Arg)
                    .field("value", Matcher::any().save("inner"))
                    .into()]),
            )
            .into();

        let mut calls = 0;
        let replaced = replace(&module, &matcher, |_, captures| {
            calls += 1;
            match &captures["inner"] {
                FieldValue::Node(inner) => Ok(Transformed::Keep(inner.clone())),
                other => panic!("unexpected capture {other:?}"),
            }
        })
        .unwrap();

        let Transformed::Keep(replaced) = replaced else {
            panic!("root was not kept");
        };
        assert_eq!(calls, 2);
        assert_eq!(replaced.code(), "x\n");
        assert_eq!(module.code(), "f(f(x))\n");
    }

    #[test]
    fn test_replace_without_matches_keeps_the_tree() {
        let module = parse_module("a = 1\n").unwrap();
        let replaced = replace(&module, &Matcher::name("zzz"), |_, _| Ok(Transformed::Remove)).unwrap();
        assert!(matches!(replaced, Transformed::Keep(node) if node.ptr_eq(&module)));
    }
}
