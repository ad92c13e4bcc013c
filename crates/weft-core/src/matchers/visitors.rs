//! Visitors whose hooks are selected by matchers
//!
//! Instead of per-kind hooks, a [`MatcherVisitor`] or [`MatcherTransformer`]
//! holds a list of [`MatchRule`]s, each paired with a closure. A rule fires
//! on nodes matching its matcher, and can be limited to nodes inside (or
//! outside) some other matching node. A node counts as inside a scope it
//! matches itself.

use super::matching::Matching;
use super::{Captures, Matcher};
use crate::metadata::ResolvedMetadata;
use crate::node::{Node, NodeId};
use crate::result::Result;
use crate::sentinel::Transformed;
use crate::visitor::{Transformer, Visitor};

#[derive(Debug, Clone)]
struct Scope {
    matcher: Matcher,
    /// The outermost node on the current path that matched
    entered: Option<NodeId>,
}

impl Scope {
    fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            entered: None,
        }
    }
}

/// When a matcher-selected hook runs
#[derive(Debug, Clone)]
pub struct MatchRule {
    matcher: Matcher,
    inside: Vec<Scope>,
    not_inside: Vec<Scope>,
}

impl MatchRule {
    pub fn new(matcher: impl Into<Matcher>) -> Self {
        Self {
            matcher: matcher.into(),
            inside: Vec::new(),
            not_inside: Vec::new(),
        }
    }

    /// Only fire within a node matching `scope`
    pub fn inside(mut self, scope: impl Into<Matcher>) -> Self {
        self.inside.push(Scope::new(scope.into()));
        self
    }

    /// Never fire within a node matching `scope`
    pub fn not_inside(mut self, scope: impl Into<Matcher>) -> Self {
        self.not_inside.push(Scope::new(scope.into()));
        self
    }

    fn scopes_mut(&mut self) -> impl Iterator<Item = &mut Scope> {
        self.inside.iter_mut().chain(self.not_inside.iter_mut())
    }

    fn enter(&mut self, matching: &Matching<'_>, node: &Node) {
        for scope in self.scopes_mut() {
            if scope.entered.is_none() && matching.matches(node, &scope.matcher) {
                scope.entered = Some(node.id());
            }
        }
    }

    fn exit(&mut self, node: &Node) {
        let id = node.id();
        for scope in self.scopes_mut() {
            if scope.entered == Some(id) {
                scope.entered = None;
            }
        }
    }

    fn fire(&self, matching: &Matching<'_>, node: &Node) -> Option<Captures> {
        let in_scope = self.inside.iter().all(|scope| scope.entered.is_some())
            && self.not_inside.iter().all(|scope| scope.entered.is_none());
        if !in_scope {
            return None;
        }
        matching.extract(node, &self.matcher)
    }
}

type Hook<'h> = Box<dyn FnMut(&Node, &Captures) + 'h>;
type LeaveHook<'h> = Box<dyn FnMut(&Node, Node, &Captures) -> Result<Transformed> + 'h>;

/// Read-only traversal running closures on matching nodes
///
/// ```rust
/// use weft_core::matchers::{MatchRule, Matcher, MatcherVisitor};
/// use weft_core::node::NodeKind;
/// use weft_core::parser::parse_module;
///
/// let module = parse_module("def f():\n    g()\nh()\n").unwrap();
/// let mut seen = Vec::new();
/// {
///     let mut visitor = MatcherVisitor::new().visit_matching(
///         MatchRule::new(Matcher::node(NodeKind::Call)).inside(Matcher::node(NodeKind::FunctionDef)),
///         |node, _| seen.push(node.code()),
///     );
///     module.visit(&mut visitor);
/// }
/// assert_eq!(seen, vec!["g()"]);
/// ```
pub struct MatcherVisitor<'h, 'm> {
    matching: Matching<'m>,
    on_visit: Vec<(MatchRule, Hook<'h>)>,
    on_leave: Vec<(MatchRule, Hook<'h>)>,
}

impl<'h, 'm> MatcherVisitor<'h, 'm> {
    pub fn new() -> Self {
        Self::with_matching(Matching::new())
    }

    pub fn with_metadata(metadata: &'m ResolvedMetadata<'m>) -> Self {
        Self::with_matching(Matching::with_metadata(metadata))
    }

    fn with_matching(matching: Matching<'m>) -> Self {
        Self {
            matching,
            on_visit: Vec::new(),
            on_leave: Vec::new(),
        }
    }

    /// Run `hook` before the children of nodes selected by `rule`
    pub fn visit_matching(
        mut self,
        rule: MatchRule,
        hook: impl FnMut(&Node, &Captures) + 'h,
    ) -> Self {
        self.on_visit.push((rule, Box::new(hook)));
        self
    }

    /// Run `hook` after the children of nodes selected by `rule`
    pub fn leave_matching(
        mut self,
        rule: MatchRule,
        hook: impl FnMut(&Node, &Captures) + 'h,
    ) -> Self {
        self.on_leave.push((rule, Box::new(hook)));
        self
    }
}

impl Default for MatcherVisitor<'_, '_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for MatcherVisitor<'_, '_> {
    fn on_visit(&mut self, node: &Node) -> bool {
        let matching = self.matching;
        for (rule, _) in self.on_visit.iter_mut().chain(self.on_leave.iter_mut()) {
            rule.enter(&matching, node);
        }
        for (rule, hook) in &mut self.on_visit {
            if let Some(captures) = rule.fire(&matching, node) {
                hook(node, &captures);
            }
        }
        true
    }

    fn on_leave(&mut self, node: &Node) {
        let matching = self.matching;
        for (rule, hook) in &mut self.on_leave {
            if let Some(captures) = rule.fire(&matching, node) {
                hook(node, &captures);
            }
        }
        for (rule, _) in self.on_visit.iter_mut().chain(self.on_leave.iter_mut()) {
            rule.exit(node);
        }
    }
}

/// Rebuilding traversal replacing matching nodes through closures
///
/// Rules are matched against the original node. When several rules fire on
/// one node their hooks run in the order they were added, each receiving the
/// previous hook's result, until one removes or flattens the node.
pub struct MatcherTransformer<'h, 'm> {
    matching: Matching<'m>,
    rules: Vec<(MatchRule, LeaveHook<'h>)>,
}

impl<'h, 'm> MatcherTransformer<'h, 'm> {
    pub fn new() -> Self {
        Self {
            matching: Matching::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_metadata(metadata: &'m ResolvedMetadata<'m>) -> Self {
        Self {
            matching: Matching::with_metadata(metadata),
            rules: Vec::new(),
        }
    }

    /// Pass nodes selected by `rule` through `hook` on the way out
    pub fn leave_matching(
        mut self,
        rule: MatchRule,
        hook: impl FnMut(&Node, Node, &Captures) -> Result<Transformed> + 'h,
    ) -> Self {
        self.rules.push((rule, Box::new(hook)));
        self
    }
}

impl Default for MatcherTransformer<'_, '_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for MatcherTransformer<'_, '_> {
    fn on_visit(&mut self, node: &Node) -> bool {
        let matching = self.matching;
        for (rule, _) in &mut self.rules {
            rule.enter(&matching, node);
        }
        true
    }

    fn on_leave(&mut self, original: &Node, updated: Node) -> Result<Transformed> {
        let matching = self.matching;
        let mut fired = Vec::new();
        for (index, (rule, _)) in self.rules.iter_mut().enumerate() {
            if let Some(captures) = rule.fire(&matching, original) {
                fired.push((index, captures));
            }
            rule.exit(original);
        }

        let mut current = updated;
        for (index, captures) in fired {
            let hook = &mut self.rules[index].1;
            match hook(original, current, &captures)? {
                Transformed::Keep(node) => current = node,
                removed => return Ok(removed),
            }
        }
        Ok(Transformed::Keep(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FieldValue, NodeKind};
    use crate::parser::parse_module;

    const SOURCE: &str = "\
a(1)
def f():
    b(2)
    if x:
        c(3)
d(4)
";

    fn function() -> Matcher {
        Matcher::node(NodeKind::FunctionDef).into()
    }

    fn calls(rule: MatchRule) -> Vec<String> {
        let module = parse_module(SOURCE).unwrap();
        let mut seen = Vec::new();
        {
            let mut visitor = MatcherVisitor::new()
                .visit_matching(rule, |node, _| seen.push(node.code()));
            module.visit(&mut visitor);
        }
        seen
    }

    #[test]
    fn test_inside_and_not_inside() {
        let call = || MatchRule::new(Matcher::node(NodeKind::Call));
        assert_eq!(calls(call()), vec!["a(1)", "b(2)", "c(3)", "d(4)"]);
        assert_eq!(calls(call().inside(function())), vec!["b(2)", "c(3)"]);
        assert_eq!(calls(call().not_inside(function())), vec!["a(1)", "d(4)"]);
        assert_eq!(
            calls(call().inside(function()).not_inside(Matcher::node(NodeKind::If))),
            vec!["b(2)"]
        );
    }

    #[test]
    fn test_a_node_is_inside_itself() {
        let module = parse_module(SOURCE).unwrap();
        let mut entered = Vec::new();
        let mut left = Vec::new();
        {
            let rule = MatchRule::new(function()).inside(function());
            let mut visitor = MatcherVisitor::new()
                .visit_matching(rule.clone(), |node, _| entered.push(node.kind()))
                .leave_matching(rule, |node, _| left.push(node.kind()));
            module.visit(&mut visitor);
        }
        assert_eq!(entered, vec![NodeKind::FunctionDef]);
        assert_eq!(left, vec![NodeKind::FunctionDef]);
    }

    #[test]
    fn test_transformer_chains_hooks() {
        let module = parse_module(SOURCE).unwrap();
        let integer = || {
            MatchRule::new(Matcher::node(NodeKind::Integer).field("value", Matcher::any().save("n")))
        };
        let bump = |_: &Node, updated: Node, captures: &Captures| -> Result<Transformed> {
            let FieldValue::Text(value) = &captures["n"] else {
                panic!("integer value is text");
            };
            let current: u32 = updated.code().parse().unwrap();
            assert!(value.parse::<u32>().unwrap() <= current);
            let next = FieldValue::from((current * 10).to_string());
            Ok(Transformed::Keep(updated.with_changes([("value", next)])?))
        };

        let mut transformer = MatcherTransformer::new()
            .leave_matching(integer().inside(function()), bump)
            .leave_matching(integer().not_inside(Matcher::node(NodeKind::If)), bump);
        let rewritten = module.transform_root(&mut transformer).unwrap();

        assert_eq!(
            rewritten.code(),
            "a(10)\ndef f():\n    b(200)\n    if x:\n        c(30)\nd(40)\n"
        );
    }

    #[test]
    fn test_transformer_stops_after_removal() {
        let module = parse_module("x = 1\ny = 2\n").unwrap();
        let mut later = 0;
        {
            let line = || MatchRule::new(Matcher::node(NodeKind::SimpleStatementLine));
            let mut transformer = MatcherTransformer::new()
                .leave_matching(line().inside(Matcher::node(NodeKind::Module)), |original, updated, _| {
                    Ok(if original.code().starts_with('x') {
                        Transformed::Remove
                    } else {
                        Transformed::Keep(updated)
                    })
                })
                .leave_matching(line(), |_, updated, _| {
                    later += 1;
                    Ok(Transformed::Keep(updated))
                });
            let rewritten = module.transform_root(&mut transformer).unwrap();
            assert_eq!(rewritten.code(), "y = 2\n");
        }
        assert_eq!(later, 1);
    }
}
