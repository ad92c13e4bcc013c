//! Visitor and transformer traversal
//!
//! Both walks are depth-first: the visit hook runs before a node's children
//! (in declared field order), the leave hook runs after them. Returning
//! `false` from a visit hook skips the node's children; its leave hook still
//! runs.
//!
//! [`Transformer`] leave hooks receive the original node and an updated node
//! whose children have already been transformed, and hand back a
//! [`Transformed`]. The engine then resolves removal and flatten sentinels
//! against the parent field:
//!
//! | field            | `Remove`                        | `Flatten(nodes)`          |
//! |------------------|---------------------------------|---------------------------|
//! | required         | `CannotRemoveRequiredField`     | `InvalidFlattenContext`   |
//! | optional         | `None`                          | `InvalidFlattenContext`   |
//! | `MaybeSentinel`  | `MaybeSentinel::Default`        | `InvalidFlattenContext`   |
//! | sequence         | element dropped                 | nodes spliced in place    |
//!
//! When no child changes, the updated node handed to the leave hook is the
//! original allocation.

use crate::error::CstError;
use crate::node::*;
use crate::result::Result;
use crate::sentinel::{MaybeSentinel, Transformed};
use std::sync::Arc;
use tracing::trace;

macro_rules! define_traversal {
    ($($kind:ident($as_kind:ident, $visit:ident, $leave:ident)),* $(,)?) => {
        /// Read-only traversal with per-kind hooks
        pub trait Visitor {
            /// Called before a node's children; `false` skips them
            fn on_visit(&mut self, node: &Node) -> bool {
                match node {
                    $(Node::$kind(inner) => self.$visit(inner),)*
                }
            }

            /// Called after a node's children
            fn on_leave(&mut self, node: &Node) {
                match node {
                    $(Node::$kind(inner) => self.$leave(inner),)*
                }
            }

            $(
                fn $visit(&mut self, _node: &Arc<$kind>) -> bool {
                    true
                }

                fn $leave(&mut self, _node: &Arc<$kind>) {}
            )*
        }

        /// Rebuilding traversal with per-kind hooks
        pub trait Transformer {
            /// Called before a node's children; `false` skips them
            fn on_visit(&mut self, node: &Node) -> bool {
                match node {
                    $(Node::$kind(inner) => self.$visit(inner),)*
                }
            }

            /// Called after a node's children with the rebuilt node
            fn on_leave(&mut self, original: &Node, updated: Node) -> Result<Transformed> {
                match (original, updated) {
                    $((Node::$kind(original), Node::$kind(updated)) => self.$leave(original, updated),)*
                    (_, updated) => Ok(Transformed::Keep(updated)),
                }
            }

            $(
                fn $visit(&mut self, _node: &Arc<$kind>) -> bool {
                    true
                }

                fn $leave(&mut self, _original: &Arc<$kind>, updated: Arc<$kind>) -> Result<Transformed> {
                    Ok(Transformed::Keep(Node::$kind(updated)))
                }
            )*
        }
    };
}

node_kinds!(define_traversal);

impl Node {
    /// Walk this subtree with `visitor`
    pub fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        if visitor.on_visit(self) {
            for child in self.children() {
                child.visit(visitor);
            }
        }
        visitor.on_leave(self);
    }

    /// Transform this subtree, returning whatever the root's leave hook produced
    pub fn transform<T: Transformer + ?Sized>(&self, transformer: &mut T) -> Result<Transformed> {
        let updated = if transformer.on_visit(self) {
            transform_children(self, transformer)?
        } else {
            self.clone()
        };
        transformer.on_leave(self, updated)
    }

    /// Transform a whole tree; the root must come back as a single node
    pub fn transform_root<T: Transformer + ?Sized>(&self, transformer: &mut T) -> Result<Node> {
        match self.transform(transformer)? {
            Transformed::Keep(node) => Ok(node),
            Transformed::Remove | Transformed::Flatten(_) => {
                Err(CstError::InvalidRootResult { kind: self.kind() })
            }
        }
    }
}

fn transform_children<T: Transformer + ?Sized>(node: &Node, transformer: &mut T) -> Result<Node> {
    let mut updates: Vec<(&'static str, FieldValue)> = Vec::new();

    for spec in node.field_specs() {
        if !spec.role.holds_nodes() {
            continue;
        }
        let value = node.field(spec.name).ok_or_else(|| {
            CstError::internal_error(format!("{} has no readable field '{}'", node.kind(), spec.name))
        })?;

        match value {
            FieldValue::Node(child) => match child.transform(transformer)? {
                Transformed::Keep(new) => {
                    if !new.ptr_eq(&child) {
                        updates.push((spec.name, new.into()));
                    }
                }
                Transformed::Remove => {
                    return Err(CstError::CannotRemoveRequiredField {
                        node: node.kind(),
                        field: spec.name,
                    });
                }
                Transformed::Flatten(_) => {
                    return Err(CstError::InvalidFlattenContext {
                        node: node.kind(),
                        field: spec.name,
                    });
                }
            },
            FieldValue::OptionalNode(Some(child)) => match child.transform(transformer)? {
                Transformed::Keep(new) => {
                    if !new.ptr_eq(&child) {
                        updates.push((spec.name, FieldValue::OptionalNode(Some(new))));
                    }
                }
                Transformed::Remove => updates.push((spec.name, FieldValue::OptionalNode(None))),
                Transformed::Flatten(_) => {
                    return Err(CstError::InvalidFlattenContext {
                        node: node.kind(),
                        field: spec.name,
                    });
                }
            },
            FieldValue::MaybeNode(MaybeSentinel::Present(child)) => {
                match child.transform(transformer)? {
                    Transformed::Keep(new) => {
                        if !new.ptr_eq(&child) {
                            updates.push((spec.name, MaybeSentinel::Present(new).into()));
                        }
                    }
                    Transformed::Remove => {
                        updates.push((spec.name, MaybeSentinel::<Node>::Default.into()))
                    }
                    Transformed::Flatten(_) => {
                        return Err(CstError::InvalidFlattenContext {
                            node: node.kind(),
                            field: spec.name,
                        });
                    }
                }
            }
            FieldValue::Nodes(children) => {
                let compact = spec.role == FieldRole::Body;
                let mut changed = false;
                let mut rebuilt = Vec::with_capacity(children.len());
                for child in &children {
                    match child.transform(transformer)? {
                        Transformed::Keep(new) => {
                            if compact && new.is_removable() && !child.is_removable() {
                                changed = true;
                                continue;
                            }
                            changed |= !new.ptr_eq(child);
                            rebuilt.push(new);
                        }
                        Transformed::Remove => changed = true,
                        Transformed::Flatten(nodes) => {
                            changed = true;
                            rebuilt.extend(nodes);
                        }
                    }
                }
                if changed {
                    updates.push((spec.name, rebuilt.into()));
                }
            }
            _ => {}
        }
    }

    if updates.is_empty() {
        return Ok(node.clone());
    }
    trace!(kind = %node.kind(), fields = updates.len(), "rebuilding node");
    node.with_changes(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    #[derive(Default)]
    struct NameCollector {
        names: Vec<String>,
        leaves: usize,
    }

    impl Visitor for NameCollector {
        fn visit_name(&mut self, node: &Arc<Name>) -> bool {
            self.names.push(node.value.clone());
            true
        }

        fn visit_call(&mut self, _node: &Arc<Call>) -> bool {
            false
        }

        fn leave_call(&mut self, _node: &Arc<Call>) {
            self.leaves += 1;
        }
    }

    #[test]
    fn test_visit_order_and_pruning() {
        let module = parse_module("a = b\nf(c)\nd.e\n").unwrap();
        let mut collector = NameCollector::default();
        module.visit(&mut collector);
        assert_eq!(collector.names, vec!["a", "b", "d", "e"]);
        assert_eq!(collector.leaves, 1);
    }

    struct Noop;

    impl Transformer for Noop {}

    #[test]
    fn test_noop_transform_preserves_identity() {
        let module = parse_module("def f(x):\n    return x\n").unwrap();
        let result = module.transform_root(&mut Noop).unwrap();
        assert!(result.ptr_eq(&module));
    }

    struct RenameX;

    impl Transformer for RenameX {
        fn leave_name(&mut self, _original: &Arc<Name>, updated: Arc<Name>) -> Result<Transformed> {
            if updated.value == "x" {
                return Ok(Transformed::Keep(Name::new("renamed").build()?));
            }
            Ok(Transformed::Keep(Node::Name(updated)))
        }
    }

    #[test]
    fn test_rebuild_shares_unchanged_siblings() {
        let module = parse_module("y = 1\nx = 2\n").unwrap();
        let result = module.transform_root(&mut RenameX).unwrap();
        assert_eq!(result.code(), "y = 1\nrenamed = 2\n");

        let before = module.as_module().unwrap();
        let after = result.as_module().unwrap();
        assert!(before.body[0].ptr_eq(&after.body[0]));
        assert!(!before.body[1].ptr_eq(&after.body[1]));
    }

    struct RemoveRoot;

    impl Transformer for RemoveRoot {
        fn leave_module(&mut self, _original: &Arc<Module>, _updated: Arc<Module>) -> Result<Transformed> {
            Ok(Transformed::Remove)
        }
    }

    #[test]
    fn test_root_removal_is_rejected() {
        let module = parse_module("x\n").unwrap();
        let err = module.transform_root(&mut RemoveRoot).unwrap_err();
        assert!(matches!(err, CstError::InvalidRootResult { kind: NodeKind::Module }));
    }

    struct RemoveOptionals;

    impl Transformer for RemoveOptionals {
        fn leave_comma(&mut self, _original: &Arc<Comma>, _updated: Arc<Comma>) -> Result<Transformed> {
            Ok(Transformed::Remove)
        }

        fn leave_integer(&mut self, _original: &Arc<Integer>, _updated: Arc<Integer>) -> Result<Transformed> {
            Ok(Transformed::Remove)
        }
    }

    #[test]
    fn test_remove_on_optional_and_sentinel_fields() {
        let module = parse_module("return 1\nf(a,)\n").unwrap();
        let result = module.transform_root(&mut RemoveOptionals).unwrap();
        assert_eq!(result.code(), "return \nf(a)\n");
    }

    struct FlattenCallee;

    impl Transformer for FlattenCallee {
        fn leave_call(&mut self, _original: &Arc<Call>, updated: Arc<Call>) -> Result<Transformed> {
            Ok(Transformed::flatten([updated.func.clone()]))
        }
    }

    #[test]
    fn test_flatten_outside_sequence_is_rejected() {
        let module = parse_module("f()\n").unwrap();
        let err = module.transform_root(&mut FlattenCallee).unwrap_err();
        assert!(matches!(
            err,
            CstError::InvalidFlattenContext { node: NodeKind::Expr, field: "value" }
        ));
    }
}
