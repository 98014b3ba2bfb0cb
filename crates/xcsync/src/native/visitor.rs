//! Visitor pattern for native cursor tree traversal.

use super::ast::{Cursor, CursorCategory};

/// Visitor over a cursor tree, dispatched by node category.
///
/// Every handler receives the node and its parent. Default implementations are
/// no-ops, and `Other` nodes are never dispatched.
pub trait CursorVisitor {
    fn visit_attribute(&mut self, _cursor: &Cursor, _parent: &Cursor) {}
    fn visit_declaration(&mut self, _cursor: &Cursor, _parent: &Cursor) {}
    fn visit_reference(&mut self, _cursor: &Cursor, _parent: &Cursor) {}
    fn visit_statement(&mut self, _cursor: &Cursor, _parent: &Cursor) {}

    /// Called once all children of a declaration have been visited
    fn leave_declaration(&mut self, _cursor: &Cursor) {}
}

/// Depth-first walk over the descendants of `root`
pub fn walk<V: CursorVisitor + ?Sized>(visitor: &mut V, root: &Cursor) {
    for child in &root.children {
        let category = child.kind.category();
        match category {
            CursorCategory::Attribute => visitor.visit_attribute(child, root),
            CursorCategory::Declaration => visitor.visit_declaration(child, root),
            CursorCategory::Reference => visitor.visit_reference(child, root),
            CursorCategory::Statement => visitor.visit_statement(child, root),
            CursorCategory::Other => {}
        }
        walk(visitor, child);
        if category == CursorCategory::Declaration {
            visitor.leave_declaration(child);
        }
    }
}
