//! Pre-order traversal over tree-sitter nodes.

use tree_sitter::Node;

/// Visits `root` and its descendants in source order. Returning `false`
/// from `visit` skips the children of that node.
pub fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) {
    let mut cursor = root.walk();
    let mut depth = 0usize;
    let mut descend = visit(cursor.node());
    loop {
        if descend && cursor.goto_first_child() {
            depth += 1;
            descend = visit(cursor.node());
            continue;
        }
        loop {
            if depth == 0 {
                return;
            }
            if cursor.goto_next_sibling() {
                descend = visit(cursor.node());
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// Every node of kind `kind` under `root`, outermost first.
pub fn descendants_of_kind<'t>(root: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk(root, |node| {
        if node.kind() == kind {
            found.push(node);
        }
        true
    });
    found
}
