use crate::expand::ExpansionState;
use crate::forest::SpanNode;
use crate::row::Row;

/// Collapsed nodes still emit their own row; only the subtree is
/// withheld.
pub fn flatten(forest: &[SpanNode], expansion: &ExpansionState) -> Vec<Row> {
    let mut rows = Vec::new();
    for root in forest {
        visit(root, 0, expansion, &mut rows);
    }
    rows
}

fn visit(node: &SpanNode, depth: usize, expansion: &ExpansionState, rows: &mut Vec<Row>) {
    let expanded = expansion.is_expanded(node.span_id());
    rows.push(Row {
        record: node.record.clone(),
        depth,
        has_children: !node.children.is_empty(),
        expanded,
    });
    if expanded {
        for child in &node.children {
            visit(child, depth + 1, expansion, rows);
        }
    }
}
