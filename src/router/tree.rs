//! Segment tree built from the canonical destination table.

use std::collections::BTreeMap;

use crate::model::{CallRecord, RoutePath};

#[derive(Debug, Clone, Default)]
pub struct RouteNode {
    pub segment: String,
    /// Absent for intermediate nodes nothing navigates to.
    pub record: Option<CallRecord>,
    pub children: BTreeMap<String, RouteNode>,
}

impl RouteNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            record: None,
            children: BTreeMap::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Route tree. The root owns the empty segment and holds the record for `/`.
#[derive(Debug, Clone, Default)]
pub struct RouteTree {
    pub root: RouteNode,
}

impl RouteTree {
    pub fn build(table: &BTreeMap<RoutePath, CallRecord>) -> Self {
        let mut root = RouteNode::new("");
        // BTreeMap iteration is sorted, so insertion order is deterministic.
        for (path, record) in table {
            let mut node = &mut root;
            for segment in path.segments() {
                node = node
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| RouteNode::new(segment));
            }
            node.record = Some(record.clone());
        }
        Self { root }
    }

    pub fn find(&self, path: &RoutePath) -> Option<&RouteNode> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    pub fn is_empty(&self) -> bool {
        self.root.record.is_none() && self.root.children.is_empty()
    }
}
