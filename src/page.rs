//! Arena page tree: stable `NodeId` handles over a mutable content tree.
//! The scanner and annotator only see this abstraction (enumerate, get text,
//! replace content, get/set attributes), which keeps the core pipeline
//! independent of any concrete rendering environment.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

/// Scan lifecycle tag for a content block.
/// Transitions are monotonic: untagged → `Pending` → one terminal state.
/// A terminal tag is never cleared by the pipeline; only removal of the node
/// from the page ends the block's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScanState {
    Pending,
    Done,
    Error,
    SkippedNoTargetMatch,
    SkippedFuzzyFail,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScanState::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Pending => "pending",
            ScanState::Done => "done",
            ScanState::Error => "error",
            ScanState::SkippedNoTargetMatch => "skipped_no_target_match",
            ScanState::SkippedFuzzyFail => "skipped_fuzzy_fail",
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a node in the arena. Stable for the lifetime of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

enum NodeData {
    Element {
        tag: String,
        attrs: HashMap<String, String>,
        scan_state: Option<ScanState>,
    },
    Text(String),
}

struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The page's content tree. Nodes are never freed; a detached node is simply
/// unreachable from the root, mirroring how a removed page region is
/// abandoned rather than destroyed.
pub struct PageTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl PageTree {
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.element("body");
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element node.
    pub fn element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: HashMap::new(),
            scan_state: None,
        })
    }

    /// Create a detached text node.
    pub fn text(&mut self, content: &str) -> NodeId {
        self.push(NodeData::Text(content.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `sibling` directly after `node` under the same parent.
    /// No-op when `node` is detached or the root.
    pub fn insert_after(&mut self, node: NodeId, sibling: NodeId) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        let pos = children.iter().position(|&c| c == node).map(|p| p + 1);
        if let Some(pos) = pos {
            children.insert(pos, sibling);
            self.nodes[sibling.0].parent = Some(parent);
        }
    }

    /// Replace `node` in its parent's child list with `replacements`.
    /// The old node becomes detached.
    pub fn replace_with(&mut self, node: NodeId, replacements: Vec<NodeId>) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|&c| c == node) else {
            return;
        };
        children.splice(pos..=pos, replacements.iter().copied());
        self.nodes[node.0].parent = None;
        for &r in &replacements {
            self.nodes[r.0].parent = Some(parent);
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Text(_))
    }

    pub fn text_value(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(t) => Some(t),
            NodeData::Element { .. } => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id.0].parent?;
        let children = &self.nodes[parent.0].children;
        let pos = children.iter().position(|&c| c == id)?;
        children.get(pos + 1).copied()
    }

    /// Preorder descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    /// Flattened text content of the subtree rooted at `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeData::Text(t) = &self.nodes[id.0].data {
            out.push_str(t);
        }
        for n in self.descendants(id) {
            if let NodeData::Text(t) = &self.nodes[n.0].data {
                out.push_str(t);
            }
        }
        out
    }

    /// Whether `id` or any ancestor carries the given attribute.
    pub fn in_subtree_with_attr(&self, id: NodeId, name: &str) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if self.attr(n, name).is_some() {
                return true;
            }
            cur = self.nodes[n.0].parent;
        }
        false
    }

    pub fn scan_state(&self, id: NodeId) -> Option<ScanState> {
        match &self.nodes[id.0].data {
            NodeData::Element { scan_state, .. } => *scan_state,
            NodeData::Text(_) => None,
        }
    }

    /// Single setter enforcing monotonic scan-state transitions.
    /// Returns false (and leaves the tag untouched) for any attempt to
    /// re-enter or clear a terminal state.
    pub fn set_scan_state(&mut self, id: NodeId, state: ScanState) -> bool {
        let NodeData::Element { scan_state, tag, .. } = &mut self.nodes[id.0].data else {
            return false;
        };
        match *scan_state {
            None => {
                *scan_state = Some(state);
                true
            }
            Some(ScanState::Pending) if state.is_terminal() => {
                *scan_state = Some(state);
                true
            }
            Some(current) => {
                warn!(
                    tag = tag.as_str(),
                    from = %current,
                    to = %state,
                    "rejected scan-state transition"
                );
                false
            }
        }
    }
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with_text(tree: &mut PageTree, tag: &str, text: &str) -> NodeId {
        let el = tree.element(tag);
        let t = tree.text(text);
        tree.append_child(el, t);
        let root = tree.root();
        tree.append_child(root, el);
        el
    }

    #[test]
    fn text_content_flattens_nested_nodes() {
        let mut tree = PageTree::new();
        let p = block_with_text(&mut tree, "p", "中国");
        let em = tree.element("em");
        let inner = tree.text("是一个大国");
        tree.append_child(em, inner);
        tree.append_child(p, em);
        assert_eq!(tree.text_content(p), "中国是一个大国");
    }

    #[test]
    fn scan_state_is_monotonic() {
        let mut tree = PageTree::new();
        let p = block_with_text(&mut tree, "p", "你好");
        assert!(tree.set_scan_state(p, ScanState::Pending));
        assert!(!tree.set_scan_state(p, ScanState::Pending));
        assert!(tree.set_scan_state(p, ScanState::Done));
        // Terminal state can never be re-entered or replaced.
        assert!(!tree.set_scan_state(p, ScanState::Error));
        assert!(!tree.set_scan_state(p, ScanState::Pending));
        assert_eq!(tree.scan_state(p), Some(ScanState::Done));
    }

    #[test]
    fn replace_with_splices_children_in_place() {
        let mut tree = PageTree::new();
        let p = block_with_text(&mut tree, "p", "abc");
        let old = tree.children(p)[0];
        let before = tree.text("a");
        let span = tree.element("span");
        let after = tree.text("c");
        tree.replace_with(old, vec![before, span, after]);
        assert_eq!(tree.children(p), &[before, span, after]);
        assert_eq!(tree.parent(span), Some(p));
        assert_eq!(tree.parent(old), None);
    }

    #[test]
    fn insert_after_places_sibling() {
        let mut tree = PageTree::new();
        let p = block_with_text(&mut tree, "p", "原文");
        let div = tree.element("div");
        tree.insert_after(p, div);
        let root = tree.root();
        assert_eq!(tree.children(root), &[p, div]);
        assert_eq!(tree.next_sibling(p), Some(div));
    }
}
