//! Page tree model
//!
//! Pages live in a [`PageTree`] arena and refer to each other by [`NodeId`].
//! A child owns nothing of its parent: the parent link is just an index, so the
//! tree can be walked upwards without creating reference cycles, and the
//! serialized form (see [`crate::output::PageDocument`]) is built by walking
//! child lists from the root.

mod node;

pub use node::{ElementKind, PageNode, PhaseTiming};

/// Index of a page inside a [`PageTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena of every page created during a crawl
///
/// Nodes are never removed. A node that never received a response is simply
/// never attached, so it is unreachable from the root.
#[derive(Debug, Default)]
pub struct PageTree {
    nodes: Vec<PageNode>,
    root: Option<NodeId>,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the arena without attaching it to its parent
    pub fn insert(&mut self, node: PageNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Appends a node to its parent's children
    ///
    /// Returns false when the node has no parent or is already attached.
    pub fn attach(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(id.0) else {
            return false;
        };
        let Some(parent) = node.parent else {
            return false;
        };
        if node.attached {
            return false;
        }

        self.nodes[id.0].attached = true;
        self.nodes[parent.0].children.push(id);
        true
    }

    pub fn get(&self, id: NodeId) -> Option<&PageNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut PageNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Installs the root, keeping the first one if called twice
    pub fn set_root(&mut self, id: NodeId) {
        if self.root.is_none() {
            self.root = Some(id);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Number of links between `id` and the root
    pub fn level(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            level += 1;
            cursor = self.parent(parent);
        }
        level
    }

    /// Iterates over the nodes reachable from the root, depth first
    pub fn walk(&self) -> impl Iterator<Item = (NodeId, &PageNode)> {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = &self.nodes[id.0];
            stack.extend(node.children.iter().rev().copied());
            Some((id, node))
        })
    }

    /// Total number of nodes created, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
