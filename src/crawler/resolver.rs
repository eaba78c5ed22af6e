//! Parent inference for newly started requests
//!
//! The fetch layer hands out request ids in submission order and tells us the
//! depth of each request, but never which page referenced it. The parent is
//! inferred: it is the most recently *completed* request at a shallower depth,
//! because that is the page whose extracted links triggered the visit.
//!
//! This is a best-effort mapping, not a causal one. Under reordered or
//! concurrent fetching it can pick the wrong parent. Resolution walks ids
//! backwards one by one, so it is linear in the number of requests issued.

use std::collections::BTreeMap;

use crate::tree::NodeId;

/// Request sequence id, assigned from 1 in submission order
pub type RequestId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Completion {
    depth: u32,
    node: NodeId,
}

/// Completion records keyed by request id
#[derive(Debug, Default)]
pub struct ParentResolver {
    completed: BTreeMap<RequestId, Completion>,
}

impl ParentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that request `id` completed at `depth`, producing `node`
    ///
    /// A later record for the same id (the end of a redirect chain) replaces
    /// the earlier one.
    pub fn record(&mut self, id: RequestId, depth: u32, node: NodeId) {
        self.completed.insert(id, Completion { depth, node });
    }

    /// Finds the parent for request `id` started at `depth`
    ///
    /// Returns `None` when no earlier completed request is shallower, which is
    /// the case for the crawl root.
    pub fn resolve(&self, id: RequestId, depth: u32) -> Option<NodeId> {
        let mut candidate = id.checked_sub(1)?;
        while candidate >= 1 {
            if let Some(completion) = self.completed.get(&candidate) {
                if completion.depth < depth {
                    return Some(completion.node);
                }
            }
            candidate -= 1;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}
