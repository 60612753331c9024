//! Node arena for character-set NFAs.
//!
//! A [`NodeList`] owns every node of one automaton for the node's whole life.
//! Nodes are stored in slots and referenced by [`NodeId`], which also carries
//! the identity of its owning list so that cross-list linking is detected
//! instead of silently corrupting two graphs. Edges are kept in
//! insertion-ordered adjacency lists on both endpoints; parallel edges to the
//! same neighbor are merged by label union.
//!
//! The normalization discipline of the whole engine lives here: the initial
//! node never has incoming edges. Construction code relies on it and every
//! transformer re-establishes it.

use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::charset::CharSet;
use crate::RenfaError;

use super::sparse_set::SparseSet;

static NEXT_LIST_ID: AtomicU32 = AtomicU32::new(0);

/// Identifies a node within its owning [`NodeList`].
///
/// Ids are stable: a node keeps its id until it is pruned, and slot indices
/// are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    list: u32,
    index: u32,
}

impl NodeId {
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }
}

type EdgeList = SmallVec<[(NodeId, CharSet); 2]>;

/// An NFA state: insertion-ordered adjacency in both directions.
#[derive(Clone, Debug, Default)]
struct Node {
    outgoing: EdgeList,
    incoming: EdgeList,
}

/// An insertion-ordered set of nodes.
///
/// Used for final-state sets. Iteration order is insertion order, which is
/// what makes identical construction histories render identically.
#[derive(Clone, Debug, Default)]
pub struct NodeSet {
    order: Vec<NodeId>,
    members: FxHashSet<NodeId>,
}

impl NodeSet {
    pub fn new() -> Self {
        NodeSet::default()
    }

    /// Insert a node. Returns false if it was already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        if self.members.insert(id) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    /// Remove a node. Returns false if it was not present.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.members.remove(&id) {
            self.order.retain(|&n| n != id);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// Iterate in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Insert every member of `other`.
    pub fn extend_from(&mut self, other: &NodeSet) {
        for id in other.iter() {
            self.insert(id);
        }
    }
}

/// The container for all nodes of one automaton.
///
/// Names the initial node (created at construction) and the mutable final
/// set. The initial node is never removed.
#[derive(Debug)]
pub struct NodeList {
    id: u32,
    slots: Vec<Option<Node>>,
    initial: NodeId,
    finals: NodeSet,
}

impl NodeList {
    /// Create a list containing only its initial node.
    pub fn new() -> Self {
        let id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        let initial = NodeId { list: id, index: 0 };
        NodeList {
            id,
            slots: vec![Some(Node::default())],
            initial,
            finals: NodeSet::new(),
        }
    }

    #[inline]
    pub fn initial(&self) -> NodeId {
        self.initial
    }

    #[inline]
    pub fn finals(&self) -> &NodeSet {
        &self.finals
    }

    #[inline]
    pub fn finals_mut(&mut self) -> &mut NodeSet {
        &mut self.finals
    }

    /// True if `id` names a live node of this list.
    pub fn contains(&self, id: NodeId) -> bool {
        id.list == self.id
            && self
                .slots
                .get(id.slot())
                .is_some_and(|slot| slot.is_some())
    }

    /// Number of slots ever allocated. Upper bound for traversal sets.
    #[inline]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Create a fresh node with no edges.
    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId {
            list: self.id,
            index: self.slots.len() as u32,
        };
        self.slots.push(Some(Node::default()));
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        self.slots[id.slot()].as_ref().expect("live node")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.slot()].as_mut().expect("live node")
    }

    /// The outgoing edges of a node, in insertion order.
    ///
    /// Panics if `id` is not a live node of this list.
    pub fn out(&self, id: NodeId) -> &[(NodeId, CharSet)] {
        assert!(self.contains(id), "node does not belong to this list");
        &self.node(id).outgoing
    }

    /// The incoming edges of a node, in insertion order.
    ///
    /// Panics if `id` is not a live node of this list.
    pub fn incoming(&self, id: NodeId) -> &[(NodeId, CharSet)] {
        assert!(self.contains(id), "node does not belong to this list");
        &self.node(id).incoming
    }

    /// The label on the edge `from -> to`, if the edge exists.
    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&CharSet> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        self.node(from)
            .outgoing
            .iter()
            .find(|(n, _)| *n == to)
            .map(|(_, label)| label)
    }

    /// Cloned snapshot of a node's outgoing edges.
    pub(crate) fn out_snapshot(&self, id: NodeId) -> Vec<(NodeId, CharSet)> {
        self.node(id).outgoing.iter().cloned().collect()
    }

    /// Cloned snapshot of a node's incoming edges.
    pub(crate) fn incoming_snapshot(&self, id: NodeId) -> Vec<(NodeId, CharSet)> {
        self.node(id).incoming.iter().cloned().collect()
    }

    /// Add an edge `from -> to` labelled `label`.
    ///
    /// If the edge already exists the labels are merged by union; parallel
    /// edges are never created. Fails with [`RenfaError::CrossListLink`] if
    /// either node belongs to another list and [`RenfaError::EmptyLabel`] if
    /// the label is empty.
    pub fn link(&mut self, from: NodeId, to: NodeId, label: CharSet) -> Result<(), RenfaError> {
        if !self.contains(from) || !self.contains(to) {
            return Err(RenfaError::CrossListLink);
        }
        if label.is_empty() {
            return Err(RenfaError::EmptyLabel);
        }
        let existing = self
            .node(from)
            .outgoing
            .iter()
            .position(|(n, _)| *n == to);
        match existing {
            Some(pos) => {
                let merged = self.node(from).outgoing[pos].1.union(&label);
                self.node_mut(from).outgoing[pos].1 = merged.clone();
                let back = self
                    .node(to)
                    .incoming
                    .iter()
                    .position(|(n, _)| *n == from)
                    .expect("adjacency symmetry");
                self.node_mut(to).incoming[back].1 = merged;
            }
            None => {
                self.node_mut(from).outgoing.push((to, label.clone()));
                self.node_mut(to).incoming.push((from, label));
            }
        }
        Ok(())
    }

    /// Remove the edge `from -> to`.
    ///
    /// Fails with [`RenfaError::MissingEdge`] if there is no such edge.
    pub fn unlink(&mut self, from: NodeId, to: NodeId) -> Result<(), RenfaError> {
        if !self.contains(from) || !self.contains(to) {
            return Err(RenfaError::CrossListLink);
        }
        let pos = self
            .node(from)
            .outgoing
            .iter()
            .position(|(n, _)| *n == to)
            .ok_or(RenfaError::MissingEdge)?;
        self.node_mut(from).outgoing.remove(pos);
        let back = self
            .node(to)
            .incoming
            .iter()
            .position(|(n, _)| *n == from)
            .expect("adjacency symmetry");
        self.node_mut(to).incoming.remove(back);
        Ok(())
    }

    /// Every node reachable from the initial node, in breadth-first order
    /// following out-edge insertion order.
    pub fn reachable(&self) -> Vec<NodeId> {
        self.reachable_from(self.initial)
    }

    pub(crate) fn reachable_from(&self, start: NodeId) -> Vec<NodeId> {
        self.forward_reachable(start)
            .iter()
            .map(|slot| self.id_of(slot))
            .collect()
    }

    /// Slot indices forward-reachable from `start` via out-edges.
    fn forward_reachable(&self, start: NodeId) -> SparseSet {
        // The sparse set's dense array doubles as the BFS worklist.
        let mut seen = SparseSet::new(self.slot_count());
        seen.insert(start.slot());
        let mut head = 0;
        while head < seen.len() {
            let node = self.id_of(seen.get(head));
            head += 1;
            for &(to, _) in self.node(node).outgoing.iter() {
                seen.insert(to.slot());
            }
        }
        seen
    }

    /// Slot indices backward-reachable from the final set via in-edges.
    pub(crate) fn backward_reachable(&self) -> SparseSet {
        let mut seen = SparseSet::new(self.slot_count());
        for id in self.finals.iter() {
            seen.insert(id.slot());
        }
        let mut head = 0;
        while head < seen.len() {
            let node = self.id_of(seen.get(head));
            head += 1;
            for &(from, _) in self.node(node).incoming.iter() {
                seen.insert(from.slot());
            }
        }
        seen
    }

    #[inline]
    fn id_of(&self, slot: usize) -> NodeId {
        NodeId {
            list: self.id,
            index: slot as u32,
        }
    }

    /// Reduce to the canonical empty-language form: the initial node with no
    /// edges and an empty final set. Every other node is released.
    fn clear_to_empty(&mut self) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if idx != self.initial.slot() {
                *slot = None;
            }
        }
        let initial = self.node_mut(self.initial);
        initial.outgoing.clear();
        initial.incoming.clear();
        self.finals.clear();
    }

    /// Detach every edge of `id` and release its slot.
    fn delete_node(&mut self, id: NodeId) {
        for (to, _) in self.out_snapshot(id) {
            let back = self
                .node(to)
                .incoming
                .iter()
                .position(|(n, _)| *n == id)
                .expect("adjacency symmetry");
            self.node_mut(to).incoming.remove(back);
        }
        for (from, _) in self.incoming_snapshot(id) {
            if from == id {
                continue; // self-loop already detached above
            }
            let pos = self
                .node(from)
                .outgoing
                .iter()
                .position(|(n, _)| *n == id)
                .expect("adjacency symmetry");
            self.node_mut(from).outgoing.remove(pos);
        }
        self.finals.remove(id);
        self.slots[id.slot()] = None;
    }

    /// Prune every state that is unreachable from the initial node or cannot
    /// reach a final state.
    ///
    /// If the final set is (or becomes) empty, the list is reduced to the
    /// canonical empty-language form instead. The initial node is never
    /// removed; [`RenfaError::InitialRemoval`] guards against it.
    pub fn remove_unreachable(&mut self) -> Result<(), RenfaError> {
        if self.finals.is_empty() {
            self.clear_to_empty();
            return Ok(());
        }

        let forward_set = self.forward_reachable(self.initial);

        let dead_finals: Vec<NodeId> = self
            .finals
            .iter()
            .filter(|id| !forward_set.contains(id.slot()))
            .collect();
        for id in dead_finals {
            self.finals.remove(id);
        }
        if self.finals.is_empty() {
            self.clear_to_empty();
            return Ok(());
        }

        let backward = self.backward_reachable();

        let mut doomed: Vec<NodeId> = Vec::new();
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.is_none() {
                continue;
            }
            let keep = forward_set.contains(idx) && backward.contains(idx);
            if !keep {
                let id = NodeId {
                    list: self.id,
                    index: idx as u32,
                };
                if id == self.initial {
                    return Err(RenfaError::InitialRemoval);
                }
                doomed.push(id);
            }
        }
        for id in doomed {
            self.delete_node(id);
        }
        Ok(())
    }

    /// Check the structural invariants. Test support.
    #[cfg(test)]
    pub(crate) fn assert_graph_invariants(&self) {
        // Normalization: the initial node has no incoming edges.
        assert!(
            self.node(self.initial).incoming.is_empty(),
            "initial node has incoming edges"
        );
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(node) = slot else { continue };
            let id = NodeId {
                list: self.id,
                index: idx as u32,
            };
            for (to, label) in node.outgoing.iter() {
                assert!(!label.is_empty(), "empty edge label");
                assert!(self.contains(*to), "edge to dead node");
                let back = self
                    .node(*to)
                    .incoming
                    .iter()
                    .find(|(n, _)| *n == id)
                    .map(|(_, l)| l);
                assert_eq!(back, Some(label), "adjacency symmetry broken");
            }
            for (from, label) in node.incoming.iter() {
                let fwd = self
                    .node(*from)
                    .outgoing
                    .iter()
                    .find(|(n, _)| *n == id)
                    .map(|(_, l)| l);
                assert_eq!(fwd, Some(label), "adjacency symmetry broken");
            }
        }
        for id in self.finals.iter() {
            assert!(self.contains(id), "final set references dead node");
        }
    }
}

impl Default for NodeList {
    fn default() -> Self {
        Self::new()
    }
}
