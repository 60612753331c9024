//! Adapter from an external DFA representation.
//!
//! The DFA itself is a black box behind [`DfaSource`]; this module only
//! mirrors its transition graph into a [`NodeList`]. Each DFA state's
//! outgoing map (range -> target) is inverted into a target-keyed map of
//! accumulated character sets, so that parallel ranges to one target become
//! a single labelled edge.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::charset::{CharRange, CharSet};
use crate::RenfaError;

use super::nfa::Nfa;
use super::node_list::{NodeId, NodeList};

/// Read access to an external deterministic automaton.
///
/// States are dense indices in `[0, state_count)`. The order in which
/// `transitions` reports its entries is the order in which mirror edges are
/// created, so sources should report deterministically.
pub trait DfaSource {
    /// Inclusive upper bound of the DFA's alphabet.
    fn max_character(&self) -> u32;

    fn state_count(&self) -> usize;

    fn initial(&self) -> usize;

    fn is_final(&self, state: usize) -> bool;

    /// Outgoing transitions of `state` as (code-point range, target state).
    fn transitions(&self, state: usize) -> Vec<(CharRange, usize)>;
}

pub(crate) fn from_dfa<D: DfaSource>(source: &D) -> Result<Nfa, RenfaError> {
    let maximum = source.max_character();
    let mut list = NodeList::new();

    // Mirror every reachable DFA state onto its own fresh node. The DFA's
    // start state may have incoming transitions, so it cannot be bound to
    // the list's initial node directly; the initial node mimics it below.
    let mut mirror: FxHashMap<usize, NodeId> = FxHashMap::default();
    let mut queue: VecDeque<usize> = VecDeque::new();
    mirror.insert(source.initial(), list.create_node());
    queue.push_back(source.initial());

    while let Some(state) = queue.pop_front() {
        let node = mirror[&state];
        if source.is_final(state) {
            list.finals_mut().insert(node);
        }

        // Invert the transition map: target-keyed accumulated unions, in
        // first-seen target order.
        let mut inverted: Vec<(usize, CharSet)> = Vec::new();
        for (range, target) in source.transitions(state) {
            let set = CharSet::from_ranges(maximum, [range])?;
            match inverted.iter_mut().find(|(t, _)| *t == target) {
                Some((_, accumulated)) => *accumulated = accumulated.union(&set),
                None => inverted.push((target, set)),
            }
        }

        for (target, set) in inverted {
            let to = match mirror.get(&target) {
                Some(&node) => node,
                None => {
                    let node = list.create_node();
                    mirror.insert(target, node);
                    queue.push_back(target);
                    node
                }
            };
            list.link(node, to, set)?;
        }
    }

    // The initial node replays the mirrored start state's outgoing edges and
    // acceptance, keeping the initial free of incoming edges.
    let start_mirror = mirror[&source.initial()];
    for (to, label) in list.out_snapshot(start_mirror) {
        list.link(list.initial(), to, label)?;
    }
    if source.is_final(source.initial()) {
        let initial = list.initial();
        list.finals_mut().insert(initial);
    }

    Ok(Nfa::from_parts(list, maximum))
}
