//! Sub-automaton transformers.
//!
//! Every algebraic construction in the engine (alternation, concatenation,
//! quantification, copying) is built from the transformers in this module.
//! They operate on [`SubList`] views into a single [`NodeList`] and share one
//! contract: the initial node of every sub-list has no incoming edges on
//! entry, and still has none on exit.
//!
//! Transformers that consume a sub-automaton take the [`SubList`] by value.
//! The consumed view must not be reused; its nodes may be left behind as
//! garbage to be collected by `remove_unreachable`.

use rustc_hash::FxHashMap;

use crate::charset::CharSet;
use crate::RenfaError;

use super::node_list::{NodeId, NodeList, NodeSet};
use super::sparse_set::SparseSet;

/// A view of a sub-automaton under construction: an entry node and the set
/// of accepting nodes, all within one [`NodeList`].
#[derive(Debug)]
pub(crate) struct SubList {
    pub(crate) initial: NodeId,
    pub(crate) finals: NodeSet,
}

impl SubList {
    /// True iff the sub-automaton accepts no word at all.
    #[inline]
    pub(crate) fn is_empty_language(&self) -> bool {
        self.finals.is_empty()
    }

    /// True iff the sub-automaton accepts exactly the empty word.
    ///
    /// Sound because normalization makes the initial node unreachable from
    /// every other node: when it is the only final, no non-empty path can
    /// end in an accepting state.
    #[inline]
    pub(crate) fn accepts_only_empty_word(&self) -> bool {
        self.finals.len() == 1 && self.finals.contains(self.initial)
    }
}

/// View the node list's own root automaton as a [`SubList`].
///
/// The final set moves into the view; pair with [`restore_root`].
pub(crate) fn take_root(list: &mut NodeList) -> SubList {
    SubList {
        initial: list.initial(),
        finals: std::mem::take(list.finals_mut()),
    }
}

/// Install a root view produced by [`take_root`] back onto the list.
pub(crate) fn restore_root(list: &mut NodeList, root: SubList) {
    *list.finals_mut() = root.finals;
}

/// Make `base` accept the empty language: detach every outgoing edge of its
/// initial node and clear its final set.
pub(crate) fn make_empty(list: &mut NodeList, base: &mut SubList) -> Result<(), RenfaError> {
    for (to, _) in list.out_snapshot(base.initial) {
        list.unlink(base.initial, to)?;
    }
    base.finals.clear();
    Ok(())
}

/// Replace `base` in place with `replacement`, consuming the latter.
///
/// The replacement's initial node is used only as a label carrier: its
/// outgoing edges are reparented onto `base.initial`, and its membership in
/// the final set maps to `base.initial`.
pub(crate) fn replace_with(
    list: &mut NodeList,
    base: &mut SubList,
    replacement: SubList,
) -> Result<(), RenfaError> {
    make_empty(list, base)?;
    transfer_finals(base, &replacement);
    reparent_initial_edges(list, base.initial, replacement.initial)
}

/// Alter `base` to accept `L(base) ∪ L(alt)`, consuming `alt`.
pub(crate) fn union(
    list: &mut NodeList,
    base: &mut SubList,
    alt: SubList,
) -> Result<(), RenfaError> {
    transfer_finals(base, &alt);
    reparent_initial_edges(list, base.initial, alt.initial)?;
    reuse_final_states(list, base)
}

/// Move each final of `source` into `base.finals`, mapping the source's
/// initial node onto the base's.
fn transfer_finals(base: &mut SubList, source: &SubList) {
    for f in source.finals.iter() {
        if f == source.initial {
            base.finals.insert(base.initial);
        } else {
            base.finals.insert(f);
        }
    }
}

/// Detach the outgoing edges of `from_initial` and re-create them starting
/// at `onto`. Labels merge by union where edges collide.
fn reparent_initial_edges(
    list: &mut NodeList,
    onto: NodeId,
    from_initial: NodeId,
) -> Result<(), RenfaError> {
    for (to, label) in list.out_snapshot(from_initial) {
        list.unlink(from_initial, to)?;
        list.link(onto, to, label)?;
    }
    Ok(())
}

/// Alter `base` to accept `L(base) · L(after)`, consuming `after`.
pub(crate) fn concat(
    list: &mut NodeList,
    base: &mut SubList,
    after: SubList,
) -> Result<(), RenfaError> {
    if base.is_empty_language() {
        return Ok(());
    }
    if after.is_empty_language() {
        return make_empty(list, base);
    }

    // The after-initial serves purely as a label carrier: its outgoing edges
    // are replayed from every final of base, then detached.
    let moved = list.out_snapshot(after.initial);
    for f in base.finals.iter() {
        for (to, label) in &moved {
            list.link(f, *to, label.clone())?;
        }
    }
    for (to, _) in &moved {
        list.unlink(after.initial, *to)?;
    }

    // Base finals survive only when `after` accepts the empty word.
    if !after.finals.contains(after.initial) {
        base.finals.clear();
    }
    for f in after.finals.iter() {
        if f != after.initial {
            base.finals.insert(f);
        }
    }
    Ok(())
}

/// Alter `base` to accept `L(base)⁺`: every non-initial final replays the
/// initial node's outgoing edges.
pub(crate) fn plus(list: &mut NodeList, base: &mut SubList) -> Result<(), RenfaError> {
    let loops = list.out_snapshot(base.initial);
    for f in base.finals.iter() {
        if f == base.initial {
            continue;
        }
        for (to, label) in &loops {
            list.link(f, *to, label.clone())?;
        }
    }
    Ok(())
}

/// Alter `base` to accept `L(base)ⁿ`.
pub(crate) fn repeat(list: &mut NodeList, base: &mut SubList, n: u64) -> Result<(), RenfaError> {
    if n == 0 {
        make_empty(list, base)?;
        base.finals.insert(base.initial);
        return Ok(());
    }
    if n == 1 || base.is_empty_language() || base.accepts_only_empty_word() {
        return Ok(());
    }

    if !base.finals.contains(base.initial) {
        let copy = local_copy(list, base)?;
        for _ in 2..n {
            let fresh = local_copy(list, &copy)?;
            concat(list, base, fresh)?;
        }
        concat(list, base, copy)
    } else {
        // Base accepts the empty word, so plain concatenation would spray
        // O(n²) redundant transitions from every intermediate final. Keep the
        // intermediate finals accepting instead: they already recognize the
        // shorter repetition counts.
        let mut real_finals = base.finals.clone();
        base.finals.remove(base.initial);
        let copy = local_copy(list, base)?;
        for _ in 2..n {
            let fresh = local_copy(list, &copy)?;
            concat(list, base, fresh)?;
            real_finals.extend_from(&base.finals);
        }
        concat(list, base, copy)?;
        real_finals.extend_from(&base.finals);
        base.finals = real_finals;
        Ok(())
    }
}

/// Alter `base` to accept `L(base){min,max}`; `max = None` is unbounded.
///
/// Fails with [`RenfaError::InvalidRange`] when `min > max`.
pub(crate) fn quantify(
    list: &mut NodeList,
    base: &mut SubList,
    min: u64,
    max: Option<u64>,
) -> Result<(), RenfaError> {
    if let Some(m) = max {
        if min > m {
            return Err(RenfaError::InvalidRange(format!(
                "quantifier min {} > max {}",
                min, m
            )));
        }
    }

    if max == Some(0) {
        make_empty(list, base)?;
        base.finals.insert(base.initial);
        return Ok(());
    }

    let mut min = min;
    if base.finals.contains(base.initial) {
        // The language already contains the empty word.
        min = 0;
    }
    if min == 0 {
        base.finals.insert(base.initial);
    }
    if max == Some(1) {
        return Ok(());
    }
    if Some(min) == max {
        return repeat(list, base, min);
    }

    match max {
        Some(m) => {
            let mut copy = local_copy(list, base)?;
            copy.finals.insert(copy.initial);
            repeat(list, &mut copy, m - min)?;
            repeat(list, base, min)?;
            concat(list, base, copy)
        }
        None if min <= 1 => plus(list, base),
        None => {
            let mut copy = local_copy(list, base)?;
            plus(list, &mut copy)?;
            repeat(list, base, min - 1)?;
            concat(list, base, copy)
        }
    }
}

/// Merge childless non-initial finals of `base` into a single shared sink.
///
/// Language-preserving size optimization: all incoming edges of the extra
/// finals are redirected onto one representative.
pub(crate) fn reuse_final_states(
    list: &mut NodeList,
    base: &mut SubList,
) -> Result<(), RenfaError> {
    let childless: Vec<NodeId> = base
        .finals
        .iter()
        .filter(|&f| f != base.initial && list.out(f).is_empty())
        .collect();
    if childless.len() < 2 {
        return Ok(());
    }
    let sink = childless[0];
    for &extra in &childless[1..] {
        for (from, label) in list.incoming_snapshot(extra) {
            list.unlink(from, extra)?;
            list.link(from, sink, label)?;
        }
        base.finals.remove(extra);
    }
    Ok(())
}

/// A detached description of a sub-automaton, used to re-create it inside
/// the same or another node list.
struct Snapshot {
    /// Depth-first preorder over the nodes reachable from the initial.
    order: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId, CharSet)>,
    initial: NodeId,
    /// Finals restricted to the reachable nodes, in final-set order.
    finals: Vec<NodeId>,
}

fn snapshot(list: &NodeList, initial: NodeId, finals: &NodeSet) -> Snapshot {
    let mut seen = SparseSet::new(list.slot_count());
    let mut order = Vec::new();
    let mut edges = Vec::new();
    let mut stack = vec![initial];
    seen.insert(initial.slot());
    while let Some(node) = stack.pop() {
        order.push(node);
        let outs = list.out(node);
        for (to, label) in outs {
            edges.push((node, *to, label.clone()));
        }
        // Reverse push so the first edge is explored first.
        for (to, _) in outs.iter().rev() {
            if seen.insert(to.slot()) {
                stack.push(*to);
            }
        }
    }
    let finals = finals.iter().filter(|f| seen.contains(f.slot())).collect();
    Snapshot {
        order,
        edges,
        initial,
        finals,
    }
}

fn instantiate(dest: &mut NodeList, snap: &Snapshot) -> Result<SubList, RenfaError> {
    let mut map: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    for &old in &snap.order {
        map.insert(old, dest.create_node());
    }
    for (from, to, label) in &snap.edges {
        dest.link(map[from], map[to], label.clone())?;
    }
    let mut finals = NodeSet::new();
    for old in &snap.finals {
        finals.insert(map[old]);
    }
    Ok(SubList {
        initial: map[&snap.initial],
        finals,
    })
}

/// Clone the sub-automaton of `source` into the same list.
///
/// The clone's initial node is freshly created and has no incoming edges,
/// satisfying normalization.
pub(crate) fn local_copy(list: &mut NodeList, source: &SubList) -> Result<SubList, RenfaError> {
    let snap = snapshot(list, source.initial, &source.finals);
    instantiate(list, &snap)
}

/// Clone a sub-automaton from another list into `dest`.
pub(crate) fn copy_from(
    dest: &mut NodeList,
    src_list: &NodeList,
    src_initial: NodeId,
    src_finals: &NodeSet,
) -> Result<SubList, RenfaError> {
    let snap = snapshot(src_list, src_initial, src_finals);
    instantiate(dest, &snap)
}
