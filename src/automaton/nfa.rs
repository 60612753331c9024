//! The NFA facade.
//!
//! [`Nfa`] wraps a [`NodeList`] together with its alphabet and exposes the
//! public operations: construction from regex ASTs, word sets and DFAs, the
//! in-place algebra (union, concatenation, quantification), the product
//! construction for intersection, membership testing, word enumeration,
//! finiteness analysis, and a deterministic textual rendering.
//!
//! The engine is single-threaded; an `Nfa` is a mutable value and callers
//! needing parallelism must work on independent copies.

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::charset::CharSet;
use crate::regexp::RegexAst;
use crate::RenfaError;

use super::builders;
use super::dfa::{self, DfaSource};
use super::node_list::{NodeId, NodeList};
use super::trie;

/// Configuration for NFA construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NfaOptions {
    /// Inclusive upper bound of the alphabet. Every edge label and every
    /// compiled character class shares it. Typically `0xFFFF` or `0x10FFFF`.
    pub max_character: u32,
}

/// A nondeterministic finite automaton over character-set-labelled edges.
#[derive(Debug)]
pub struct Nfa {
    list: NodeList,
    max_character: u32,
}

impl Nfa {
    /// The NFA accepting the empty language.
    pub fn empty(options: NfaOptions) -> Nfa {
        Nfa {
            list: NodeList::new(),
            max_character: options.max_character,
        }
    }

    /// Compile a regex AST.
    ///
    /// Accepts an [`Expression`](crate::regexp::Expression), a single
    /// [`Concatenation`](crate::regexp::Concatenation), or a raw alternatives
    /// slice.
    pub fn from_regex<'a, A>(ast: A, options: NfaOptions) -> Result<Nfa, RenfaError>
    where
        A: Into<RegexAst<'a>>,
    {
        crate::regexp::compiler::compile(ast.into(), options)
    }

    /// Build an NFA accepting exactly the given words (sequences of code
    /// points).
    pub fn from_words<W, I>(words: W, options: NfaOptions) -> Result<Nfa, RenfaError>
    where
        W: IntoIterator<Item = I>,
        I: IntoIterator<Item = u32>,
    {
        trie::from_words(words, options)
    }

    /// Mirror an external DFA's transition graph.
    pub fn from_dfa<D: DfaSource>(source: &D) -> Result<Nfa, RenfaError> {
        dfa::from_dfa(source)
    }

    pub(crate) fn from_parts(list: NodeList, max_character: u32) -> Nfa {
        Nfa { list, max_character }
    }

    #[inline]
    pub fn options(&self) -> NfaOptions {
        NfaOptions {
            max_character: self.max_character,
        }
    }

    #[inline]
    pub fn max_character(&self) -> u32 {
        self.max_character
    }

    /// The underlying graph. Read access for collaborators such as the regex
    /// emitter: the initial node, per-node transition maps and the final
    /// predicate are all available here.
    #[inline]
    pub fn nodes(&self) -> &NodeList {
        &self.list
    }

    /// True iff the accepted language is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.finals().is_empty()
    }

    /// True iff the accepted language is a finite set of words.
    ///
    /// Holds when no cycle lies on a path from the initial node to a final
    /// node. Cycles on dead branches don't count.
    pub fn is_finite(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        let live = self.list.backward_reachable();
        let initial = self.list.initial();
        if !live.contains(initial.slot()) {
            return true;
        }

        // Three-color depth-first search restricted to live nodes: a gray
        // target is a cycle that both leaves the initial node and reaches a
        // final.
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let mut color = vec![WHITE; self.list.slot_count()];
        let mut stack: Vec<(NodeId, usize)> = vec![(initial, 0)];
        color[initial.slot()] = GRAY;
        while let Some(top) = stack.len().checked_sub(1) {
            let (node, idx) = stack[top];
            let outs = self.list.out(node);
            if idx >= outs.len() {
                color[node.slot()] = BLACK;
                stack.pop();
                continue;
            }
            stack[top].1 += 1;
            let to = outs[idx].0;
            if !live.contains(to.slot()) {
                continue;
            }
            match color[to.slot()] {
                GRAY => return false,
                WHITE => {
                    color[to.slot()] = GRAY;
                    stack.push((to, 0));
                }
                _ => {}
            }
        }
        true
    }

    /// A fresh NFA accepting the same language, built by unioning `self`
    /// into an empty automaton.
    pub fn copy(&self) -> Result<Nfa, RenfaError> {
        let mut fresh = Nfa::empty(self.options());
        fresh.union(self)?;
        Ok(fresh)
    }

    /// Brute-force membership test.
    ///
    /// Recursive conformance simulation; depth grows with the word length
    /// and branching can revisit states, so this is not a performance path.
    pub fn test(&self, word: &[u32]) -> bool {
        self.accepts_from(self.list.initial(), word)
    }

    fn accepts_from(&self, node: NodeId, word: &[u32]) -> bool {
        match word.split_first() {
            None => self.list.finals().contains(node),
            Some((&cp, rest)) => self
                .list
                .out(node)
                .iter()
                .any(|(to, label)| label.has(cp) && self.accepts_from(*to, rest)),
        }
    }

    /// Lazily enumerate accepted word sets: for each accepting path, the
    /// sequence of edge labels along it, shortest paths first.
    ///
    /// Infinite for infinite languages; callers must bound their consumption.
    pub fn word_sets(&self) -> WordSets<'_> {
        let live = self.list.backward_reachable();
        let mut queue = VecDeque::new();
        let initial = self.list.initial();
        if live.contains(initial.slot()) {
            queue.push_back((initial, Vec::new()));
        }
        WordSets {
            nfa: self,
            live,
            queue,
        }
    }

    /// Lazily enumerate accepted words, expanding each word set through all
    /// combinations of its character sets.
    ///
    /// Infinite for infinite languages; callers must bound their consumption.
    pub fn words(&self) -> Words<'_> {
        Words {
            sets: self.word_sets(),
            current: None,
        }
    }

    fn check_alphabet(&self, other: &Nfa) -> Result<(), RenfaError> {
        if self.max_character != other.max_character {
            return Err(RenfaError::AlphabetMismatch {
                left: self.max_character,
                right: other.max_character,
            });
        }
        Ok(())
    }

    /// Alter `self` to accept `L(self) ∪ L(other)`.
    pub fn union(&mut self, other: &Nfa) -> Result<(), RenfaError> {
        self.check_alphabet(other)?;
        let imported = builders::copy_from(
            &mut self.list,
            &other.list,
            other.list.initial(),
            other.list.finals(),
        )?;
        let mut root = builders::take_root(&mut self.list);
        builders::union(&mut self.list, &mut root, imported)?;
        builders::restore_root(&mut self.list, root);
        Ok(())
    }

    /// Alter `self` to accept `L(self) · L(other)`.
    ///
    /// To concatenate an automaton with itself, use `quantify(2, Some(2))`.
    pub fn concat(&mut self, other: &Nfa) -> Result<(), RenfaError> {
        self.check_alphabet(other)?;
        let imported = builders::copy_from(
            &mut self.list,
            &other.list,
            other.list.initial(),
            other.list.finals(),
        )?;
        let mut root = builders::take_root(&mut self.list);
        builders::concat(&mut self.list, &mut root, imported)?;
        builders::restore_root(&mut self.list, root);
        Ok(())
    }

    /// Alter `self` to accept `L(self){min,max}`; `max = None` is unbounded.
    ///
    /// Fails with [`RenfaError::InvalidRange`] when `min > max`; the
    /// automaton is untouched in that case.
    pub fn quantify(&mut self, min: u64, max: Option<u64>) -> Result<(), RenfaError> {
        if let Some(m) = max {
            if min > m {
                return Err(RenfaError::InvalidRange(format!(
                    "quantifier min {} > max {}",
                    min, m
                )));
            }
        }
        let mut root = builders::take_root(&mut self.list);
        builders::quantify(&mut self.list, &mut root, min, max)?;
        builders::restore_root(&mut self.list, root);
        Ok(())
    }

    /// Product construction: a fresh NFA accepting `L(left) ∩ L(right)`.
    pub fn intersection(left: &Nfa, right: &Nfa) -> Result<Nfa, RenfaError> {
        left.check_alphabet(right)?;

        let left_order = left.list.reachable();
        let right_order = right.list.reachable();
        let mut left_index: FxHashMap<NodeId, u64> = FxHashMap::default();
        for (i, &id) in left_order.iter().enumerate() {
            left_index.insert(id, i as u64);
        }
        let mut right_index: FxHashMap<NodeId, u64> = FxHashMap::default();
        for (i, &id) in right_order.iter().enumerate() {
            right_index.insert(id, i as u64);
        }
        let right_count = right_order.len() as u64;

        let mut list = NodeList::new();
        // Product states are keyed `i_left * |right| + i_right`; (0, 0) is
        // the fresh initial node.
        let mut product: FxHashMap<u64, NodeId> = FxHashMap::default();
        product.insert(0, list.initial());
        if left.list.finals().contains(left_order[0]) && right.list.finals().contains(right_order[0])
        {
            let initial = list.initial();
            list.finals_mut().insert(initial);
        }

        let mut queue: VecDeque<(NodeId, NodeId, NodeId)> = VecDeque::new();
        queue.push_back((left_order[0], right_order[0], list.initial()));
        while let Some((a, b, p)) = queue.pop_front() {
            for (a2, label_a) in left.list.out(a) {
                for (b2, label_b) in right.list.out(b) {
                    let label = label_a.intersect(label_b);
                    if label.is_empty() {
                        continue;
                    }
                    let key = left_index[a2] * right_count + right_index[b2];
                    let q = match product.get(&key) {
                        Some(&q) => q,
                        None => {
                            let q = list.create_node();
                            product.insert(key, q);
                            if left.list.finals().contains(*a2)
                                && right.list.finals().contains(*b2)
                            {
                                list.finals_mut().insert(q);
                            }
                            queue.push_back((*a2, *b2, q));
                            q
                        }
                    };
                    list.link(p, q, label)?;
                }
            }
        }

        list.remove_unreachable()?;
        let mut root = builders::take_root(&mut list);
        builders::reuse_final_states(&mut list, &mut root)?;
        builders::restore_root(&mut list, root);
        Ok(Nfa::from_parts(list, left.max_character))
    }

    /// Prune every state that is unreachable from the initial node or cannot
    /// reach a final state. The only operation that releases node storage
    /// mid-lifetime.
    pub fn remove_unreachable(&mut self) -> Result<(), RenfaError> {
        self.list.remove_unreachable()
    }

    /// Check every structural invariant. Test support.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.list.assert_graph_invariants();
        for &id in &self.list.reachable() {
            for (_, label) in self.list.out(id) {
                assert_eq!(
                    label.maximum(),
                    self.max_character,
                    "edge label alphabet diverges from the automaton's"
                );
            }
        }
    }
}

/// Iterator over accepted word sets. See [`Nfa::word_sets`].
pub struct WordSets<'a> {
    nfa: &'a Nfa,
    live: super::sparse_set::SparseSet,
    queue: VecDeque<(NodeId, Vec<CharSet>)>,
}

impl Iterator for WordSets<'_> {
    type Item = Vec<CharSet>;

    fn next(&mut self) -> Option<Vec<CharSet>> {
        while let Some((node, path)) = self.queue.pop_front() {
            for (to, label) in self.nfa.list.out(node) {
                if !self.live.contains(to.slot()) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(label.clone());
                self.queue.push_back((*to, extended));
            }
            if self.nfa.list.finals().contains(node) {
                return Some(path);
            }
        }
        None
    }
}

/// Iterator over accepted words. See [`Nfa::words`].
pub struct Words<'a> {
    sets: WordSets<'a>,
    current: Option<Odometer>,
}

impl Iterator for Words<'_> {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Vec<u32>> {
        loop {
            if let Some(odometer) = &mut self.current {
                if let Some(word) = odometer.next() {
                    return Some(word);
                }
                self.current = None;
            }
            match self.sets.next() {
                Some(sets) => self.current = Some(Odometer::new(sets)),
                None => return None,
            }
        }
    }
}

/// Enumerates the concrete words of one word set in ascending code-point
/// order, rightmost position fastest.
struct Odometer {
    sets: Vec<CharSet>,
    /// Per position: (range index, current code point).
    state: Vec<(usize, u32)>,
    exhausted: bool,
}

impl Odometer {
    fn new(sets: Vec<CharSet>) -> Odometer {
        let state = sets.iter().map(|s| (0, s.ranges()[0].min)).collect();
        Odometer {
            sets,
            state,
            exhausted: false,
        }
    }

    fn next(&mut self) -> Option<Vec<u32>> {
        if self.exhausted {
            return None;
        }
        let word: Vec<u32> = self.state.iter().map(|&(_, cp)| cp).collect();

        let mut pos = self.state.len();
        loop {
            if pos == 0 {
                self.exhausted = true;
                break;
            }
            pos -= 1;
            let ranges = self.sets[pos].ranges();
            let (range_idx, cp) = &mut self.state[pos];
            if *cp < ranges[*range_idx].max {
                *cp += 1;
                break;
            }
            if *range_idx + 1 < ranges.len() {
                *range_idx += 1;
                *cp = ranges[*range_idx].min;
                break;
            }
            // Carry: reset this position and advance the one before it.
            self.state[pos] = (0, ranges[0].min);
        }
        Some(word)
    }
}

impl fmt::Display for Nfa {
    /// Deterministic multi-line rendering: one stanza per node in
    /// breadth-first order, `(id)` for plain nodes, `[id]` for finals,
    /// `-> none` when a node has no outgoing edges, stanzas separated by a
    /// blank line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = self.list.reachable();
        let mut index: FxHashMap<NodeId, usize> = FxHashMap::default();
        for (i, &id) in order.iter().enumerate() {
            index.insert(id, i);
        }
        let label = |id: NodeId| {
            if self.list.finals().contains(id) {
                format!("[{}]", index[&id])
            } else {
                format!("({})", index[&id])
            }
        };

        let mut stanzas: Vec<String> = Vec::new();
        for &id in &order {
            let head = label(id);
            let outs = self.list.out(id);
            if outs.is_empty() {
                stanzas.push(format!("{} -> none", head));
                continue;
            }
            let mut lines = Vec::with_capacity(outs.len());
            for (k, (to, set)) in outs.iter().enumerate() {
                let lead = if k == 0 {
                    head.clone()
                } else {
                    " ".repeat(head.len())
                };
                lines.push(format!("{} -> {} : {}", lead, label(*to), set));
            }
            stanzas.push(lines.join("\n"));
        }
        write!(f, "{}", stanzas.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharRange;
    use crate::regexp::{CharacterClass, Concatenation, Element};

    const OPTS: NfaOptions = NfaOptions {
        max_character: 0xFFFF,
    };

    fn chr(cp: u32) -> Element {
        Element::CharacterClass(CharacterClass {
            characters: CharSet::single(OPTS.max_character, cp).unwrap(),
        })
    }

    fn literal(word: &str) -> Nfa {
        let concat = Concatenation {
            elements: word.chars().map(|c| chr(c as u32)).collect(),
        };
        Nfa::from_regex(&concat, OPTS).unwrap()
    }

    fn w(s: &str) -> Vec<u32> {
        s.chars().map(|c| c as u32).collect()
    }

    #[test]
    fn test_empty_accepts_nothing() {
        let nfa = Nfa::empty(OPTS);
        assert!(nfa.is_empty());
        assert!(nfa.is_finite());
        assert!(!nfa.test(&[]));
        assert!(!nfa.test(&w("a")));
        assert_eq!(nfa.words().count(), 0);
    }

    #[test]
    fn test_union_and_test() {
        let mut nfa = literal("ab");
        nfa.union(&literal("cd")).unwrap();
        assert!(nfa.test(&w("ab")));
        assert!(nfa.test(&w("cd")));
        assert!(!nfa.test(&w("ad")));
        assert!(!nfa.test(&w("")));
        nfa.assert_invariants();
    }

    #[test]
    fn test_concat_and_test() {
        let mut nfa = literal("ab");
        nfa.concat(&literal("cd")).unwrap();
        assert!(nfa.test(&w("abcd")));
        assert!(!nfa.test(&w("ab")));
        assert!(!nfa.test(&w("cd")));
        nfa.assert_invariants();
    }

    #[test]
    fn test_self_concat_via_quantify() {
        let mut nfa = literal("ab");
        nfa.quantify(2, Some(2)).unwrap();
        assert!(nfa.test(&w("abab")));
        assert!(!nfa.test(&w("ab")));
        assert!(!nfa.test(&w("ababab")));
        nfa.assert_invariants();
    }

    #[test]
    fn test_quantify_rejects_inverted_bounds_without_damage() {
        let mut nfa = literal("a");
        assert!(matches!(
            nfa.quantify(3, Some(1)),
            Err(RenfaError::InvalidRange(_))
        ));
        // The automaton still works.
        assert!(nfa.test(&w("a")));
    }

    #[test]
    fn test_alphabet_mismatch_detected() {
        let mut small = Nfa::empty(NfaOptions { max_character: 0xFF });
        let large = Nfa::empty(OPTS);
        assert_eq!(
            small.union(&large),
            Err(RenfaError::AlphabetMismatch {
                left: 0xFF,
                right: 0xFFFF
            })
        );
    }

    #[test]
    fn test_copy_is_independent() {
        let original = literal("ab");
        let mut copy = original.copy().unwrap();
        copy.union(&literal("z")).unwrap();
        assert!(copy.test(&w("z")));
        assert!(!original.test(&w("z")));
        assert!(original.test(&w("ab")));
        copy.assert_invariants();
    }

    #[test]
    fn test_is_finite() {
        let finite = literal("abc");
        assert!(finite.is_finite());

        let mut infinite = literal("a");
        infinite.quantify(1, None).unwrap();
        assert!(!infinite.is_finite());

        // A cycle that cannot reach a final does not make the language
        // infinite.
        let mut lasso = literal("a");
        lasso.quantify(1, None).unwrap();
        lasso.concat(&Nfa::empty(OPTS)).unwrap();
        assert!(lasso.is_empty());
        assert!(lasso.is_finite());
    }

    #[test]
    fn test_words_enumeration_finite() {
        let mut nfa = literal("ab");
        nfa.union(&literal("c")).unwrap();
        let mut words: Vec<Vec<u32>> = nfa.words().collect();
        words.sort();
        assert_eq!(words, vec![w("ab"), w("c")]);
    }

    #[test]
    fn test_words_enumeration_infinite_prefix() {
        let mut nfa = literal("a");
        nfa.quantify(1, None).unwrap();
        let words: Vec<Vec<u32>> = nfa.words().take(3).collect();
        assert_eq!(words, vec![w("a"), w("aa"), w("aaa")]);
    }

    #[test]
    fn test_word_sets_expand_ranges() {
        let class = Element::CharacterClass(CharacterClass {
            characters: CharSet::from_ranges(
                OPTS.max_character,
                [CharRange::new(0x61, 0x62), CharRange::new(0x64, 0x64)],
            )
            .unwrap(),
        });
        let concat = Concatenation {
            elements: vec![class],
        };
        let nfa = Nfa::from_regex(&concat, OPTS).unwrap();

        let sets: Vec<Vec<CharSet>> = nfa.word_sets().collect();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0][0].to_string(), "61..62, 64");

        let words: Vec<Vec<u32>> = nfa.words().collect();
        assert_eq!(words, vec![vec![0x61], vec![0x62], vec![0x64]]);
    }

    #[test]
    fn test_intersection_empty_when_disjoint() {
        let inter = Nfa::intersection(&literal("ab"), &literal("cd")).unwrap();
        assert!(inter.is_empty());
        inter.assert_invariants();
    }

    #[test]
    fn test_intersection_of_literal_with_itself() {
        let a = literal("ab");
        let inter = Nfa::intersection(&a, &a).unwrap();
        assert!(inter.test(&w("ab")));
        assert!(!inter.test(&w("a")));
        inter.assert_invariants();
    }

    #[test]
    fn test_display_single_node() {
        let nfa = Nfa::empty(OPTS);
        assert_eq!(nfa.to_string(), "(0) -> none");
    }
}
