//! Trie construction of an NFA from a set of words.
//!
//! Words sharing a prefix share the corresponding path, so the result is the
//! longest-common-prefix trie of the input; a final merging pass collapses
//! the childless accepting leaves into one shared sink. Words are inserted
//! in sorted order, which makes the trie canonical for a given word set.

use crate::charset::CharSet;
use crate::RenfaError;

use super::builders;
use super::nfa::{Nfa, NfaOptions};
use super::node_list::NodeList;

pub(crate) fn from_words<W, I>(words: W, options: NfaOptions) -> Result<Nfa, RenfaError>
where
    W: IntoIterator<Item = I>,
    I: IntoIterator<Item = u32>,
{
    let maximum = options.max_character;

    let mut collected: Vec<Vec<u32>> = Vec::new();
    for word in words {
        let mut code_points = Vec::new();
        for cp in word {
            if cp > maximum {
                return Err(RenfaError::InvalidCodePoint {
                    code_point: cp,
                    maximum,
                });
            }
            code_points.push(cp);
        }
        collected.push(code_points);
    }
    collected.sort_unstable();
    collected.dedup();

    let mut list = NodeList::new();
    for word in &collected {
        let mut node = list.initial();
        for &cp in word {
            let existing = list
                .out(node)
                .iter()
                .find(|(_, label)| label.has(cp))
                .map(|(to, _)| *to);
            node = match existing {
                Some(next) => next,
                None => {
                    let child = list.create_node();
                    list.link(node, child, CharSet::single(maximum, cp)?)?;
                    child
                }
            };
        }
        let terminal = node;
        list.finals_mut().insert(terminal);
    }

    let mut root = builders::take_root(&mut list);
    builders::reuse_final_states(&mut list, &mut root)?;
    builders::restore_root(&mut list, root);
    Ok(Nfa::from_parts(list, maximum))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTS: NfaOptions = NfaOptions {
        max_character: 0xFFFF,
    };

    fn w(s: &str) -> Vec<u32> {
        s.chars().map(|c| c as u32).collect()
    }

    fn build(words: &[&str]) -> Nfa {
        from_words(words.iter().map(|s| w(s)), OPTS).unwrap()
    }

    #[test]
    fn test_accepts_exactly_the_given_words() {
        let nfa = build(&["foo", "bar", "baz"]);
        assert!(nfa.test(&w("foo")));
        assert!(nfa.test(&w("bar")));
        assert!(nfa.test(&w("baz")));
        assert!(!nfa.test(&w("ba")));
        assert!(!nfa.test(&w("fool")));
        assert!(!nfa.test(&w("")));
    }

    #[test]
    fn test_prefix_word_keeps_inner_final() {
        let nfa = build(&["foo", "food"]);
        assert!(nfa.test(&w("foo")));
        assert!(nfa.test(&w("food")));
        assert!(!nfa.test(&w("fo")));
    }

    #[test]
    fn test_empty_word_makes_initial_final() {
        let nfa = build(&["", "a"]);
        assert!(nfa.test(&[]));
        assert!(nfa.test(&w("a")));
        assert!(!nfa.test(&w("b")));
    }

    #[test]
    fn test_no_words_is_empty_language() {
        let nfa = build(&[]);
        assert!(nfa.is_empty());
        assert!(!nfa.test(&[]));
    }

    #[test]
    fn test_duplicate_words_collapse() {
        let nfa = build(&["dup", "dup"]);
        assert!(nfa.test(&w("dup")));
        assert_eq!(nfa.words().count(), 1);
    }

    #[test]
    fn test_childless_finals_share_a_sink() {
        // r and z diverge at the last step but end in the same sink node.
        let nfa = build(&["bar", "baz"]);
        let sets: Vec<_> = nfa.word_sets().collect();
        assert_eq!(sets.len(), 1);
        let last = sets[0].last().unwrap();
        assert!(last.has('r' as u32));
        assert!(last.has('z' as u32));
    }

    #[test]
    fn test_rejects_out_of_alphabet_code_point() {
        let err = from_words([vec![0x110000u32]], NfaOptions { max_character: 0x10FFFF })
            .unwrap_err();
        assert_eq!(
            err,
            RenfaError::InvalidCodePoint {
                code_point: 0x110000,
                maximum: 0x10FFFF
            }
        );
    }
}
