//! AST-to-NFA compilation.
//!
//! Walks the regex tree recursively, building each subtree as a sub-automaton
//! inside one shared node list and combining them with the sub-list
//! transformers. The compiled root is installed onto the list's initial node
//! at the end, so the resulting automaton is normalized like every other.

use crate::automaton::builders::{self, SubList};
use crate::automaton::{Nfa, NfaOptions, NodeList, NodeSet};
use crate::RenfaError;

use super::{Concatenation, Element, RegexAst};

pub(crate) fn compile(ast: RegexAst<'_>, options: NfaOptions) -> Result<Nfa, RenfaError> {
    let alternatives: &[Concatenation] = match ast {
        RegexAst::Expression(expression) => &expression.alternatives,
        RegexAst::Concatenation(concatenation) => std::slice::from_ref(concatenation),
        RegexAst::Alternatives(alternatives) => alternatives,
    };

    let mut list = NodeList::new();
    let compiled = compile_alternatives(&mut list, alternatives, &options)?;
    let mut root = builders::take_root(&mut list);
    builders::replace_with(&mut list, &mut root, compiled)?;
    builders::restore_root(&mut list, root);
    Ok(Nfa::from_parts(list, options.max_character))
}

/// Compile a list of alternatives: the first becomes the base, the rest are
/// unioned into it. No alternatives at all is the empty language.
fn compile_alternatives(
    list: &mut NodeList,
    alternatives: &[Concatenation],
    options: &NfaOptions,
) -> Result<SubList, RenfaError> {
    let mut iter = alternatives.iter();
    let Some(first) = iter.next() else {
        return Ok(SubList {
            initial: list.create_node(),
            finals: NodeSet::new(),
        });
    };
    let mut base = compile_concatenation(list, first, options)?;
    for alternative in iter {
        let sub = compile_concatenation(list, alternative, options)?;
        builders::union(list, &mut base, sub)?;
    }
    Ok(base)
}

/// Compile a concatenation, threading the final set through each element.
///
/// Once the final set drains (an empty character class was hit), the
/// remaining elements cannot contribute and are skipped.
fn compile_concatenation(
    list: &mut NodeList,
    concatenation: &Concatenation,
    options: &NfaOptions,
) -> Result<SubList, RenfaError> {
    let initial = list.create_node();
    let mut finals = NodeSet::new();
    finals.insert(initial);
    let mut base = SubList { initial, finals };

    for element in &concatenation.elements {
        if base.finals.is_empty() {
            break;
        }
        match element {
            Element::CharacterClass(class) => {
                if class.characters.maximum() != options.max_character {
                    return Err(RenfaError::AlphabetMismatch {
                        left: options.max_character,
                        right: class.characters.maximum(),
                    });
                }
                if class.characters.is_empty() {
                    builders::make_empty(list, &mut base)?;
                    continue;
                }
                let next = list.create_node();
                for f in base.finals.iter() {
                    list.link(f, next, class.characters.clone())?;
                }
                base.finals.clear();
                base.finals.insert(next);
            }
            Element::Alternation(alternation) => {
                let sub = compile_alternatives(list, &alternation.alternatives, options)?;
                builders::concat(list, &mut base, sub)?;
            }
            Element::Quantifier(quantifier) => {
                let mut sub = compile_alternatives(list, &quantifier.alternatives, options)?;
                builders::quantify(list, &mut sub, quantifier.min, quantifier.max)?;
                builders::concat(list, &mut base, sub)?;
            }
            Element::Assertion(_) => {
                return Err(RenfaError::UnsupportedConstruct("assertion"));
            }
        }
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharSet;
    use crate::regexp::{Assertion, AssertionKind, CharacterClass, Quantifier};

    const OPTS: NfaOptions = NfaOptions {
        max_character: 0xFFFF,
    };

    fn class(cp: u32) -> Element {
        Element::CharacterClass(CharacterClass {
            characters: CharSet::single(OPTS.max_character, cp).unwrap(),
        })
    }

    fn concat_of(elements: Vec<Element>) -> Concatenation {
        Concatenation { elements }
    }

    #[test]
    fn test_no_alternatives_is_empty_language() {
        let alternatives: Vec<Concatenation> = Vec::new();
        let nfa = Nfa::from_regex(&alternatives, OPTS).unwrap();
        assert!(nfa.is_empty());
        assert!(!nfa.test(&[]));
    }

    #[test]
    fn test_empty_concatenation_accepts_empty_word() {
        let concatenation = concat_of(vec![]);
        let nfa = Nfa::from_regex(&concatenation, OPTS).unwrap();
        assert!(nfa.test(&[]));
        assert!(!nfa.test(&[0x61]));
    }

    #[test]
    fn test_empty_class_skips_rest_of_concatenation() {
        let empty = Element::CharacterClass(CharacterClass {
            characters: CharSet::empty(OPTS.max_character),
        });
        let concatenation = concat_of(vec![class(0x61), empty, class(0x62)]);
        let nfa = Nfa::from_regex(&concatenation, OPTS).unwrap();
        assert!(nfa.is_empty());
    }

    #[test]
    fn test_class_alphabet_mismatch_rejected() {
        let foreign = Element::CharacterClass(CharacterClass {
            characters: CharSet::single(0xFF, 0x61).unwrap(),
        });
        let concatenation = concat_of(vec![foreign]);
        assert_eq!(
            Nfa::from_regex(&concatenation, OPTS).unwrap_err(),
            RenfaError::AlphabetMismatch {
                left: 0xFFFF,
                right: 0xFF
            }
        );
    }

    #[test]
    fn test_assertion_rejected() {
        let assertion = Element::Assertion(Assertion {
            kind: AssertionKind::Ahead,
            negate: false,
            alternatives: vec![concat_of(vec![class(0x61)])],
        });
        let concatenation = concat_of(vec![assertion]);
        assert_eq!(
            Nfa::from_regex(&concatenation, OPTS).unwrap_err(),
            RenfaError::UnsupportedConstruct("assertion")
        );
    }

    #[test]
    fn test_quantifier_bounds_validated() {
        let quantifier = Element::Quantifier(Quantifier {
            min: 4,
            max: Some(2),
            alternatives: vec![concat_of(vec![class(0x61)])],
        });
        let concatenation = concat_of(vec![quantifier]);
        assert!(matches!(
            Nfa::from_regex(&concatenation, OPTS),
            Err(RenfaError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_alternation_element() {
        use crate::regexp::Alternation;
        let alternation = Element::Alternation(Alternation {
            alternatives: vec![concat_of(vec![class(0x62)]), concat_of(vec![class(0x63)])],
        });
        let concatenation = concat_of(vec![class(0x61), alternation]);
        let nfa = Nfa::from_regex(&concatenation, OPTS).unwrap();
        assert!(nfa.test(&[0x61, 0x62]));
        assert!(nfa.test(&[0x61, 0x63]));
        assert!(!nfa.test(&[0x61]));
        assert!(!nfa.test(&[0x62]));
    }
}
