// src/lexer/tables/conflicts.rs
// Pairwise relationships between the languages of two tokens.

use std::fmt;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

use crate::grammar::{LexicalGrammar, Symbol};
use crate::parser::tables::LookaheadSet;

use super::chars::CharacterSet;
use super::nfa::{LexicalNfa, NfaStateId};
use super::pattern::word_chars;

/// How the strings matched by one token relate to the strings matched by another.
///
/// `status(A, B)` reads "A relative to B".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConflictStatus {
    /// A matches a string that B, starting at the same place, is still skipping as separators.
    pub matches_shorter_string_within_separators: bool,
    /// Some string is matched by both.
    pub matches_same_string: bool,
    /// A can keep going after a complete match of B.
    pub matches_longer_string: bool,
    /// ... and the character that keeps A going may legally follow B.
    pub matches_longer_string_with_valid_next_char: bool,
}

impl ConflictStatus {
    pub const DOES_NOT_MATCH: ConflictStatus = ConflictStatus {
        matches_shorter_string_within_separators: false,
        matches_same_string: false,
        matches_longer_string: false,
        matches_longer_string_with_valid_next_char: false,
    };

    pub fn does_not_match(&self) -> bool {
        *self == Self::DOES_NOT_MATCH
    }

    /// Static analysis cannot tell the two tokens apart; priority must decide.
    pub fn cannot_distinguish(&self) -> bool {
        self.matches_shorter_string_within_separators
            || self.matches_same_string
            || self.matches_longer_string_with_valid_next_char
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.does_not_match() {
            return write!(f, "does-not-match");
        }
        let flags = [
            (self.matches_shorter_string_within_separators, "shorter-within-separators"),
            (self.matches_same_string, "same-string"),
            (self.matches_longer_string, "longer-string"),
            (self.matches_longer_string_with_valid_next_char, "valid-next-char"),
        ];
        let names: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        write!(f, "{}", names.join(" | "))
    }
}

/// A literal made only of `\w` characters.
pub(crate) fn is_word_literal(s: &str) -> bool {
    let word = word_chars();
    !s.is_empty() && s.chars().all(|c| word.contains(c))
}

/// Conflict statuses of every token pair, computed once.
pub(crate) struct TokenConflictMap {
    n: usize,
    status_matrix: Vec<ConflictStatus>,
    following_chars: Vec<CharacterSet>,
    separator_start_chars: CharacterSet,
}

impl TokenConflictMap {
    pub fn new(
        grammar: &LexicalGrammar,
        nfa: &LexicalNfa,
        following_tokens: &HashMap<Symbol, LookaheadSet>,
    ) -> Self {
        let t0 = Instant::now();
        let n = grammar.variables.len();

        let starting_chars: Vec<CharacterSet> = (0..n).map(|i| nfa.main_start_chars(i)).collect();
        let separator_start_chars = (0..n).fold(CharacterSet::empty(), |acc, i| {
            acc.union(&nfa.separator_start_chars(i))
        });

        let following_chars: Vec<CharacterSet> = (0..n)
            .map(|i| {
                let Some(following) = following_tokens.get(&Symbol::terminal(i)) else {
                    return CharacterSet::all();
                };
                let mut chars = separator_start_chars.clone();
                for j in following.terminals().filter(|&j| j < n) {
                    chars = chars.union(&starting_chars[j]);
                }
                // a word-shaped literal ends where the word ends
                if grammar.variables[i].literal().is_some_and(is_word_literal) {
                    chars = chars.difference(&word_chars());
                }
                chars
            })
            .collect();

        let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (0..i).map(move |j| (i, j))).collect();
        let results: Vec<(ConflictStatus, ConflictStatus)> = pairs
            .par_iter()
            .map(|&(i, j)| compute_conflict_status(nfa, &following_chars, i, j))
            .collect();

        let mut status_matrix = vec![ConflictStatus::DOES_NOT_MATCH; n * n];
        for (&(i, j), (ij, ji)) in pairs.iter().zip(results) {
            status_matrix[i * n + j] = ij;
            status_matrix[j * n + i] = ji;
        }

        log::info!(
            "[lex] classified {} token pairs in {} ms",
            pairs.len(),
            t0.elapsed().as_millis()
        );
        Self {
            n,
            status_matrix,
            following_chars,
            separator_start_chars,
        }
    }

    pub fn status(&self, a: usize, b: usize) -> ConflictStatus {
        self.status_matrix[a * self.n + b]
    }

    pub fn following_chars(&self, token: usize) -> &CharacterSet {
        &self.following_chars[token]
    }

    pub fn separator_start_chars(&self) -> &CharacterSet {
        &self.separator_start_chars
    }
}

/// Explores the product automaton of two tokens, separator prefixes included.
/// Returns `(status(i, j), status(j, i))`.
fn compute_conflict_status(
    nfa: &LexicalNfa,
    following_chars: &[CharacterSet],
    i: usize,
    j: usize,
) -> (ConflictStatus, ConflictStatus) {
    let tokens = [i, j];
    let mut result = [ConflictStatus::DOES_NOT_MATCH; 2];

    let seed = nfa
        .nfa
        .closure([nfa.tokens[i].start_state, nfa.tokens[j].start_state]);
    let mut visited: HashSet<Vec<NfaStateId>> = HashSet::new();
    visited.insert(seed.clone());
    let mut stack = vec![seed];

    while let Some(states) = stack.pop() {
        let mut completed = [false; 2];
        for (token, _) in nfa.completions(&states) {
            for k in 0..2 {
                completed[k] |= token == tokens[k];
            }
        }
        if completed[0] && completed[1] {
            result[0].matches_same_string = true;
            result[1].matches_same_string = true;
        }

        for transition in nfa.transitions(&states) {
            let mut continues = [false; 2];
            let mut continues_main = [false; 2];
            for &advance in &transition.advances {
                let owner = nfa.owner(advance);
                for k in 0..2 {
                    if owner == tokens[k] {
                        continues[k] = true;
                        continues_main[k] |= !nfa.is_separator_state(advance);
                    }
                }
            }

            for k in 0..2 {
                let other = 1 - k;
                if !completed[k] || continues[k] || !continues[other] {
                    continue;
                }
                if !continues_main[other] {
                    result[k].matches_shorter_string_within_separators = true;
                } else {
                    result[other].matches_longer_string = true;
                    if transition
                        .characters
                        .does_intersect(&following_chars[tokens[k]])
                    {
                        result[other].matches_longer_string_with_valid_next_char = true;
                    }
                }
            }

            if visited.insert(transition.states.clone()) {
                stack.push(transition.states);
            }
        }
    }

    (result[0], result[1])
}
