// src/lexer/tables/dfa.rs
// Subset construction: NFA state sets -> lex states.

use std::cmp::Reverse;
use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::grammar::{LexicalGrammar, Symbol};
use crate::parser::tables::ParseStateId;

use super::nfa::{LexicalNfa, NfaStateId};
use super::{AcceptTokenAction, AdvanceAction, LexState, LexStateId, LexTable};

/// A lex state: NFA states inside a token already begun, NFA states still in a
/// separator prefix (no token begun yet), and whether end of input is valid.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StateKey {
    main: Vec<NfaStateId>,
    prefix: Vec<NfaStateId>,
    eof: bool,
}

/// Builds one lex table. `coincide(a, b)` returns a parse state in which tokens `a` and
/// `b` are both valid, used to report ties that priority cannot break.
pub(crate) struct TableBuilder<'a, F> {
    nfa: &'a LexicalNfa,
    grammar: &'a LexicalGrammar,
    coincide: F,
    table: LexTable,
    state_ids: HashMap<StateKey, LexStateId>,
    queue: VecDeque<(LexStateId, StateKey)>,
}

impl<'a, F> TableBuilder<'a, F>
where
    F: Fn(usize, usize) -> Option<ParseStateId>,
{
    pub fn new(nfa: &'a LexicalNfa, grammar: &'a LexicalGrammar, coincide: F) -> Self {
        Self {
            nfa,
            grammar,
            coincide,
            table: LexTable::default(),
            state_ids: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Interns the state entered from `seeds`. `eof` marks states where end of input is valid.
    pub fn add_start_state(&mut self, seeds: impl IntoIterator<Item = NfaStateId>, eof: bool) -> LexStateId {
        let prefix = self.nfa.nfa.closure(seeds);
        self.intern(StateKey {
            main: Vec::new(),
            prefix,
            eof,
        })
    }

    fn intern(&mut self, key: StateKey) -> LexStateId {
        if let Some(&id) = self.state_ids.get(&key) {
            return id;
        }
        let id = self.table.states.len();
        self.table.states.push(LexState::default());
        self.state_ids.insert(key.clone(), id);
        self.queue.push_back((id, key));
        id
    }

    /// Expands every state reachable from the start states, breadth first.
    pub fn finish(mut self) -> Result<LexTable> {
        while let Some((id, key)) = self.queue.pop_front() {
            let accept_action = self.resolve_accept(&key.main)?;

            // Once a token is accepted only that token's text may grow; tokens that
            // would begin after a separator are lexed on the next call.
            let sources = if accept_action.is_some() {
                key.main.clone()
            } else {
                merge_sorted(&key.main, &key.prefix)
            };

            let mut advance_actions = Vec::new();
            for transition in self.nfa.transitions(&sources) {
                if let Some(accept) = &accept_action {
                    if transition.precedence < accept.precedence {
                        continue;
                    }
                }
                let next = self.intern(StateKey {
                    main: transition.main_states,
                    prefix: transition.separator_states,
                    eof: key.eof && transition.is_separator,
                });
                advance_actions.push((
                    transition.characters,
                    AdvanceAction {
                        state: next,
                        in_main_token: !transition.is_separator,
                    },
                ));
            }

            let state = &mut self.table.states[id];
            state.eof_action = (key.eof && accept_action.is_none()).then(AcceptTokenAction::end_of_input);
            state.accept_action = accept_action;
            state.advance_actions = advance_actions;
        }
        Ok(self.table)
    }

    fn resolve_accept(&self, states: &[NfaStateId]) -> Result<Option<AcceptTokenAction>> {
        let is_literal = |token: usize| self.grammar.variables[token].literal().is_some();

        let mut candidates: Vec<(usize, i32)> = self.nfa.completions(states).collect();
        candidates.sort_by_key(|&(token, precedence)| (Reverse(precedence), Reverse(is_literal(token)), token));
        candidates.dedup();

        let Some(&(winner, precedence)) = candidates.first() else {
            return Ok(None);
        };
        for &(other, other_precedence) in &candidates[1..] {
            if other_precedence != precedence || is_literal(other) != is_literal(winner) {
                break;
            }
            if let Some(example_state) = (self.coincide)(winner, other) {
                return Err(Error::AmbiguousTokens {
                    first: Symbol::terminal(winner),
                    first_name: self.grammar.variables[winner].name.clone(),
                    second: Symbol::terminal(other),
                    second_name: self.grammar.variables[other].name.clone(),
                    example_state,
                });
            }
            log::debug!(
                "[lex] `{}` wins over `{}` by declaration order",
                self.grammar.variables[winner].name,
                self.grammar.variables[other].name
            );
        }

        Ok(Some(AcceptTokenAction {
            symbol: Symbol::terminal(winner),
            precedence,
            candidates: candidates.iter().map(|&(t, _)| Symbol::terminal(t)).collect(),
        }))
    }
}

fn merge_sorted(left: &[NfaStateId], right: &[NfaStateId]) -> Vec<NfaStateId> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    out.extend_from_slice(left);
    out.extend_from_slice(right);
    out.sort_unstable();
    out.dedup();
    out
}
