// src/lexer/tables/mod.rs
pub mod build;
pub mod chars;
pub mod coincident;
pub mod conflicts;
pub mod dfa;
pub mod io;
pub mod nfa;
pub mod pattern;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grammar::Symbol;
use crate::parser::tables::ParseStateId;

// Re-exports to keep the external API flat.
pub use build::{BuildOptions, LexTableBuilder};
pub use chars::CharacterSet;
pub use coincident::CoincidentTokenIndex;
pub use conflicts::ConflictStatus;
pub use io::{LexTablesInput, load_build_result_json_bytes, load_input_json_bytes, save_build_result_json};

pub type LexStateId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvanceAction {
    pub state: LexStateId,
    /// `false` while skipping separators; the runtime moves the token start past them.
    pub in_main_token: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcceptTokenAction {
    pub symbol: Symbol,
    pub precedence: i32,
    /// Every token accepting here, best first. Empty for end of input.
    #[serde(default)]
    pub candidates: Vec<Symbol>,
}

impl AcceptTokenAction {
    pub fn end_of_input() -> Self {
        Self {
            symbol: Symbol::end(),
            precedence: 0,
            candidates: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LexState {
    /// Disjoint character sets, sorted.
    pub advance_actions: Vec<(CharacterSet, AdvanceAction)>,
    pub accept_action: Option<AcceptTokenAction>,
    pub eof_action: Option<AcceptTokenAction>,
}

impl LexState {
    pub fn advance(&self, c: char) -> Option<AdvanceAction> {
        self.advance_actions
            .iter()
            .find(|(chars, _)| chars.contains(c))
            .map(|(_, action)| *action)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LexTable {
    pub states: Vec<LexState>,
}

impl LexTable {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: LexStateId) -> &LexState {
        &self.states[id]
    }

    /// Runs `text` from state 0 without separators or backtracking and returns the
    /// token accepted at its end. This is how a keyword table is consulted.
    pub fn lookup(&self, text: &str) -> Option<Symbol> {
        let mut state = self.states.first()?;
        for c in text.chars() {
            state = self.state(state.advance(c)?.state);
        }
        state.accept_action.as_ref().map(|a| a.symbol)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub main_table: LexTable,
    pub keyword_table: LexTable,
    pub keyword_capture_token: Option<Symbol>,
    /// Start state in `main_table` for every parse state.
    pub parse_state_lex_states: BTreeMap<ParseStateId, LexStateId>,
}

impl BuildResult {
    /// Resolves a capture-token match to the reserved word it spells, if any.
    pub fn keyword_for(&self, text: &str) -> Option<Symbol> {
        self.keyword_capture_token?;
        self.keyword_table.lookup(text)
    }
}
