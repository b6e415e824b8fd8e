// src/parser/tables.rs
// Parse-table data consumed by the lex table builder. Only lookahead information is needed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grammar::{Symbol, SymbolType};

pub type ParseStateId = usize;

/// Tokens that are valid next in some context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookaheadSet {
    symbols: BTreeSet<Symbol>,
}

impl LookaheadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> bool {
        self.symbols.insert(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn contains_end(&self) -> bool {
        self.symbols.contains(&Symbol::end())
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols.iter().copied()
    }

    /// Indices of the terminal members, ascending.
    pub fn terminals(&self) -> impl Iterator<Item = usize> + '_ {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolType::Terminal)
            .map(|s| s.index)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl FromIterator<Symbol> for LookaheadSet {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self {
            symbols: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseState {
    pub id: ParseStateId,
    pub lookahead: LookaheadSet,
}

/// Read-only view of the parse automaton.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseTable {
    pub states: Vec<ParseState>,
}

impl ParseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a state whose id is its position in the table.
    pub fn push_state(&mut self, lookahead: LookaheadSet) -> ParseStateId {
        let id = self.states.len();
        self.states.push(ParseState { id, lookahead });
        id
    }
}
