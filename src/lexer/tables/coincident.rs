// src/lexer/tables/coincident.rs
use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::grammar::Symbol;
use crate::parser::tables::{ParseStateId, ParseTable};

/// For every unordered pair of tokens, the parse states in which both are valid lookahead.
#[derive(Clone, Debug, Default)]
pub struct CoincidentTokenIndex {
    entries: HashMap<(usize, usize), BTreeSet<ParseStateId>>,
}

impl CoincidentTokenIndex {
    pub fn new(parse_table: &ParseTable) -> Self {
        let mut entries: HashMap<(usize, usize), BTreeSet<ParseStateId>> = HashMap::new();
        for state in &parse_table.states {
            let terminals: Vec<usize> = state.lookahead.terminals().collect();
            for (i, &a) in terminals.iter().enumerate() {
                for &b in &terminals[i + 1..] {
                    entries.entry((a, b)).or_default().insert(state.id);
                }
            }
        }
        log::debug!("[lex] coincident index: {} token pairs", entries.len());
        Self { entries }
    }

    /// Canonical key; `None` for anything but two distinct terminals.
    fn key(a: Symbol, b: Symbol) -> Option<(usize, usize)> {
        if !a.is_terminal() || !b.is_terminal() || a.index == b.index {
            return None;
        }
        Some((a.index.min(b.index), a.index.max(b.index)))
    }

    pub fn contains(&self, a: Symbol, b: Symbol) -> bool {
        Self::key(a, b).is_some_and(|k| self.entries.contains_key(&k))
    }

    /// States where both tokens are valid lookahead.
    ///
    /// Panics when the pair never coincides; callers check `contains` first.
    pub fn states_with(&self, a: Symbol, b: Symbol) -> &BTreeSet<ParseStateId> {
        Self::key(a, b)
            .and_then(|k| self.entries.get(&k))
            .unwrap_or_else(|| panic!("tokens {a} and {b} never coincide"))
    }

    /// Lowest parse state where both tokens are valid lookahead.
    pub fn example_state(&self, a: Symbol, b: Symbol) -> Option<ParseStateId> {
        Self::key(a, b)
            .and_then(|k| self.entries.get(&k))
            .and_then(|states| states.first().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Coincident pairs as `(lower index, higher index)`, in no particular order.
    pub fn pairs(&self) -> impl Iterator<Item = ((usize, usize), &BTreeSet<ParseStateId>)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tables::LookaheadSet;

    fn t(i: usize) -> Symbol {
        Symbol::terminal(i)
    }

    fn table() -> ParseTable {
        let mut table = ParseTable::new();
        table.push_state([t(0), t(1), t(2), Symbol::end()].into_iter().collect::<LookaheadSet>());
        table.push_state([t(1), t(2), Symbol::non_terminal(0)].into_iter().collect());
        table.push_state([t(3)].into_iter().collect());
        table
    }

    #[test]
    fn records_states_per_pair() {
        let index = CoincidentTokenIndex::new(&table());
        assert_eq!(index.len(), 3);
        assert!(index.contains(t(0), t(2)));
        assert!(index.contains(t(2), t(0)));
        assert!(!index.contains(t(0), t(3)));
        assert!(!index.contains(t(1), t(1)));
        assert!(!index.contains(t(0), Symbol::end()));
        assert_eq!(index.states_with(t(2), t(1)), &BTreeSet::from([0, 1]));
        assert_eq!(index.example_state(t(1), t(2)), Some(0));
        assert_eq!(index.example_state(t(0), t(3)), None);
    }

    #[test]
    #[should_panic(expected = "never coincide")]
    fn states_with_unknown_pair_panics() {
        CoincidentTokenIndex::new(&table()).states_with(t(0), t(3));
    }
}
