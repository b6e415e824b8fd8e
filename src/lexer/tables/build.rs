// src/lexer/tables/build.rs
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::grammar::{LexicalGrammar, Symbol, SyntaxGrammar};
use crate::parser::tables::{LookaheadSet, ParseStateId, ParseTable};

use super::coincident::CoincidentTokenIndex;
use super::conflicts::{ConflictStatus, TokenConflictMap, is_word_literal};
use super::dfa::TableBuilder;
use super::nfa::LexicalNfa;
use super::{BuildResult, LexTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Replace reserved words by a capture token in the main table.
    pub extract_keywords: bool,
    /// Share lex start states between parse states whose tokens do not conflict.
    pub merge_compatible_states: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            extract_keywords: true,
            merge_compatible_states: true,
        }
    }
}

impl BuildOptions {
    /// Defaults, switched off by `LEXTAB_NO_KEYWORDS` / `LEXTAB_NO_MERGE`.
    pub fn from_env() -> Self {
        Self {
            extract_keywords: !env_flag_true("LEXTAB_NO_KEYWORDS", false),
            merge_compatible_states: !env_flag_true("LEXTAB_NO_MERGE", false),
        }
    }
}

/// Treat any value other than "0"/"false" (case-insensitive) as true.
fn env_flag_true(var: &str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
        .unwrap_or(default)
}

/// Tokens the lexer must recognize in a start state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct TokenSet {
    tokens: BTreeSet<usize>,
    eof: bool,
}

/// Builds the main and keyword lex tables for a parse table.
///
/// All token pairs are classified in `create`; `build` only runs the subset constructions.
pub struct LexTableBuilder<'a> {
    lexical_grammar: &'a LexicalGrammar,
    syntax_grammar: &'a SyntaxGrammar,
    coincident_tokens: &'a CoincidentTokenIndex,
    parse_table: &'a ParseTable,
    options: BuildOptions,
    /// Terminal extras, valid in every parse state.
    extras: BTreeSet<usize>,
    nfa: LexicalNfa,
    conflicts: TokenConflictMap,
    keyword_capture_token: Option<usize>,
    keywords: BTreeSet<usize>,
}

impl<'a> LexTableBuilder<'a> {
    pub fn create(
        syntax_grammar: &'a SyntaxGrammar,
        lexical_grammar: &'a LexicalGrammar,
        following_tokens: &HashMap<Symbol, LookaheadSet>,
        coincident_tokens: &'a CoincidentTokenIndex,
        parse_table: &'a ParseTable,
    ) -> Result<Self> {
        Self::create_with_options(
            syntax_grammar,
            lexical_grammar,
            following_tokens,
            coincident_tokens,
            parse_table,
            BuildOptions::default(),
        )
    }

    pub fn create_with_options(
        syntax_grammar: &'a SyntaxGrammar,
        lexical_grammar: &'a LexicalGrammar,
        following_tokens: &HashMap<Symbol, LookaheadSet>,
        coincident_tokens: &'a CoincidentTokenIndex,
        parse_table: &'a ParseTable,
        options: BuildOptions,
    ) -> Result<Self> {
        validate(syntax_grammar, lexical_grammar, following_tokens, parse_table)?;

        let t0 = Instant::now();
        let nfa = LexicalNfa::build(lexical_grammar)?;
        let conflicts = TokenConflictMap::new(lexical_grammar, &nfa, following_tokens);

        let mut builder = Self {
            lexical_grammar,
            syntax_grammar,
            coincident_tokens,
            parse_table,
            options,
            extras: syntax_grammar
                .extra_symbols
                .iter()
                .filter(|s| s.is_terminal())
                .map(|s| s.index)
                .collect(),
            nfa,
            conflicts,
            keyword_capture_token: None,
            keywords: BTreeSet::new(),
        };
        if options.extract_keywords {
            builder.extract_keywords();
        }
        log::info!(
            "[lex] prepared {} tokens in {} ms",
            lexical_grammar.variables.len(),
            t0.elapsed().as_millis()
        );
        Ok(builder)
    }

    /// How the language of `a` relates to the language of `b`.
    ///
    /// Panics unless both are terminals of the lexical grammar.
    pub fn get_conflict_status(&self, a: Symbol, b: Symbol) -> ConflictStatus {
        assert!(
            a.is_terminal() && b.is_terminal(),
            "conflict status is only defined for terminals, got {a} and {b}"
        );
        self.conflicts.status(a.index, b.index)
    }

    pub fn keyword_capture_token(&self) -> Option<Symbol> {
        self.keyword_capture_token.map(Symbol::terminal)
    }

    pub fn keywords(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.keywords.iter().map(|&k| Symbol::terminal(k))
    }

    pub fn build(&self) -> Result<BuildResult> {
        let t0 = Instant::now();
        let groups = self.start_token_sets();

        let mut builder = TableBuilder::new(&self.nfa, self.lexical_grammar, |a, b| {
            self.main_table_coincidence(a, b)
        });
        let mut parse_state_lex_states = BTreeMap::new();
        for (set, parse_states) in &groups {
            let seeds = set.tokens.iter().map(|&t| self.nfa.tokens[t].start_state);
            let start = builder.add_start_state(seeds, set.eof);
            for &parse_state in parse_states {
                parse_state_lex_states.insert(parse_state, start);
            }
        }
        let main_table = builder.finish()?;
        log::info!(
            "[lex] main table: {} states from {} start states in {} ms",
            main_table.len(),
            groups.len(),
            t0.elapsed().as_millis()
        );

        let keyword_table = if self.keyword_capture_token.is_some() && !self.keywords.is_empty() {
            let mut builder = TableBuilder::new(&self.nfa, self.lexical_grammar, |a, b| self.coincident_state(a, b));
            let seeds = self.keywords.iter().map(|&k| self.nfa.tokens[k].main_start_state);
            builder.add_start_state(seeds, false);
            builder.finish()?
        } else {
            LexTable::default()
        };
        log::info!("[lex] keyword table: {} states", keyword_table.len());

        Ok(BuildResult {
            main_table,
            keyword_table,
            keyword_capture_token: self.keyword_capture_token(),
            parse_state_lex_states,
        })
    }

    /// Picks the capture token and the reserved words it stands for.
    fn extract_keywords(&mut self) {
        let n = self.lexical_grammar.variables.len();
        let candidates: BTreeSet<usize> = (0..n)
            .filter(|&i| {
                self.lexical_grammar.variables[i]
                    .literal()
                    .is_some_and(is_word_literal)
            })
            .collect();
        if candidates.is_empty() {
            return;
        }

        let capture = match self.syntax_grammar.word_token {
            Some(word) => Some(word.index),
            None => {
                let qualifying: Vec<usize> = (0..n)
                    .filter(|&i| self.can_capture_keywords(i, &candidates))
                    .collect();
                if qualifying.len() > 1 {
                    log::debug!("[lex] {} tokens could capture keywords; extracting none", qualifying.len());
                }
                match qualifying.as_slice() {
                    [only] => Some(*only),
                    _ => None,
                }
            }
        };
        let Some(capture) = capture else {
            return;
        };

        let captured: BTreeSet<usize> = candidates
            .into_iter()
            .filter(|&k| k != capture && self.conflicts.status(capture, k).matches_same_string)
            .collect();
        // A keyword stays a plain token where the capture token would collide
        // with another token valid alongside it.
        let keywords: BTreeSet<usize> = captured
            .iter()
            .copied()
            .filter(|&k| match self.capture_collision(capture, k, &captured) {
                Some(other) => {
                    log::debug!(
                        "[lex] `{}` stays a plain token: `{}` is valid with it and conflicts with `{}`",
                        self.lexical_grammar.variables[k].name,
                        self.lexical_grammar.variables[other].name,
                        self.lexical_grammar.variables[capture].name
                    );
                    false
                }
                None => true,
            })
            .collect();
        if keywords.is_empty() {
            log::debug!(
                "[lex] `{}` captures no keywords",
                self.lexical_grammar.variables[capture].name
            );
            return;
        }
        self.keywords = keywords;
        self.keyword_capture_token = Some(capture);
        log::info!(
            "[lex] capture token `{}` covers {} keywords",
            self.lexical_grammar.variables[capture].name,
            self.keywords.len()
        );
    }

    fn can_capture_keywords(&self, token: usize, candidates: &BTreeSet<usize>) -> bool {
        if candidates.contains(&token) {
            return false;
        }
        if !candidates
            .iter()
            .all(|&k| self.conflicts.status(token, k).matches_same_string)
        {
            return false;
        }
        if self
            .nfa
            .token_chars(token)
            .does_intersect(self.conflicts.separator_start_chars())
        {
            return false;
        }

        // Standing in for a keyword must not change how another token lexes
        // in the states where that keyword is valid.
        for other in 0..self.lexical_grammar.variables.len() {
            if other == token || candidates.contains(&other) {
                continue;
            }
            let status = self.conflicts.status(other, token);
            if !(status.matches_shorter_string_within_separators
                || status.matches_longer_string_with_valid_next_char)
            {
                continue;
            }
            let shadows = candidates
                .iter()
                .any(|&k| self.coincident_state(other, k).is_some());
            if shadows {
                log::debug!(
                    "[lex] `{}` cannot capture keywords: it would shadow `{}`",
                    self.lexical_grammar.variables[token].name,
                    self.lexical_grammar.variables[other].name
                );
                return false;
            }
        }
        true
    }

    /// A token, other than the capture token and the keywords it replaces, that is valid
    /// together with `keyword` and that the capture token cannot be told apart from.
    fn capture_collision(&self, capture: usize, keyword: usize, keywords: &BTreeSet<usize>) -> Option<usize> {
        (0..self.lexical_grammar.variables.len()).find(|&other| {
            other != capture
                && !keywords.contains(&other)
                && self.coincident_state(other, keyword).is_some()
                && (self.conflicts.status(other, capture).cannot_distinguish()
                    || self.conflicts.status(capture, other).cannot_distinguish())
        })
    }

    /// Parse states grouped by the token set their lex start state must recognize,
    /// in order of first appearance.
    fn start_token_sets(&self) -> Vec<(TokenSet, Vec<ParseStateId>)> {
        let mut groups: Vec<(TokenSet, Vec<ParseStateId>)> = Vec::new();
        let mut index: HashMap<TokenSet, usize> = HashMap::new();
        for state in &self.parse_table.states {
            let mut tokens: BTreeSet<usize> = state
                .lookahead
                .terminals()
                .map(|t| match self.keyword_capture_token {
                    Some(capture) if self.keywords.contains(&t) => capture,
                    _ => t,
                })
                .collect();
            tokens.extend(self.extras.iter().copied());
            let set = TokenSet {
                tokens,
                eof: state.lookahead.contains_end(),
            };
            match index.get(&set) {
                Some(&g) => groups[g].1.push(state.id),
                None => {
                    index.insert(set.clone(), groups.len());
                    groups.push((set, vec![state.id]));
                }
            }
        }
        let distinct = groups.len();

        if self.options.merge_compatible_states {
            let mut merged: Vec<(TokenSet, Vec<ParseStateId>)> = Vec::new();
            for (set, states) in groups {
                let target = merged
                    .iter_mut()
                    .find(|(existing, _)| existing.eof == set.eof && self.can_merge(&existing.tokens, &set.tokens));
                match target {
                    Some((existing, existing_states)) => {
                        existing.tokens.extend(set.tokens);
                        existing_states.extend(states);
                    }
                    None => merged.push((set, states)),
                }
            }
            groups = merged;
        }

        log::debug!(
            "[lex] {} parse states, {} distinct token sets, {} start states",
            self.parse_table.states.len(),
            distinct,
            groups.len()
        );
        groups
    }

    fn can_merge(&self, left: &BTreeSet<usize>, right: &BTreeSet<usize>) -> bool {
        let conflicts = |added: &BTreeSet<usize>, existing: &BTreeSet<usize>| {
            added.difference(existing).any(|&a| {
                existing.iter().any(|&e| {
                    self.conflicts.status(a, e).cannot_distinguish()
                        || self.conflicts.status(e, a).cannot_distinguish()
                })
            })
        };
        !conflicts(right, left) && !conflicts(left, right)
    }

    /// The capture token stands for every keyword when checking coincidence in the main table.
    fn main_table_coincidence(&self, a: usize, b: usize) -> Option<ParseStateId> {
        let expand = |t: usize| -> Vec<usize> {
            let mut out = vec![t];
            if self.keyword_capture_token == Some(t) {
                out.extend(self.keywords.iter().copied());
            }
            out
        };
        let left = expand(a);
        let right = expand(b);
        left.iter()
            .flat_map(|&x| right.iter().map(move |&y| (x, y)))
            .filter_map(|(x, y)| self.coincident_state(x, y))
            .min()
    }

    /// A parse state in which both tokens are valid lookahead. Extras are valid everywhere.
    fn coincident_state(&self, a: usize, b: usize) -> Option<ParseStateId> {
        match (self.extras.contains(&a), self.extras.contains(&b)) {
            (true, true) => self.parse_table.states.iter().map(|s| s.id).min(),
            (true, false) => self.first_state_with(b),
            (false, true) => self.first_state_with(a),
            (false, false) => self
                .coincident_tokens
                .example_state(Symbol::terminal(a), Symbol::terminal(b)),
        }
    }

    fn first_state_with(&self, token: usize) -> Option<ParseStateId> {
        self.parse_table
            .states
            .iter()
            .filter(|s| s.lookahead.contains(&Symbol::terminal(token)))
            .map(|s| s.id)
            .min()
    }
}

fn validate(
    syntax_grammar: &SyntaxGrammar,
    lexical_grammar: &LexicalGrammar,
    following_tokens: &HashMap<Symbol, LookaheadSet>,
    parse_table: &ParseTable,
) -> Result<()> {
    let n = lexical_grammar.variables.len();
    let check = |symbol: Symbol, context: &str| {
        if symbol.is_terminal() && symbol.index >= n {
            return Err(Error::invalid_grammar(format!(
                "{context} refers to token {symbol}, but the lexical grammar has {n} tokens"
            )));
        }
        Ok(())
    };

    for state in &parse_table.states {
        for symbol in state.lookahead.iter() {
            check(symbol, &format!("parse state {}", state.id))?;
        }
    }
    for &extra in &syntax_grammar.extra_symbols {
        check(extra, "extra symbol")?;
    }
    if let Some(word) = syntax_grammar.word_token {
        if !word.is_terminal() {
            return Err(Error::invalid_grammar(format!("word token {word} is not a terminal")));
        }
        check(word, "word token")?;
    }
    for (token, following) in following_tokens {
        check(*token, "following-token map")?;
        for symbol in following.iter() {
            check(symbol, &format!("following tokens of {token}"))?;
        }
    }
    Ok(())
}
