// src/lexer/tables/nfa.rs
// One NFA for the whole lexical grammar. States live in a flat arena and are
// referenced by index; every token is expanded backwards from its accept state.

use crate::error::{Error, Result};
use crate::grammar::{LexicalGrammar, Rule, Symbol};

use super::chars::CharacterSet;
use super::pattern::parse_pattern;

pub type NfaStateId = u32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NfaState {
    Advance {
        chars: CharacterSet,
        state_id: NfaStateId,
        is_sep: bool,
        precedence: i32,
    },
    Split(NfaStateId, NfaStateId),
    Accept {
        variable_index: usize,
        precedence: i32,
    },
}

#[derive(Clone, Debug, Default)]
pub struct Nfa {
    pub states: Vec<NfaState>,
}

impl Nfa {
    pub fn last_state_id(&self) -> NfaStateId {
        self.states.len() as NfaStateId - 1
    }

    /// Epsilon closure, sorted. Split states are followed but not kept.
    pub fn closure(&self, seeds: impl IntoIterator<Item = NfaStateId>) -> Vec<NfaStateId> {
        let mut seen = vec![false; self.states.len()];
        let mut stack: Vec<NfaStateId> = seeds.into_iter().collect();
        let mut out = Vec::new();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id as usize], true) {
                continue;
            }
            match &self.states[id as usize] {
                NfaState::Split(a, b) => {
                    stack.push(*a);
                    stack.push(*b);
                }
                _ => out.push(id),
            }
        }
        out.sort_unstable();
        out
    }
}

/// A group of characters that moves a state set to the same target set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NfaTransition {
    pub characters: CharacterSet,
    /// Closure of the targets.
    pub states: Vec<NfaStateId>,
    /// Closure of the targets reached by advancing inside a token's own rule.
    pub main_states: Vec<NfaStateId>,
    /// Closure of the targets reached by advancing through a separator prefix.
    pub separator_states: Vec<NfaStateId>,
    /// The advance states that take this transition.
    pub advances: Vec<NfaStateId>,
    /// Every contributing advance belongs to a separator prefix.
    pub is_separator: bool,
    pub precedence: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenStart {
    /// Entry point including the separator prefix.
    pub start_state: NfaStateId,
    /// Entry point of the token's own rule.
    pub main_start_state: NfaStateId,
}

/// The expanded lexical grammar.
#[derive(Clone, Debug)]
pub struct LexicalNfa {
    pub nfa: Nfa,
    pub tokens: Vec<TokenStart>,
    owners: Vec<usize>,
}

impl LexicalNfa {
    pub fn build(grammar: &LexicalGrammar) -> Result<Self> {
        let separator_rule = if grammar.separators.is_empty() {
            Rule::Blank
        } else {
            let mut separators = grammar.separators.clone();
            separators.push(Rule::Blank);
            Rule::repeat(Rule::choice(separators))
        };

        let mut builder = NfaBuilder {
            nfa: Nfa::default(),
            is_sep: false,
            precedence_stack: Vec::new(),
        };
        let mut tokens = Vec::with_capacity(grammar.variables.len());
        let mut owners = Vec::new();

        for (i, variable) in grammar.variables.iter().enumerate() {
            let unsupported =
                |reason: String| Error::unsupported_rule(Symbol::terminal(i), &variable.name, reason);

            builder.is_sep = false;
            builder.precedence_stack = vec![variable.precedence];
            builder.nfa.states.push(NfaState::Accept {
                variable_index: i,
                precedence: variable.precedence,
            });
            let accept_state = builder.nfa.last_state_id();
            let consumed = builder
                .expand_rule(&variable.rule, accept_state)
                .map_err(unsupported)?;
            let main_start_state = builder.nfa.last_state_id();
            if !consumed || builder.nfa.closure([main_start_state]).contains(&accept_state) {
                return Err(unsupported("the rule matches the empty string".into()));
            }

            if !variable.immediate {
                builder.is_sep = true;
                builder
                    .expand_rule(&separator_rule, main_start_state)
                    .map_err(|reason| unsupported(format!("in separators: {reason}")))?;
            }
            let start_state = builder.nfa.last_state_id();

            owners.resize(builder.nfa.states.len(), i);
            tokens.push(TokenStart {
                start_state,
                main_start_state,
            });
        }

        log::debug!(
            "[lex] expanded {} tokens into {} nfa states",
            tokens.len(),
            builder.nfa.states.len()
        );
        Ok(Self {
            nfa: builder.nfa,
            tokens,
            owners,
        })
    }

    /// Token that owns an NFA state.
    pub fn owner(&self, state: NfaStateId) -> usize {
        self.owners[state as usize]
    }

    pub fn is_separator_state(&self, state: NfaStateId) -> bool {
        matches!(
            self.nfa.states[state as usize],
            NfaState::Advance { is_sep: true, .. }
        )
    }

    /// Tokens accepting in a closed state set, with their precedence.
    pub fn completions<'a>(&'a self, states: &'a [NfaStateId]) -> impl Iterator<Item = (usize, i32)> + 'a {
        states.iter().filter_map(|&s| match &self.nfa.states[s as usize] {
            NfaState::Accept {
                variable_index,
                precedence,
            } => Some((*variable_index, *precedence)),
            _ => None,
        })
    }

    /// Outgoing transitions of a closed state set, split into disjoint character groups
    /// and sorted by character set.
    pub fn transitions(&self, states: &[NfaStateId]) -> Vec<NfaTransition> {
        struct Group {
            chars: CharacterSet,
            advances: Vec<NfaStateId>,
        }

        let mut groups: Vec<Group> = Vec::new();
        for &id in states {
            let NfaState::Advance { chars, .. } = &self.nfa.states[id as usize] else {
                continue;
            };
            let mut remaining = chars.clone();
            let mut split_off = Vec::new();
            for group in groups.iter_mut() {
                if remaining.is_empty() {
                    break;
                }
                let shared = group.chars.intersection(&remaining);
                if shared.is_empty() {
                    continue;
                }
                let rest = group.chars.difference(&shared);
                if !rest.is_empty() {
                    split_off.push(Group {
                        chars: rest,
                        advances: group.advances.clone(),
                    });
                }
                group.chars = shared;
                group.advances.push(id);
                remaining = remaining.difference(&group.chars);
            }
            groups.extend(split_off);
            if !remaining.is_empty() {
                groups.push(Group {
                    chars: remaining,
                    advances: vec![id],
                });
            }
        }

        let mut transitions: Vec<NfaTransition> = groups
            .into_iter()
            .map(|group| {
                let mut is_separator = true;
                let mut precedence = i32::MIN;
                let mut main_targets = Vec::new();
                let mut separator_targets = Vec::new();
                for &id in &group.advances {
                    if let NfaState::Advance {
                        state_id,
                        is_sep,
                        precedence: p,
                        ..
                    } = &self.nfa.states[id as usize]
                    {
                        if *is_sep {
                            separator_targets.push(*state_id);
                        } else {
                            main_targets.push(*state_id);
                        }
                        is_separator &= *is_sep;
                        precedence = precedence.max(*p);
                    }
                }
                let mut advances = group.advances;
                advances.sort_unstable();
                NfaTransition {
                    characters: group.chars,
                    states: self.nfa.closure(main_targets.iter().chain(&separator_targets).copied()),
                    main_states: self.nfa.closure(main_targets),
                    separator_states: self.nfa.closure(separator_targets),
                    advances,
                    is_separator,
                    precedence,
                }
            })
            .collect();
        transitions.sort_by(|a, b| a.characters.cmp(&b.characters));
        transitions
    }

    /// First characters of a token's own rule.
    pub fn main_start_chars(&self, token: usize) -> CharacterSet {
        self.advance_chars(&self.nfa.closure([self.tokens[token].main_start_state]), |_| true)
    }

    /// First characters of the separator prefix of a token.
    pub fn separator_start_chars(&self, token: usize) -> CharacterSet {
        self.advance_chars(&self.nfa.closure([self.tokens[token].start_state]), |is_sep| is_sep)
    }

    /// Every character the token's own rule can consume.
    pub fn token_chars(&self, token: usize) -> CharacterSet {
        let mut out = CharacterSet::empty();
        for (id, state) in self.nfa.states.iter().enumerate() {
            if let NfaState::Advance {
                chars, is_sep: false, ..
            } = state
            {
                if self.owners[id] == token {
                    out = out.union(chars);
                }
            }
        }
        out
    }

    fn advance_chars(&self, states: &[NfaStateId], keep: impl Fn(bool) -> bool) -> CharacterSet {
        let mut out = CharacterSet::empty();
        for &id in states {
            if let NfaState::Advance { chars, is_sep, .. } = &self.nfa.states[id as usize] {
                if keep(*is_sep) {
                    out = out.union(chars);
                }
            }
        }
        out
    }
}

struct NfaBuilder {
    nfa: Nfa,
    is_sep: bool,
    precedence_stack: Vec<i32>,
}

impl NfaBuilder {
    /// Expands `rule` so that it continues into `next_state_id`. On success the rule's entry
    /// is the last pushed state. Returns `false` (and pushes nothing) if the rule consumes nothing.
    fn expand_rule(&mut self, rule: &Rule, mut next_state_id: NfaStateId) -> Result<bool, String> {
        match rule {
            Rule::Blank => Ok(false),
            Rule::String(s) => {
                for c in s.chars().rev() {
                    self.push_advance(CharacterSet::from_char(c), next_state_id);
                    next_state_id = self.nfa.last_state_id();
                }
                Ok(!s.is_empty())
            }
            Rule::CharacterSet(chars) => {
                self.push_advance(chars.clone(), next_state_id);
                Ok(true)
            }
            Rule::Pattern(pattern) => {
                let rule = parse_pattern(pattern).map_err(|e| format!("invalid pattern /{pattern}/: {e}"))?;
                self.expand_rule(&rule, next_state_id)
            }
            Rule::Seq(elements) => {
                let mut result = false;
                for element in elements.iter().rev() {
                    if self.expand_rule(element, next_state_id)? {
                        result = true;
                        next_state_id = self.nfa.last_state_id();
                    }
                }
                Ok(result)
            }
            Rule::Choice(elements) => {
                let mut alternatives = Vec::with_capacity(elements.len());
                for element in elements {
                    if self.expand_rule(element, next_state_id)? {
                        alternatives.push(self.nfa.last_state_id());
                    } else {
                        alternatives.push(next_state_id);
                    }
                }
                alternatives.sort_unstable();
                alternatives.dedup();
                match alternatives.as_slice() {
                    [] => Ok(false),
                    [only] if *only == next_state_id => Ok(false),
                    [_] => Ok(true),
                    [first, rest @ ..] => {
                        let mut current = *first;
                        for &alternative in rest {
                            self.nfa.states.push(NfaState::Split(current, alternative));
                            current = self.nfa.last_state_id();
                        }
                        Ok(true)
                    }
                }
            }
            Rule::Repeat(inner) => {
                // placeholder, patched once the body exists
                self.nfa.states.push(NfaState::Split(0, 0));
                let split_state_id = self.nfa.last_state_id();
                if self.expand_rule(inner, split_state_id)? {
                    let body = self.nfa.last_state_id();
                    self.nfa.states[split_state_id as usize] = NfaState::Split(body, next_state_id);
                    Ok(true)
                } else {
                    self.nfa.states.truncate(split_state_id as usize);
                    Ok(false)
                }
            }
            Rule::Metadata { params, rule } => {
                if let Some(precedence) = params.precedence {
                    self.precedence_stack.push(precedence);
                }
                let result = self.expand_rule(rule, next_state_id);
                if params.precedence.is_some() {
                    self.precedence_stack.pop();
                }
                result
            }
            Rule::Symbol(symbol) => Err(format!("reference to grammar symbol {symbol} inside a token")),
        }
    }

    fn push_advance(&mut self, chars: CharacterSet, state_id: NfaStateId) {
        let precedence = self.precedence_stack.last().copied().unwrap_or(0);
        self.nfa.states.push(NfaState::Advance {
            chars,
            state_id,
            is_sep: self.is_sep,
            precedence,
        });
    }
}
