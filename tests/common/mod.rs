//! Shared helpers for the integration tests: grammar construction, table building,
//! and a maximal-munch CPU lexer over built tables used as the oracle.
#![allow(dead_code)]

use hashbrown::HashMap;
use lextab::{
    BuildOptions, BuildResult, CoincidentTokenIndex, LexTableBuilder, Result,
    grammar::{LexicalGrammar, LexicalVariable, Rule, Symbol, SyntaxGrammar},
    lexer::tables::LexStateId,
    parser::tables::{LookaheadSet, ParseTable},
};
use rand::{Rng, rngs::StdRng};

pub fn t(i: usize) -> Symbol {
    Symbol::terminal(i)
}

pub fn grammar(variables: Vec<LexicalVariable>) -> LexicalGrammar {
    LexicalGrammar {
        variables,
        separators: vec![Rule::pattern("\\s")],
    }
}

pub fn literal(name: &str) -> LexicalVariable {
    LexicalVariable::new(name, Rule::string(name))
}

pub fn pattern(name: &str, pattern: &str) -> LexicalVariable {
    LexicalVariable::new(name, Rule::pattern(pattern))
}

/// One parse state per entry; `true` marks states where input may end.
pub fn parse_table(states: &[(&[usize], bool)]) -> ParseTable {
    let mut table = ParseTable::new();
    for (tokens, eof) in states {
        let mut lookahead: LookaheadSet = tokens.iter().map(|&i| t(i)).collect();
        if *eof {
            lookahead.insert(Symbol::end());
        }
        table.push_state(lookahead);
    }
    table
}

/// A single parse state in which every token and end of input are valid.
pub fn flat_parse_table(lexical: &LexicalGrammar) -> ParseTable {
    let all: Vec<usize> = (0..lexical.variables.len()).collect();
    parse_table(&[(&all, true)])
}

pub fn build_with(
    syntax: &SyntaxGrammar,
    lexical: &LexicalGrammar,
    table: &ParseTable,
    following: &HashMap<Symbol, LookaheadSet>,
    options: BuildOptions,
) -> Result<BuildResult> {
    let coincident = CoincidentTokenIndex::new(table);
    LexTableBuilder::create_with_options(syntax, lexical, following, &coincident, table, options)?.build()
}

pub fn build(lexical: &LexicalGrammar, table: &ParseTable) -> Result<BuildResult> {
    build_with(
        &SyntaxGrammar::default(),
        lexical,
        table,
        &HashMap::new(),
        BuildOptions::default(),
    )
}

/// Token names and texts of `src` lexed from the start state of `parse_state`.
pub fn lex_names(lexical: &LexicalGrammar, result: &BuildResult, parse_state: usize, src: &str) -> Vec<(String, String)> {
    let start = result.parse_state_lex_states[&parse_state];
    lex_all(result, start, src)
        .unwrap_or_else(|e| panic!("lexing {src:?} failed: {e}"))
        .into_iter()
        .map(|tok| {
            (
                lexical.token_name(tok.symbol).to_string(),
                src[tok.start..tok.start + tok.len].to_string(),
            )
        })
        .collect()
}

const WORDS: &[&str] = &["if", "in", "int", "for", "form", "do", "done", "let", "else"];
const OPERATORS: &[&str] = &["=", "==", "+", "++", "+=", "<", "<=", "<<", "-", "->", "(", ")", ";"];

/// A random grammar of distinct literals plus an identifier and a number token.
pub fn random_grammar(rng: &mut StdRng) -> LexicalGrammar {
    let mut variables = vec![
        pattern("identifier", "[a-z_][a-z0-9_]*"),
        pattern("number", "\\d+"),
    ];
    for pool in [WORDS, OPERATORS] {
        for &text in pool {
            if rng.random_bool(0.6) {
                variables.push(literal(text));
            }
        }
    }
    grammar(variables)
}

/// Random lookahead sets over `n` tokens; every state allows a few tokens.
pub fn random_parse_table(rng: &mut StdRng, n: usize, states: usize) -> ParseTable {
    let mut table = ParseTable::new();
    for _ in 0..states {
        let mut lookahead = LookaheadSet::new();
        for i in 0..n {
            if rng.random_bool(0.35) {
                lookahead.insert(t(i));
            }
        }
        if rng.random_bool(0.3) {
            lookahead.insert(Symbol::end());
        }
        table.push_state(lookahead);
    }
    table
}

// -------------------- CPU oracle --------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuToken {
    pub symbol: Symbol,
    /// Byte offset, separators excluded.
    pub start: usize,
    pub len: usize,
}

fn slice_dbg(src: &str, i: usize) -> (usize, String) {
    let mut lo = i.saturating_sub(16);
    while !src.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (i + 16).min(src.len());
    while !src.is_char_boundary(hi) {
        hi += 1;
    }
    let s = src[lo..hi]
        .chars()
        .map(|c| if c.is_control() && c != '\n' { '·' } else { c })
        .collect();
    (lo, s)
}

/// Lexes the token at byte `pos` starting from `start_state` of the main table.
/// Keyword-shaped matches are resolved through the keyword table.
pub fn lex_one(result: &BuildResult, start_state: LexStateId, input: &str, pos: usize) -> Result<CpuToken, String> {
    let table = &result.main_table;
    let mut state = start_state;
    let mut tok_start = pos;
    let mut cur = pos;
    let mut last: Option<CpuToken> = None;

    loop {
        let lex_state = table.state(state);
        if let Some(accept) = &lex_state.accept_action {
            last = Some(CpuToken {
                symbol: accept.symbol,
                start: tok_start,
                len: cur - tok_start,
            });
        }

        let Some(c) = input[cur..].chars().next() else {
            if last.is_none() && lex_state.eof_action.is_some() {
                return Ok(CpuToken {
                    symbol: Symbol::end(),
                    start: cur,
                    len: 0,
                });
            }
            break;
        };
        let Some(action) = lex_state.advance(c) else {
            break;
        };
        cur += c.len_utf8();
        if !action.in_main_token {
            tok_start = cur;
        }
        state = action.state;
    }

    let Some(mut token) = last else {
        let (ctx_lo, ctx) = slice_dbg(input, cur);
        return Err(format!(
            "no token matches at byte {cur} from lex state {start_state}; context [{}..{}):\n{}",
            ctx_lo,
            ctx_lo + ctx.len(),
            ctx
        ));
    };

    if Some(token.symbol) == result.keyword_capture_token {
        let text = &input[token.start..token.start + token.len];
        if let Some(keyword) = result.keyword_for(text) {
            token.symbol = keyword;
        }
    }
    Ok(token)
}

/// Lexes `input` to the end, always restarting in `start_state`. The end-of-input
/// token is not included.
pub fn lex_all(result: &BuildResult, start_state: LexStateId, input: &str) -> Result<Vec<CpuToken>, String> {
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        let token = lex_one(result, start_state, input, pos)?;
        if token.symbol.is_end() {
            return Ok(out);
        }
        pos = token.start + token.len;
        out.push(token);
    }
}
