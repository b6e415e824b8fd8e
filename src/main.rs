// src/main.rs
// Builds lex tables for a small C-like grammar and prints their shape.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use lextab::{
    BuildOptions, CoincidentTokenIndex, LexTableBuilder,
    grammar::{LexicalGrammar, LexicalVariable, Rule, Symbol, SyntaxGrammar},
    parser::tables::{LookaheadSet, ParseTable},
};

fn demo_grammar() -> LexicalGrammar {
    LexicalGrammar {
        variables: vec![
            LexicalVariable::new("identifier", Rule::pattern("[a-zA-Z_][a-zA-Z0-9_]*")),
            LexicalVariable::new("number", Rule::pattern("\\d+(\\.\\d+)?")),
            LexicalVariable::new("string", Rule::pattern("\"([^\"\\\\\\n]|\\\\.)*\"")),
            LexicalVariable::new("if", Rule::string("if")),
            LexicalVariable::new("else", Rule::string("else")),
            LexicalVariable::new("while", Rule::string("while")),
            LexicalVariable::new("return", Rule::string("return")),
            LexicalVariable::new("=", Rule::string("=")),
            LexicalVariable::new("==", Rule::string("==")),
            LexicalVariable::new("+", Rule::string("+")),
            LexicalVariable::new("(", Rule::string("(")),
            LexicalVariable::new(")", Rule::string(")")),
            LexicalVariable::new("{", Rule::string("{")),
            LexicalVariable::new("}", Rule::string("}")),
            LexicalVariable::new(";", Rule::string(";")),
        ],
        separators: vec![Rule::pattern("\\s"), Rule::pattern("//[^\\n]*")],
    }
}

fn main() -> Result<()> {
    let lexical = demo_grammar();
    let syntax = SyntaxGrammar::default();
    let n = lexical.variables.len();

    // Top level (input may end here), expression starts, and after an expression.
    let all: LookaheadSet = (0..n).map(Symbol::terminal).chain([Symbol::end()]).collect();
    let mut parse_table = ParseTable::new();
    parse_table.push_state(all);
    parse_table.push_state([0, 1, 2, 10].into_iter().map(Symbol::terminal).collect());
    parse_table.push_state([7, 8, 9, 11, 14].into_iter().map(Symbol::terminal).collect());

    let coincident = CoincidentTokenIndex::new(&parse_table);
    let builder = LexTableBuilder::create_with_options(
        &syntax,
        &lexical,
        &HashMap::new(),
        &coincident,
        &parse_table,
        BuildOptions::from_env(),
    )
    .context("preparing lex tables")?;
    let result = builder.build().context("building lex tables")?;

    println!(
        "main table: {} states, keyword table: {} states, capture token: {}",
        result.main_table.len(),
        result.keyword_table.len(),
        result
            .keyword_capture_token
            .map(|s| lexical.token_name(s).to_string())
            .unwrap_or_else(|| "-".into())
    );

    for (parse_state, lex_state) in &result.parse_state_lex_states {
        let state = result.main_table.state(*lex_state);
        let accepts_eof = if state.eof_action.is_some() { ", end of input" } else { "" };
        println!(
            "parse state {parse_state} -> lex state {lex_state} ({} transitions{accepts_eof})",
            state.advance_actions.len()
        );
    }

    println!("KEYWORDS:");
    for word in ["if", "iffy", "while", "returned", "return"] {
        let name = result
            .keyword_for(word)
            .map(|s| lexical.token_name(s))
            .unwrap_or("(identifier)");
        println!("{word:<10} {name}");
    }
    Ok(())
}
