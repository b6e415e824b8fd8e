//! End-to-end table construction: keywords, ambiguity, priorities and determinism.

mod common;

use std::collections::BTreeSet;

use common::*;
use hashbrown::HashMap;
use lextab::{
    BuildOptions, CoincidentTokenIndex, Error, LexTableBuilder,
    grammar::{LexicalVariable, Rule, Symbol, SyntaxGrammar},
    lexer::tables::{BuildResult, LexStateId, save_build_result_json},
};
use rand::{SeedableRng, rngs::StdRng};

/// Token accepted by the main table after consuming all of `text` from `start`.
fn main_table_accepts(result: &BuildResult, start: LexStateId, text: &str) -> Option<Symbol> {
    let table = &result.main_table;
    let mut state = table.state(start);
    for c in text.chars() {
        state = table.state(state.advance(c)?.state);
    }
    state.accept_action.as_ref().map(|a| a.symbol)
}

fn keyword_grammar() -> lextab::grammar::LexicalGrammar {
    grammar(vec![
        pattern("identifier", "[a-zA-Z_][a-zA-Z0-9_]*"),
        pattern("number", "\\d+"),
        literal("if"),
        literal("else"),
        literal("while"),
        literal("("),
        literal(")"),
    ])
}

#[test]
fn keyword_round_trip() {
    let lexical = keyword_grammar();
    let table = flat_parse_table(&lexical);
    let result = build(&lexical, &table).unwrap();
    let capture = result.keyword_capture_token.expect("identifier captures keywords");
    assert_eq!(capture, t(0));
    let start = result.parse_state_lex_states[&0];

    for (index, word) in [(2, "if"), (3, "else"), (4, "while")] {
        assert_eq!(main_table_accepts(&result, start, word), Some(capture), "{word}");
        assert_eq!(result.keyword_table.lookup(word), Some(t(index)), "{word}");
    }
    for word in ["iff", "els", "whiles", "x"] {
        assert_eq!(main_table_accepts(&result, start, word), Some(capture), "{word}");
        assert_eq!(result.keyword_table.lookup(word), None, "{word}");
    }

    let tokens = lex_names(&lexical, &result, 0, "if (x) else while2 12");
    let names: Vec<&str> = tokens.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["if", "(", "identifier", ")", "else", "identifier", "number"]);
}

#[test]
fn keywords_are_replaced_in_start_states() {
    let lexical = keyword_grammar();
    // `if` is valid without the identifier; the capture token stands in for it
    let table = parse_table(&[(&[2, 5], false), (&[0, 6], true)]);
    let result = build(&lexical, &table).unwrap();
    let tokens = lex_names(&lexical, &result, 1, "x)");
    assert_eq!(tokens[0], ("identifier".to_string(), "x".to_string()));

    let start = result.parse_state_lex_states[&0];
    assert_eq!(main_table_accepts(&result, start, "if"), Some(t(0)));
    assert_eq!(lex_one(&result, start, "if", 0).unwrap().symbol, t(2));
}

#[test]
fn identical_literals_that_coincide_are_ambiguous() {
    for with_identifier in [false, true] {
        let mut variables = vec![
            LexicalVariable::new("first_if", Rule::string("if")),
            LexicalVariable::new("second_if", Rule::string("if")),
        ];
        if with_identifier {
            variables.push(pattern("identifier", "[a-z]+"));
        }
        let lexical = grammar(variables);
        let table = flat_parse_table(&lexical);

        let err = build(&lexical, &table).unwrap_err();
        let Error::AmbiguousTokens {
            first,
            second,
            example_state,
            ..
        } = &err
        else {
            panic!("expected an ambiguity error, got {err:?}");
        };
        assert_eq!((*first, *second, *example_state), (t(0), t(1), 0));
        let message = err.to_string();
        assert!(message.contains("first_if") && message.contains("second_if"), "{message}");
    }
}

#[test]
fn identical_literals_in_disjoint_states_are_fine() {
    let lexical = grammar(vec![
        LexicalVariable::new("first_if", Rule::string("if")),
        LexicalVariable::new("second_if", Rule::string("if")),
    ]);
    let table = parse_table(&[(&[0], true), (&[1], true)]);
    let result = build(&lexical, &table).unwrap();
    assert_ne!(result.parse_state_lex_states[&0], result.parse_state_lex_states[&1]);
    assert_eq!(lex_names(&lexical, &result, 0, "if")[0].0, "first_if");
    assert_eq!(lex_names(&lexical, &result, 1, "if")[0].0, "second_if");
}

#[test]
fn longest_match_and_separators_break_prefix_ties() {
    let lexical = grammar(vec![literal("="), literal("=="), pattern("identifier", "[a-z]+")]);
    let table = flat_parse_table(&lexical);
    let result = build(&lexical, &table).unwrap();

    let texts = |src: &str| -> Vec<String> {
        lex_names(&lexical, &result, 0, src)
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    };
    assert_eq!(texts("=="), ["=="]);
    assert_eq!(texts("= ="), ["=", "="]);
    assert_eq!(texts("==="), ["==", "="]);
    assert_eq!(texts("a==b"), ["a", "==", "b"]);
}

#[test]
fn lookahead_limits_what_is_lexed() {
    let lexical = grammar(vec![literal("="), literal("==")]);
    let table = parse_table(&[(&[0], true), (&[0, 1], true)]);
    let result = build(&lexical, &table).unwrap();

    let only_assign = lex_names(&lexical, &result, 0, "==");
    assert_eq!(only_assign.len(), 2);
    let both = lex_names(&lexical, &result, 1, "==");
    assert_eq!(both, [("==".to_string(), "==".to_string())]);
}

#[test]
fn declared_priority_beats_longest_match() {
    let lexical = grammar(vec![
        pattern("word", "[a-z]+"),
        LexicalVariable::new("a", Rule::string("a")).with_precedence(1),
    ]);
    let table = flat_parse_table(&lexical);
    let options = BuildOptions {
        extract_keywords: false,
        ..BuildOptions::default()
    };
    let result = build_with(&SyntaxGrammar::default(), &lexical, &table, &HashMap::new(), options).unwrap();
    let tokens = lex_names(&lexical, &result, 0, "ab ba");
    assert_eq!(
        tokens,
        [
            ("a".to_string(), "a".to_string()),
            ("word".to_string(), "b".to_string()),
            ("word".to_string(), "ba".to_string()),
        ]
    );
}

#[test]
fn end_of_input_only_where_allowed() {
    let lexical = grammar(vec![literal("x")]);
    let table = parse_table(&[(&[0], true), (&[0], false)]);
    let result = build(&lexical, &table).unwrap();

    let with_eof = result.main_table.state(result.parse_state_lex_states[&0]);
    let without_eof = result.main_table.state(result.parse_state_lex_states[&1]);
    assert_eq!(with_eof.eof_action.as_ref().map(|a| a.symbol), Some(Symbol::end()));
    assert!(without_eof.eof_action.is_none());

    let start = result.parse_state_lex_states[&1];
    assert!(lex_one(&result, start, "  ", 0).is_err());
}

#[test]
fn extras_are_valid_in_every_start_state() {
    let lexical = grammar(vec![literal("x"), pattern("comment", "#[^\\n]*")]);
    let syntax = SyntaxGrammar {
        extra_symbols: vec![t(1)],
        ..SyntaxGrammar::default()
    };
    let table = parse_table(&[(&[0], true)]);
    let result = build_with(&syntax, &lexical, &table, &HashMap::new(), BuildOptions::default()).unwrap();
    let names: Vec<String> = lex_names(&lexical, &result, 0, "x # note\nx")
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, ["x", "comment", "x"]);
}

#[test]
fn accept_candidates_always_share_a_string() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let lexical = random_grammar(&mut rng);
        let table = random_parse_table(&mut rng, lexical.variables.len(), 12);
        let coincident = CoincidentTokenIndex::new(&table);
        let syntax = SyntaxGrammar::default();
        let builder =
            LexTableBuilder::create(&syntax, &lexical, &HashMap::new(), &coincident, &table)
                .unwrap();
        let result = builder.build().unwrap();

        for state in &result.main_table.states {
            let Some(accept) = &state.accept_action else {
                continue;
            };
            assert_eq!(accept.candidates.first(), Some(&accept.symbol));
            for (i, &a) in accept.candidates.iter().enumerate() {
                for &b in &accept.candidates[i + 1..] {
                    let status = builder.get_conflict_status(a, b);
                    assert!(!status.does_not_match(), "seed {seed}: {a} and {b} accept together");
                    assert!(status.matches_same_string, "seed {seed}: {a} vs {b} is {status}");
                }
            }
        }
    }
}

#[test]
fn builds_are_deterministic() {
    for seed in 0..6u64 {
        let serialized: Vec<String> = (0..2)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seed);
                let lexical = random_grammar(&mut rng);
                let table = random_parse_table(&mut rng, lexical.variables.len(), 16);
                let result = build(&lexical, &table).unwrap();
                serde_json::to_string(&result).unwrap()
            })
            .collect();
        assert_eq!(serialized[0], serialized[1], "seed {seed}");
    }

    let lexical = keyword_grammar();
    let table = flat_parse_table(&lexical);
    let dir = std::env::temp_dir();
    let files: Vec<Vec<u8>> = (0..2)
        .map(|i| {
            let path = dir.join(format!("lextab-determinism-{}-{i}.json", std::process::id()));
            save_build_result_json(&path, &build(&lexical, &table).unwrap()).unwrap();
            let bytes = std::fs::read(&path).unwrap();
            std::fs::remove_file(&path).ok();
            bytes
        })
        .collect();
    assert_eq!(files[0], files[1]);
}

#[test]
fn every_parse_state_gets_a_start_state() {
    let mut rng = StdRng::seed_from_u64(7);
    let lexical = random_grammar(&mut rng);
    let table = random_parse_table(&mut rng, lexical.variables.len(), 20);
    let merged = build(&lexical, &table).unwrap();
    let unmerged = build_with(
        &SyntaxGrammar::default(),
        &lexical,
        &table,
        &HashMap::new(),
        BuildOptions {
            merge_compatible_states: false,
            ..BuildOptions::default()
        },
    )
    .unwrap();

    for result in [&merged, &unmerged] {
        let ids: BTreeSet<usize> = result.parse_state_lex_states.keys().copied().collect();
        assert_eq!(ids, (0..20).collect::<BTreeSet<usize>>());
        assert!(result.parse_state_lex_states.values().all(|&s| s < result.main_table.len()));
    }
    let starts = |r: &BuildResult| r.parse_state_lex_states.values().collect::<BTreeSet<_>>().len();
    assert!(starts(&merged) <= starts(&unmerged));
}

#[test]
fn extras_coincide_with_every_token() {
    let lexical = grammar(vec![
        LexicalVariable::new("kw_if", Rule::string("if")),
        LexicalVariable::new("extra_if", Rule::string("if")),
    ]);
    let syntax = SyntaxGrammar {
        extra_symbols: vec![t(1)],
        ..SyntaxGrammar::default()
    };
    let table = parse_table(&[(&[0], true)]);
    let err = build_with(&syntax, &lexical, &table, &HashMap::new(), BuildOptions::default()).unwrap_err();
    let Error::AmbiguousTokens {
        first,
        second,
        example_state,
        ..
    } = err
    else {
        panic!("expected an ambiguity error, got {err:?}");
    };
    assert_eq!((first, second, example_state), (t(0), t(1), 0));

    // two extras are valid together everywhere
    let syntax = SyntaxGrammar {
        extra_symbols: vec![t(0), t(1)],
        ..SyntaxGrammar::default()
    };
    let table = parse_table(&[(&[], true)]);
    let err = build_with(&syntax, &lexical, &table, &HashMap::new(), BuildOptions::default()).unwrap_err();
    assert!(matches!(err, Error::AmbiguousTokens { example_state: 0, .. }), "{err:?}");

    let lexical = grammar(vec![
        LexicalVariable::new("kw_if", Rule::string("if")),
        LexicalVariable::new("extra_if", Rule::string("if")).with_precedence(1),
    ]);
    let syntax = SyntaxGrammar {
        extra_symbols: vec![t(1)],
        ..SyntaxGrammar::default()
    };
    let table = parse_table(&[(&[0], true)]);
    let result = build_with(&syntax, &lexical, &table, &HashMap::new(), BuildOptions::default()).unwrap();
    assert_eq!(lex_names(&lexical, &result, 0, "if")[0].0, "extra_if");
}

#[test]
fn keyword_stays_plain_where_capture_token_would_collide() {
    let lexical = grammar(vec![
        pattern("identifier", "[a-z]+"),
        literal("if"),
        pattern("hexish", "[a-h]+"),
        literal("while"),
    ]);
    let table = parse_table(&[(&[1, 2], true), (&[0, 3], true)]);
    let coincident = CoincidentTokenIndex::new(&table);
    let syntax = SyntaxGrammar::default();
    let builder = LexTableBuilder::create(&syntax, &lexical, &HashMap::new(), &coincident, &table).unwrap();
    assert_eq!(builder.keyword_capture_token(), Some(t(0)));
    assert_eq!(builder.keywords().collect::<Vec<_>>(), vec![t(3)]);

    let result = builder.build().unwrap();
    let pair = |name: &str, text: &str| (name.to_string(), text.to_string());
    assert_eq!(lex_names(&lexical, &result, 0, "if bad"), [pair("if", "if"), pair("hexish", "bad")]);
    assert_eq!(
        lex_names(&lexical, &result, 1, "while if"),
        [pair("while", "while"), pair("identifier", "if")]
    );
    assert_eq!(result.keyword_for("if"), None);
    assert_eq!(result.keyword_for("while"), Some(t(3)));

    // with nothing left to capture there is no capture token
    let lexical = grammar(vec![pattern("identifier", "[a-z]+"), literal("if"), pattern("hexish", "[a-h]+")]);
    let table = parse_table(&[(&[1, 2], true), (&[0], true)]);
    let result = build(&lexical, &table).unwrap();
    assert_eq!(result.keyword_capture_token, None);
    assert!(result.keyword_table.is_empty());
    assert_eq!(lex_names(&lexical, &result, 0, "if")[0].0, "if");
}

#[test]
fn immediate_token_is_not_merged_with_separators() {
    let lexical = grammar(vec![
        LexicalVariable::new("newline", Rule::string("\n")).immediate(),
        pattern("identifier", "[a-z]+"),
    ]);
    let table = flat_parse_table(&lexical);
    let result = build(&lexical, &table).unwrap();
    let pair = |name: &str, text: &str| (name.to_string(), text.to_string());
    let lexed = |src: &str| lex_names(&lexical, &result, 0, src);

    assert_eq!(lexed("\n"), [pair("newline", "\n")]);
    assert_eq!(lexed(" \nx"), [pair("identifier", "x")]);
    assert_eq!(lexed("\nx"), [pair("newline", "\n"), pair("identifier", "x")]);
    assert_eq!(
        lexed("x\ny"),
        [pair("identifier", "x"), pair("newline", "\n"), pair("identifier", "y")]
    );
    assert_eq!(result, build(&lexical, &table).unwrap());
}
