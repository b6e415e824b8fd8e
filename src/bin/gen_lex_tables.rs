// src/bin/gen_lex_tables.rs
// Build lex tables from a JSON input description and write them to JSON.
// Usage:
//   cargo run --bin gen_lex_tables -- input.json                # writes tables/lex_tables.json
//   cargo run --bin gen_lex_tables -- input.json /path/out.json
// LEXTAB_NO_KEYWORDS=1 / LEXTAB_NO_MERGE=1 switch off keyword extraction / state merging.

use std::{env, fs, path::Path, time::Instant};

use anyhow::{Context, Result, bail};
use lextab::{
    BuildOptions, CoincidentTokenIndex, LexTableBuilder,
    lexer::tables::{load_input_json_bytes, save_build_result_json},
};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: gen_lex_tables <input.json> [out.json]");
    };
    let out = args
        .next()
        .unwrap_or_else(|| "tables/lex_tables.json".to_string());
    let out_path = Path::new(&out);

    let data = fs::read(&input).with_context(|| format!("failed to read {input}"))?;
    let input = load_input_json_bytes(&data).map_err(anyhow::Error::msg)?;

    let options = BuildOptions::from_env();
    println!(
        "[gen_lex_tables] {} tokens, {} parse states (keywords: {}, merge: {})",
        input.lexical_grammar.variables.len(),
        input.parse_table.states.len(),
        options.extract_keywords,
        options.merge_compatible_states
    );

    let t0 = Instant::now();
    let coincident = CoincidentTokenIndex::new(&input.parse_table);
    let builder = LexTableBuilder::create_with_options(
        &input.syntax_grammar,
        &input.lexical_grammar,
        &input.following_tokens,
        &coincident,
        &input.parse_table,
        options,
    )?;
    let result = builder.build()?;
    println!(
        "[gen_lex_tables] main = {} states, keywords = {} states, capture = {}, took {} ms",
        result.main_table.len(),
        result.keyword_table.len(),
        result
            .keyword_capture_token
            .map(|s| input.lexical_grammar.token_name(s).to_string())
            .unwrap_or_else(|| "-".into()),
        t0.elapsed().as_millis()
    );

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    save_build_result_json(out_path, &result).with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("[gen_lex_tables] wrote {}", out_path.display());
    Ok(())
}
