// src/lexer/tables/io.rs
use std::{
    io::{BufWriter, Write},
    time::Instant,
};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::grammar::{LexicalGrammar, Symbol, SyntaxGrammar};
use crate::parser::tables::{LookaheadSet, ParseTable};

use super::BuildResult;

// -------------------- Input --------------------

/// Everything `LexTableBuilder::create` needs, as one JSON document.
#[serde_as]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LexTablesInput {
    #[serde(default)]
    pub syntax_grammar: SyntaxGrammar,
    pub lexical_grammar: LexicalGrammar,
    pub parse_table: ParseTable,
    /// Symbol keys are not strings, so the map is stored as a list of pairs.
    #[serde_as(as = "Vec<(_, _)>")]
    #[serde(default)]
    pub following_tokens: HashMap<Symbol, LookaheadSet>,
}

pub fn load_input_json_bytes(data: &[u8]) -> Result<LexTablesInput, String> {
    serde_json::from_slice::<LexTablesInput>(data).map_err(|e| format!("Failed to parse lex tables input JSON: {e}"))
}

// -------------------- Output --------------------

pub fn save_build_result_json(path: &std::path::Path, result: &BuildResult) -> std::io::Result<()> {
    let instant = Instant::now();
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, result)?;
    let flush = w.flush();
    log::info!(
        "[lex] saved tables to {} in {} ms",
        path.display(),
        instant.elapsed().as_millis()
    );
    flush
}

pub fn load_build_result_json_bytes(data: &[u8]) -> Result<BuildResult, String> {
    serde_json::from_slice::<BuildResult>(data).map_err(|e| format!("Failed to parse lex tables JSON: {e}"))
}
