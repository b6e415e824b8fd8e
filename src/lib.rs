// src/lib.rs
//! Lex table construction for an LR parser generator.
//!
//! Given the lexical grammar and the lookahead sets of a parse table, builds the main lex
//! table (one start state per group of compatible parse states) and a keyword table that
//! resolves identifier-shaped matches to reserved words.

pub mod error;
pub mod grammar;
pub mod lexer;
pub mod parser;

pub use error::{Error, Result};
pub use lexer::tables::{BuildOptions, BuildResult, CoincidentTokenIndex, ConflictStatus, LexTableBuilder};
