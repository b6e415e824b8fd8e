// src/lexer/mod.rs
pub mod tables;
