// src/parser/mod.rs
pub mod tables;
