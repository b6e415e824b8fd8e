// src/grammar.rs
// Grammar objects handed over by the grammar layer. Everything here is plain data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lexer::tables::chars::CharacterSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolType {
    Terminal,
    NonTerminal,
    End,
}

/// A grammar symbol. `index` is the position of the variable in its grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolType,
    pub index: usize,
}

impl Symbol {
    pub fn terminal(index: usize) -> Self {
        Self {
            kind: SymbolType::Terminal,
            index,
        }
    }

    pub fn non_terminal(index: usize) -> Self {
        Self {
            kind: SymbolType::NonTerminal,
            index,
        }
    }

    pub fn end() -> Self {
        Self {
            kind: SymbolType::End,
            index: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == SymbolType::Terminal
    }

    pub fn is_end(&self) -> bool {
        self.kind == SymbolType::End
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SymbolType::Terminal => write!(f, "t{}", self.index),
            SymbolType::NonTerminal => write!(f, "n{}", self.index),
            SymbolType::End => write!(f, "end"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataParams {
    #[serde(default)]
    pub precedence: Option<i32>,
}

/// Regular-language descriptor of a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    Blank,
    String(String),
    Pattern(String),
    CharacterSet(CharacterSet),
    Choice(Vec<Rule>),
    Seq(Vec<Rule>),
    /// One or more repetitions.
    Repeat(Box<Rule>),
    Metadata {
        params: MetadataParams,
        rule: Box<Rule>,
    },
    Symbol(Symbol),
}

impl Rule {
    pub fn string(s: impl Into<String>) -> Self {
        Rule::String(s.into())
    }

    pub fn pattern(p: impl Into<String>) -> Self {
        Rule::Pattern(p.into())
    }

    pub fn seq(rules: Vec<Rule>) -> Self {
        Rule::Seq(rules)
    }

    pub fn choice(rules: Vec<Rule>) -> Self {
        Rule::Choice(rules)
    }

    pub fn repeat(rule: Rule) -> Self {
        Rule::Repeat(Box::new(rule))
    }

    pub fn optional(rule: Rule) -> Self {
        Rule::Choice(vec![rule, Rule::Blank])
    }

    pub fn prec(precedence: i32, rule: Rule) -> Self {
        Rule::Metadata {
            params: MetadataParams {
                precedence: Some(precedence),
            },
            rule: Box::new(rule),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalVariable {
    pub name: String,
    pub rule: Rule,
    /// Declared token priority.
    #[serde(default)]
    pub precedence: i32,
    /// Immediate tokens cannot be preceded by separators.
    #[serde(default)]
    pub immediate: bool,
}

impl LexicalVariable {
    pub fn new(name: impl Into<String>, rule: Rule) -> Self {
        Self {
            name: name.into(),
            rule,
            precedence: 0,
            immediate: false,
        }
    }

    pub fn with_precedence(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// The literal text of a string token.
    pub fn literal(&self) -> Option<&str> {
        match &self.rule {
            Rule::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalGrammar {
    pub variables: Vec<LexicalVariable>,
    #[serde(default)]
    pub separators: Vec<Rule>,
}

impl LexicalGrammar {
    pub fn token_name(&self, symbol: Symbol) -> &str {
        match symbol.kind {
            SymbolType::Terminal => self
                .variables
                .get(symbol.index)
                .map(|v| v.name.as_str())
                .unwrap_or("<unknown>"),
            SymbolType::End => "<end>",
            SymbolType::NonTerminal => "<non-terminal>",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxVariable {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxGrammar {
    #[serde(default)]
    pub variables: Vec<SyntaxVariable>,
    /// Symbols that may appear anywhere; terminal extras are valid in every parse state.
    #[serde(default)]
    pub extra_symbols: Vec<Symbol>,
    /// Explicit keyword capture token.
    #[serde(default)]
    pub word_token: Option<Symbol>,
}
