//! Error types for lex table construction

use thiserror::Error;

use crate::grammar::Symbol;
use crate::parser::tables::ParseStateId;

/// Result type alias using our Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two coincident tokens match the same string and nothing ranks one above the other
    #[error(
        "tokens `{first_name}` and `{second_name}` match the same string in parse state {example_state}, \
         and neither has a higher priority"
    )]
    AmbiguousTokens {
        first: Symbol,
        first_name: String,
        second: Symbol,
        second_name: String,
        example_state: ParseStateId,
    },

    /// A token rule that cannot be turned into a finite automaton
    #[error("token `{name}` cannot be lexed: {reason}")]
    UnsupportedRule {
        symbol: Symbol,
        name: String,
        reason: String,
    },

    /// Inputs that do not agree with each other
    #[error("invalid grammar: {0}")]
    InvalidGrammar(String),
}

impl Error {
    pub fn unsupported_rule(symbol: Symbol, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedRule {
            symbol,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_grammar(msg: impl Into<String>) -> Self {
        Error::InvalidGrammar(msg.into())
    }
}
