//! # RGL — Relational Graph Language
//!
//! Textual codec for one statement: `MAIN:SUB>VAR(pPROB,COND)`.
//! Pure functions: no registry, no state.
//!
//! Encoding always writes the probability with two decimals. Decoding accepts
//! any `DIGITS[.DIGITS]` in `[0,1]`; the decoded value is rounded to hundredths,
//! so `decode(encode(s)) == s` for every statement.

pub mod lexer;
pub mod parser;

use crate::model::Statement;
use crate::Result;

/// Encode a statement as its canonical record (no trailing separator).
pub fn encode(statement: &Statement) -> String {
    format!(
        "{}:{}>{}(p{:.2},{})",
        statement.main,
        statement.sub,
        statement.variable,
        statement.probability.value(),
        statement.condition,
    )
}

/// Decode one record. Fails with `Error::MalformedStatement` if the record
/// does not match the grammar or its probability is outside `[0,1]`.
pub fn decode(record: &str) -> Result<Statement> {
    let lexemes = lexer::tokenize(record)?;
    parser::parse_statement(&lexemes)
}
