//! # Graph Model
//!
//! Plain data shared by every layer: tokens, statements, relations and the
//! textual graph. No I/O, no locking, no async.

pub mod token;
pub mod statement;
pub mod relation;
pub mod text_graph;

pub use token::{Token, TokenRegistry};
pub use statement::{Probability, Statement, MergeKey, ResolvedStatement};
pub use relation::Relation;
pub use text_graph::{TextGraph, RECORD_SEPARATOR};
