//! # Graph Storage
//!
//! `GraphStore` owns the token registry and the statement sequence, and is
//! the only place either is mutated.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `ingest` | intern terms, merge by `(main, sub, variable)` or append, then validate + prune |
//! | `validate` | fatal on bad weights, warns on fan-out violations |
//! | `prune` | keep the top `max_edges_per_node` statements per node |
//! | `deduplicate` | drop byte-identical records, first occurrence wins |
//! | `snapshot` / `restore` | full text graph in and out |

pub mod graph_store;
pub mod sparsity;

pub use graph_store::{
    GraphStore, IngestReport, ValidationReport, FanoutViolation, RestoreReport,
};
