//! # rgl-engine — Relational Graph Language
//!
//! A directed, probability-weighted semantic graph kept as compact text:
//! every edge is one record `MAIN:SUB>VAR(pPROB,COND)` over interned term
//! tokens, and the whole graph is the `;`-terminated sequence of records.
//!
//! ## Design Principles
//!
//! 1. **One owner**: `GraphStore` holds the registry and the statements; all
//!    mutation goes through its operations
//! 2. **Codec owns nothing**: record ↔ `Statement` is a pure function
//! 3. **Extraction is pluggable**: `RelationExtractor` is the only seam to
//!    the text-understanding side, and it always runs under a deadline
//! 4. **Bounded graph**: per-node fan-out is capped by pruning, never by
//!    rejecting writes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rgl_engine::{ArrowExtractor, Engine, EngineConfig, QueryOutcome};
//!
//! # async fn example() -> rgl_engine::Result<()> {
//! let engine = Engine::in_memory(EngineConfig::default(), ArrowExtractor::default())?;
//!
//! let outcome = engine
//!     .teach("justiça > justiça distributiva > necessidade (p0.9, crise)")
//!     .await?;
//! println!("{} -> {}", outcome.old_graph, outcome.new_graph);
//!
//! if let QueryOutcome::Match(answer) = engine.query("justiça", "crise")? {
//!     println!("{}: {}", answer.result, answer.explanation);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod rgl;
pub mod storage;
pub mod query;
pub mod extract;
pub mod persistence;
pub mod config;

use parking_lot::RwLock;
use tracing::{error, info, warn};

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    Token, TokenRegistry, Probability, Statement, MergeKey, Relation, TextGraph,
};
pub use storage::{GraphStore, IngestReport, ValidationReport, FanoutViolation, RestoreReport};
pub use query::{Answer, QueryEngine, QueryOutcome};
pub use extract::{ArrowExtractor, RelationExtractor};
pub use persistence::{PersistenceManager, StateDocument};
pub use config::EngineConfig;

// ============================================================================
// Engine handle
// ============================================================================

/// How a `teach` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeachStatus {
    /// Relations were ingested (and persisted, if configured).
    Learned,
    /// The extractor produced nothing, or was unavailable.
    NothingExtracted,
    /// The relations were refused; the graph is unchanged.
    Rejected,
    /// Saving the new state failed; the graph was rolled back.
    Unsaved,
}

/// Before/after view of one `teach` call, for audit display.
#[derive(Debug, Clone, PartialEq)]
pub struct TeachOutcome {
    pub status: TeachStatus,
    pub old_graph: TextGraph,
    pub new_graph: TextGraph,
    pub report: IngestReport,
    pub diagnostic: Option<String>,
}

impl TeachOutcome {
    fn unchanged(status: TeachStatus, graph: TextGraph, diagnostic: Option<String>) -> Self {
        Self {
            status,
            old_graph: graph.clone(),
            new_graph: graph,
            report: IngestReport::default(),
            diagnostic,
        }
    }
}

/// The primary entry point. An `Engine` owns one graph store and serves
/// teach (mutating) and query (read-only) calls from any number of tasks.
///
/// Queries share a read lock on the store. A teach call holds the writer
/// gate from ingestion through persistence, so at most one mutation is in
/// flight and state documents are written in mutation order; the store's
/// write lock is only held for the in-memory part.
pub struct Engine<X: RelationExtractor> {
    config: EngineConfig,
    extractor: X,
    store: RwLock<GraphStore>,
    writer: tokio::sync::Mutex<()>,
    persistence: Option<PersistenceManager>,
}

impl<X: RelationExtractor> Engine<X> {
    /// Engine with an empty graph and no persistence, whatever the config
    /// says about a state path.
    pub fn in_memory(config: EngineConfig, extractor: X) -> Result<Self> {
        config.validate()?;
        let store = GraphStore::new(config.store.clone());
        Ok(Self::assemble(config, extractor, store, None))
    }

    /// Engine backed by the configured state document. A missing document
    /// starts an empty graph; a corrupt one is an error.
    pub async fn open(config: EngineConfig, extractor: X) -> Result<Self> {
        config.validate()?;
        let persistence = PersistenceManager::from_config(&config.persistence);

        let store = match &persistence {
            Some(manager) => match manager.read().await? {
                Some(document) => {
                    let (store, report) = persistence::load(&document, config.store.clone())?;
                    if report.dropped > 0 {
                        warn!(dropped = report.dropped, "malformed records skipped while loading");
                    }
                    info!(statements = report.restored, tokens = store.registry().len(), "graph loaded");
                    store
                }
                None => GraphStore::new(config.store.clone()),
            },
            None => GraphStore::new(config.store.clone()),
        };

        Ok(Self::assemble(config, extractor, store, persistence))
    }

    fn assemble(
        config: EngineConfig,
        extractor: X,
        store: GraphStore,
        persistence: Option<PersistenceManager>,
    ) -> Self {
        Self {
            config,
            extractor,
            store: RwLock::new(store),
            writer: tokio::sync::Mutex::new(()),
            persistence,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    // ========================================================================
    // Teach
    // ========================================================================

    /// Extract relations from `raw_text`, ingest them and persist the result.
    ///
    /// Extractor failure or timeout counts as zero relations. Relations with
    /// an invalid probability are refused as a whole. If persisting fails,
    /// the in-memory graph is rolled back and the outcome is `Unsaved`, with
    /// the previous graph on both sides. Only an unexpected store error
    /// (e.g. exhausted token ids) is returned as `Err`, also after rollback.
    pub async fn teach(&self, raw_text: &str) -> Result<TeachOutcome> {
        let deadline = self.config.extraction.timeout();
        let (relations, diagnostic) =
            match extract::extract_with_deadline(&self.extractor, raw_text, deadline).await {
                Ok(relations) => (relations, None),
                Err(e) => {
                    warn!(error = %e, "extraction unavailable, treating as no relations");
                    (Vec::new(), Some(e.to_string()))
                }
            };

        let _gate = self.writer.lock().await;
        let old_graph = self.store.read().snapshot();

        if relations.is_empty() {
            let diagnostic = diagnostic.or_else(|| Some("no relations extracted".into()));
            return Ok(TeachOutcome::unchanged(TeachStatus::NothingExtracted, old_graph, diagnostic));
        }

        let (report, document, previous) = {
            let mut store = self.store.write();
            let previous = store.clone();
            let report = match store.ingest(&relations) {
                Ok(report) => report,
                Err(e @ Error::InvalidProbability(_)) => {
                    warn!(error = %e, "relations rejected");
                    return Ok(TeachOutcome::unchanged(
                        TeachStatus::Rejected,
                        old_graph,
                        Some(e.to_string()),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "ingest failed, rolling back");
                    *store = previous;
                    return Err(e);
                }
            };
            store.deduplicate();
            (report, persistence::save(&store), previous)
        };

        if let Some(manager) = &self.persistence {
            if let Err(e) = manager.write(&document).await {
                error!(error = %e, path = %manager.path().display(), "persisting state failed, rolling back");
                *self.store.write() = previous;
                return Ok(TeachOutcome::unchanged(
                    TeachStatus::Unsaved,
                    old_graph,
                    Some(e.to_string()),
                ));
            }
        }

        info!(
            appended = report.appended,
            merged = report.merged,
            pruned = report.pruned,
            statements = self.store.read().len(),
            "taught"
        );

        Ok(TeachOutcome {
            status: TeachStatus::Learned,
            old_graph,
            new_graph: document.text_graph,
            report,
            diagnostic,
        })
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Best recommendation for `query` under `context`.
    ///
    /// A missing match is `Ok(QueryOutcome::NoMatch)`; only an empty query
    /// or context is an error.
    pub fn query(&self, query: &str, context: &str) -> Result<QueryOutcome> {
        require("query", query)?;
        require("context", context)?;
        let store = self.store.read();
        Ok(QueryEngine::new(&store).answer(query.trim(), context.trim()))
    }

    /// Up to `limit` ranked recommendations.
    pub fn rank(&self, query: &str, context: &str, limit: usize) -> Result<Vec<Answer>> {
        require("query", query)?;
        require("context", context)?;
        let store = self.store.read();
        Ok(QueryEngine::new(&store).rank(query.trim(), context.trim(), limit))
    }

    // ========================================================================
    // Export / maintenance
    // ========================================================================

    /// Current graph, one encoded record per statement.
    pub fn rules(&self) -> Vec<String> {
        self.store.read().records()
    }

    /// Current graph with terms in place of token ids.
    pub fn resolved_rules(&self) -> Vec<String> {
        self.store.read().resolved_records()
    }

    pub fn snapshot(&self) -> TextGraph {
        self.store.read().snapshot()
    }

    pub fn document(&self) -> StateDocument {
        persistence::save(&self.store.read())
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        self.store.read().validate()
    }

    /// Run `f` against a consistent view of the store.
    pub fn read<R>(&self, f: impl FnOnce(&GraphStore) -> R) -> R {
        f(&self.store.read())
    }

    /// Deduplicate and prune the stored graph (e.g. after lowering
    /// `max_edges_per_node`), then persist. Returns how many records went.
    pub async fn compact(&self) -> Result<usize> {
        let _gate = self.writer.lock().await;
        let (removed, document, previous) = {
            let mut store = self.store.write();
            let previous = store.clone();
            let removed = store.deduplicate() + store.prune();
            (removed, persistence::save(&store), previous)
        };
        if removed == 0 {
            return Ok(0);
        }
        if let Some(manager) = &self.persistence {
            if let Err(e) = manager.write(&document).await {
                error!(error = %e, path = %manager.path().display(), "persisting compacted state failed, rolling back");
                *self.store.write() = previous;
                return Err(e);
            }
        }
        info!(removed, "graph compacted");
        Ok(removed)
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingField(field));
    }
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A record does not match the statement grammar. Callers drop the
    /// record and carry on.
    #[error("Malformed statement at position {position}: {message}")]
    MalformedStatement { position: usize, message: String },

    #[error("Invalid probability: {0}")]
    InvalidProbability(String),

    /// The state document is missing fields or internally inconsistent.
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    #[error("Extraction unavailable: {0}")]
    ExtractionUnavailable(String),

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u64 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
