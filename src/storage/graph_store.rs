//! In-memory graph store.
//!
//! Owns the token registry and the ordered statement sequence. All mutation
//! goes through `ingest`, `prune`, `deduplicate` and `restore`; callers that
//! share a store across threads wrap it in a lock (see `crate::Engine`).

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::model::*;
use crate::{Error, Result};
use super::sparsity;

/// Counts from one `ingest` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub appended: usize,
    pub merged: usize,
    /// Relations with an empty meaning, sub-meaning, variable or condition.
    pub skipped: usize,
    /// Statements removed by the prune that follows ingestion.
    pub pruned: usize,
}

impl IngestReport {
    pub fn changed(&self) -> bool {
        self.appended + self.merged + self.pruned > 0
    }
}

/// A node whose fan-out exceeds the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutViolation {
    pub node: Token,
    pub fanout: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub statements: usize,
    pub violations: Vec<FanoutViolation>,
}

/// Outcome of decoding a text graph into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Malformed records that were skipped.
    pub dropped: usize,
}

/// The full graph: registry plus statements in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStore {
    config: StoreConfig,
    registry: TokenRegistry,
    statements: Vec<Statement>,
}

impl GraphStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_registry(config, TokenRegistry::new())
    }

    pub fn with_registry(config: StoreConfig, registry: TokenRegistry) -> Self {
        Self {
            config,
            registry,
            statements: Vec::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of outgoing statements from `node`.
    pub fn fanout(&self, node: Token) -> usize {
        self.statements.iter().filter(|s| s.main == node).count()
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Merge or append each relation, then validate and prune.
    ///
    /// Every probability is parsed before anything is touched: one bad weight
    /// fails the whole call with `InvalidProbability` and leaves the store
    /// exactly as it was. Running out of token ids fails mid-batch; callers
    /// that need all-or-nothing keep a clone (see `Engine::teach`).
    pub fn ingest(&mut self, relations: &[Relation]) -> Result<IngestReport> {
        let weights = relations
            .iter()
            .map(|r| Probability::parse(&r.probability))
            .collect::<Result<Vec<_>>>()?;

        let mut index = self.key_index();
        let mut report = IngestReport::default();

        for (relation, probability) in relations.iter().zip(weights) {
            let terms = [
                relation.meaning.trim(),
                relation.sub_meaning.trim(),
                relation.variable.trim(),
                relation.condition.trim(),
            ];
            if terms.iter().any(|t| t.is_empty()) {
                warn!(?relation, "skipping relation with an empty term");
                report.skipped += 1;
                continue;
            }

            let [meaning, sub_meaning, variable, condition] = terms;
            let incoming = Statement::new(
                self.registry.intern(meaning)?,
                self.registry.intern(sub_meaning)?,
                self.registry.intern(variable)?,
                probability,
                self.registry.intern(condition)?,
            );

            match index.get(&incoming.key()) {
                Some(&at) => {
                    let existing = &mut self.statements[at];
                    let blended = existing
                        .probability
                        .blend(incoming.probability, self.config.incoming_weight);
                    debug!(
                        record = %existing,
                        from = existing.probability.value(),
                        to = blended.value(),
                        "merging statement"
                    );
                    existing.probability = blended;
                    existing.condition = incoming.condition;
                    report.merged += 1;
                }
                None => {
                    index.insert(incoming.key(), self.statements.len());
                    debug!(record = %incoming, "appending statement");
                    self.statements.push(incoming);
                    report.appended += 1;
                }
            }
        }

        self.validate()?;
        report.pruned = self.prune();
        Ok(report)
    }

    /// First position of every merge key.
    fn key_index(&self) -> HashMap<MergeKey, usize> {
        let mut index = HashMap::with_capacity(self.statements.len());
        for (i, s) in self.statements.iter().enumerate() {
            index.entry(s.key()).or_insert(i);
        }
        index
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Check every weight and report nodes over the fan-out limit.
    ///
    /// An out-of-range weight is fatal. Fan-out violations are only reported;
    /// `prune` is the step that fixes them.
    pub fn validate(&self) -> Result<ValidationReport> {
        for s in &self.statements {
            let p = s.probability.value();
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidProbability(format!("{p} in record {s}")));
            }
        }

        let limit = self.config.max_edges_per_node;
        let mut violations: Vec<FanoutViolation> = sparsity::fanout(&self.statements)
            .into_iter()
            .filter(|&(_, fanout)| fanout > limit)
            .map(|(node, fanout)| FanoutViolation { node, fanout, limit })
            .collect();
        violations.sort_by_key(|v| v.node);

        for v in &violations {
            warn!(
                node = %v.node,
                term = %self.registry.resolve(v.node),
                fanout = v.fanout,
                limit = v.limit,
                "node exceeds fan-out limit"
            );
        }

        Ok(ValidationReport {
            statements: self.statements.len(),
            violations,
        })
    }

    /// Keep the `max_edges_per_node` strongest statements of every node.
    /// Survivors keep their relative order. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let dropped = sparsity::overflow(&self.statements, self.config.max_edges_per_node);
        if dropped.is_empty() {
            return 0;
        }

        let mut keep = vec![true; self.statements.len()];
        for &i in &dropped {
            keep[i] = false;
        }
        let mut mask = keep.into_iter();
        self.statements.retain(|_| mask.next().unwrap_or(true));

        debug!(removed = dropped.len(), remaining = self.statements.len(), "pruned graph");
        dropped.len()
    }

    /// Collapse byte-identical records, keeping first occurrences in order.
    pub fn deduplicate(&mut self) -> usize {
        let before = self.statements.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(before);
        self.statements.retain(|s| seen.insert(crate::rgl::encode(s)));
        before - self.statements.len()
    }

    // ========================================================================
    // Snapshot / restore
    // ========================================================================

    pub fn snapshot(&self) -> TextGraph {
        TextGraph::from_statements(&self.statements)
    }

    /// Replace all statements with the decoded contents of `graph`.
    ///
    /// A malformed record is dropped with a warning; the rest still load.
    /// The registry is left as it is.
    pub fn restore(&mut self, graph: &TextGraph) -> RestoreReport {
        let mut report = RestoreReport::default();
        let mut statements = Vec::new();

        for record in graph.records() {
            match crate::rgl::decode(record) {
                Ok(s) => {
                    for token in [s.main, s.sub, s.variable, s.condition] {
                        if !self.registry.contains(token) {
                            debug!(%token, record, "record references an unknown token");
                        }
                    }
                    statements.push(s);
                    report.restored += 1;
                }
                Err(e) => {
                    warn!(record, error = %e, "dropping malformed record");
                    report.dropped += 1;
                }
            }
        }

        self.statements = statements;
        report
    }

    /// Encoded records, one per statement.
    pub fn records(&self) -> Vec<String> {
        self.statements.iter().map(crate::rgl::encode).collect()
    }

    /// Records with terms in place of token ids.
    pub fn resolved_records(&self) -> Vec<String> {
        self.statements
            .iter()
            .map(|s| s.resolved(&self.registry).to_string())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn store(max: usize) -> GraphStore {
        GraphStore::new(StoreConfig { max_edges_per_node: max, ..StoreConfig::default() })
    }

    fn rel(main: &str, sub: &str, var: &str, p: &str, cond: &str) -> Relation {
        Relation::new(main, sub, var, p, cond)
    }

    #[test]
    fn test_ingest_appends_new_statement() {
        let mut g = store(10);
        let report = g
            .ingest(&[rel("justiça", "justiça distributiva", "necessidade", "0.9", "crise")])
            .unwrap();
        assert_eq!(report.appended, 1);
        assert_eq!(g.snapshot().as_str(), "1:2>3(p0.90,4);");
        assert_eq!(g.registry().resolve(Token(3)), "necessidade");
    }

    #[test]
    fn test_merge_blends_in_place() {
        let mut g = store(10);
        g.ingest(&[
            rel("a", "b", "c", "0.5", "x"),
            rel("d", "e", "f", "0.4", "x"),
        ])
        .unwrap();
        let report = g.ingest(&[rel("a", "b", "c", "0.9", "x")]).unwrap();

        assert_eq!(report.merged, 1);
        assert_eq!(report.appended, 0);
        assert_eq!(g.len(), 2);
        // Merged record stays first.
        assert_eq!(g.statements()[0].probability.value(), 0.62);
        assert_eq!(g.records()[0], "1:2>3(p0.62,4)");
    }

    #[test]
    fn test_merge_key_excludes_condition() {
        let mut g = store(10);
        g.ingest(&[rel("a", "b", "c", "0.5", "paz")]).unwrap();
        g.ingest(&[rel("a", "b", "c", "0.5", "guerra")]).unwrap();

        assert_eq!(g.len(), 1);
        let cond = g.statements()[0].condition;
        assert_eq!(g.registry().resolve(cond), "guerra");
    }

    #[test]
    fn test_merge_within_one_batch() {
        let mut g = store(10);
        let report = g
            .ingest(&[rel("a", "b", "c", "0.5", "x"), rel("a", "b", "c", "0.9", "x")])
            .unwrap();
        assert_eq!((report.appended, report.merged), (1, 1));
        assert_eq!(g.statements()[0].probability.value(), 0.62);
    }

    #[test]
    fn test_invalid_probability_leaves_store_untouched() {
        let mut g = store(10);
        g.ingest(&[rel("a", "b", "c", "0.5", "x")]).unwrap();
        let before = g.clone();

        let err = g
            .ingest(&[rel("new", "term", "here", "0.7", "x"), rel("a", "b", "c", "1.7", "x")])
            .unwrap_err();

        assert!(matches!(err, Error::InvalidProbability(_)));
        assert_eq!(g, before);
        assert_eq!(g.registry().lookup("new"), None);
    }

    #[test]
    fn test_terms_are_trimmed_and_empty_skipped() {
        let mut g = store(10);
        let report = g
            .ingest(&[rel("  amor ", "afeto", "cuidado", "0.5", "vida"), rel("", "x", "y", "0.5", "z")])
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(g.registry().lookup("amor"), Some(Token(1)));
        assert_eq!(g.registry().lookup("x"), None);
    }

    #[test]
    fn test_ingest_prunes_to_top_n() {
        let mut g = store(10);
        let relations: Vec<Relation> = (0..11)
            .map(|i| rel("justiça", &format!("sub{i}"), "v", &format!("0.{:02}", 40 + i), "c"))
            .collect();
        let report = g.ingest(&relations).unwrap();

        assert_eq!(report.appended, 11);
        assert_eq!(report.pruned, 1);
        assert_eq!(g.len(), 10);
        let main = g.registry().lookup("justiça").unwrap();
        assert_eq!(g.fanout(main), 10);
        // The weakest (0.40, sub0) is the one removed.
        assert!(g.registry().lookup("sub0").is_some());
        let weakest = g.registry().lookup("sub0").unwrap();
        assert!(g.statements().iter().all(|s| s.sub != weakest));
    }

    #[test]
    fn test_validate_reports_without_pruning() {
        let mut g = store(1);
        g.restore(&TextGraph::new("1:2>3(p0.50,4);1:5>3(p0.60,4);"));
        let report = g.validate().unwrap();
        assert_eq!(report.statements, 2);
        assert_eq!(report.violations, vec![FanoutViolation { node: Token(1), fanout: 2, limit: 1 }]);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_prune_keeps_order_of_survivors() {
        let mut g = store(2);
        g.restore(&TextGraph::new("1:2>3(p0.10,4);1:5>3(p0.90,4);9:2>3(p0.20,4);1:6>3(p0.80,4);"));
        assert_eq!(g.prune(), 1);
        assert_eq!(g.snapshot().as_str(), "1:5>3(p0.90,4);9:2>3(p0.20,4);1:6>3(p0.80,4);");
        assert_eq!(g.prune(), 0);
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let mut g = store(10);
        g.restore(&TextGraph::new("1:2>3(p0.50,4);5:6>7(p0.10,4);1:2>3(p0.5,4);"));
        assert_eq!(g.deduplicate(), 1);
        assert_eq!(g.snapshot().as_str(), "1:2>3(p0.50,4);5:6>7(p0.10,4);");
    }

    #[test]
    fn test_restore_drops_malformed_records() {
        let mut g = store(10);
        let report = g.restore(&TextGraph::new("1:2>3(p0.50,4);garbage;1:2>3(p9,4);5:6>7(p1,8)"));
        assert_eq!(report, RestoreReport { restored: 2, dropped: 2 });
        assert_eq!(g.snapshot().as_str(), "1:2>3(p0.50,4);5:6>7(p1.00,8);");
    }

    #[test]
    fn test_resolved_records() {
        let mut g = store(10);
        g.ingest(&[rel("justiça", "justiça distributiva", "necessidade", "0.9", "crise")]).unwrap();
        assert_eq!(
            g.resolved_records(),
            vec!["justiça:justiça distributiva>necessidade(p0.90,crise)".to_string()]
        );
    }

    fn text_graph() -> impl Strategy<Value = TextGraph> {
        prop::collection::vec((1u64..5, 1u64..8, 1u64..4, 0u32..=100, 1u64..4), 0..40).prop_map(
            |rows| {
                let statements: Vec<Statement> = rows
                    .into_iter()
                    .map(|(m, s, v, p, c)| {
                        let p = Probability::new(f64::from(p) / 100.0).unwrap();
                        Statement::new(Token(m), Token(s), Token(v), p, Token(c))
                    })
                    .collect();
                TextGraph::from_statements(&statements)
            },
        )
    }

    proptest! {
        #[test]
        fn prune_is_idempotent_and_bounds_fanout(graph in text_graph(), max in 1usize..6) {
            let mut g = store(max);
            g.restore(&graph);
            g.prune();
            let once = g.snapshot();
            g.prune();
            prop_assert_eq!(g.snapshot(), once);
            for (_, n) in sparsity::fanout(g.statements()) {
                prop_assert!(n <= max);
            }
        }

        #[test]
        fn deduplicate_is_idempotent(graph in text_graph()) {
            let mut g = store(10);
            g.restore(&graph);
            g.deduplicate();
            let once = g.snapshot();
            prop_assert_eq!(g.deduplicate(), 0);
            prop_assert_eq!(g.snapshot(), once);
        }

        #[test]
        fn snapshot_restore_roundtrip(graph in text_graph()) {
            let mut g = store(10);
            g.restore(&graph);
            prop_assert_eq!(g.snapshot(), graph);
        }
    }
}
