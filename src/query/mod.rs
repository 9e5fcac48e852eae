//! Query engine — recommendation lookups over a `GraphStore`.
//!
//! A statement is a candidate for `(query, context)` when its main term
//! contains `query`, and its main term or its condition contains `context`.
//! Both tests are case-insensitive substring matches. The strongest candidate
//! wins; ties go to the earlier statement.

use serde::{Deserialize, Serialize};
use crate::model::{Probability, Statement};
use crate::storage::GraphStore;

/// A matched statement with its recommendation text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub result: String,
    pub explanation: String,
    pub statement: Statement,
    pub probability: Probability,
}

/// Outcome of a lookup. `NoMatch` is a normal answer, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryOutcome {
    Match(Answer),
    NoMatch,
}

impl QueryOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, QueryOutcome::Match(_))
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            QueryOutcome::Match(answer) => Some(answer),
            QueryOutcome::NoMatch => None,
        }
    }
}

/// Read-only view over a store for answering queries.
pub struct QueryEngine<'g> {
    store: &'g GraphStore,
}

impl<'g> QueryEngine<'g> {
    pub fn new(store: &'g GraphStore) -> Self {
        Self { store }
    }

    /// Best candidate for `query` under `context`, or `NoMatch`.
    pub fn answer(&self, query: &str, context: &str) -> QueryOutcome {
        match self.rank(query, context, 1).into_iter().next() {
            Some(answer) => QueryOutcome::Match(answer),
            None => QueryOutcome::NoMatch,
        }
    }

    /// Up to `limit` candidates, strongest first, ties in graph order.
    pub fn rank(&self, query: &str, context: &str, limit: usize) -> Vec<Answer> {
        let query = query.to_lowercase();
        let context = context.to_lowercase();
        let registry = self.store.registry();

        let mut candidates: Vec<&Statement> = self
            .store
            .statements()
            .iter()
            .filter(|s| {
                let main = registry.resolve(s.main).to_lowercase();
                let condition = registry.resolve(s.condition).to_lowercase();
                main.contains(&query) && (condition.contains(&context) || main.contains(&context))
            })
            .collect();

        // Stable: equal weights keep their graph order.
        candidates.sort_by(|a, b| b.probability.value().total_cmp(&a.probability.value()));
        candidates.into_iter().take(limit).map(|s| self.explain(s)).collect()
    }

    fn explain(&self, s: &Statement) -> Answer {
        let registry = self.store.registry();
        let variable = registry.resolve(s.variable);
        let sub_meaning = registry.resolve(s.sub);
        let condition = registry.resolve(s.condition);

        Answer {
            result: format!("Recommend: {variable}"),
            explanation: format!(
                "{} via {sub_meaning} (probability {}) under condition {condition}",
                registry.resolve(s.main),
                s.probability,
            ),
            statement: *s,
            probability: s.probability,
        }
    }
}
