//! # Relation Extraction
//!
//! Turning raw text into candidate relations is a pluggable capability.
//! The engine only relies on the output contract (`Vec<Relation>`), so a
//! model-backed extractor can replace the heuristic one without touching
//! the store.
//!
//! | Extractor | Module | Description |
//! |-----------|--------|-------------|
//! | `ArrowExtractor` | `arrow` | `meaning > sub > variable (pPROB, condition)` clauses, or a JSON array |

pub mod arrow;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;

use crate::model::Relation;
use crate::{Error, Result};

pub use arrow::ArrowExtractor;

/// Produces candidate relations from raw natural-language input.
#[async_trait]
pub trait RelationExtractor: Send + Sync {
    /// Extract relations from `raw_text`. Producing nothing is `Ok(vec![])`;
    /// `Err` means the extractor itself failed.
    async fn extract(&self, raw_text: &str) -> Result<Vec<Relation>>;
}

#[async_trait]
impl<X: RelationExtractor + ?Sized> RelationExtractor for Arc<X> {
    async fn extract(&self, raw_text: &str) -> Result<Vec<Relation>> {
        (**self).extract(raw_text).await
    }
}

#[async_trait]
impl<X: RelationExtractor + ?Sized> RelationExtractor for Box<X> {
    async fn extract(&self, raw_text: &str) -> Result<Vec<Relation>> {
        (**self).extract(raw_text).await
    }
}

/// Run an extractor with a deadline.
///
/// Timeouts and extractor failures both come back as
/// `Error::ExtractionUnavailable`; the caller decides whether that means
/// "zero relations" or a retry.
pub async fn extract_with_deadline<X>(
    extractor: &X,
    raw_text: &str,
    deadline: Duration,
) -> Result<Vec<Relation>>
where
    X: RelationExtractor + ?Sized,
{
    match tokio::time::timeout(deadline, extractor.extract(raw_text)).await {
        Ok(Ok(relations)) => Ok(relations),
        Ok(Err(Error::ExtractionUnavailable(reason))) => Err(Error::ExtractionUnavailable(reason)),
        Ok(Err(e)) => Err(Error::ExtractionUnavailable(e.to_string())),
        Err(_) => Err(Error::ExtractionUnavailable(format!(
            "timed out after {}ms",
            deadline.as_millis()
        ))),
    }
}
