//! Heuristic extractor for arrow-notation text.
//!
//! One clause per line (or per `;`):
//!
//! ```text
//! justiça > justiça distributiva > necessidade (p0.9, crise)
//! justiça > priorizar recursos (crise)
//! ```
//!
//! With only two segments the condition doubles as the variable. Missing
//! probability and condition fall back to the configured defaults. Input
//! that starts with `[` is read as a JSON array of relations instead.

use async_trait::async_trait;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::model::Relation;
use crate::{Error, Result};
use super::RelationExtractor;

#[derive(Debug, Clone)]
pub struct ArrowExtractor {
    default_probability: String,
    default_condition: String,
}

impl Default for ArrowExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl ArrowExtractor {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            default_probability: config.default_probability.clone(),
            default_condition: config.default_condition.clone(),
        }
    }

    /// Synchronous core of `extract`.
    pub fn parse(&self, raw_text: &str) -> Result<Vec<Relation>> {
        let text = raw_text.trim();
        if text.starts_with('[') {
            return serde_json::from_str(text)
                .map_err(|e| Error::ExtractionUnavailable(format!("invalid relation JSON: {e}")));
        }

        Ok(text
            .split(['\n', ';'])
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .filter_map(|clause| self.parse_clause(clause))
            .collect())
    }

    fn parse_clause(&self, clause: &str) -> Option<Relation> {
        let (head, annotation) = split_annotation(clause);

        let segments: Vec<&str> = head.split('>').map(str::trim).collect();
        if segments.len() < 2 || segments.len() > 3 || segments.iter().any(|s| s.is_empty()) {
            debug!(clause, "clause is not `meaning > sub [> variable]`, skipping");
            return None;
        }

        let mut probability = None;
        let mut condition = None;
        let items = annotation
            .into_iter()
            .flat_map(|a| a.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty());
        for (i, item) in items.enumerate() {
            // `pNUM` anywhere, or a bare number in first position.
            let weight = match item.strip_prefix('p') {
                Some(rest) => Some(rest),
                None if i == 0 => Some(item),
                None => None,
            };
            match weight.filter(|w| is_number(w)) {
                Some(w) if probability.is_none() => probability = Some(w.to_string()),
                _ => condition = Some(item.to_string()),
            }
        }

        let condition = condition.unwrap_or_else(|| self.default_condition.clone());
        let variable = segments.get(2).map_or_else(|| condition.clone(), |v| v.to_string());

        Some(Relation {
            meaning: segments[0].to_string(),
            sub_meaning: segments[1].to_string(),
            variable,
            probability: probability.unwrap_or_else(|| self.default_probability.clone()),
            condition,
        })
    }
}

fn is_number(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit() || c == '.') && text.parse::<f64>().is_ok()
}

/// Split `head (annotation)` into its parts. No trailing parenthesis means
/// no annotation.
fn split_annotation(clause: &str) -> (&str, Option<&str>) {
    if let Some(body) = clause.strip_suffix(')') {
        if let Some(open) = body.rfind('(') {
            return (&body[..open], Some(&body[open + 1..]));
        }
    }
    (clause, None)
}

#[async_trait]
impl RelationExtractor for ArrowExtractor {
    async fn extract(&self, raw_text: &str) -> Result<Vec<Relation>> {
        self.parse(raw_text)
    }
}
