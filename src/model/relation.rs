//! Relation — the extractor's output contract.

use serde::{Deserialize, Serialize};

/// One candidate relation produced from raw text.
///
/// `probability` stays textual here; it is parsed and range-checked when the
/// relation is ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub meaning: String,
    pub sub_meaning: String,
    pub variable: String,
    pub probability: String,
    pub condition: String,
}

impl Relation {
    pub fn new(
        meaning: impl Into<String>,
        sub_meaning: impl Into<String>,
        variable: impl Into<String>,
        probability: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            meaning: meaning.into(),
            sub_meaning: sub_meaning.into(),
            variable: variable.into(),
            probability: probability.into(),
            condition: condition.into(),
        }
    }
}
