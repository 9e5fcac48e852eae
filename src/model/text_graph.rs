//! TextGraph — the serialized form of the whole graph.

use serde::{Deserialize, Serialize};
use super::Statement;

/// Record terminator in the textual graph.
pub const RECORD_SEPARATOR: char = ';';

/// A sequence of encoded statements, each terminated by `;`.
///
/// `1:2>3(p0.90,4);5:6>7(p0.50,4);`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextGraph(String);

impl TextGraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encode statements in order.
    pub fn from_statements<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Self {
        let mut text = String::new();
        for statement in statements {
            text.push_str(&crate::rgl::encode(statement));
            text.push(RECORD_SEPARATOR);
        }
        Self(text)
    }

    /// Non-empty records, trimmed, in order. Tolerates a missing final
    /// separator and stray whitespace between records.
    pub fn records(&self) -> impl Iterator<Item = &str> {
        self.0
            .split(RECORD_SEPARATOR)
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.records().next().is_none()
    }
}

impl std::fmt::Display for TextGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TextGraph {
    fn from(text: String) -> Self {
        Self(text)
    }
}
