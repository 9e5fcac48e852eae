//! Statement (weighted edge) in the semantic graph.

use serde::{Deserialize, Serialize};
use super::{Token, TokenRegistry};
use crate::{Error, Result};

/// Edge weight in `[0.0, 1.0]`, held at two-decimal precision.
///
/// Every constructor rounds to hundredths, so a stored probability always
/// encodes to exactly the text it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    pub const ZERO: Probability = Probability(0.0);
    pub const ONE: Probability = Probability(1.0);

    /// Checked constructor. Out-of-range or non-finite values are rejected,
    /// never clamped.
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidProbability(value.to_string()));
        }
        Ok(Self(round_hundredths(value)))
    }

    /// Parse the extractor's textual probability (e.g. `"0.9"`).
    pub fn parse(text: &str) -> Result<Self> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidProbability(text.to_string()))?;
        Self::new(value).map_err(|_| Error::InvalidProbability(text.to_string()))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `existing * (1 - incoming_weight) + incoming * incoming_weight`.
    ///
    /// Both inputs and the weight lie in `[0,1]`, so the blend does too.
    pub fn blend(self, incoming: Probability, incoming_weight: f64) -> Probability {
        let mixed = self.0 * (1.0 - incoming_weight) + incoming.0 * incoming_weight;
        Probability(round_hundredths(mixed.clamp(0.0, 1.0)))
    }
}

impl TryFrom<f64> for Probability {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Probability::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> f64 {
        p.0
    }
}

impl std::fmt::Display for Probability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Identity of a statement for merge purposes. The condition is an
/// attribute of the edge, not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub main: Token,
    pub sub: Token,
    pub variable: Token,
}

/// One directed, labeled, weighted edge: `MAIN:SUB>VAR(pPROB,COND)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub main: Token,
    pub sub: Token,
    pub variable: Token,
    pub probability: Probability,
    pub condition: Token,
}

impl Statement {
    pub fn new(
        main: Token,
        sub: Token,
        variable: Token,
        probability: Probability,
        condition: Token,
    ) -> Self {
        Self { main, sub, variable, probability, condition }
    }

    pub fn key(&self) -> MergeKey {
        MergeKey {
            main: self.main,
            sub: self.sub,
            variable: self.variable,
        }
    }

    /// Render with terms instead of token ids.
    pub fn resolved<'a>(&'a self, registry: &'a TokenRegistry) -> ResolvedStatement<'a> {
        ResolvedStatement { statement: self, registry }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::rgl::encode(self))
    }
}

impl std::str::FromStr for Statement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::rgl::decode(s)
    }
}

/// Display adapter showing a statement's terms, for audit output.
pub struct ResolvedStatement<'a> {
    statement: &'a Statement,
    registry: &'a TokenRegistry,
}

impl std::fmt::Display for ResolvedStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.statement;
        write!(
            f,
            "{}:{}>{}(p{:.2},{})",
            self.registry.resolve(s.main),
            self.registry.resolve(s.sub),
            self.registry.resolve(s.variable),
            s.probability.value(),
            self.registry.resolve(s.condition),
        )
    }
}
