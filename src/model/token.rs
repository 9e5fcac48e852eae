//! Token interning — the bidirectional term ↔ token dictionary.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

/// Opaque token identifier standing in for a term inside encoded statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Token(pub u64);

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only dictionary mapping terms to tokens and back.
///
/// Tokens are allocated monotonically starting at 1 and are never reused.
/// Terms are matched case-sensitively; callers normalize before interning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    forward: HashMap<String, Token>,
    reverse: HashMap<Token, String>,
    next: u64,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            next: 1,
        }
    }

    /// Rebuild a registry from already-checked parts.
    ///
    /// The persistence layer verifies that `reverse` inverts `forward` and
    /// that `next` is past every allocated id before calling this.
    pub(crate) fn from_parts(
        forward: HashMap<String, Token>,
        reverse: HashMap<Token, String>,
        next: u64,
    ) -> Self {
        Self { forward, reverse, next }
    }

    /// Return the token for `term`, allocating the next one if it is new.
    ///
    /// Fails with `CorruptState` once the id space is used up; the counter
    /// must stay above every allocated id.
    pub fn intern(&mut self, term: &str) -> Result<Token> {
        if let Some(token) = self.forward.get(term) {
            return Ok(*token);
        }
        let next = self.next.checked_add(1).ok_or_else(|| {
            Error::CorruptState(format!("token counter exhausted at {}", self.next))
        })?;
        let token = Token(self.next);
        self.next = next;
        self.forward.insert(term.to_string(), token);
        self.reverse.insert(token, term.to_string());
        Ok(token)
    }

    /// Term for `token`, or the token's literal form when it is unknown.
    pub fn resolve(&self, token: Token) -> String {
        match self.reverse.get(&token) {
            Some(term) => term.clone(),
            None => token.to_string(),
        }
    }

    /// Token for an already-interned term, without allocating.
    pub fn lookup(&self, term: &str) -> Option<Token> {
        self.forward.get(term).copied()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.reverse.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// The id the next new term will receive.
    pub fn next_token(&self) -> u64 {
        self.next
    }

    pub fn forward(&self) -> &HashMap<String, Token> {
        &self.forward
    }

    pub fn reverse(&self) -> &HashMap<Token, String> {
        &self.reverse
    }
}
