//! Position cursor and admission policy
//!
//! The cursor remembers the last forwarded position token. A candidate token
//! is admitted only when it is non-empty and strictly newer than the cursor;
//! equal or older tokens are replays.
//!
//! ## Ordering
//!
//! Tokens are opaque strings, so the comparison is an explicit policy:
//!
//! - [`TokenOrdering::Numeric`]: leading zeros are stripped, then shorter
//!   tokens sort first and equal lengths compare byte-wise. For decimal
//!   tokens this is integer order of any length: `"99" < "100"` and
//!   `"0100" == "100"`. Other tokens still get a stable total order.
//! - [`TokenOrdering::Lexical`]: raw byte-wise string order. Only correct when
//!   the source guarantees fixed-width tokens.
//!
//! `admit()` never mutates; `advance()` is the only mutation and refuses to
//! move backward.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison policy for position tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenOrdering {
    /// Compare as arbitrary-precision unsigned decimal integers
    #[default]
    Numeric,
    /// Compare as raw strings
    Lexical,
}

impl TokenOrdering {
    /// Whether `token` can be ordered
    ///
    /// Both policies order every non-empty token; the empty token never is.
    pub fn accepts(&self, token: &str) -> bool {
        !token.is_empty()
    }

    /// Compare two tokens
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            TokenOrdering::Numeric => {
                let a = a.trim_start_matches('0');
                let b = b.trim_start_matches('0');
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            TokenOrdering::Lexical => a.cmp(b),
        }
    }

    /// Parse a policy name ("numeric" or "lexical")
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "numeric" => Ok(TokenOrdering::Numeric),
            "lexical" => Ok(TokenOrdering::Lexical),
            other => Err(Error::config(format!(
                "Unknown token ordering '{}'. Valid: numeric, lexical",
                other
            ))),
        }
    }
}

/// The last admitted position token
#[derive(Debug, Clone, Default)]
pub struct PositionCursor {
    last: Option<String>,
    ordering: TokenOrdering,
}

impl PositionCursor {
    /// Create an unset cursor
    pub fn new(ordering: TokenOrdering) -> Self {
        Self { last: None, ordering }
    }

    /// Create a cursor resumed from a persisted checkpoint
    ///
    /// An empty checkpoint means "unset".
    pub fn resume(checkpoint: impl Into<String>, ordering: TokenOrdering) -> Self {
        let checkpoint = checkpoint.into();
        Self {
            last: ordering.accepts(&checkpoint).then_some(checkpoint),
            ordering,
        }
    }

    /// The last admitted token, if any
    pub fn position(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// The ordering policy in use
    pub fn ordering(&self) -> TokenOrdering {
        self.ordering
    }

    /// Whether `candidate` represents new information
    pub fn admit(&self, candidate: &str) -> bool {
        if !self.ordering.accepts(candidate) {
            return false;
        }
        match &self.last {
            None => true,
            Some(last) => self.ordering.compare(candidate, last) == Ordering::Greater,
        }
    }

    /// Move the cursor to `token`
    ///
    /// Returns `false` and leaves the cursor untouched if `token` would not be
    /// admitted.
    pub fn advance(&mut self, token: &str) -> bool {
        if !self.admit(token) {
            return false;
        }
        self.last = Some(token.to_string());
        true
    }
}
