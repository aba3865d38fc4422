//! Expiry rules: absolute expiry computation and stale-hit filtering.

use lexcache_core::{ExpiryStrategy, UnixTimestamp, UNLIMITED_EXPIRES_AT};
use lexcache_index::{Document, Query};

use crate::schema;

/// State of an index hit at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitState {
    Live,
    Expired,
    /// No readable expiry or payload was stored. Handled as expired.
    Legacy,
}

impl HitState {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    default_lifetime: i64,
    strategy: ExpiryStrategy,
}

impl ExpiryPolicy {
    pub fn new(default_lifetime: i64, strategy: ExpiryStrategy) -> Self {
        Self {
            default_lifetime,
            strategy,
        }
    }

    pub fn strategy(&self) -> ExpiryStrategy {
        self.strategy
    }

    /// Absolute expiry for a write at `now`.
    ///
    /// `None` uses the default lifetime, `0` never expires. A negative
    /// lifetime yields `None`: the write must be skipped.
    pub fn resolve(&self, now: UnixTimestamp, lifetime: Option<i64>) -> Option<UnixTimestamp> {
        let lifetime = lifetime.unwrap_or(self.default_lifetime);
        match lifetime {
            l if l < 0 => None,
            0 => Some(UNLIMITED_EXPIRES_AT),
            l => Some(now.saturating_add(l).min(UNLIMITED_EXPIRES_AT)),
        }
    }

    pub fn classify(&self, document: &Document, now: UnixTimestamp) -> HitState {
        if schema::content(document).is_none() {
            return HitState::Legacy;
        }
        match schema::expires_at(document) {
            Some(expires_at) if expires_at >= now => HitState::Live,
            Some(_) => HitState::Expired,
            None => HitState::Legacy,
        }
    }

    /// The query to run for live documents. Under [`ExpiryStrategy::Query`]
    /// the lifetime constraint is part of the query itself; hits must still
    /// go through [`classify`](Self::classify) to drop legacy documents.
    pub fn freshness_query(&self, query: Query, now: UnixTimestamp) -> Query {
        match self.strategy {
            ExpiryStrategy::Lazy => query,
            ExpiryStrategy::Query => {
                Query::and([query, Query::at_least(schema::FIELD_LIFETIME, now)])
            }
        }
    }

    /// Every document whose expiry lies strictly before `now`.
    pub fn garbage_query(&self, now: UnixTimestamp) -> Query {
        Query::less_than(schema::FIELD_LIFETIME, now)
    }
}
