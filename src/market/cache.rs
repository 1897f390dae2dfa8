//! Single-entry cache for slot-derived Polymarket identifiers.

use std::sync::Arc;

use tracing::{debug, info};

use super::discovery::IdentifierResolver;
use super::types::InstrumentIdentifiers;
use crate::error::MarketError;
use crate::metrics;

/// Caches the most recent slug -> token ID resolution.
///
/// Capacity is exactly one: the lookup key encodes the slot, so once it
/// changes the old identifiers are stale forever.
pub struct IdentifierCache {
    resolver: Arc<dyn IdentifierResolver>,
    entry: Option<InstrumentIdentifiers>,
}

impl IdentifierCache {
    /// Create an empty cache backed by `resolver`.
    pub fn new(resolver: Arc<dyn IdentifierResolver>) -> Self {
        Self {
            resolver,
            entry: None,
        }
    }

    /// Resolve `lookup_key`, hitting the network only on a key change.
    ///
    /// On failure the previous entry is kept.
    pub async fn resolve(&mut self, lookup_key: &str) -> Result<InstrumentIdentifiers, MarketError> {
        if let Some(entry) = &self.entry {
            if entry.slug == lookup_key {
                debug!(slug = %lookup_key, "Identifier cache hit");
                return Ok(entry.clone());
            }
        }

        let resolved = self.resolver.resolve(lookup_key).await?;
        metrics::inc_identifier_resolutions();
        info!(
            slug = %lookup_key,
            up_token = %resolved.up_token_id,
            down_token = %resolved.down_token_id,
            "Resolved Polymarket identifiers"
        );

        // Keyed by the requested slug so the next lookup hits.
        let resolved = InstrumentIdentifiers {
            slug: lookup_key.to_string(),
            ..resolved
        };
        self.entry = Some(resolved.clone());
        Ok(resolved)
    }

    /// Currently cached entry.
    pub fn cached(&self) -> Option<&InstrumentIdentifiers> {
        self.entry.as_ref()
    }
}

impl std::fmt::Debug for IdentifierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierCache")
            .field("entry", &self.entry)
            .finish()
    }
}
