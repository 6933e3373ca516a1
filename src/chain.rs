use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cache::SuggestionCache;
use crate::config::EngineConfig;
use crate::errors::{SuggestError, SuggestResult};
use crate::model::PlaceHit;
use crate::rank::{rank, DedupKey, RankOptions};
use crate::sources::PlaceSource;
use crate::text::cache_key;

/// Cache-first lookup against the registry, falling back to the geocoder once.
#[derive(Clone)]
pub struct SourceChain {
    primary: Arc<dyn PlaceSource>,
    fallback: Arc<dyn PlaceSource>,
    cache: Arc<dyn SuggestionCache>,
    primary_limit: usize,
    fallback_limit: usize,
    timeout: Duration,
    rank: RankOptions,
}

impl SourceChain {
    pub fn new(
        primary: Arc<dyn PlaceSource>,
        fallback: Arc<dyn PlaceSource>,
        cache: Arc<dyn SuggestionCache>,
        config: &EngineConfig,
        rank: RankOptions,
    ) -> Self {
        Self {
            primary,
            fallback,
            cache,
            primary_limit: config.primary_limit,
            fallback_limit: config.geocoder_limit,
            timeout: config.request_timeout(),
            rank,
        }
    }

    pub fn rank_options(&self) -> RankOptions {
        self.rank
    }

    /// Returns ranked suggestions for `query`. Source failures never surface:
    /// when both sources fail the result is an empty list. The only error is
    /// [`SuggestError::Cancelled`].
    pub async fn fetch(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> SuggestResult<Vec<PlaceHit>> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }
        let query = query.trim();
        let key = self.scoped_key(query);
        if let Some(hits) = self.cache.get(&key) {
            trace!(query, hits = hits.len(), "suggestion cache hit");
            return Ok(hits);
        }

        let primary = guarded(
            self.primary.search(query, self.primary_limit),
            cancel,
            self.timeout,
        )
        .await;
        let ranked = match primary {
            Ok(hits) => {
                let ranked = rank(hits, query, self.rank);
                if ranked.is_empty() {
                    debug!(
                        query,
                        source = self.primary.name(),
                        "no usable primary matches; trying fallback"
                    );
                    rank(self.fallback_hits(query, cancel).await?, query, self.rank)
                } else {
                    ranked
                }
            }
            Err(SuggestError::Cancelled) => return Err(SuggestError::Cancelled),
            Err(err) => {
                warn!(
                    ?err,
                    source = self.primary.name(),
                    "primary place source failed; trying fallback"
                );
                rank(self.fallback_hits(query, cancel).await?, query, self.rank)
            }
        };

        if !ranked.is_empty() {
            self.cache.set(&key, ranked.clone());
        }
        debug!(query, hits = ranked.len(), "suggestions ready");
        Ok(ranked)
    }

    async fn fallback_hits(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> SuggestResult<Vec<PlaceHit>> {
        match guarded(
            self.fallback.search(query, self.fallback_limit),
            cancel,
            self.timeout,
        )
        .await
        {
            Ok(hits) => Ok(hits),
            Err(SuggestError::Cancelled) => Err(SuggestError::Cancelled),
            Err(err) => {
                warn!(
                    ?err,
                    source = self.fallback.name(),
                    "fallback place source failed; no suggestions"
                );
                Ok(Vec::new())
            }
        }
    }

    // Fields with different dedup keys or limits rank the same query
    // differently, so each ranking profile gets its own slice of the cache.
    fn scoped_key(&self, query: &str) -> String {
        let dedup = match self.rank.dedup {
            DedupKey::Name => "name",
            DedupKey::NameRegion => "name+region",
        };
        format!("{dedup}/{}/{}", self.rank.limit, cache_key(query))
    }
}

/// Runs `future` until it finishes, `cancel` fires, or `timeout` elapses.
pub(crate) async fn guarded<T, F>(
    future: F,
    cancel: &CancellationToken,
    timeout: Duration,
) -> SuggestResult<T>
where
    F: Future<Output = SuggestResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SuggestError::Cancelled),
        outcome = tokio::time::timeout(timeout, future) => match outcome {
            Ok(result) => result,
            Err(_) => Err(SuggestError::Timeout(timeout.as_millis() as u64)),
        },
    }
}
