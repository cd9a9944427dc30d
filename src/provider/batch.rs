use super::{BatchResolve, ProviderError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How ids are grouped and paced when resolved in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    batch_size: usize,
    delay: Duration,
}

impl BatchPolicy {
    /// Upstream rejects vkey requests carrying more ids than this.
    pub const MAX_BATCH_SIZE: usize = 100;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    /// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.clamp(1, Self::MAX_BATCH_SIZE),
            delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::new(Self::MAX_BATCH_SIZE, Self::DEFAULT_DELAY)
    }
}

/// Resolves an arbitrary number of ids through a [`BatchResolve`], one batch
/// at a time.
#[derive(Clone)]
pub struct IdentifierBatcher {
    resolver: Arc<dyn BatchResolve>,
    policy: BatchPolicy,
}

impl IdentifierBatcher {
    pub fn new(resolver: Arc<dyn BatchResolve>, policy: BatchPolicy) -> Self {
        Self { resolver, policy }
    }

    /// Resolve every id, preserving order and length.
    ///
    /// Batches run strictly one after another with `policy.delay` between
    /// them. The first failing batch aborts the whole call.
    pub async fn resolve_all(&self, ids: &[String]) -> Result<Vec<String>> {
        let size = self.policy.batch_size();
        let total = ids.len().div_ceil(size);
        let mut out = Vec::with_capacity(ids.len());

        for (i, chunk) in ids.chunks(size).enumerate() {
            info!("batch {}/{} ({} songs)", i + 1, total, chunk.len());
            let urls = self.resolver.resolve_batch(chunk).await?;
            if urls.len() != chunk.len() {
                return Err(ProviderError::Malformed {
                    endpoint: "vkey",
                    detail: format!("expected {} urls, got {}", chunk.len(), urls.len()),
                });
            }
            out.extend(urls);

            if i + 1 < total {
                tokio::time::sleep(self.policy.delay()).await;
            }
        }

        Ok(out)
    }
}
