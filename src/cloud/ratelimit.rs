//! Rate limiting hook
//!
//! Every dispatch to the provider first passes through a [`RateLimiter`].
//! Only the contract and a no-op policy live here; real policies are
//! supplied by the caller.

use crate::error::Result;
use crate::meta::Version;
use crate::Context;
use async_trait::async_trait;

/// Key identifying the operation to be rate limited. The rate limit queue is
/// chosen from its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub project_id: String,
    /// Operation name, e.g. `Get`, `Insert`, `SetUrlMap`
    pub operation: String,
    pub version: Version,
    /// Service name, e.g. `Addresses`
    pub service: String,
}

/// Rate limiting policy.
///
/// `accept` may block for as long as the policy requires, or until `ctx` is
/// cancelled. Stateful policies synchronize themselves.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn accept(&self, ctx: &Context, key: &RateLimitKey) -> Result<()>;
}

/// A rate limiter that performs no limiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopRateLimiter;

#[async_trait]
impl RateLimiter for NopRateLimiter {
    async fn accept(&self, _ctx: &Context, _key: &RateLimitKey) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nop_never_blocks_or_errors() {
        let key = RateLimitKey {
            project_id: "p".to_string(),
            operation: "Get".to_string(),
            version: Version::Beta,
            service: "Instances".to_string(),
        };
        let ctx = Context::new();
        ctx.cancel();
        assert!(NopRateLimiter.accept(&ctx, &key).await.is_ok());
    }
}
