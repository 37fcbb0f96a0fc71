//! Ordered fallback across strategies.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{ResolveError, ResolvedFile, Resolver};
use crate::parser::ShareLink;

/// Tries each strategy in order and returns the first success.
///
/// When every strategy fails, the last strategy's error is returned.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverChain {
    /// Creates a chain with a primary strategy.
    #[must_use]
    pub fn new(primary: Box<dyn Resolver>) -> Self {
        Self {
            resolvers: vec![primary],
        }
    }

    /// Appends a fallback strategy.
    pub fn push(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    /// Strategy names in the order they are tried.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}

#[async_trait]
impl Resolver for ResolverChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn resolve(&self, link: &ShareLink) -> Result<ResolvedFile, ResolveError> {
        let mut last_error = None;
        for (index, resolver) in self.resolvers.iter().enumerate() {
            debug!(strategy = resolver.name(), position = index + 1, "trying strategy");
            match resolver.resolve(link).await {
                Ok(file) => {
                    if index > 0 {
                        info!(strategy = resolver.name(), "fallback strategy succeeded");
                    }
                    return Ok(file);
                }
                Err(error) => {
                    warn!(strategy = resolver.name(), error = %error, "strategy failed");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            ResolveError::setup("chain", "no strategies configured", "Configure a strategy")
        }))
    }
}
