//! Target contract.
//!
//! A target is the system under evaluation, typically an LLM call or an
//! agent loop. It receives a case's input mapping and produces a
//! [`TargetOutput`]. Any error it returns becomes an `error` trial; the
//! runner never lets a target failure escape a case.

use crate::types::TargetOutput;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// The system under evaluation.
#[async_trait]
pub trait Target: Send + Sync {
    /// Produce an output for one case input.
    async fn invoke(&self, input: &Map<String, Value>) -> anyhow::Result<TargetOutput>;
}

type TargetFuture = Pin<Box<dyn Future<Output = anyhow::Result<TargetOutput>> + Send>>;

/// Function-based target for closures and test doubles.
pub struct FnTarget<F> {
    func: F,
}

impl<F> FnTarget<F>
where
    F: Fn(&Map<String, Value>) -> TargetFuture + Send + Sync,
{
    /// Wrap a closure as a target.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Target for FnTarget<F>
where
    F: Fn(&Map<String, Value>) -> TargetFuture + Send + Sync,
{
    async fn invoke(&self, input: &Map<String, Value>) -> anyhow::Result<TargetOutput> {
        (self.func)(input).await
    }
}

/// Build a target from an async closure without spelling out the boxing.
pub fn target_fn<F, Fut>(func: F) -> impl Target
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<TargetOutput>> + Send + 'static,
{
    struct ClosureTarget<F>(F);

    #[async_trait]
    impl<F, Fut> Target for ClosureTarget<F>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync,
        Fut: Future<Output = anyhow::Result<TargetOutput>> + Send + 'static,
    {
        async fn invoke(&self, input: &Map<String, Value>) -> anyhow::Result<TargetOutput> {
            (self.0)(input.clone()).await
        }
    }

    ClosureTarget(func)
}
