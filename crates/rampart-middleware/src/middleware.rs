//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all pipeline stages
//! implement, the [`Next`] continuation they receive, and the [`Endpoint`]
//! that terminates the chain.
//!
//! # Design Philosophy
//!
//! Rampart uses a fixed-order middleware pipeline. The standard stages
//! cannot be reordered (see [`crate::pipeline`]).
//! Unlike a one-shot callback, [`Next`] is `Copy`: a stage may run the rest
//! of the chain more than once, which is how the retry stage works.
//!
//! # Example
//!
//! ```
//! use rampart_middleware::{
//!     BoxFuture, Invocation, Middleware, MiddlewareContext, Next, PipelineResult,
//! };
//!
//! struct Audit;
//!
//! impl Middleware for Audit {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         invocation: &'a Invocation,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, PipelineResult> {
//!         Box::pin(async move {
//!             tracing::info!(request_name = invocation.name(), "Request received");
//!             next.run(ctx, invocation).await
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::types::{Invocation, PipelineResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A boxed future returned by middleware and endpoints.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core middleware trait.
///
/// All pipeline stages implement this trait. Middleware receives a mutable
/// context, the invocation, and a [`Next`] continuation to invoke the rest
/// of the chain.
///
/// # Invariants
///
/// - Middleware MUST NOT swallow an error unless it substitutes a response
///   for it (fallback, cache hit)
/// - Middleware MUST NOT hold a lock across `next.run()`
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware stage.
    ///
    /// This name is used for ordering checks, logging and debugging.
    fn name(&self) -> &'static str;

    /// Processes the invocation through this middleware.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The mutable middleware context
    /// * `invocation` - The request being processed
    /// * `next` - Continuation for the rest of the chain
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult>;
}

/// The terminal point of the chain.
pub trait Endpoint: Send + Sync {
    /// Invokes the handler for `invocation`.
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, PipelineResult>;
}

/// Continuation for the rest of the middleware chain.
///
/// Calling [`Next::run`] runs every remaining stage and then the endpoint.
/// Not calling it short-circuits the pipeline.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Creates a continuation over `chain` that ends in `endpoint`.
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Endpoint) -> Self {
        Self { chain, endpoint }
    }

    /// Runs the rest of the chain.
    pub fn run<'b>(
        self,
        ctx: &'b mut MiddlewareContext,
        invocation: &'b Invocation,
    ) -> BoxFuture<'b, PipelineResult>
    where
        'a: 'b,
    {
        match self.chain.split_first() {
            Some((middleware, rest)) => {
                middleware.process(ctx, invocation, Next::new(rest, self.endpoint))
            }
            None => self.endpoint.call(ctx, invocation),
        }
    }

    /// Returns the number of stages left before the endpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.chain.iter().map(|m| m.name()).collect();
        f.debug_struct("Next").field("chain", &names).finish_non_exhaustive()
    }
}

/// An endpoint built from a closure over the serialized payload.
///
/// Useful for tests and for handlers that do not need the typed request.
///
/// # Example
///
/// ```
/// use rampart_middleware::FnEndpoint;
/// use serde_json::json;
///
/// let endpoint = FnEndpoint::new(|payload, _cancel| async move {
///     Ok(json!({ "echo": payload }))
/// });
/// # let _ = endpoint;
/// ```
pub struct FnEndpoint<F> {
    f: F,
}

impl<F, Fut> FnEndpoint<F>
where
    F: Fn(serde_json::Value, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = PipelineResult> + Send + 'static,
{
    /// Creates a new function-based endpoint.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Endpoint for FnEndpoint<F>
where
    F: Fn(serde_json::Value, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = PipelineResult> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin((self.f)(
            invocation.payload().clone(),
            ctx.cancellation_token(),
        ))
    }
}
