//! The mediator: typed requests in, typed responses out.

use rampart_cache::{CacheService, CacheStore};
use rampart_config::{ConfigError, RampartConfig};
use rampart_core::{PipelineError, Request, RequestType};
use rampart_middleware::{
    AnonymousAuthorization, Endpoint, HandlerEndpoint, Invocation, MiddlewareContext, Observers,
    Pipeline, PolicyRegistryBuilder, RequestHandler, UserAuthorization,
};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Sends requests through the pipeline to their handlers.
///
/// One mediator is built per process and shared; circuit, rate limit and
/// cache state live as long as it does.
pub struct Mediator {
    config: RampartConfig,
    pipeline: Pipeline,
    handlers: HashMap<TypeId, Arc<dyn Endpoint>>,
    authorization: Arc<dyn UserAuthorization>,
}

impl Mediator {
    /// Creates a mediator builder.
    #[must_use]
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// Sends `request` on behalf of the configured caller.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error, or `PipelineError::Internal` when no
    /// handler is registered for `R`.
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response, PipelineError> {
        let mut ctx = MiddlewareContext::with_authorization(self.authorization.clone());
        self.send_with(&mut ctx, request).await
    }

    /// Sends `request` with a caller-supplied context.
    ///
    /// Use this to pass a cancellation token, a request id or a per-call
    /// authorization.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_with<R: Request>(
        &self,
        ctx: &mut MiddlewareContext,
        request: R,
    ) -> Result<R::Response, PipelineError> {
        let request_type = R::request_type();
        let Some(endpoint) = self.handlers.get(&request_type.id()) else {
            return Err(PipelineError::internal(format!(
                "no handler registered for {}",
                request_type.full_name()
            )));
        };

        let invocation = Invocation::new(request)?;
        let response = self
            .pipeline
            .process(ctx, &invocation, endpoint.as_ref())
            .await?;

        serde_json::from_value(response).map_err(|e| {
            PipelineError::internal_with_source(
                format!("failed to decode the response of {}", request_type.name()),
                e,
            )
        })
    }

    /// Returns `true` if a handler is registered for `R`.
    #[must_use]
    pub fn has_handler<R: Request>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    /// Returns the configuration the mediator was built with.
    #[must_use]
    pub fn config(&self) -> &RampartConfig {
        &self.config
    }

    /// Returns the assembled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("environment", &self.config.app.environment)
            .field("pipeline", &self.pipeline)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Mediator`].
pub struct MediatorBuilder {
    config: RampartConfig,
    policies: PolicyRegistryBuilder,
    handlers: HashMap<TypeId, Arc<dyn Endpoint>>,
    duplicates: Vec<RequestType>,
    cache_store: Option<Arc<dyn CacheStore>>,
    authorization: Arc<dyn UserAuthorization>,
    observers: Observers,
}

impl MediatorBuilder {
    /// Creates a builder with the default configuration, no handlers and an
    /// anonymous caller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RampartConfig::default(),
            policies: PolicyRegistryBuilder::new(),
            handlers: HashMap::new(),
            duplicates: Vec::new(),
            cache_store: None,
            authorization: Arc::new(AnonymousAuthorization),
            observers: Observers::new(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: RampartConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-type policies, validators and fallbacks.
    #[must_use]
    pub fn policies(mut self, policies: PolicyRegistryBuilder) -> Self {
        self.policies = policies;
        self
    }

    /// Registers the handler for `R`.
    #[must_use]
    pub fn handler<R: Request, H: RequestHandler<R>>(mut self, handler: H) -> Self {
        let endpoint: Arc<dyn Endpoint> = Arc::new(HandlerEndpoint::<R, H>::new(handler));
        if self.handlers.insert(TypeId::of::<R>(), endpoint).is_some() {
            self.duplicates.push(R::request_type());
        }
        self
    }

    /// Sets the store behind the caching stage. Without one nothing is cached.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Sets who requests are sent on behalf of.
    #[must_use]
    pub fn authorization(mut self, authorization: Arc<dyn UserAuthorization>) -> Self {
        self.authorization = authorization;
        self
    }

    /// Sets the retry, circuit and timeout observers.
    #[must_use]
    pub fn observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    /// Builds the mediator.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration or a policy is invalid,
    /// or if a request type has more than one handler.
    pub fn build(self) -> Result<Mediator, ConfigError> {
        if let Some(request_type) = self.duplicates.first() {
            return Err(ConfigError::validation_error(format!(
                "more than one handler registered for {}",
                request_type.full_name()
            )));
        }

        let registry = Arc::new(self.policies.build(&self.config)?);
        let cache = self
            .cache_store
            .map(|store| CacheService::from_config(store, &self.config));
        let pipeline = Pipeline::builder()
            .standard(&self.config, registry, cache, self.observers)
            .build()?;

        tracing::debug!(
            environment = %self.config.app.environment,
            namespace = %self.config.app.namespace,
            handlers = self.handlers.len(),
            stages = ?pipeline.stage_names(),
            "Mediator built"
        );

        Ok(Mediator {
            config: self.config,
            pipeline,
            handlers: self.handlers,
            authorization: self.authorization,
        })
    }
}

impl Default for MediatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MediatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediatorBuilder")
            .field("handlers", &self.handlers.len())
            .field("cache_store", &self.cache_store.is_some())
            .finish_non_exhaustive()
    }
}
