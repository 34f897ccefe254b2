//! Middleware context types.
//!
//! The [`MiddlewareContext`] carries per-invocation state through the
//! pipeline: the correlation id, the cancellation signal, the caller
//! resolver, and typed extensions stages can use to hand data to each other.

use crate::authorization::{AnonymousAuthorization, UserAuthorization};
use rampart_core::{AuthorizedUser, RequestId};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Context that flows through the middleware pipeline.
///
/// # Example
///
/// ```
/// use rampart_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// assert!(!ctx.is_cancelled());
///
/// ctx.set_extension(42u32);
/// assert_eq!(ctx.get_extension::<u32>(), Some(&42));
/// ```
pub struct MiddlewareContext {
    /// Unique identifier for this invocation.
    request_id: RequestId,

    /// When the invocation entered the pipeline.
    started_at: Instant,

    /// Resolves the caller on demand.
    authorization: Arc<dyn UserAuthorization>,

    /// The caller, once resolved.
    caller: Option<AuthorizedUser>,

    /// Signal observed by handlers; replaced by the timeout stage.
    cancellation: CancellationToken,

    /// Type-erased extension data.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a new context for an anonymous caller.
    #[must_use]
    pub fn new() -> Self {
        Self::with_authorization(Arc::new(AnonymousAuthorization))
    }

    /// Creates a context that resolves the caller through `authorization`.
    #[must_use]
    pub fn with_authorization(authorization: Arc<dyn UserAuthorization>) -> Self {
        Self {
            request_id: RequestId::new(),
            started_at: Instant::now(),
            authorization,
            caller: None,
            cancellation: CancellationToken::new(),
            extensions: HashMap::new(),
        }
    }

    /// Uses an upstream correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Ties the invocation to an outer cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns when the invocation started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the invocation started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the caller resolver.
    #[must_use]
    pub fn authorization(&self) -> Arc<dyn UserAuthorization> {
        Arc::clone(&self.authorization)
    }

    /// Resolves the caller, asking the collaborator at most once.
    ///
    /// A failed lookup is logged and reported as the anonymous user; it is
    /// retried on the next call.
    pub async fn caller(&mut self) -> AuthorizedUser {
        if let Some(user) = &self.caller {
            return user.clone();
        }

        let resolved = self.authorization.authorized_user().await;
        match resolved {
            Ok(user) => {
                self.caller = Some(user.clone());
                user
            }
            Err(error) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    error = %error,
                    "Unable to resolve the authorized user"
                );
                AuthorizedUser::anonymous()
            }
        }
    }

    /// Returns the current cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns `true` once the invocation has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Installs `token` and returns the one it replaces.
    pub fn replace_cancellation(&mut self, token: CancellationToken) -> CancellationToken {
        std::mem::replace(&mut self.cancellation, token)
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("request_id", &self.request_id)
            .field("started_at", &self.started_at)
            .field("caller", &self.caller)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}
