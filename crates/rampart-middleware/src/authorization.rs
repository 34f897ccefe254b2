//! Caller resolution.
//!
//! The pipeline does not authenticate anyone. It asks a [`UserAuthorization`]
//! collaborator who the caller is, which tenant they belong to and which
//! attributes scope their view of the data. The caching stage keys entries
//! on the latter two; the logging stages attach the former to records.

use async_trait::async_trait;
use rampart_core::AuthorizedUser;
use std::collections::BTreeMap;
use thiserror::Error;

/// Caller attributes, keyed by attribute name.
pub type UserAttributes = BTreeMap<String, Vec<String>>;

/// Errors raised while resolving the caller.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// No caller is attached to the current invocation.
    #[error("no authenticated caller")]
    Unauthenticated,

    /// The authorization service could not be reached.
    #[error("authorization service unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Resolves the caller of the current invocation.
#[async_trait]
pub trait UserAuthorization: Send + Sync {
    /// Returns the caller's customer (tenant) code.
    async fn customer_code(&self) -> Result<String, AuthorizationError>;

    /// Returns the caller's attributes.
    async fn user_attributes(&self) -> Result<UserAttributes, AuthorizationError>;

    /// Returns the caller's identity.
    async fn authorized_user(&self) -> Result<AuthorizedUser, AuthorizationError>;
}

/// Authorization for unauthenticated callers.
///
/// Every invocation belongs to the anonymous user with an empty customer
/// code and no attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthorization;

#[async_trait]
impl UserAuthorization for AnonymousAuthorization {
    async fn customer_code(&self) -> Result<String, AuthorizationError> {
        Ok(String::new())
    }

    async fn user_attributes(&self) -> Result<UserAttributes, AuthorizationError> {
        Ok(UserAttributes::new())
    }

    async fn authorized_user(&self) -> Result<AuthorizedUser, AuthorizationError> {
        Ok(AuthorizedUser::anonymous())
    }
}

/// Authorization with a fixed answer.
///
/// Suitable for background jobs that act on behalf of one tenant, and for
/// tests.
///
/// # Example
///
/// ```
/// use rampart_core::AuthorizedUser;
/// use rampart_middleware::StaticAuthorization;
///
/// let auth = StaticAuthorization::new("ACME", AuthorizedUser::new("u-1", "alice"))
///     .with_attribute("Region", ["EU", "US"]);
/// # let _ = auth;
/// ```
#[derive(Debug, Clone)]
pub struct StaticAuthorization {
    customer_code: String,
    attributes: UserAttributes,
    user: AuthorizedUser,
}

impl StaticAuthorization {
    /// Creates a fixed authorization for `user` within `customer_code`.
    #[must_use]
    pub fn new(customer_code: impl Into<String>, user: AuthorizedUser) -> Self {
        Self {
            customer_code: customer_code.into(),
            attributes: UserAttributes::new(),
            user,
        }
    }

    /// Adds an attribute with its values.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl UserAuthorization for StaticAuthorization {
    async fn customer_code(&self) -> Result<String, AuthorizationError> {
        Ok(self.customer_code.clone())
    }

    async fn user_attributes(&self) -> Result<UserAttributes, AuthorizationError> {
        Ok(self.attributes.clone())
    }

    async fn authorized_user(&self) -> Result<AuthorizedUser, AuthorizationError> {
        Ok(self.user.clone())
    }
}
