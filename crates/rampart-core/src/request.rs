//! Request identity.
//!
//! Every command or query that enters the pipeline implements [`Request`].
//! The pipeline never inspects a request directly: it sees its
//! [`RequestType`] and its serialized fields.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::fmt;

/// A command or query that can be sent through the pipeline.
///
/// Each request type maps to exactly one response type. Requests must be
/// serializable: the serialized top-level fields are used for logging and
/// for cache key derivation.
///
/// # Example
///
/// ```
/// use rampart_core::{Request, RequestKind};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize)]
/// struct GetCityQuery {
///     code: String,
/// }
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct CityVm {
///     name: String,
/// }
///
/// impl Request for GetCityQuery {
///     type Response = Option<CityVm>;
/// }
///
/// let request_type = GetCityQuery::request_type();
/// assert_eq!(request_type.name(), "GetCityQuery");
/// assert_eq!(request_type.kind(), RequestKind::Query);
/// ```
pub trait Request: Serialize + Send + Sync + 'static {
    /// The response produced by the handler of this request.
    type Response: Serialize + DeserializeOwned + Send + 'static;

    /// Returns the identity of this request type.
    fn request_type() -> RequestType
    where
        Self: Sized,
    {
        RequestType::of::<Self>()
    }
}

/// Whether a request reads or changes state, inferred from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// The type name ends with `Command`.
    Command,
    /// The type name ends with `Query`.
    Query,
    /// Neither suffix matched.
    Other,
}

impl RequestKind {
    /// Infers the kind from a short type name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.ends_with("Command") {
            Self::Command
        } else if name.ends_with("Query") {
            Self::Query
        } else {
            Self::Other
        }
    }
}

/// The identity of a request type.
///
/// Equality and hashing use the [`TypeId`]; the names are for display,
/// logging and cache keys.
#[derive(Clone, Copy)]
pub struct RequestType {
    id: TypeId,
    full_name: &'static str,
}

impl RequestType {
    /// Returns the identity of `R`.
    #[must_use]
    pub fn of<R: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            full_name: std::any::type_name::<R>(),
        }
    }

    /// Returns the [`TypeId`] of the request type.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified type path, e.g. `app::city::GetCityListQuery`.
    #[must_use]
    pub const fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Returns the unqualified type name, e.g. `GetCityListQuery`.
    ///
    /// Generic arguments are stripped.
    #[must_use]
    pub fn name(&self) -> &'static str {
        let base = self
            .full_name
            .split_once('<')
            .map_or(self.full_name, |(base, _)| base);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Returns the request kind inferred from the type name.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        RequestKind::from_name(self.name())
    }
}

impl PartialEq for RequestType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RequestType {}

impl std::hash::Hash for RequestType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestType").field(&self.full_name).finish()
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
