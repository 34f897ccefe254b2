//! Caller identity as seen by the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The authenticated caller of a request.
///
/// Resolved through the authorization collaborator and attached to log
/// records by the logging, performance and unhandled-exception stages.
///
/// # Example
///
/// ```
/// use rampart_core::AuthorizedUser;
///
/// let user = AuthorizedUser::new("u-42", "alice");
/// assert_eq!(user.to_string(), "alice (u-42)");
/// assert!(AuthorizedUser::anonymous().is_anonymous());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizedUser {
    /// Stable user identifier.
    pub user_id: String,
    /// Display or login name.
    pub user_name: String,
}

impl AuthorizedUser {
    const ANONYMOUS: &'static str = "anonymous";

    /// Creates a new authorized user.
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }

    /// The identity used when no caller could be resolved.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(Self::ANONYMOUS, Self::ANONYMOUS)
    }

    /// Returns `true` for the anonymous identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id == Self::ANONYMOUS
    }
}

impl Default for AuthorizedUser {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Display for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user_name, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_anonymous() {
        let user = AuthorizedUser::default();
        assert!(user.is_anonymous());
        assert_eq!(user.user_name, "anonymous");
    }

    #[test]
    fn test_named_user_is_not_anonymous() {
        let user = AuthorizedUser::new("7d1c", "bob");
        assert!(!user.is_anonymous());
    }
}
