//! Caller identity forwarded by the upstream gateway

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;

/// Header carrying the authenticated caller's identity
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the authenticated caller's role
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Role allowed to resolve alerts
pub const OBSERVER_ROLE: &str = "observer";

/// Authenticated caller, as asserted by the upstream gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Opaque caller identity
    pub id: String,
    /// Caller role, lower-cased
    pub role: Option<String>,
}

impl Actor {
    /// Whether the caller holds the observer capability
    pub fn is_observer(&self) -> bool {
        self.role.as_deref() == Some(OBSERVER_ROLE)
    }

    /// Fail with `Forbidden` unless the caller is an observer
    pub fn require_observer(&self) -> Result<(), Error> {
        if self.is_observer() {
            Ok(())
        } else {
            Err(Error::forbidden("observer role required"))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| Error::forbidden("missing caller identity"))?
            .to_string();
        let role = header(ACTOR_ROLE_HEADER).map(str::to_ascii_lowercase);

        Ok(Self { id, role })
    }
}
