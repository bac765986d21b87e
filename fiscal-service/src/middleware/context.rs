//! Actor context extraction.
//!
//! The gateway in front of the service authenticates callers and forwards
//! their identity as `X-Actor-ID` / `X-Actor-Role`. Both are optional; they
//! are only recorded on audit events.

use crate::models::RequestContext;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::middleware::{RequestId, REQUEST_ID_HEADER};
use std::convert::Infallible;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.as_str().to_string())
            .or_else(|| header(parts, REQUEST_ID_HEADER));

        let ctx = RequestContext {
            actor_id: header(parts, ACTOR_ID_HEADER),
            actor_role: header(parts, ACTOR_ROLE_HEADER),
            request_id,
        };

        tracing::debug!(actor_id = ?ctx.actor_id, actor_role = ?ctx.actor_role, "Request context extracted");

        Ok(ctx)
    }
}
