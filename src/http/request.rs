//! Request identification and client address extraction.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the caller sent none
//! - Extract the caller's [`ClientAddrs`] for handlers and middleware
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Forwarded headers are read according to the live runtime config, so a
//!   reload that stops trusting them takes effect on the next request

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderValue, Request, StatusCode},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::http::server::AppState;
use crate::security::address::ClientAddrs;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

impl FromRequestParts<AppState> for ClientAddrs {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ConnectInfo(peer) = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Peer address unavailable"))?;

        let runtime = state.runtime();
        Ok(ClientAddrs::from_headers(
            peer.ip().to_string(),
            &parts.headers,
            &runtime.config.client_ip,
        ))
    }
}
