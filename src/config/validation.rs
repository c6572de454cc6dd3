//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! string destined for a typed value (socket address, header, method,
//! access-policy entry) actually parses. All errors are returned, not just
//! the first.

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};
use thiserror::Error;

use crate::config::schema::EdgeConfig;
use crate::security::local_access::TrustedAddress;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeout,

    #[error("client_ip.forwarded_header `{0}` is not a valid header name")]
    ForwardedHeader(String),

    #[error("rate_limit.{0} must be greater than zero")]
    RateLimit(&'static str),

    #[error("cors.allow_origins entry `{0}` is not a valid origin")]
    CorsOrigin(String),

    #[error("cors.allow_headers entry `{0}` is not a valid header name")]
    CorsHeader(String),

    #[error("cors.allow_methods entry `{0}` is not a valid method")]
    CorsMethod(String),

    #[error("monitor.trusted_addresses entry `{0:?}` is not an address, network or host name")]
    TrustedAddress(String),

    #[error("observability.upkeep_secs must be greater than zero")]
    UpkeepInterval,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    if HeaderName::from_bytes(config.client_ip.forwarded_header.as_bytes()).is_err() {
        errors.push(ValidationError::ForwardedHeader(
            config.client_ip.forwarded_header.clone(),
        ));
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::RateLimit("max_requests"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::RateLimit("window_secs"));
    }

    for origin in &config.cors.allow_origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }
    for header in &config.cors.allow_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::CorsHeader(header.clone()));
        }
    }
    for method in &config.cors.allow_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::CorsMethod(method.clone()));
        }
    }

    for entry in &config.monitor.trusted_addresses {
        if entry.parse::<TrustedAddress>().is_err() {
            errors.push(ValidationError::TrustedAddress(entry.clone()));
        }
    }

    if config.observability.upkeep_secs == 0 {
        errors.push(ValidationError::UpkeepInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
