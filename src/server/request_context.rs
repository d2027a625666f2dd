//! Per-request context pulled from headers: where the request came from and
//! who sent it.

use super::state::ServerState;
use crate::media::RequestOrigin;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use tracing::debug;

pub const HEADER_FORWARDED_PROTO: &str = "x-forwarded-proto";
const DEFAULT_SCHEME: &str = "http";

/// Display name of the user behind the request, as forwarded by the auth
/// gateway. `None` for anonymous requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester(pub Option<String>);

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// First entry of a possibly comma-separated forwarding header.
fn first_forwarded_value(value: &str) -> Option<String> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn resolve_origin(headers: &HeaderMap, fallback_host: &str) -> RequestOrigin {
    let scheme = header_str(headers, HEADER_FORWARDED_PROTO)
        .and_then(first_forwarded_value)
        .unwrap_or_else(|| DEFAULT_SCHEME.to_string());
    let host = header_str(headers, header::HOST.as_str())
        .unwrap_or(fallback_host)
        .to_string();
    RequestOrigin::new(scheme, host)
}

impl FromRequestParts<ServerState> for RequestOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(resolve_origin(&parts.headers, &ctx.config.public_host))
    }
}

impl FromRequestParts<ServerState> for Requester {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let name = header_str(&parts.headers, &ctx.config.requester_header).map(str::to_string);
        if name.is_none() {
            debug!("No {} header, request is anonymous", ctx.config.requester_header);
        }
        Ok(Requester(name))
    }
}
