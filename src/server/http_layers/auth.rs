//! Middleware wiring [`AuthGate`] and [`RoleGate`] into the router.
//!
//! `require_auth` must wrap `require_role`, so route layers are added in the
//! order role first, auth second.

use crate::auth::{AuthContext, AuthGate, RoleGate};
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    match gate.authenticate(authorization.as_deref()).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

pub async fn require_role(
    State(role_gate): State<RoleGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Err(e) = role_gate.check(request.extensions().get::<AuthContext>()) {
        return e.into_response();
    }
    next.run(request).await
}
