//! Request gate run ahead of every handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// Decides whether a request may reach the handlers.
pub trait Gate: Send + Sync + 'static {
    fn admit(&self, request: &Request<Body>) -> bool;
}

/// Admits requests whose `password` query parameter equals the shared secret.
#[derive(Debug, Clone)]
pub struct QueryPassword {
    secret: String,
}

impl QueryPassword {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[derive(Deserialize)]
struct PasswordParam {
    password: Option<String>,
}

impl Gate for QueryPassword {
    fn admit(&self, request: &Request<Body>) -> bool {
        match Query::<PasswordParam>::try_from_uri(request.uri()) {
            Ok(Query(PasswordParam {
                password: Some(password),
            })) => password == self.secret,
            _ => false,
        }
    }
}

pub async fn require_gate(
    State(gate): State<Arc<dyn Gate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !gate.admit(&request) {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "rejected by gate"
        );
        return (StatusCode::UNAUTHORIZED, "Incorrect password").into_response();
    }
    next.run(request).await
}
