//! Axum request handlers for the dashboard routes.
//!
//! Each route checks exactly the trust predicate it needs and hands the
//! result to the [`Dispatcher`](crate::render::Dispatcher).

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::Response,
};
use common::{protocol::HealthResponse, ServiceError};
use minijinja::{context, Value};
use tracing::debug;

use super::state::AppState;
use crate::auth::Access;
use crate::render::HelperContext;

/// The caller's trust predicates and the helper context derived from them.
pub struct Caller {
    pub access: Access,
    pub helpers: HelperContext,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let access = state.authorizer.access(&parts.uri, &parts.headers);
        debug!(path = parts.uri.path(), level = ?access.level(), "caller resolved");
        let helpers = state.helper_context(access, &parts.uri);
        Ok(Caller { access, helpers })
    }
}

/// `GET /`: public status page.
pub async fn index(State(state): State<AppState>, caller: Caller) -> Response {
    let core = state.core.current();
    let data = context! {
        title => core.name.clone(),
        services => core.public_services(),
        messages => core.messages.clone(),
    };
    state.dispatcher.page("index.html", data, None, &caller.helpers)
}

/// `GET /dashboard`: the dashboard for logged-in users, the login form for
/// everyone else.
pub async fn dashboard(State(state): State<AppState>, caller: Caller) -> Response {
    let core = state.core.current();
    if !caller.access.user {
        let data = context! { title => "Sign in" };
        return state.dispatcher.page("login.html", data, None, &caller.helpers);
    }
    let data = context! {
        title => "Dashboard",
        services => core.services.clone(),
    };
    state.dispatcher.page("dashboard.html", data, None, &caller.helpers)
}

/// `GET /settings`: administrators only; others are sent back to `/`.
pub async fn settings(State(state): State<AppState>, caller: Caller) -> Response {
    let redirect = (!caller.access.admin).then_some("/");
    let data = context! { title => "Settings" };
    state
        .dispatcher
        .page("settings.html", data, redirect, &caller.helpers)
}

/// `GET /charts.js`: chart script rendered with the reduced helper table.
pub async fn charts_js(State(state): State<AppState>, caller: Caller) -> Response {
    state
        .dispatcher
        .script("charts.js", Value::from(()), &caller.helpers)
}

/// `GET /api`: application snapshot for read-authenticated callers.
pub async fn api_index(State(state): State<AppState>, caller: Caller) -> Response {
    if !caller.access.read {
        return read_denied(&state);
    }
    let core = state.core.current();
    state.dispatcher.json(StatusCode::OK, core.as_ref())
}

/// `GET /api/services`: every monitored service for read-authenticated
/// callers.
pub async fn api_services(State(state): State<AppState>, caller: Caller) -> Response {
    if !caller.access.read {
        return read_denied(&state);
    }
    let core = state.core.current();
    state.dispatcher.json(StatusCode::OK, &core.services)
}

/// `GET /health`: liveness check.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        mode: state.dispatcher.mode().as_str().into(),
        version: env!("CARGO_PKG_VERSION").into(),
        services: state.core.current().services.len(),
    };
    state.dispatcher.json(StatusCode::OK, body)
}

/// Catch-all 404 page.
pub async fn not_found(State(state): State<AppState>, caller: Caller) -> Response {
    let data = context! { title => "Page not found" };
    state.dispatcher.not_found(data, &caller.helpers)
}

fn read_denied(state: &AppState) -> Response {
    state
        .dispatcher
        .error(&ServiceError::Unauthorized("read access required".into()))
}
