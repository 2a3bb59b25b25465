//! Turns composed render units into HTTP responses.
//!
//! Every response leaving the dispatcher passes through [`Dispatcher::secure`],
//! which attaches `Strict-Transport-Security` when the server runs in
//! TLS-hardened mode.

use axum::{
    http::{
        header::{CONTENT_TYPE, LOCATION, STRICT_TRANSPORT_SECURITY},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, ServiceError};
use minijinja::Value;
use serde::Serialize;
use tracing::{error, warn};

use super::composer::{Composer, RenderPolicy, RenderUnit};
use super::helpers::HelperContext;
use crate::server::mode::{ServerMode, HSTS_VALUE};

/// Page rendered for unknown routes.
pub const NOT_FOUND_PAGE: &str = "error_404.html";

const HTML: &str = "text/html; charset=utf-8";
const JAVASCRIPT: &str = "application/javascript";

#[derive(Clone)]
pub struct Dispatcher {
    composer: Composer,
    mode: ServerMode,
    policy: RenderPolicy,
}

impl Dispatcher {
    pub fn new(composer: Composer, mode: ServerMode, policy: RenderPolicy) -> Self {
        Self {
            composer,
            mode,
            policy,
        }
    }

    pub fn mode(&self) -> ServerMode {
        self.mode
    }

    /// Render `page` with `data`, or redirect when `redirect` is set.
    ///
    /// A redirect answers `303 See Other` without touching the asset stores.
    pub fn page(
        &self,
        page: &str,
        data: Value,
        redirect: Option<&str>,
        helpers: &HelperContext,
    ) -> Response {
        if let Some(target) = redirect {
            return self.secure(see_other(target));
        }
        let unit = self.composer.compose(page, helpers);
        let resp = self.render(page, &unit, &data, StatusCode::OK, HTML);
        self.secure(resp)
    }

    /// Render the script asset `file` as JavaScript.
    pub fn script(&self, file: &str, data: Value, helpers: &HelperContext) -> Response {
        let unit = self.composer.compose_script(file, helpers);
        let resp = self.render(file, &unit, &data, StatusCode::OK, JAVASCRIPT);
        self.secure(resp)
    }

    /// Render the fixed not-found page with status 404.
    pub fn not_found(&self, data: Value, helpers: &HelperContext) -> Response {
        let unit = self.composer.compose(NOT_FOUND_PAGE, helpers);
        let resp = self.render(NOT_FOUND_PAGE, &unit, &data, StatusCode::NOT_FOUND, HTML);
        self.secure(resp)
    }

    /// Serialize `body` as a JSON reply.
    pub fn json<T: Serialize>(&self, status: StatusCode, body: T) -> Response {
        self.secure((status, Json(body)).into_response())
    }

    /// JSON error reply for `err`.
    pub fn error(&self, err: &ServiceError) -> Response {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.json(status, ErrorResponse::from(err))
    }

    /// Attach the transport-security header in TLS-hardened mode.
    pub fn secure(&self, mut resp: Response) -> Response {
        if self.mode.is_hardened() {
            resp.headers_mut().insert(
                STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS_VALUE),
            );
        }
        resp
    }

    fn render(
        &self,
        name: &str,
        unit: &RenderUnit,
        data: &Value,
        status: StatusCode,
        content_type: &'static str,
    ) -> Response {
        if self.policy == RenderPolicy::Strict && !unit.failures().is_empty() {
            warn!(
                page = name,
                failures = unit.failures().len(),
                "refusing to render with missing fragments"
            );
            return self.error(&ServiceError::Internal("page could not be rendered".into()));
        }

        let mut body = Vec::new();
        if let Err(e) = unit.execute(data, &mut body) {
            error!(page = name, error = %e, "template execution failed");
            if self.policy == RenderPolicy::Strict {
                return self.error(&ServiceError::Internal("page could not be rendered".into()));
            }
        }
        (
            status,
            [(CONTENT_TYPE, HeaderValue::from_static(content_type))],
            body,
        )
            .into_response()
    }
}

fn see_other(target: &str) -> Response {
    match HeaderValue::try_from(target) {
        Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
        Err(_) => {
            error!("redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
