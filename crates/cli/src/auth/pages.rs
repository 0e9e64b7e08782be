// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-facing result pages for the login callback.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use minijinja::{context, Environment};
use tracing::warn;

use crate::error::AuthError;

const SUCCESS_PAGE: &str = include_str!("templates/success.html");
const ERROR_TEMPLATE: &str = include_str!("templates/error.html");
const ERROR_TEMPLATE_NAME: &str = "error.html";

/// Parsed page templates. The `.html` name turns on minijinja's HTML
/// auto-escaping, so IdP-supplied text is always escaped.
pub struct CallbackPages {
    env: Environment<'static>,
}

impl CallbackPages {
    pub fn load() -> Result<Self, AuthError> {
        let mut env = Environment::new();
        env.add_template(ERROR_TEMPLATE_NAME, ERROR_TEMPLATE)
            .map_err(|e| AuthError::CallbackServer(format!("error page template: {e}")))?;
        Ok(Self { env })
    }

    /// The static success page (200).
    pub fn success(&self) -> Response {
        Html(SUCCESS_PAGE).into_response()
    }

    /// Render the error page with `message` escaped into it.
    pub fn error(&self, status: StatusCode, message: &str) -> Response {
        let rendered = self
            .env
            .get_template(ERROR_TEMPLATE_NAME)
            .and_then(|tmpl| tmpl.render(context! { message => message }));
        match rendered {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                warn!("failed to render error page: {e}");
                (status, Html("<!DOCTYPE html><p>Authentication failed.</p>")).into_response()
            }
        }
    }
}

#[cfg(test)]
#[path = "pages_tests.rs"]
mod tests;
