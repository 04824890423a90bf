// File: src/redirector.rs
// Purpose: Builds redirects with the configured status, fallback and htmx behaviour

use crate::config::Config;
use crate::error::RedirectError;
use crate::request_context::RequestContext;
use crate::response::RedirectResponse;
use axum::http::StatusCode;

/// Redirect factory shared through application state.
#[derive(Debug, Clone)]
pub struct Redirector {
    status: StatusCode,
    htmx: bool,
    fallback: String,
}

impl Redirector {
    pub fn new(config: &Config) -> Result<Self, RedirectError> {
        Ok(Self {
            status: config.redirect.status_code()?,
            htmx: config.redirect.htmx,
            fallback: config.redirect.fallback.clone(),
        })
    }

    pub fn to<'r>(&self, url: impl Into<String>) -> Result<RedirectResponse<'r>, RedirectError> {
        Ok(RedirectResponse::new(url, self.status)?.htmx(self.htmx))
    }

    /// Redirect to an external URL. Same as `to`, named for intent.
    pub fn away<'r>(&self, url: impl Into<String>) -> Result<RedirectResponse<'r>, RedirectError> {
        self.to(url)
    }

    /// Back to the Referer, then the session's previous URL, then the fallback.
    pub fn back<'r>(&self, request: &'r RequestContext) -> Result<RedirectResponse<'r>, RedirectError> {
        let target = request
            .referer()
            .map(str::to_string)
            .or_else(|| request.session().and_then(|s| s.previous_url()))
            .unwrap_or_else(|| self.fallback.clone());

        Ok(self.to(target)?.with_request(request))
    }

    /// Reload the current path, query string included.
    pub fn refresh<'r>(&self, request: &'r RequestContext) -> Result<RedirectResponse<'r>, RedirectError> {
        Ok(self.to(request.full_path())?.with_request(request))
    }
}

impl Default for Redirector {
    fn default() -> Self {
        Self {
            status: StatusCode::FOUND,
            htmx: true,
            fallback: "/".to_string(),
        }
    }
}
