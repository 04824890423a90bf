// File: src/request_context.rs
// Purpose: Request context with headers, cookies, input, uploaded files and session

use crate::session::Session;
use crate::value::{
    forget_path, get_path, insert_bracketed, merge_recursive, set_path, InputMap, InputValue,
    UploadedFile,
};
use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use std::collections::HashMap;
use thiserror::Error;

/// Largest non-multipart body the extractor will buffer.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The current request as seen by handlers and redirect responses
#[derive(Clone)]
pub struct RequestContext {
    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: Method,

    /// Request path, without the query string
    pub path: String,

    /// Raw query string, if any
    pub query: Option<String>,

    /// Request headers
    pub headers: HeaderMap,

    /// Parsed cookies
    pub cookies: HashMap<String, String>,

    input: InputMap,
    files: InputMap,
    session: Option<Session>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("input", &self.input.keys().collect::<Vec<_>>())
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("session", &self.session.is_some())
            .finish()
    }
}

impl RequestContext {
    /// Create a new request context
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        let cookies = Self::parse_cookies(&headers);

        Self {
            method,
            path: path.into(),
            query: None,
            headers,
            cookies,
            input: InputMap::new(),
            files: InputMap::new(),
            session: None,
        }
    }

    /// Set the query string. Its fields are added to the input; existing
    /// input keys win.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        let mut merged = InputMap::new();
        parse_urlencoded(&mut merged, &query);
        merge_recursive(&mut merged, &self.input);
        self.input = merged;
        self.query = Some(query);
        self
    }

    pub fn with_input(mut self, input: InputMap) -> Self {
        self.input = input;
        self
    }

    pub fn with_files(mut self, files: InputMap) -> Self {
        self.files = files;
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Parse cookies from Cookie header
    fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| Cookie::split_parse(raw.to_string()))
            .filter_map(Result::ok)
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect()
    }

    /// Input fields, uploaded files excluded
    pub fn input(&self) -> &InputMap {
        &self.input
    }

    pub fn files(&self) -> &InputMap {
        &self.files
    }

    /// Input and uploaded files together, files merged in last
    pub fn all(&self) -> InputMap {
        let mut all = self.input.clone();
        merge_recursive(&mut all, &self.files);
        all
    }

    /// Get an input value by dot path
    pub fn get(&self, key: &str) -> Option<&InputValue> {
        get_path(&self.input, key)
    }

    /// Get an uploaded file by dot path
    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        get_path(&self.files, key)?.as_file()
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some() || get_path(&self.files, key).is_some()
    }

    /// Only the named fields (dot paths allowed). Missing fields are skipped.
    pub fn only(&self, keys: &[&str]) -> InputMap {
        let all = self.all();
        let mut results = InputMap::new();

        for key in keys {
            if let Some(value) = get_path(&all, key) {
                set_path(&mut results, key, value.clone());
            }
        }

        results
    }

    /// Everything except the named fields (dot paths allowed)
    pub fn except(&self, keys: &[&str]) -> InputMap {
        let mut results = self.all();

        for key in keys {
            forget_path(&mut results, key);
        }

        results
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Get a cookie value
    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    /// Get a header value
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn referer(&self) -> Option<&str> {
        self.get_header("referer").filter(|r| !r.is_empty())
    }

    /// Check if this is an HTMX request
    pub fn is_htmx(&self) -> bool {
        self.get_header("hx-request").is_some()
    }

    /// Path plus query string
    pub fn full_path(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// Decode `a=1&user[name]=x&tags[]=y` into `map`, nesting bracket keys.
pub fn parse_urlencoded(map: &mut InputMap, raw: &str) {
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        if key.is_empty() {
            continue;
        }
        insert_bracketed(map, &key, InputValue::String(decode_component(value)));
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced.clone(),
    }
}

#[derive(Debug, Error)]
pub enum InputRejection {
    #[error("request body could not be read: {0}")]
    Body(String),

    #[error("request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("multipart body could not be read: {0}")]
    Multipart(String),
}

impl IntoResponse for InputRejection {
    fn into_response(self) -> Response {
        tracing::warn!("Rejected request input: {}", self);
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

#[async_trait]
impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = InputRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);
        let headers = req.headers().clone();
        let session = req.extensions().get::<Session>().cloned();

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let mut body = InputMap::new();
        let mut files = InputMap::new();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| InputRejection::Multipart(e.to_string()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| InputRejection::Multipart(e.to_string()))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let file_name = field.file_name().map(str::to_string);
                let part_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| InputRejection::Multipart(e.to_string()))?;

                match file_name {
                    Some(file_name) => {
                        let file = UploadedFile::new(name.clone(), file_name, part_type, bytes);
                        insert_bracketed(&mut files, &name, InputValue::File(file));
                    }
                    None => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        insert_bracketed(&mut body, &name, InputValue::String(text));
                    }
                }
            }
        } else {
            let bytes = axum::body::to_bytes(req.into_body(), DEFAULT_BODY_LIMIT)
                .await
                .map_err(|e| InputRejection::Body(e.to_string()))?;

            if !bytes.is_empty() {
                if content_type.starts_with("application/json") {
                    let json: serde_json::Value = serde_json::from_slice(&bytes)?;
                    if let InputValue::Map(map) = InputValue::from(json) {
                        body = map;
                    }
                } else if content_type.starts_with("application/x-www-form-urlencoded") {
                    parse_urlencoded(&mut body, &String::from_utf8_lossy(&bytes));
                }
            }
        }

        tracing::debug!(
            "Extracted {} input field(s) and {} file field(s) for {} {}",
            body.len(),
            files.len(),
            method,
            path
        );

        let mut ctx = RequestContext::new(method, path, headers)
            .with_input(body)
            .with_files(files);
        if let Some(query) = query {
            ctx = ctx.with_query(query);
        }
        if let Some(session) = session {
            ctx = ctx.with_session(session);
        }

        Ok(ctx)
    }
}
