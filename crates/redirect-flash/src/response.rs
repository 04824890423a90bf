// File: src/response.rs
// Purpose: Redirect response that carries cookies, fragments and flashed state

use crate::error::RedirectError;
use crate::message_bag::{ErrorSource, MessageBag, ViewErrorBag};
use crate::request_context::RequestContext;
use crate::session::Session;
use crate::value::{remove_files, InputMap};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use maud::{html, Markup, DOCTYPE};
use serde::Serialize;

/// Status codes a redirect may carry.
const REDIRECT_STATUSES: [StatusCode; 6] = [
    StatusCode::CREATED,
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

pub(crate) fn ensure_redirect_status(status: StatusCode) -> Result<(), RedirectError> {
    if REDIRECT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(RedirectError::NotARedirect(status.as_u16()))
    }
}

/// Redirect with flash-and-redirect helpers.
///
/// The attached request is borrowed, never owned: build the redirect from
/// the handler's `RequestContext` and turn it into a `Response` before the
/// handler returns.
///
/// ```ignore
/// let ctx: RequestContext = ...;
/// RedirectResponse::to("/contact")?
///     .with_request(&ctx)
///     .with_errors(errors)?
///     .except_input(&["password"])?
///     .with_fragment("form")
///     .into_response()
/// ```
#[derive(Debug)]
pub struct RedirectResponse<'r> {
    target_url: String,
    status: StatusCode,
    headers: HeaderMap,
    request: Option<&'r RequestContext>,
    htmx: bool,
}

impl<'r> RedirectResponse<'r> {
    pub fn new(url: impl Into<String>, status: StatusCode) -> Result<Self, RedirectError> {
        let target_url = url.into();
        if target_url.is_empty() {
            return Err(RedirectError::EmptyTargetUrl);
        }
        ensure_redirect_status(status)?;

        Ok(Self {
            target_url,
            status,
            headers: HeaderMap::new(),
            request: None,
            htmx: true,
        })
    }

    /// 302 redirect to `url`.
    pub fn to(url: impl Into<String>) -> Result<Self, RedirectError> {
        Self::new(url, StatusCode::FOUND)
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn set_target_url(&mut self, url: impl Into<String>) -> Result<(), RedirectError> {
        let url = url.into();
        if url.is_empty() {
            return Err(RedirectError::EmptyTargetUrl);
        }
        self.target_url = url;
        Ok(())
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Set the HTTP status code (201, 301, 302, 303, 307, 308).
    pub fn status(mut self, status: StatusCode) -> Result<Self, RedirectError> {
        ensure_redirect_status(status)?;
        self.status = status;
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether to add `HX-Redirect` for htmx requests.
    pub fn htmx(mut self, enabled: bool) -> Self {
        self.htmx = enabled;
        self
    }

    /// Add a custom response header. Invalid names or values are skipped.
    pub fn header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            HeaderName::from_bytes(key.as_ref().as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(val)) => {
                self.headers.insert(name, val);
            }
            _ => tracing::warn!("Skipping invalid header {:?}", key.as_ref()),
        }
        self
    }

    pub fn with_headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |res, (key, value)| res.header(key, value))
    }

    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.append_cookie(&cookie);
        self
    }

    /// Append each cookie as its own `Set-Cookie` header, in order.
    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = Cookie<'static>>) -> Self {
        for cookie in cookies {
            self.append_cookie(&cookie);
        }
        self
    }

    /// Expire a cookie on the client.
    pub fn without_cookie(mut self, name: impl Into<String>) -> Self {
        let mut cookie = Cookie::build((name.into(), "")).path("/").build();
        cookie.make_removal();
        self.append_cookie(&cookie);
        self
    }

    fn append_cookie(&mut self, cookie: &Cookie<'_>) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                tracing::debug!("Attaching cookie {}", cookie.name());
                self.headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!("Skipping cookie {} with invalid value", cookie.name()),
        }
    }

    /// Copy of `input` without any uploaded files, at any depth.
    pub fn remove_files_from_input(&self, input: &InputMap) -> InputMap {
        remove_files(input)
    }

    fn require_request(&self) -> Result<&'r RequestContext, RedirectError> {
        self.request.ok_or(RedirectError::MissingRequest)
    }

    fn session(&self) -> Result<&'r Session, RedirectError> {
        self.require_request()?
            .session()
            .ok_or(RedirectError::MissingSession)
    }

    /// Flash a value for the next request.
    pub fn with(self, key: impl Into<String>, value: impl Serialize) -> Result<Self, RedirectError> {
        let key = key.into();
        self.session()?.flash(key.clone(), value)?;
        tracing::debug!("Flashed {} for {}", key, self.target_url);
        Ok(self)
    }

    pub fn with_many<K, V>(
        self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, RedirectError>
    where
        K: Into<String>,
        V: Serialize,
    {
        values
            .into_iter()
            .try_fold(self, |res, (key, value)| res.with(key, value))
    }

    /// Flash the attached request's input.
    pub fn with_input(self) -> Result<Self, RedirectError> {
        let input = self.require_request()?.input().clone();
        self.with_input_from(&input)
    }

    /// Flash the given input. Uploaded files are dropped first.
    pub fn with_input_from(self, input: &InputMap) -> Result<Self, RedirectError> {
        let session = self.session()?;
        let input = self.remove_files_from_input(input);
        session.flash_input(&input)?;
        tracing::debug!("Flashed {} input field(s) for {}", input.len(), self.target_url);
        Ok(self)
    }

    /// Flash only the named input fields.
    pub fn only_input(self, fields: &[&str]) -> Result<Self, RedirectError> {
        let input = self.require_request()?.only(fields);
        self.with_input_from(&input)
    }

    /// Flash every input field except the named ones.
    pub fn except_input(self, fields: &[&str]) -> Result<Self, RedirectError> {
        let input = self.require_request()?.except(fields);
        self.with_input_from(&input)
    }

    /// Normalize any accepted error shape into a bag.
    pub fn parse_errors(&self, provider: impl Into<ErrorSource>) -> Result<MessageBag, RedirectError> {
        MessageBag::try_from(provider.into())
    }

    /// Flash validation errors into the session's default bag.
    pub fn with_errors(self, provider: impl Into<ErrorSource>) -> Result<Self, RedirectError> {
        let bag = self.session()?.keys().default_bag.clone();
        self.with_errors_in(provider, &bag)
    }

    /// Flash validation errors into a named bag, keeping the other bags.
    pub fn with_errors_in(
        self,
        provider: impl Into<ErrorSource>,
        bag: &str,
    ) -> Result<Self, RedirectError> {
        let session = self.session()?;
        let value = self.parse_errors(provider)?;

        let mut errors: ViewErrorBag = session.errors();
        errors.put(bag, value);
        session.flash(session.keys().errors.clone(), &errors)?;

        tracing::debug!(
            "Flashed {} error(s) into bag {} for {}",
            errors.bag(bag).count(),
            bag,
            self.target_url
        );
        Ok(self)
    }

    /// Replace any fragment with `fragment` (a leading `#` is optional).
    pub fn with_fragment(self, fragment: &str) -> Self {
        let fragment = fragment
            .split_once('#')
            .map(|(_, after)| after)
            .unwrap_or(fragment);
        let mut res = self.without_fragment();
        res.target_url = format!("{}#{}", res.target_url, fragment);
        res
    }

    /// Drop everything from the first `#` on.
    pub fn without_fragment(mut self) -> Self {
        if let Some((base, _)) = self.target_url.split_once('#') {
            self.target_url = base.to_string();
        }
        self
    }

    /// A redirect has no renderable body of its own.
    pub fn original_content(&self) -> Option<&str> {
        None
    }

    pub fn request(&self) -> Option<&'r RequestContext> {
        self.request
    }

    pub fn set_request(&mut self, request: &'r RequestContext) {
        self.request = Some(request);
    }

    pub fn with_request(mut self, request: &'r RequestContext) -> Self {
        self.set_request(request);
        self
    }
}

fn redirect_page(url: &str) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="UTF-8";
                meta http-equiv="refresh" content=(format!("0;url='{}'", url));
                title { "Redirecting to " (url) }
            }
            body {
                "Redirecting to " a href=(url) { (url) } "."
            }
        }
    }
}

impl IntoResponse for RedirectResponse<'_> {
    fn into_response(self) -> Response {
        // fragment edits can leave an empty target behind
        if self.target_url.is_empty() {
            return RedirectError::EmptyTargetUrl.into_response();
        }

        let location = match HeaderValue::from_str(&self.target_url) {
            Ok(value) => value,
            Err(_) => {
                tracing::error!("Invalid redirect location: {:?}", self.target_url);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut headers = self.headers;
        headers.insert(header::LOCATION, location.clone());
        if self.htmx && self.request.map(RequestContext::is_htmx).unwrap_or(false) {
            headers.insert("hx-redirect", location);
        }
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );

        let body = redirect_page(&self.target_url).into_string();
        (self.status, headers, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{InputValue, UploadedFile};
    use axum::http::Method;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn input(json: serde_json::Value) -> InputMap {
        match InputValue::from(json) {
            InputValue::Map(map) => map,
            _ => InputMap::new(),
        }
    }

    fn request_with_session(json: serde_json::Value) -> RequestContext {
        RequestContext::new(Method::POST, "/form", HeaderMap::new())
            .with_input(input(json))
            .with_session(Session::new())
    }

    #[test]
    fn test_new_rejects_empty_url_and_non_redirect_status() {
        assert!(matches!(
            RedirectResponse::to(""),
            Err(RedirectError::EmptyTargetUrl)
        ));
        assert!(matches!(
            RedirectResponse::new("/", StatusCode::OK),
            Err(RedirectError::NotARedirect(200))
        ));
        assert_eq!(
            RedirectResponse::to("/").unwrap().status_code(),
            StatusCode::FOUND
        );
    }

    #[test]
    fn test_with_cookies_preserves_order() {
        let res = RedirectResponse::to("/")
            .unwrap()
            .with_cookies(vec![Cookie::new("a", "1"), Cookie::new("b", "2")]);

        let cookies: Vec<&str> = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_duplicate_cookie_names_are_kept() {
        let res = RedirectResponse::to("/")
            .unwrap()
            .with_cookie(Cookie::new("a", "1"))
            .with_cookie(Cookie::new("a", "2"));

        assert_eq!(res.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_without_cookie_expires_it() {
        let res = RedirectResponse::to("/").unwrap().without_cookie("remember");
        let value = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();

        assert!(value.starts_with("remember=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[rstest]
    #[case("https://x/y#old", "new", "https://x/y#new")]
    #[case("https://x/y", "#section", "https://x/y#section")]
    #[case("https://x/y", "section", "https://x/y#section")]
    #[case("https://x/y#a#b", "c", "https://x/y#c")]
    #[case("https://x/y", "a#b", "https://x/y#b")]
    fn test_with_fragment(#[case] url: &str, #[case] fragment: &str, #[case] expected: &str) {
        let res = RedirectResponse::to(url).unwrap().with_fragment(fragment);
        assert_eq!(res.target_url(), expected);
    }

    #[test]
    fn test_with_fragment_twice_has_one_fragment() {
        let res = RedirectResponse::to("https://x/y")
            .unwrap()
            .with_fragment("section")
            .with_fragment("section");

        assert_eq!(res.target_url(), "https://x/y#section");
    }

    #[rstest]
    #[case("https://x/y", "https://x/y")]
    #[case("https://x/y#frag", "https://x/y")]
    #[case("https://x/y?q=1#a#b", "https://x/y?q=1")]
    fn test_without_fragment(#[case] url: &str, #[case] expected: &str) {
        let res = RedirectResponse::to(url).unwrap().without_fragment();
        assert_eq!(res.target_url(), expected);
    }

    #[test]
    fn test_only_input_without_request_fails() {
        let res = RedirectResponse::to("/").unwrap();
        assert!(matches!(
            res.only_input(&["a", "b"]),
            Err(RedirectError::MissingRequest)
        ));

        let res = RedirectResponse::to("/").unwrap();
        assert!(matches!(
            res.except_input(&["a"]),
            Err(RedirectError::MissingRequest)
        ));
    }

    #[test]
    fn test_flash_without_session_fails() {
        let ctx = RequestContext::new(Method::POST, "/", HeaderMap::new());
        let res = RedirectResponse::to("/").unwrap().with_request(&ctx);

        assert!(matches!(
            res.with_input(),
            Err(RedirectError::MissingSession)
        ));
    }

    #[test]
    fn test_only_input_flashes_selected_fields() {
        let ctx = request_with_session(serde_json::json!({ "a": 1, "b": 2, "c": 3 }));
        RedirectResponse::to("/")
            .unwrap()
            .with_request(&ctx)
            .only_input(&["a", "b"])
            .unwrap();

        let session = ctx.session().unwrap();
        assert_eq!(session.old_input(Some("a")), Some(InputValue::from(1)));
        assert_eq!(session.old_input(Some("b")), Some(InputValue::from(2)));
        assert_eq!(session.old_input(Some("c")), None);
    }

    #[test]
    fn test_except_input_flashes_the_rest() {
        let ctx = request_with_session(serde_json::json!({
            "email": "ada@example.com", "password": "secret"
        }));
        RedirectResponse::to("/")
            .unwrap()
            .with_request(&ctx)
            .except_input(&["password"])
            .unwrap();

        let session = ctx.session().unwrap();
        assert!(session.has_old_input(Some("email")));
        assert!(!session.has_old_input(Some("password")));
    }

    #[test]
    fn test_files_are_never_flashed() {
        let mut files = InputMap::new();
        files.insert(
            "avatar".into(),
            InputValue::File(UploadedFile::new("avatar", "me.png", None, vec![1u8])),
        );
        let ctx = request_with_session(serde_json::json!({ "name": "Ada" })).with_files(files);

        RedirectResponse::to("/")
            .unwrap()
            .with_request(&ctx)
            .only_input(&["name", "avatar"])
            .unwrap();

        let session = ctx.session().unwrap();
        assert!(session.has_old_input(Some("name")));
        assert!(!session.has_old_input(Some("avatar")));
    }

    #[test]
    fn test_parse_errors_shapes() {
        let res = RedirectResponse::to("/").unwrap();

        let bag = res.parse_errors("msg").unwrap();
        assert_eq!(bag.count(), 1);
        assert_eq!(bag.get("0"), ["msg"]);

        let mut existing = MessageBag::new();
        existing.add("email", "Invalid email");
        assert_eq!(res.parse_errors(&existing).unwrap(), existing);

        assert!(matches!(
            res.parse_errors(serde_json::json!(3)),
            Err(RedirectError::UnsupportedErrorShape(_))
        ));

        let bag = res
            .parse_errors(serde_json::json!({ "age": 3, "tags": [["x"]] }))
            .unwrap();
        assert_eq!(bag.get("age"), ["3"]);
        assert_eq!(bag.get("tags"), ["x"]);
    }

    #[test]
    fn test_with_errors_keeps_other_bags() {
        let ctx = request_with_session(serde_json::json!({}));
        RedirectResponse::to("/")
            .unwrap()
            .with_request(&ctx)
            .with_errors_in("Wrong password", "login")
            .unwrap()
            .with_errors("Something failed")
            .unwrap();

        let errors = ctx.session().unwrap().errors();
        assert_eq!(errors.bag("login").first(None), Some("Wrong password"));
        assert_eq!(errors.bag("default").first(None), Some("Something failed"));
    }

    #[test]
    fn test_with_flashes_values() {
        let ctx = request_with_session(serde_json::json!({}));
        RedirectResponse::to("/")
            .unwrap()
            .with_request(&ctx)
            .with("status", "saved")
            .unwrap()
            .with_many([("a", 1), ("b", 2)])
            .unwrap();

        let session = ctx.session().unwrap();
        assert_eq!(session.get::<String>("status").as_deref(), Some("saved"));
        assert_eq!(session.get::<i64>("b"), Some(2));
    }

    #[test]
    fn test_request_accessors() {
        let first = RequestContext::new(Method::GET, "/first", HeaderMap::new());
        let second = RequestContext::new(Method::GET, "/second", HeaderMap::new());

        let mut res = RedirectResponse::to("/").unwrap();
        assert!(res.request().is_none());
        assert!(res.original_content().is_none());

        res.set_request(&first);
        res.set_request(&second);
        assert_eq!(res.request().map(|r| r.path.as_str()), Some("/second"));
    }

    #[test]
    fn test_status_must_be_redirect() {
        let res = RedirectResponse::to("/").unwrap();
        assert!(res.status(StatusCode::NOT_FOUND).is_err());

        let res = RedirectResponse::to("/")
            .unwrap()
            .status(StatusCode::SEE_OTHER)
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_into_response_headers() {
        let resp = RedirectResponse::to("/dashboard")
            .unwrap()
            .header("x-request-id", "abc")
            .with_cookie(Cookie::new("a", "1"))
            .into_response();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()["location"], "/dashboard");
        assert_eq!(resp.headers()["x-request-id"], "abc");
        assert!(resp.headers().contains_key("set-cookie"));
        assert!(!resp.headers().contains_key("hx-redirect"));
    }

    #[test]
    fn test_htmx_redirect_header() {
        let mut headers = HeaderMap::new();
        headers.insert("hx-request", "true".parse().unwrap());
        let ctx = RequestContext::new(Method::POST, "/", headers);

        let resp = RedirectResponse::to("/next")
            .unwrap()
            .with_request(&ctx)
            .into_response();
        assert_eq!(resp.headers()["hx-redirect"], "/next");

        let resp = RedirectResponse::to("/next")
            .unwrap()
            .with_request(&ctx)
            .htmx(false)
            .into_response();
        assert!(!resp.headers().contains_key("hx-redirect"));
    }

    #[test]
    fn test_invalid_location_is_server_error() {
        let resp = RedirectResponse::to("/bad\nurl").unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_target_after_fragment_removal_is_server_error() {
        let res = RedirectResponse::to("#top").unwrap().without_fragment();
        assert_eq!(res.target_url(), "");

        let resp = res.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!resp.headers().contains_key("location"));
    }

    #[test]
    fn test_redirect_page_escapes_url() {
        let page = redirect_page("/a?b=<c>").into_string();
        assert!(page.contains("Redirecting to"));
        assert!(page.contains("&lt;c&gt;"));
        assert!(!page.contains("<c>"));
    }
}
