// File: src/session_layer.rs
// Purpose: In-memory session middleware that ages flash data after every request

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use cookie::{Cookie, SameSite};
use indexmap::IndexMap;
use parking_lot::RwLock;
use redirect_flash::{FlashKeys, Session};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "flash_session";

/// Most sessions kept at once; the oldest is evicted past this.
pub const MAX_SESSIONS: usize = 10_000;

/// Live session handles by id, oldest first.
///
/// Requests on the same session share one handle, so concurrent flashes
/// land in the same data. Only sessions that hold data are kept.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<IndexMap<String, Session>>>,
    keys: FlashKeys,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(keys: FlashKeys) -> Self {
        Self::with_capacity(keys, MAX_SESSIONS)
    }

    pub fn with_capacity(keys: FlashKeys, capacity: usize) -> Self {
        Self {
            sessions: Arc::default(),
            keys,
            capacity: capacity.max(1),
        }
    }

    fn find(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    fn fresh(&self) -> Session {
        Session::with_keys(self.keys.clone())
    }

    /// Keep the session while it holds data, drop it once empty.
    fn store(&self, id: &str, session: &Session) {
        let mut sessions = self.sessions.write();

        if session.is_empty() {
            sessions.shift_remove(id);
            return;
        }

        if !sessions.contains_key(id) {
            while sessions.len() >= self.capacity {
                sessions.shift_remove_index(0);
            }
            sessions.insert(id.to_string(), session.clone());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

fn session_id(req: &Request) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_string()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub async fn start_session(
    State(registry): State<SessionRegistry>,
    mut req: Request,
    next: Next,
) -> Response {
    let known = session_id(&req).and_then(|id| registry.find(&id).map(|session| (id, session)));
    let (id, session, is_new) = match known {
        Some((id, session)) => (id, session, false),
        None => (uuid::Uuid::new_v4().to_string(), registry.fresh(), true),
    };

    let page_view = req.method() == Method::GET && !req.headers().contains_key("hx-request");
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    req.extensions_mut().insert(session.clone());
    let mut response = next.run(req).await;

    // only sessions the client already holds remember where it was
    if !is_new && page_view && response.status().is_success() {
        if let Err(e) = session.set_previous_url(url) {
            tracing::warn!("Failed to record previous URL: {}", e);
        }
    }

    session.age_flash_data();
    registry.store(&id, &session);

    if is_new && !session.is_empty() {
        let cookie = Cookie::build((SESSION_COOKIE, id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        if let Ok(header_value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, header_value);
        }
    }

    response
}
