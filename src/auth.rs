//! Login gate: server-side sessions, flash messages and the `RequireUser` extractor.
//!
//! A session is created lazily the first time something has to be stored (a login or
//! a flash message) and is addressed by a random UUID kept in the `sessionid` cookie.
//! The id is replaced on login and on logout. Sessions idle for longer than the store's
//! TTL are dropped, and the table never holds more than its configured maximum.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use argon2::Argon2;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use utoipa::ToSchema;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionid";
/// Idle time after which a session is forgotten
pub const SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);
/// Upper bound on live sessions; the least recently seen is evicted first
pub const MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Success,
    Error,
    Info,
}

/// One-shot message shown on the next page the user sees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Clone)]
struct SessionData {
    user: Option<String>,
    messages: Vec<FlashMessage>,
    last_seen: Instant,
}

impl SessionData {
    fn new(user: Option<String>, messages: Vec<FlashMessage>) -> Self {
        Self {
            user,
            messages,
            last_seen: Instant::now(),
        }
    }
}

/// In-memory session table shared by every request
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionData>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SESSION_TTL, MAX_SESSIONS)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a custom idle timeout and size cap
    #[must_use]
    pub fn with_limits(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn expired(&self, data: &SessionData, now: Instant) -> bool {
        now.duration_since(data.last_seen) >= self.ttl
    }

    /// Add a session, first dropping expired ones and making room under the cap
    async fn insert(&self, data: SessionData) -> Uuid {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, existing| !self.expired(existing, now));
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped expired sessions");
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, existing)| existing.last_seen)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::debug!(session = %oldest, "Evicted least recently seen session");
        }

        let id = Uuid::new_v4();
        sessions.insert(id, data);
        id
    }

    /// Whether `id` is live; refreshes its idle timer, forgets it once expired
    async fn touch(&self, id: Uuid) -> bool {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(data) if self.expired(data, now) => {
                sessions.remove(&id);
                false
            }
            Some(data) => {
                data.last_seen = now;
                true
            }
            None => false,
        }
    }

    async fn remove(&self, id: Uuid) -> Option<SessionData> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// The single account allowed to manage the collection
pub struct Credentials {
    username: String,
    /// argon2id PHC string; `None` when no password is configured and every login fails
    password_hash: Option<String>,
}

impl Credentials {
    /// Hash `password` with a fresh salt.
    ///
    /// # Errors
    ///
    /// Fails if argon2 rejects the input.
    pub fn new(
        username: impl Into<String>,
        password: Option<&str>,
    ) -> Result<Self, password_hash::Error> {
        Ok(Self {
            username: username.into(),
            password_hash: password.map(hash_password).transpose()?,
        })
    }

    /// Use an argon2 hash produced elsewhere, e.g. by `argon2` on the command line.
    ///
    /// # Errors
    ///
    /// Fails if `hash` is not a PHC string.
    pub fn from_hash(
        username: impl Into<String>,
        hash: &str,
    ) -> Result<Self, password_hash::Error> {
        PasswordHash::new(hash)?;
        Ok(Self {
            username: username.into(),
            password_hash: Some(hash.to_string()),
        })
    }

    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(hash) = &self.password_hash else {
            return false;
        };
        // Hash check runs for unknown usernames too
        let password_ok = verify_password(password, hash);
        username == self.username && password_ok
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn login_enabled(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Hash a plain password with argon2id
fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn session_cookie(id: Uuid) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie
}

/// The current visitor's session
pub struct Session {
    id: Option<Uuid>,
    store: SessionStore,
    cookies: Cookies,
}

impl Session {
    /// Logged-in username, if any
    pub async fn user(&self) -> Option<String> {
        let id = self.id?;
        self.store
            .sessions
            .read()
            .await
            .get(&id)
            .and_then(|data| data.user.clone())
    }

    async fn replace(&mut self, data: SessionData) {
        if let Some(old) = self.id.take() {
            self.store.remove(old).await;
        }
        let id = self.store.insert(data).await;
        self.cookies.add(session_cookie(id));
        self.id = Some(id);
    }

    /// Mark the session as logged in under a fresh id
    pub async fn login(&mut self, username: &str) {
        let messages = match self.id {
            Some(id) => self
                .store
                .remove(id)
                .await
                .map(|data| data.messages)
                .unwrap_or_default(),
            None => Vec::new(),
        };
        self.id = None;
        self.replace(SessionData::new(Some(username.to_string()), messages))
            .await;
    }

    /// Drop everything stored for this visitor.
    ///
    /// A visitor who had a session gets a fresh anonymous one, so a flash can follow
    /// them to the next page; returns `false` and stores nothing for anyone else.
    pub async fn logout(&mut self) -> bool {
        if self.id.is_none() {
            return false;
        }
        self.replace(SessionData::new(None, Vec::new())).await;
        true
    }

    pub async fn flash(&mut self, level: MessageLevel, text: impl Into<String>) {
        let message = FlashMessage {
            level,
            text: text.into(),
        };
        if let Some(id) = self.id
            && let Some(data) = self.store.sessions.write().await.get_mut(&id)
        {
            data.messages.push(message);
            return;
        }
        self.replace(SessionData::new(None, vec![message])).await;
    }

    pub async fn success(&mut self, text: impl Into<String>) {
        self.flash(MessageLevel::Success, text).await;
    }

    /// Messages queued so far; they are removed from the session
    pub async fn take_messages(&self) -> Vec<FlashMessage> {
        let Some(id) = self.id else {
            return Vec::new();
        };
        self.store
            .sessions
            .write()
            .await
            .get_mut(&id)
            .map(|data| std::mem::take(&mut data.messages))
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state).await?;
        let store = SessionStore::from_ref(state);

        let presented = cookies
            .get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());
        let id = match presented {
            Some(id) if store.touch(id).await => Some(id),
            _ => None,
        };

        Ok(Self { id, store, cookies })
    }
}

/// Extractor for routes that need a logged-in user.
///
/// Anonymous visitors are redirected to `/login/?next=<original path>`.
pub struct RequireUser(pub String);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match session.user().await {
            Some(user) => Ok(Self(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
                tracing::debug!(path = %next, "Anonymous request to protected route");
                Err(login_redirect(&next).into_response())
            }
        }
    }
}

/// `303` to the login page, remembering where to return
#[must_use]
pub fn login_redirect(next: &str) -> Redirect {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("/login/?next={encoded}"))
}

/// `next` if it is a path on this site, so login cannot bounce users elsewhere
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    local.then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_verify() {
        let credentials = Credentials::new("admin", Some("s3cret")).unwrap();
        assert!(credentials.verify("admin", "s3cret"));
        assert!(!credentials.verify("admin", "wrong"));
        assert!(!credentials.verify("someone", "s3cret"));
    }

    #[test]
    fn test_password_is_stored_as_salted_argon2id() {
        let first = Credentials::new("admin", Some("s3cret")).unwrap();
        let second = Credentials::new("admin", Some("s3cret")).unwrap();
        let first_hash = first.password_hash.clone().unwrap();

        assert!(first_hash.starts_with("$argon2id$"));
        assert!(!first_hash.contains("s3cret"));
        assert_ne!(Some(first_hash.clone()), second.password_hash);

        let imported = Credentials::from_hash("admin", &first_hash).unwrap();
        assert!(imported.verify("admin", "s3cret"));
        assert!(Credentials::from_hash("admin", "not-a-hash").is_err());
    }

    #[test]
    fn test_credentials_without_password_reject_everything() {
        let credentials = Credentials::new("admin", None).unwrap();
        assert!(!credentials.login_enabled());
        assert!(!credentials.verify("admin", ""));
    }

    #[tokio::test]
    async fn test_expired_sessions_are_pruned_on_insert() {
        let store = SessionStore::with_limits(Duration::ZERO, MAX_SESSIONS);
        let first = store.insert(SessionData::new(None, Vec::new())).await;
        store.insert(SessionData::new(None, Vec::new())).await;

        assert_eq!(store.len().await, 1);
        assert!(!store.touch(first).await);
    }

    #[tokio::test]
    async fn test_touch_forgets_expired_session() {
        let store = SessionStore::with_limits(Duration::ZERO, MAX_SESSIONS);
        let id = store
            .insert(SessionData::new(Some("admin".to_string()), Vec::new()))
            .await;

        assert!(!store.touch(id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_full_store_evicts_least_recently_seen() {
        let store = SessionStore::with_limits(SESSION_TTL, 2);
        let oldest = store.insert(SessionData::new(None, Vec::new())).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let kept = store.insert(SessionData::new(None, Vec::new())).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newest = store.insert(SessionData::new(None, Vec::new())).await;

        assert_eq!(store.len().await, 2);
        assert!(!store.touch(oldest).await);
        assert!(store.touch(kept).await);
        assert!(store.touch(newest).await);
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/car/add/")), Some("/car/add/"));
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_login_redirect_encodes_next() {
        let response = login_redirect("/dashboard/?case=A").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/login/?next=%2Fdashboard%2F%3Fcase%3DA"
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(Uuid::nil());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
