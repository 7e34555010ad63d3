//! Session management against the hosted auth service.
//!
//! [`SupabaseAuthClient`] talks to the auth REST API. [`SessionManager`] wraps
//! it as a [`SessionProvider`]: the capability the request layer uses to get a
//! bearer token, refreshed shortly before it would expire.

use std::fmt;
use std::future::Future;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::util::{is_http_url, unix_timestamp_now};

/// Tokens with less remaining lifetime than this are refreshed before use.
pub const REFRESH_THRESHOLD_SECONDS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    pub const fn needs_refresh_at(&self, now: i64) -> bool {
        self.expires_at - now < REFRESH_THRESHOLD_SECONDS
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(unix_timestamp_now())
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("Auth HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse auth payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Durable storage for the signed-in session.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Source of bearer tokens for authenticated requests.
pub trait SessionProvider: Send + Sync + 'static {
    /// Returns a token that is valid for at least the refresh threshold, or
    /// `None` when nobody is signed in.
    fn valid_token(&self) -> impl Future<Output = AuthResult<Option<String>>> + Send;

    /// Drops the current session locally.
    fn force_sign_out(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    api_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, api_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::InvalidConfiguration("API key must not be empty"));
        }

        Ok(Self {
            auth_url,
            api_key,
            client: Client::builder().build()?,
            store,
        })
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load the persisted session, refreshing it when close to expiry.
    ///
    /// A session that cannot be refreshed is discarded.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored.needs_refresh() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        if email.trim().is_empty() {
            return Err(AuthError::Api("Email is required".to_string()));
        }
        if password.trim().is_empty() {
            return Err(AuthError::Api("Password is required".to_string()));
        }

        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&serde_json::json!({ "email": email, "password": password })),
        );
        let session = self.send_token_request(request).await?;
        self.store.save_session(&session)?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&serde_json::json!({ "refresh_token": refresh_token })),
        );
        let session = self.send_token_request(request).await?;
        self.store.save_session(&session)?;
        tracing::debug!(expires_at = session.expires_at, "Refreshed session");
        Ok(session)
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !(status.is_success() || status == StatusCode::UNAUTHORIZED) {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        Ok(())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send_token_request(&self, request: RequestBuilder) -> AuthResult<AuthSession> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        response.json::<TokenResponse>().await?.into_session()
    }
}

/// [`SessionProvider`] backed by the auth service and a persistence layer.
///
/// The cached session sits behind an async mutex that is held across a
/// refresh, so concurrent callers wait for one refresh instead of racing.
pub struct SessionManager<S: SessionPersistence> {
    client: SupabaseAuthClient<S>,
    current: Mutex<Option<AuthSession>>,
}

impl<S: SessionPersistence> SessionManager<S> {
    pub fn new(client: SupabaseAuthClient<S>) -> Self {
        Self {
            client,
            current: Mutex::new(None),
        }
    }
}

impl<S: SessionPersistence> SessionProvider for SessionManager<S> {
    async fn valid_token(&self) -> AuthResult<Option<String>> {
        let mut guard = self.current.lock().await;
        if guard.is_none() {
            *guard = self.client.store().load_session()?;
        }
        let Some(session) = guard.as_ref() else {
            return Ok(None);
        };
        if !session.needs_refresh() {
            return Ok(Some(session.access_token.clone()));
        }

        let refresh_token = session.refresh_token.clone();
        match self.client.refresh_session(&refresh_token).await {
            Ok(refreshed) => {
                let token = refreshed.access_token.clone();
                *guard = Some(refreshed);
                Ok(Some(token))
            }
            Err(error) => {
                tracing::warn!("Session refresh failed, signing out: {}", error);
                *guard = None;
                self.client.store().clear_session()?;
                Ok(None)
            }
        }
    }

    async fn force_sign_out(&self) {
        self.current.lock().await.take();
        if let Err(error) = self.client.store().clear_session() {
            tracing::warn!("Failed to clear stored session: {}", error);
        }
    }
}

/// Fixed bearer token, for service accounts and tests.
#[derive(Debug)]
pub struct StaticTokenProvider {
    token: std::sync::Mutex<Option<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: std::sync::Mutex::new(Some(token.into())),
        }
    }

    pub const fn signed_out() -> Self {
        Self {
            token: std::sync::Mutex::new(None),
        }
    }

    fn read(&self) -> Option<String> {
        self.token
            .lock()
            .map_or_else(|poisoned| poisoned.into_inner().clone(), |guard| guard.clone())
    }
}

impl SessionProvider for StaticTokenProvider {
    async fn valid_token(&self) -> AuthResult<Option<String>> {
        Ok(self.read())
    }

    async fn force_sign_out(&self) {
        match self.token.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<TokenUser>,
}

impl TokenResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });

        match (self.access_token, self.refresh_token, expires_at, self.user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user: AuthUser {
                        id: user.id,
                        email: user.email,
                    },
                })
            }
            _ => Err(AuthError::Api(
                "Auth response did not include an active session".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<AuthErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
