//! Authenticated JSON requests against the hosted functions endpoint.
//!
//! Every call carries the platform API key and a bearer token from the
//! session provider. A 401 ends the session: the provider is signed out and
//! the notice sink is told to route back to sign-in, once per rejected token
//! no matter how many in-flight requests fail with it.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::SessionProvider;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::notice::NoticeSink;
use crate::util::compact_text;

pub struct ApiClient<P: SessionProvider> {
    inner: Arc<Inner<P>>,
}

struct Inner<P> {
    base_url: String,
    api_key: String,
    http: Client,
    provider: Arc<P>,
    notices: Arc<dyn NoticeSink>,
    rejected_token: Mutex<Option<String>>,
}

impl<P: SessionProvider> Clone for ApiClient<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: SessionProvider> ApiClient<P> {
    pub fn new(
        config: &ClientConfig,
        provider: Arc<P>,
        notices: Arc<dyn NoticeSink>,
    ) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                base_url: config.functions_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                http,
                provider,
                notices,
                rejected_token: Mutex::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn notices(&self) -> Arc<dyn NoticeSink> {
        Arc::clone(&self.inner.notices)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<(), T>(Method::POST, path, None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<(), T>(Method::DELETE, path, None).await
    }

    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let token = self
            .inner
            .provider
            .valid_token()
            .await?
            .ok_or(Error::Unauthenticated)?;

        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!(%method, %url, "Sending API request");

        let mut request = self
            .inner
            .http
            .request(method, &url)
            .header("apikey", &self.inner.api_key)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.end_session(&token).await;
            return Err(Error::Unauthorized);
        }

        let text = response.text().await?;
        if !status.is_success() {
            let message = parse_api_error(status, &text);
            tracing::debug!(status = status.as_u16(), %message, "API request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload = if text.trim().is_empty() { "null" } else { &text };
        Ok(serde_json::from_str(payload)?)
    }

    async fn end_session(&self, token: &str) {
        let first_rejection = {
            let mut rejected = self
                .inner
                .rejected_token
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if rejected.as_deref() == Some(token) {
                false
            } else {
                *rejected = Some(token.to_string());
                true
            }
        };
        if !first_rejection {
            tracing::debug!("Session already ended for rejected token");
            return;
        }

        tracing::warn!("Backend rejected the session token; signing out");
        self.inner.provider.force_sign_out().await;
        self.inner.notices.session_ended();
    }
}

/// Percent-encode a single path segment.
pub fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            let message = message.trim();
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }

    let status_line = status.canonical_reason().map_or_else(
        || format!("HTTP {}", status.as_u16()),
        |reason| format!("HTTP {} {reason}", status.as_u16()),
    );
    let trimmed = compact_text(body);
    if trimmed.is_empty() || trimmed.starts_with('{') {
        status_line
    } else {
        format!("{status_line}: {trimmed}")
    }
}
