//! Who is signed in.
//!
//! The session is an explicit value handed to every page handler; there is no
//! global current user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Identity provider error: {0}")]
    Provider(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, if any
    async fn current_user(&self) -> Result<Option<User>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Session state as seen by pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user: Option<User>,
    pub loading: bool,
}

impl SessionContext {
    pub fn loading() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }

    /// Resolve the current user from the provider
    pub async fn start(auth: &dyn AuthProvider) -> Self {
        match auth.current_user().await {
            Ok(user) => {
                tracing::debug!(user_id = ?user.as_ref().map(|u| u.id.as_str()), "session started");
                Self { user, loading: false }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve session, continuing signed out");
                Self::default()
            }
        }
    }

    pub fn end(&mut self) {
        self.user = None;
        self.loading = false;
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user.as_ref().ok_or(AppError::Unauthenticated)
    }
}

/// Fixed identity for local single-user setups and tests
#[derive(Debug, Default)]
pub struct StaticAuth {
    user: Mutex<Option<User>>,
    password: Option<String>,
}

impl StaticAuth {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            user: Mutex::new(Some(User {
                id: id.into(),
                email: None,
            })),
            password: None,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Accept `sign_in` only with this password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Result<Option<User>, AuthError> {
        Ok(self.user.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if let Some(expected) = &self.password {
            if expected != password {
                return Err(AuthError::InvalidCredentials);
            }
        }

        let mut current = self.user.lock().unwrap_or_else(|e| e.into_inner());
        let user = User {
            id: current
                .as_ref()
                .map(|u| u.id.clone())
                .unwrap_or_else(|| email.to_string()),
            email: Some(email.to_string()),
        };
        *current = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: User,
}

/// Hosted identity provider with a GoTrue-style HTTP API
pub struct RestAuth {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Mutex<Option<String>>,
}

impl RestAuth {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: Mutex::new(None),
        })
    }

    /// Token of the signed-in user, for stores that enforce row ownership
    pub fn access_token(&self) -> Option<String> {
        self.access_token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let bearer = token.unwrap_or(&self.api_key);
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn provider_error(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AuthError::Provider(format!("{}: {}", status, body))
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    async fn current_user(&self) -> Result<Option<User>, AuthError> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };

        let response = self
            .request(reqwest::Method::GET, "user", Some(&token))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(Some(response.json().await?)),
            reqwest::StatusCode::UNAUTHORIZED => Ok(None),
            _ => Err(Self::provider_error(response).await),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(Self::provider_error(response).await);
        }

        let token: TokenResponse = response.json().await?;
        *self.access_token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.access_token);
        tracing::info!(user_id = %token.user.id, "signed in");
        Ok(token.user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .access_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .request(reqwest::Method::POST, "logout", Some(&token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(())
    }
}
