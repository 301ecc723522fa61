//! REST adapters for the hosted identity service and the per-user document
//! store that holds each user's API key.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client as Http, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use translator_core::ports::{AuthProvider, CredentialDirectory, SettingsStore};
use translator_core::preferences::keys;
use translator_core::types::unix_now;
use translator_core::{Identity, ServiceError};

fn build_http(timeout: Duration) -> Result<Http> {
    Http::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client for identity services")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// The token endpoint answers in snake_case, unlike sign-in.
#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Base URLs of the two identity endpoints.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    /// Hosts `accounts:signInWithPassword`.
    pub accounts: String,
    /// Hosts `token` (refresh-token exchange).
    pub tokens: String,
}

/// Email/password sign-in. The signed-in identity, refresh token included,
/// is remembered in the settings store so later runs start signed in.
pub struct FirebaseAuth {
    http: Http,
    endpoints: AuthEndpoints,
    api_key: Option<String>,
    settings: Arc<dyn SettingsStore>,
    current: RwLock<Option<Identity>>,
}

impl FirebaseAuth {
    pub fn new(
        endpoints: AuthEndpoints,
        api_key: Option<String>,
        settings: Arc<dyn SettingsStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let current = settings
            .get(keys::AUTH_IDENTITY)
            .and_then(|raw| match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable stored identity");
                    None
                }
            });
        if let Some(identity) = &current {
            debug!(uid = %identity.uid, expired = identity.is_expired(), "restored signed-in user");
        }

        Ok(Self {
            http: build_http(timeout)?,
            endpoints,
            api_key,
            settings,
            current: RwLock::new(current),
        })
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Auth("DMS_FIREBASE_API_KEY is not set".into()))
    }

    fn remember(&self, identity: Option<Identity>) {
        if let Some(identity) = &identity {
            match serde_json::to_string(identity) {
                Ok(raw) => {
                    if let Err(e) = self.settings.set(keys::AUTH_IDENTITY, &raw) {
                        warn!(error = %e, "failed to persist signed-in user");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize signed-in user"),
            }
        }
        if let Ok(mut current) = self.current.write() {
            *current = identity;
        }
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ServiceError> {
        let url = format!(
            "{}/accounts:signInWithPassword?key={}",
            self.endpoints.accounts.trim_end_matches('/'),
            self.api_key()?
        );

        let resp = self
            .http
            .post(url)
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let resp = check_auth_status(resp, "sign-in").await?;

        let body: SignInResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("sign-in: {}", e)))?;
        let identity = Identity {
            uid: body.local_id,
            email: body.email.or_else(|| Some(email.to_string())),
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: expiry_from(body.expires_in.as_deref()),
        };

        self.remember(Some(identity.clone()));
        info!(uid = %identity.uid, "identity service accepted credentials");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        self.remember(None);
        self.settings
            .remove(keys::AUTH_IDENTITY)
            .map_err(|e| ServiceError::Auth(format!("failed to forget signed-in user: {}", e)))
    }

    fn current_user(&self) -> Option<Identity> {
        self.current.read().ok().and_then(|c| c.clone())
    }

    async fn refresh(&self) -> Result<Identity, ServiceError> {
        let current = self
            .current_user()
            .ok_or_else(|| ServiceError::Auth("no user is signed in".into()))?;
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| ServiceError::Auth("no refresh token stored, sign in again".into()))?;
        let url = format!(
            "{}/token?key={}",
            self.endpoints.tokens.trim_end_matches('/'),
            self.api_key()?
        );

        let resp = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let resp = check_auth_status(resp, "token refresh").await?;

        let body: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("token refresh: {}", e)))?;
        let identity = Identity {
            uid: body.user_id,
            email: current.email,
            id_token: body.id_token,
            refresh_token: Some(body.refresh_token),
            expires_at: expiry_from(body.expires_in.as_deref()),
        };

        self.remember(Some(identity.clone()));
        info!(uid = %identity.uid, "identity token refreshed");
        Ok(identity)
    }
}

/// Non-success answers carry `error.message` (e.g. `INVALID_PASSWORD`,
/// `TOKEN_EXPIRED`).
async fn check_auth_status(resp: Response, action: &str) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| format!("{} failed with status {}", action, status.as_u16()));
    Err(ServiceError::Auth(message))
}

/// `expiresIn` is a decimal string of seconds from now.
fn expiry_from(expires_in: Option<&str>) -> Option<u64> {
    let secs = expires_in?.trim().parse::<u64>().ok()?;
    Some(unix_now() + secs)
}

/// Reads `users/{uid}` from the document store and returns its `apiKey`
/// string field.
pub struct FirestoreCredentials {
    http: Http,
    base_url: String,
    project_id: Option<String>,
}

impl FirestoreCredentials {
    pub fn new(base_url: impl Into<String>, project_id: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            base_url: base_url.into(),
            project_id,
        })
    }

    fn document_url(&self, project: &str, uid: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/users/{}",
            self.base_url.trim_end_matches('/'),
            project,
            uid
        )
    }
}

#[async_trait]
impl CredentialDirectory for FirestoreCredentials {
    async fn fetch_api_key(&self, identity: &Identity) -> Result<Option<String>> {
        let project = self
            .project_id
            .as_deref()
            .ok_or_else(|| anyhow!("DMS_FIREBASE_PROJECT_ID is not set"))?;

        let resp = self
            .http
            .get(self.document_url(project, &identity.uid))
            .bearer_auth(&identity.id_token)
            .send()
            .await
            .context("Failed to reach document store")?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(uid = %identity.uid, "user document does not exist");
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            })
            .context("document store refused the request");
        }

        let doc: Value = resp.json().await.context("Invalid user document")?;
        Ok(doc
            .pointer("/fields/apiKey/stringValue")
            .and_then(|v| v.as_str())
            .map(str::to_owned))
    }
}
