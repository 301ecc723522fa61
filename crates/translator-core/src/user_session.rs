use std::sync::Arc;

use tracing::{info, warn};

use crate::credential::CredentialStore;
use crate::error::ServiceError;
use crate::ports::{AuthProvider, SettingsStore};
use crate::preferences::keys;
use crate::types::Identity;

/// Sign-in state for the app, constructed at startup and torn down at logout.
#[derive(Clone)]
pub struct UserSession {
    auth: Arc<dyn AuthProvider>,
    settings: Arc<dyn SettingsStore>,
    credentials: CredentialStore,
}

impl UserSession {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        settings: Arc<dyn SettingsStore>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            auth,
            settings,
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.current_user().is_some()
            || self.settings.get(keys::IS_LOGGED_IN).as_deref() == Some("true")
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.auth.current_user()
    }

    /// Signs in and warms the credential cache. A missing credential does not
    /// fail the login; the pipeline reports it on first use.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ServiceError> {
        let identity = self.auth.sign_in(email, password).await?;
        if let Err(e) = self.settings.set(keys::IS_LOGGED_IN, "true") {
            warn!(error = %e, "failed to persist login flag");
        }
        info!(uid = %identity.uid, "signed in");

        if !self.credentials.ensure_credential().await {
            warn!(uid = %identity.uid, "signed in but no API key is available yet");
        }
        Ok(identity)
    }

    /// Signs out and drops the cached credential. The credential is cleared
    /// even when the provider reports a sign-out error.
    pub async fn logout(&self) -> Result<(), ServiceError> {
        let result = self.auth.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "error signing out");
        }
        if let Err(e) = self.settings.set(keys::IS_LOGGED_IN, "false") {
            warn!(error = %e, "failed to persist login flag");
        }
        self.credentials.clear();
        info!("signed out");
        result
    }
}
