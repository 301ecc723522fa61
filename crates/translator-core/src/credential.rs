use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::ports::{AuthProvider, CredentialDirectory, SettingsStore};
use crate::preferences::keys;
use crate::types::{Credential, CredentialOrigin, Identity};

pub const DEFAULT_CREDENTIAL_WAIT: Duration = Duration::from_secs(1);

/// Cached API credential, lazily populated from the signed-in user's
/// remote document.
///
/// Clones share the same cache and fetch lock.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Arc<dyn SettingsStore>,
    auth: Arc<dyn AuthProvider>,
    directory: Arc<dyn CredentialDirectory>,
    wait: Duration,
    fetch_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        auth: Arc<dyn AuthProvider>,
        directory: Arc<dyn CredentialDirectory>,
        wait: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                auth,
                directory,
                wait,
                fetch_lock: Mutex::new(()),
            }),
        }
    }

    pub fn wait(&self) -> Duration {
        self.inner.wait
    }

    /// Cached credential, if any. A miss starts a background fetch and
    /// returns `None` right away.
    pub fn get_credential(&self) -> Option<Credential> {
        if let Some(credential) = self.cached() {
            return Some(credential);
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.clone();
                handle.spawn(async move {
                    if let Some(identity) = store.inner.auth.current_user() {
                        store.fetch_for(identity).await;
                    } else {
                        info!("No user is signed in, skipping credential fetch");
                    }
                });
            }
            Err(_) => debug!("no async runtime, credential fetch not started"),
        }
        None
    }

    /// True once a credential is available, waiting at most the configured
    /// delay for a remote fetch to finish.
    pub async fn ensure_credential(&self) -> bool {
        self.credential().await.is_ok()
    }

    /// Resolves the credential for a remote call.
    pub async fn credential(&self) -> Result<Credential, ServiceError> {
        if let Some(credential) = self.cached() {
            return Ok(credential);
        }

        let Some(identity) = self.inner.auth.current_user() else {
            info!("No user is signed in, credential unavailable");
            return Err(ServiceError::CredentialUnavailable);
        };

        // The fetch runs as its own task so it can still fill the cache if
        // it outlives the wait below.
        let task = tokio::spawn(self.clone().fetch_for(identity));
        match tokio::time::timeout(self.inner.wait, task).await {
            Ok(Ok(Some(credential))) => Ok(credential),
            Ok(Ok(None)) => Err(ServiceError::CredentialUnavailable),
            Ok(Err(e)) => {
                warn!(error = %e, "credential fetch task failed");
                Err(ServiceError::CredentialUnavailable)
            }
            Err(_) => {
                warn!(wait_ms = self.inner.wait.as_millis() as u64, "credential fetch still pending");
                self.cached().ok_or(ServiceError::CredentialUnavailable)
            }
        }
    }

    /// Persists a credential obtained outside the remote document flow.
    pub fn store(&self, value: &str) -> anyhow::Result<()> {
        self.inner.settings.set(keys::API_KEY, value)
    }

    pub fn clear(&self) {
        if let Err(e) = self.inner.settings.remove(keys::API_KEY) {
            warn!(error = %e, "failed to remove cached credential");
        } else {
            info!("cached credential cleared");
        }
    }

    fn cached(&self) -> Option<Credential> {
        self.inner
            .settings
            .get(keys::API_KEY)
            .filter(|value| !value.is_empty())
            .map(|value| Credential::new(value, CredentialOrigin::Cached))
    }

    async fn fetch_for(self, identity: Identity) -> Option<Credential> {
        let _guard = self.inner.fetch_lock.lock().await;

        // Another fetch may have filled the cache while we waited for the lock.
        if let Some(credential) = self.cached() {
            return Some(credential);
        }

        let mut identity = identity;
        if identity.is_expired() {
            debug!(uid = %identity.uid, "identity token expired, refreshing before fetch");
            if let Some(fresh) = self.refresh_identity(&identity).await {
                identity = fresh;
            }
        }

        let mut result = self.inner.directory.fetch_api_key(&identity).await;
        if matches!(&result, Err(e) if token_rejected(e)) {
            info!(uid = %identity.uid, "identity token rejected, refreshing");
            if let Some(fresh) = self.refresh_identity(&identity).await {
                identity = fresh;
                result = self.inner.directory.fetch_api_key(&identity).await;
            }
        }

        match result {
            Ok(Some(value)) if !value.is_empty() => {
                let credential = Credential::new(value, CredentialOrigin::Remote);
                if let Err(e) = self.inner.settings.set(keys::API_KEY, credential.value()) {
                    warn!(error = %e, "failed to cache fetched credential");
                    return None;
                }
                info!(uid = %identity.uid, credential = %credential.masked(), "API key fetched from user document");
                Some(credential)
            }
            Ok(_) => {
                warn!(uid = %identity.uid, "user document does not exist or has no API key");
                None
            }
            Err(e) => {
                warn!(uid = %identity.uid, error = %e, "failed to read user document");
                None
            }
        }
    }

    async fn refresh_identity(&self, stale: &Identity) -> Option<Identity> {
        match self.inner.auth.refresh().await {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(uid = %stale.uid, error = %e, "failed to refresh identity token");
                None
            }
        }
    }
}

fn token_rejected(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ServiceError>()
        .is_some_and(ServiceError::is_unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CountingDirectory, MemorySettings, StaticAuth};

    fn store_with(auth: StaticAuth, directory: CountingDirectory) -> (CredentialStore, Arc<CountingDirectory>) {
        let directory = Arc::new(directory);
        let store = CredentialStore::new(
            Arc::new(MemorySettings::new()),
            Arc::new(auth),
            directory.clone(),
            Duration::from_millis(1000),
        );
        (store, directory)
    }

    #[tokio::test]
    async fn cached_value_skips_remote() {
        let (store, directory) = store_with(StaticAuth::signed_in("u1"), CountingDirectory::with_key("k1"));
        store.store("cached").unwrap();

        let credential = store.credential().await.unwrap();

        assert_eq!(credential.value(), "cached");
        assert_eq!(credential.origin(), CredentialOrigin::Cached);
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn no_identity_means_no_fetch() {
        let (store, directory) = store_with(StaticAuth::signed_out(), CountingDirectory::with_key("k1"));

        assert!(!store.ensure_credential().await);
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn fetched_credential_is_marked_remote() {
        let (store, _) = store_with(StaticAuth::signed_in("u1"), CountingDirectory::with_key("k1"));

        let credential = store.credential().await.unwrap();

        assert_eq!(credential.origin(), CredentialOrigin::Remote);
        assert_eq!(store.get_credential().map(|c| c.value().to_string()), Some("k1".to_string()));
    }

    #[tokio::test]
    async fn missing_document_leaves_cache_empty() {
        let (store, directory) = store_with(StaticAuth::signed_in("u1"), CountingDirectory::empty());

        assert_eq!(store.credential().await, Err(ServiceError::CredentialUnavailable));
        assert_eq!(directory.calls(), 1);
        assert!(store.cached().is_none());
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_retried_once() {
        let auth = Arc::new(StaticAuth::signed_in("u1").refreshing_to("fresh"));
        let directory = Arc::new(CountingDirectory::with_key("k1").accepting_token("fresh"));
        let store = CredentialStore::new(
            Arc::new(MemorySettings::new()),
            auth.clone(),
            directory.clone(),
            Duration::from_secs(1),
        );

        let credential = store.credential().await.unwrap();

        assert_eq!(credential.value(), "k1");
        assert_eq!(auth.refreshes(), 1);
        assert_eq!(directory.tokens_seen(), vec!["token-u1".to_string(), "fresh".to_string()]);
    }

    #[tokio::test]
    async fn failed_refresh_does_not_retry() {
        let auth = Arc::new(StaticAuth::signed_in("u1"));
        let directory = Arc::new(CountingDirectory::with_key("k1").accepting_token("fresh"));
        let store = CredentialStore::new(
            Arc::new(MemorySettings::new()),
            auth.clone(),
            directory.clone(),
            Duration::from_secs(1),
        );

        assert_eq!(store.credential().await, Err(ServiceError::CredentialUnavailable));
        assert_eq!(auth.refreshes(), 1);
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn expired_identity_is_refreshed_before_the_fetch() {
        let auth = Arc::new(StaticAuth::signed_in("u1").expiring_at(1).refreshing_to("fresh"));
        let directory = Arc::new(CountingDirectory::with_key("k1").accepting_token("fresh"));
        let store = CredentialStore::new(
            Arc::new(MemorySettings::new()),
            auth.clone(),
            directory.clone(),
            Duration::from_secs(1),
        );

        assert!(store.ensure_credential().await);
        assert_eq!(directory.tokens_seen(), vec!["fresh".to_string()]);
    }
}
