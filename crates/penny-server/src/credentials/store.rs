use std::sync::Arc;

use tokio::sync::RwLock;

use super::types::{Credential, CredentialSlot};

/// In-memory home of the live credentials
///
/// Readers get an `Arc` snapshot, so a token and its expiry are never observed
/// half-updated.
pub struct CredentialStore {
    app: RwLock<Arc<Credential>>,
    user: RwLock<Arc<Credential>>,
}

impl CredentialStore {
    pub fn new(app: Credential, user: Credential) -> Self {
        Self {
            app: RwLock::new(Arc::new(app)),
            user: RwLock::new(Arc::new(user)),
        }
    }

    fn slot(&self, slot: CredentialSlot) -> &RwLock<Arc<Credential>> {
        match slot {
            CredentialSlot::App => &self.app,
            CredentialSlot::User => &self.user,
        }
    }

    pub async fn snapshot(&self, slot: CredentialSlot) -> Arc<Credential> {
        self.slot(slot).read().await.clone()
    }

    pub(crate) async fn replace(&self, slot: CredentialSlot, credential: Credential) {
        *self.slot(slot).write().await = Arc::new(credential);
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(Credential::default(), Credential::default())
    }
}
