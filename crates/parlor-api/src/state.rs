use std::sync::Arc;

use parlor_db::{RegistryDb, StoreManager};

use crate::mail::Notifier;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub registry: RegistryDb,
    pub stores: StoreManager,
    pub tokens: TokenService,
    pub notifier: Notifier,
    pub config: CoreConfig,
}

#[derive(Clone)]
pub struct CoreConfig {
    /// The one address allowed to approve rooms and delete any message.
    pub admin_email: String,
    /// When false, rooms are provisioned on first touch.
    pub require_approval: bool,
    /// Prefix for the links embedded in notification payloads.
    pub base_url: String,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// A state backed by a throwaway data directory.
    pub fn test_state(require_approval: bool) -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryDb::open(&dir.path().join("registry.db")).unwrap();
        let stores = StoreManager::new(dir.path()).unwrap();
        let state = Arc::new(AppStateInner {
            registry,
            stores,
            tokens: TokenService::new("test-secret"),
            notifier: Notifier::Log,
            config: CoreConfig {
                admin_email: "admin@example.com".to_string(),
                require_approval,
                base_url: "http://localhost:3000".to_string(),
            },
        });
        (dir, state)
    }
}
