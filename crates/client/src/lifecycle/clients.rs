//! Registry of open clients (pages) and the generation controlling each.
//!
//! The registry belongs to the host, not to a version: controllers of
//! different versions share one registry so a new version can see and claim
//! pages still controlled by the old one.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Clients {
    /// Generation that controls newly opened clients.
    active: Option<String>,
    /// Client id to controlling generation (`None` = uncontrolled).
    controllers: HashMap<String, Option<String>>,
}

/// Shared registry of open clients.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<RwLock<Clients>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an opened client. It is controlled by the active generation,
    /// if any, which is returned.
    pub async fn open(&self, client_id: &str) -> Option<String> {
        let mut clients = self.inner.write().await;
        let controller = clients.active.clone();
        clients
            .controllers
            .insert(client_id.to_string(), controller.clone());
        controller
    }

    /// Forget a closed client. Returns false if it was not registered.
    pub async fn close(&self, client_id: &str) -> bool {
        self.inner
            .write()
            .await
            .controllers
            .remove(client_id)
            .is_some()
    }

    /// Make `generation` active and control every open client with it.
    ///
    /// Returns how many clients changed controller.
    pub async fn claim(&self, generation: &str) -> usize {
        let mut clients = self.inner.write().await;
        clients.active = Some(generation.to_string());

        let mut claimed = 0;
        for controller in clients.controllers.values_mut() {
            if controller.as_deref() != Some(generation) {
                *controller = Some(generation.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    /// Generation controlling `client_id`.
    pub async fn controller(&self, client_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .controllers
            .get(client_id)
            .cloned()
            .flatten()
    }

    /// Generation that controls newly opened clients.
    pub async fn active(&self) -> Option<String> {
        self.inner.read().await.active.clone()
    }

    /// Number of open clients controlled by a generation other than `generation`.
    pub async fn controlled_by_other(&self, generation: &str) -> usize {
        self.inner
            .read()
            .await
            .controllers
            .values()
            .filter(|c| c.as_deref().is_some_and(|g| g != generation))
            .count()
    }

    /// Number of open clients.
    pub async fn len(&self) -> usize {
        self.inner.read().await.controllers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_before_any_activation_is_uncontrolled() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.open("tab-1").await, None);
        assert_eq!(registry.controller("tab-1").await, None);
        assert_eq!(registry.controlled_by_other("daemon-cache-v2").await, 0);
    }

    #[tokio::test]
    async fn test_claim_takes_over_open_clients() {
        let registry = ClientRegistry::new();
        registry.open("tab-1").await;
        registry.claim("daemon-cache-v1").await;
        registry.open("tab-2").await;

        assert_eq!(registry.controller("tab-2").await.as_deref(), Some("daemon-cache-v1"));
        assert_eq!(registry.controlled_by_other("daemon-cache-v2").await, 2);

        let claimed = registry.claim("daemon-cache-v2").await;
        assert_eq!(claimed, 2);
        assert_eq!(registry.controlled_by_other("daemon-cache-v2").await, 0);
        assert_eq!(registry.active().await.as_deref(), Some("daemon-cache-v2"));
    }

    #[tokio::test]
    async fn test_claim_counts_only_changes() {
        let registry = ClientRegistry::new();
        registry.claim("daemon-cache-v1").await;
        registry.open("tab-1").await;

        assert_eq!(registry.claim("daemon-cache-v1").await, 0);
    }

    #[tokio::test]
    async fn test_close() {
        let registry = ClientRegistry::new();
        registry.open("tab-1").await;
        assert_eq!(registry.len().await, 1);

        assert!(registry.close("tab-1").await);
        assert!(!registry.close("tab-1").await);
        assert!(registry.is_empty().await);
    }
}
