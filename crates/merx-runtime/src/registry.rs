//! Connector registry.
//!
//! A unique mapping from platform to one connector. Registering a second
//! connector for a platform replaces the first (last write wins). The map is
//! behind a reader-writer lock: registration takes the write side, execution
//! only ever reads and clones the `Arc` out before dispatching.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use merx_core::{ConnectorConfig, MerxConfig, Platform};

use crate::connector::{Connector, ConnectorError, ConnectorMetadata, HealthStatus};
use crate::fallback::FallbackConnector;

#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: RwLock<HashMap<Platform, Arc<dyn Connector>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fallback connectors initialized from the `connectors` section.
    ///
    /// With no `connectors` entries every platform gets a fallback connector;
    /// otherwise only the listed platforms are registered.
    pub async fn from_config(config: &MerxConfig) -> Result<Self, ConnectorError> {
        let registry = Self::new();
        let platforms: Vec<(Platform, ConnectorConfig)> = if config.connectors.is_empty() {
            Platform::ALL
                .iter()
                .map(|p| (*p, ConnectorConfig::default()))
                .collect()
        } else {
            config
                .connectors
                .iter()
                .map(|(p, c)| (*p, c.clone()))
                .collect()
        };

        for (platform, connector_config) in platforms {
            let mut connector = FallbackConnector::new(platform);
            connector.initialize(&connector_config).await?;
            registry.register(Arc::new(connector));
        }
        Ok(registry)
    }

    /// Register a connector under its own platform, returning the one it
    /// replaced.
    pub fn register(&self, connector: Arc<dyn Connector>) -> Option<Arc<dyn Connector>> {
        let platform = connector.platform();
        let name = connector.metadata().name;
        let previous = self
            .connectors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(platform, connector);

        match &previous {
            Some(old) => tracing::warn!(
                platform = %platform,
                replaced = %old.metadata().name,
                connector = %name,
                "Connector replaced"
            ),
            None => tracing::debug!(platform = %platform, connector = %name, "Connector registered"),
        }
        previous
    }

    pub fn unregister(&self, platform: Platform) -> Option<Arc<dyn Connector>> {
        self.connectors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&platform)
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn Connector>> {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&platform)
            .cloned()
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&platform)
    }

    /// Registered platforms, sorted.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata of every registered connector, sorted by platform.
    pub fn metadata(&self) -> Vec<ConnectorMetadata> {
        self.snapshot()
            .into_iter()
            .map(|(_, connector)| connector.metadata())
            .collect()
    }

    pub async fn health_check_all(&self) -> BTreeMap<Platform, HealthStatus> {
        let mut statuses = BTreeMap::new();
        for (platform, connector) in self.snapshot() {
            statuses.insert(platform, connector.health_check().await);
        }
        statuses
    }

    fn snapshot(&self) -> Vec<(Platform, Arc<dyn Connector>)> {
        let mut entries: Vec<(Platform, Arc<dyn Connector>)> = self
            .connectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(p, c)| (*p, Arc::clone(c)))
            .collect();
        entries.sort_by_key(|(p, _)| *p);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::ConnectorMode;

    #[test]
    fn register_and_get() {
        let registry = ConnectorRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(FallbackConnector::new(Platform::Whop)));

        assert!(registry.contains(Platform::Whop));
        assert!(registry.get(Platform::Whop).is_some());
        assert!(registry.get(Platform::Stripe).is_none());
    }

    #[test]
    fn last_registration_wins() {
        let registry = ConnectorRegistry::new();
        let first = Arc::new(FallbackConnector::new(Platform::Stripe));
        let second = Arc::new(FallbackConnector::new(Platform::Stripe));

        assert!(registry.register(first.clone()).is_none());
        let replaced = registry.register(second.clone()).unwrap();
        assert_eq!(registry.len(), 1);

        // The replaced connector is the first one; the registry now hands out the second.
        let current = registry.get(Platform::Stripe).unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&replaced), Arc::as_ptr(&first)));
        assert!(std::ptr::addr_eq(Arc::as_ptr(&current), Arc::as_ptr(&second)));
    }

    #[test]
    fn unregister_removes() {
        let registry = ConnectorRegistry::new();
        registry.register(Arc::new(FallbackConnector::new(Platform::Discord)));
        assert!(registry.unregister(Platform::Discord).is_some());
        assert!(!registry.contains(Platform::Discord));
        assert!(registry.unregister(Platform::Discord).is_none());
    }

    #[test]
    fn platforms_and_metadata_are_sorted() {
        let registry = ConnectorRegistry::new();
        registry.register(Arc::new(FallbackConnector::new(Platform::Email)));
        registry.register(Arc::new(FallbackConnector::new(Platform::Whop)));
        assert_eq!(registry.platforms(), vec![Platform::Whop, Platform::Email]);
        let metadata = registry.metadata();
        assert_eq!(metadata[0].platform, Platform::Whop);
        assert_eq!(metadata[1].mode, ConnectorMode::Fallback);
    }

    #[tokio::test]
    async fn from_config_defaults_to_every_platform() {
        let registry = ConnectorRegistry::from_config(&MerxConfig::default())
            .await
            .unwrap();
        assert_eq!(registry.platforms(), Platform::ALL.to_vec());

        let health = registry.health_check_all().await;
        assert!(health.values().all(|status| status.healthy));
    }

    #[tokio::test]
    async fn from_config_registers_listed_platforms_only() {
        let config = MerxConfig::from_yaml("connectors:\n  stripe:\n    mode: fallback\n").unwrap();
        let registry = ConnectorRegistry::from_config(&config).await.unwrap();
        assert_eq!(registry.platforms(), vec![Platform::Stripe]);
    }
}
