use std::{collections::HashSet, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::{
    adapters::Adapter,
    platform::{Platform, PlatformDetector},
};

pub type AdapterEntry = Arc<dyn Adapter>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("platform {0} is recognized but has no adapter")]
    MissingAdapter(Platform),
    #[error("adapter {adapter} is bound to {platform}, which is never recognized")]
    OrphanAdapter {
        adapter: &'static str,
        platform: Platform,
    },
    #[error("platform {0} is bound more than once")]
    DuplicateBinding(Platform),
    #[error("adapter {adapter} can not handle {platform}")]
    UnsupportedBinding {
        adapter: &'static str,
        platform: Platform,
    },
    #[error("adapter {0} does not take search queries")]
    UnsupportedSearch(&'static str),
}

/// Which adapter handles which platform, and which one takes search queries.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    bindings: Vec<(Platform, AdapterEntry)>,
    search: Option<AdapterEntry>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `adapter` to every platform it declares.
    pub fn register(&mut self, adapter: AdapterEntry) -> Result<(), RegistryError> {
        let platforms = adapter.platforms().to_vec();
        for platform in platforms {
            self.bind(platform, Arc::clone(&adapter))?;
        }

        Ok(())
    }

    pub fn bind(&mut self, platform: Platform, adapter: AdapterEntry) -> Result<(), RegistryError> {
        if !adapter.platforms().contains(&platform) {
            return Err(RegistryError::UnsupportedBinding {
                adapter: adapter.name(),
                platform,
            });
        }

        if self.get(platform).is_some() {
            return Err(RegistryError::DuplicateBinding(platform));
        }

        debug!(%platform, adapter = adapter.name(), "Bound adapter");
        self.bindings.push((platform, adapter));
        Ok(())
    }

    pub fn set_search(&mut self, adapter: AdapterEntry) -> Result<(), RegistryError> {
        if !adapter.handles_search() {
            return Err(RegistryError::UnsupportedSearch(adapter.name()));
        }

        debug!(adapter = adapter.name(), "Bound search adapter");
        self.search = Some(adapter);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<&AdapterEntry> {
        self.bindings
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, adapter)| adapter)
    }

    #[must_use]
    pub const fn search(&self) -> Option<&AdapterEntry> {
        self.search.as_ref()
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.bindings.iter().map(|(p, _)| *p)
    }

    /// Every recognized platform has exactly one adapter and every adapter is reachable.
    pub fn validate_against(&self, detector: &PlatformDetector) -> Result<(), RegistryError> {
        let recognized = detector.platforms().collect::<HashSet<_>>();

        for platform in detector.platforms() {
            if self.get(platform).is_none() {
                return Err(RegistryError::MissingAdapter(platform));
            }
        }

        for (platform, adapter) in &self.bindings {
            if !recognized.contains(platform) {
                return Err(RegistryError::OrphanAdapter {
                    adapter: adapter.name(),
                    platform: *platform,
                });
            }
        }

        Ok(())
    }
}
