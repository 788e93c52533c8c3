//! Injected runtime environment
//!
//! Everything the pipeline needs from the host process (identifiers, the
//! local address, region lookup, the counter store, the remote transport,
//! and the operating mode) is bundled into one `Environment` that is built
//! once and shared via `Arc`.

use crate::error::{AuditError, Result};
use crate::store::{CounterStore, MemoryCounterStore};
use crate::transport::Transport;
use crate::types::{Region, RunMode};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Generates globally unique event identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUID v4 identifiers
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// GeoIP region lookup
pub trait RegionLookup: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Result<Region>;
}

/// Lookup that always fails; events keep an empty region
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRegion;

impl RegionLookup for NoRegion {
    fn lookup(&self, ip: IpAddr) -> Result<Region> {
        Err(AuditError::Region {
            ip: ip.to_string(),
            reason: "no region database configured".to_string(),
        })
    }
}

/// Fixed IP → region table
#[derive(Debug, Default, Clone)]
pub struct StaticRegions {
    table: HashMap<IpAddr, Region>,
}

impl StaticRegions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn with(mut self, ip: IpAddr, region: Region) -> Self {
        self.table.insert(ip, region);
        self
    }
}

impl RegionLookup for StaticRegions {
    fn lookup(&self, ip: IpAddr) -> Result<Region> {
        self.table.get(&ip).cloned().ok_or_else(|| AuditError::Region {
            ip: ip.to_string(),
            reason: "not found".to_string(),
        })
    }
}

/// Host collaborators shared by events and the dispatcher
pub struct Environment {
    mode: RunMode,
    debug: bool,
    local_addr: String,
    ids: Arc<dyn IdGenerator>,
    region: Arc<dyn RegionLookup>,
    store: Arc<dyn CounterStore>,
    transport: Option<Arc<dyn Transport>>,
}

impl Environment {
    /// Start building an environment from defaults
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Diagnostic mode disables alert inhibition
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Address of the local node, stamped on every event
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }

    pub fn lookup_region(&self, ip: IpAddr) -> Result<Region> {
        self.region.lookup(ip)
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }
}

impl Default for Environment {
    fn default() -> Self {
        EnvironmentBuilder::default().build()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("mode", &self.mode)
            .field("debug", &self.debug)
            .field("local_addr", &self.local_addr)
            .field("transport", &self.transport.as_ref().map(|t| t.name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Environment`]
pub struct EnvironmentBuilder {
    mode: RunMode,
    debug: bool,
    local_addr: String,
    ids: Arc<dyn IdGenerator>,
    region: Arc<dyn RegionLookup>,
    store: Arc<dyn CounterStore>,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            debug: false,
            local_addr: "127.0.0.1".to_string(),
            ids: Arc::new(UuidIds),
            region: Arc::new(NoRegion),
            store: Arc::new(MemoryCounterStore::default()),
            transport: None,
        }
    }
}

impl EnvironmentBuilder {
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn local_addr(mut self, addr: impl Into<String>) -> Self {
        self.local_addr = addr.into();
        self
    }

    pub fn ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn region(mut self, region: impl RegionLookup + 'static) -> Self {
        self.region = Arc::new(region);
        self
    }

    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = store;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Environment {
        Environment {
            mode: self.mode,
            debug: self.debug,
            local_addr: self.local_addr,
            ids: self.ids,
            region: self.region,
            store: self.store,
            transport: self.transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn test_no_region_fails() {
        let err = NoRegion.lookup("8.8.8.8".parse().unwrap()).unwrap_err();
        assert!(matches!(err, AuditError::Region { .. }));
    }

    #[test]
    fn test_static_regions() {
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let regions = StaticRegions::new().with(ip, Region::new("CN", "", "", ""));
        assert_eq!(regions.lookup(ip).unwrap().country, "CN");
        assert!(regions.lookup("4.3.2.1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_environment_defaults() {
        let env = Environment::default();
        assert_eq!(env.mode(), RunMode::Standalone);
        assert!(!env.is_debug());
        assert_eq!(env.local_addr(), "127.0.0.1");
        assert!(env.transport().is_none());
    }
}
