use std::net::SocketAddr;

/// The allocation registry is the one piece of cross-allocation shared
/// state the core touches, and only at the two edges of an allocation's
/// life: once when it transitions into `Active`, and once when it tears
/// down. Everything in between -- permissions, channels, refresh -- is
/// local to the core and never goes back through this collaborator.
pub trait AllocationRegistry: Send + Sync {
    /// Record a newly-active allocation. `max_allocations` is the quota
    /// the registry should enforce for this `(username, realm)` pair;
    /// implementations that don't track quotas can ignore it.
    fn add(&self, client: SocketAddr, username: &str, realm: &str, max_allocations: u32);

    /// Remove an allocation that has expired, been refreshed to zero, or
    /// whose owner went away.
    fn del(&self, client: SocketAddr, username: &str, realm: &str);
}

/// A registry that does not enforce or track anything, for standalone
/// deployments with no clustering.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRegistry;

impl AllocationRegistry for NullRegistry {
    fn add(&self, _client: SocketAddr, _username: &str, _realm: &str, _max_allocations: u32) {}
    fn del(&self, _client: SocketAddr, _username: &str, _realm: &str) {}
}
