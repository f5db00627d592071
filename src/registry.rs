//! A process-local stand-in for the allocation registry the core treats
//! as an external collaborator: per-user allocation quota bookkeeping is
//! explicitly out of scope for the core itself, but a binary that
//! actually runs a server still needs something behind the
//! `AllocationRegistry` trait. This one only counts; it does not reject
//! anything, matching the core's own contract (`add` returns nothing for
//! the core to act on -- see `service::core::registry::AllocationRegistry`).

use std::net::SocketAddr;

use ahash::AHashMap;
use parking_lot::Mutex;

use service::core::registry::AllocationRegistry;

#[derive(Default)]
pub struct CountingRegistry {
    counts: Mutex<AHashMap<(String, String), u32>>,
}

impl CountingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, username: &str, realm: &str) -> u32 {
        self.counts
            .lock()
            .get(&(username.to_string(), realm.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl AllocationRegistry for CountingRegistry {
    fn add(&self, client: SocketAddr, username: &str, realm: &str, max_allocations: u32) {
        let key = (username.to_string(), realm.to_string());
        let mut counts = self.counts.lock();
        let count = counts.entry(key).or_insert(0);
        *count += 1;

        if *count > max_allocations {
            log::warn!(
                "{username}@{realm} now holds {count} allocations, above the configured quota of {max_allocations} (client {client})"
            );
        }
    }

    fn del(&self, _client: SocketAddr, username: &str, realm: &str) {
        let key = (username.to_string(), realm.to_string());
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_del_balance() {
        let registry = CountingRegistry::new();
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

        registry.add(addr, "alice", "example.org", 10);
        registry.add(addr, "alice", "example.org", 10);
        assert_eq!(registry.count_for("alice", "example.org"), 2);

        registry.del(addr, "alice", "example.org");
        assert_eq!(registry.count_for("alice", "example.org"), 1);
    }
}
