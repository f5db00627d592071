use std::net::IpAddr;

use ahash::AHashMap;

use crate::core::blacklist::Blacklist;
use codec::message::attributes::address::IpFamily;

/// Why a CreatePermission request was rejected, before any change was
/// applied to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    /// XOR-PEER-ADDRESS was absent.
    Empty,
    /// Installing every requested address would exceed the per-allocation
    /// quota.
    QuotaExceeded,
    /// A peer address family didn't match the relayed address family.
    FamilyMismatch,
    /// A peer address is on the blacklist.
    Blacklisted(IpAddr),
}

/// Tracks which peer IP addresses an allocation is currently permitted to
/// exchange data with, keyed on address only (port is ignored per RFC5766
/// section 9).
#[derive(Debug, Default)]
pub struct PermissionTable {
    entries: AHashMap<IpAddr, u64>,
    generation: u64,
    max: usize,
}

impl PermissionTable {
    pub fn new(max: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            generation: 0,
            max,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.entries.contains_key(addr)
    }

    pub fn generation_of(&self, addr: &IpAddr) -> Option<u64> {
        self.entries.get(addr).copied()
    }

    /// Drop a permission if its generation still matches, i.e. it has not
    /// been refreshed since the timer was armed. Returns whether anything
    /// was removed.
    pub fn expire(&mut self, addr: &IpAddr, generation: u64) -> bool {
        if self.entries.get(addr) == Some(&generation) {
            self.entries.remove(addr);
            true
        } else {
            false
        }
    }

    /// Validate a batch of peer addresses against quota, address family and
    /// the blacklist, without mutating the table. The caller installs the
    /// addresses with [`PermissionTable::install`] only once validation
    /// succeeds, so a rejected request leaves the table untouched.
    pub fn validate(
        &self,
        addrs: &[IpAddr],
        relay_family: IpFamily,
        blacklist: &Blacklist,
    ) -> Result<(), PermissionError> {
        if addrs.is_empty() {
            return Err(PermissionError::Empty);
        }

        // New addresses are additive: refreshing an already-permitted peer
        // still consumes a quota slot for this calculation, matching how
        // install() always bumps every entry's generation.
        if self.entries.len() + addrs.len() > self.max {
            return Err(PermissionError::QuotaExceeded);
        }

        for addr in addrs {
            if family_of(addr) != relay_family {
                return Err(PermissionError::FamilyMismatch);
            }
        }

        for addr in addrs {
            if blacklist.is_blacklisted(*addr) {
                return Err(PermissionError::Blacklisted(*addr));
            }
        }

        Ok(())
    }

    /// Install (or refresh) permissions for every address, returning the
    /// generation assigned to each so the caller can arm an expiry timer.
    pub fn install(&mut self, addrs: &[IpAddr]) -> Vec<(IpAddr, u64)> {
        let mut armed = Vec::with_capacity(addrs.len());

        for addr in addrs {
            self.generation += 1;
            self.entries.insert(*addr, self.generation);
            armed.push((*addr, self.generation));
        }

        armed
    }
}

pub(crate) fn family_of(addr: &IpAddr) -> IpFamily {
    match addr {
        IpAddr::V4(_) => IpFamily::V4,
        IpAddr::V6(_) => IpFamily::V6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_checked_before_install() {
        let mut table = PermissionTable::new(1);
        let addrs = ["1.1.1.1".parse().unwrap(), "2.2.2.2".parse().unwrap()];
        let blacklist = Blacklist::default();

        let err = table
            .validate(&addrs, IpFamily::V4, &blacklist)
            .unwrap_err();
        assert_eq!(err, PermissionError::QuotaExceeded);
        assert!(table.is_empty());
    }

    #[test]
    fn family_mismatch_is_rejected() {
        let table = PermissionTable::new(10);
        let addrs = ["::1".parse().unwrap()];
        let blacklist = Blacklist::default();

        let err = table
            .validate(&addrs, IpFamily::V4, &blacklist)
            .unwrap_err();
        assert_eq!(err, PermissionError::FamilyMismatch);
    }

    #[test]
    fn install_assigns_increasing_generations() {
        let mut table = PermissionTable::new(10);
        let addrs = ["1.1.1.1".parse().unwrap(), "2.2.2.2".parse().unwrap()];
        let armed = table.install(&addrs);

        assert_eq!(armed.len(), 2);
        assert!(armed[1].1 > armed[0].1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut table = PermissionTable::new(10);
        let addrs = ["1.1.1.1".parse().unwrap()];
        let armed = table.install(&addrs);
        let (addr, generation) = armed[0];

        // refresh bumps the generation
        table.install(&addrs);
        assert!(!table.expire(&addr, generation));
        assert!(table.contains(&addr));
    }
}
