use std::net::SocketAddr;

use ahash::AHashMap;

/// Why a ChannelBind request was rejected, before any change was applied
/// to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel number is outside `0x4000..=0x7FFE`.
    OutOfRange,
    /// This peer is already bound to a different channel number.
    PeerBoundElsewhere(u16),
    /// This channel number is already bound to a different peer.
    ChannelBoundElsewhere(SocketAddr),
}

/// Bidirectional channel-number <-> peer-address bindings for a single
/// allocation.
#[derive(Debug, Default)]
pub struct ChannelTable {
    by_channel: AHashMap<u16, (SocketAddr, u64)>,
    by_peer: AHashMap<SocketAddr, u16>,
    generation: u64,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_channel.len()
    }

    pub fn peer_of(&self, channel: u16) -> Option<SocketAddr> {
        self.by_channel.get(&channel).map(|(peer, _)| *peer)
    }

    pub fn channel_of(&self, peer: &SocketAddr) -> Option<u16> {
        self.by_peer.get(peer).copied()
    }

    pub fn generation_of(&self, channel: u16) -> Option<u64> {
        self.by_channel.get(&channel).map(|(_, gen)| *gen)
    }

    /// Bind (or refresh) `channel` to `peer`. ChannelBind is idempotent: a
    /// repeat bind of the same (channel, peer) pair just refreshes the
    /// generation; any other collision is rejected and the table is left
    /// unchanged.
    pub fn bind(&mut self, channel: u16, peer: SocketAddr) -> Result<u64, ChannelError> {
        if !(0x4000..=0x7FFE).contains(&channel) {
            return Err(ChannelError::OutOfRange);
        }

        if let Some(&existing) = self.by_peer.get(&peer) {
            if existing != channel {
                return Err(ChannelError::PeerBoundElsewhere(existing));
            }
        }

        if let Some((existing_peer, _)) = self.by_channel.get(&channel) {
            if *existing_peer != peer {
                return Err(ChannelError::ChannelBoundElsewhere(*existing_peer));
            }
        }

        self.generation += 1;
        self.by_channel.insert(channel, (peer, self.generation));
        self.by_peer.insert(peer, channel);
        Ok(self.generation)
    }

    /// Drop a binding if its generation still matches. Returns whether
    /// anything was removed.
    pub fn expire(&mut self, channel: u16, generation: u64) -> bool {
        if let Some((peer, current)) = self.by_channel.get(&channel) {
            if *current == generation {
                let peer = *peer;
                self.by_channel.remove(&channel);
                self.by_peer.remove(&peer);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_the_same_pair_refreshes() {
        let mut table = ChannelTable::new();
        let peer: SocketAddr = "1.2.3.4:9".parse().unwrap();

        let g1 = table.bind(0x4000, peer).unwrap();
        let g2 = table.bind(0x4000, peer).unwrap();
        assert!(g2 > g1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn conflicting_bind_is_rejected() {
        let mut table = ChannelTable::new();
        let peer_a: SocketAddr = "1.2.3.4:9".parse().unwrap();
        let peer_b: SocketAddr = "5.6.7.8:9".parse().unwrap();

        table.bind(0x4000, peer_a).unwrap();
        let err = table.bind(0x4000, peer_b).unwrap_err();
        assert_eq!(err, ChannelError::ChannelBoundElsewhere(peer_a));

        let err = table.bind(0x4001, peer_a).unwrap_err();
        assert_eq!(err, ChannelError::PeerBoundElsewhere(0x4000));
    }

    #[test]
    fn channel_number_must_be_in_range() {
        let mut table = ChannelTable::new();
        let peer: SocketAddr = "1.2.3.4:9".parse().unwrap();
        assert_eq!(
            table.bind(0x3FFF, peer).unwrap_err(),
            ChannelError::OutOfRange
        );
        assert_eq!(
            table.bind(0x7FFF, peer).unwrap_err(),
            ChannelError::OutOfRange
        );
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut table = ChannelTable::new();
        let peer: SocketAddr = "1.2.3.4:9".parse().unwrap();
        let g1 = table.bind(0x4000, peer).unwrap();
        table.bind(0x4000, peer).unwrap();
        assert!(!table.expire(0x4000, g1));
        assert!(table.peer_of(0x4000).is_some());
    }
}
