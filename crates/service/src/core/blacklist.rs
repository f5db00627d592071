use std::net::IpAddr;
use std::str::FromStr;

/// A single CIDR-style network used for blacklist matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: IpAddr,
    prefix_len: u8,
}

#[derive(Debug)]
pub struct SubnetParseError;

impl std::fmt::Display for SubnetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid subnet, expected \"address/prefix\"")
    }
}

impl std::error::Error for SubnetParseError {}

impl Subnet {
    pub fn new(network: IpAddr, prefix_len: u8) -> Self {
        Self {
            network,
            prefix_len,
        }
    }

    /// True if `addr` falls inside this network.
    ///
    /// IPv4-mapped IPv6 addresses are normalized before comparison: a v4
    /// address is checked against a v6 network by promoting it into
    /// `::ffff:0:0/96`, and a v6 address that carries a v4-mapped form is
    /// checked against a v4 network by stripping the prefix back out. Any
    /// other family combination never matches.
    ///
    /// # Test
    ///
    /// ```
    /// use turn_server_service::core::blacklist::Subnet;
    ///
    /// let net: Subnet = "10.0.0.0/8".parse().unwrap();
    /// assert!(net.matches("10.1.2.3".parse().unwrap()));
    /// assert!(!net.matches("11.1.2.3".parse().unwrap()));
    ///
    /// let mapped: Subnet = "::ffff:10.0.0.0/104".parse().unwrap();
    /// assert!(mapped.matches("10.1.2.3".parse().unwrap()));
    /// ```
    pub fn matches(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => prefix_match(&net.octets(), &a.octets(), self.prefix_len),
            (IpAddr::V6(net), IpAddr::V6(a)) => prefix_match(&net.octets(), &a.octets(), self.prefix_len),
            (IpAddr::V6(net), IpAddr::V4(a)) => {
                let mapped = a.to_ipv6_mapped();
                prefix_match(&net.octets(), &mapped.octets(), self.prefix_len)
            }
            (IpAddr::V4(net), IpAddr::V6(a)) => match a.to_ipv4_mapped() {
                Some(v4) => prefix_match(&net.octets(), &v4.octets(), self.prefix_len),
                None => false,
            },
        }
    }
}

fn prefix_match(network: &[u8], addr: &[u8], prefix_len: u8) -> bool {
    let full_bytes = (prefix_len / 8) as usize;
    let rem_bits = prefix_len % 8;

    if network[..full_bytes] != addr[..full_bytes] {
        return false;
    }

    if rem_bits == 0 {
        return true;
    }

    let mask = 0xFFu8 << (8 - rem_bits);
    (network[full_bytes] & mask) == (addr[full_bytes] & mask)
}

impl FromStr for Subnet {
    type Err = SubnetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.split_once('/').ok_or(SubnetParseError)?;
        let network = IpAddr::from_str(addr).map_err(|_| SubnetParseError)?;
        let prefix_len = prefix.parse::<u8>().map_err(|_| SubnetParseError)?;
        Ok(Self::new(network, prefix_len))
    }
}

/// Deny-list of peer networks an allocation will never install a
/// permission or forward a channel toward.
#[derive(Debug, Clone)]
pub struct Blacklist {
    subnets: Vec<Subnet>,
}

impl Blacklist {
    /// Build a blacklist from the fixed defaults plus any operator-supplied
    /// networks.
    ///
    /// The defaults cover loopback/unspecified addresses and the IPv6
    /// transition mechanisms (Teredo, 6to4) that are routinely abused to
    /// reach otherwise-unreachable internal hosts through a relay.
    pub fn new(extra: Vec<Subnet>) -> Self {
        let mut subnets = vec![
            Subnet::new(IpAddr::from_str("0.0.0.0").unwrap(), 8),
            Subnet::new(IpAddr::from_str("::").unwrap(), 128),
            Subnet::new(IpAddr::from_str("2001::").unwrap(), 32),
            Subnet::new(IpAddr::from_str("2002::").unwrap(), 16),
        ];

        subnets.extend(extra);
        Self { subnets }
    }

    pub fn is_blacklisted(&self, addr: IpAddr) -> bool {
        self.subnets.iter().any(|subnet| subnet.matches(addr))
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blacklist_rejects_teredo_and_6to4() {
        let blacklist = Blacklist::default();
        assert!(blacklist.is_blacklisted("2001:0:4136:e378::1".parse().unwrap()));
        assert!(blacklist.is_blacklisted("2002:c000:204::1".parse().unwrap()));
        assert!(blacklist.is_blacklisted("0.0.0.1".parse().unwrap()));
        assert!(!blacklist.is_blacklisted("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn custom_entries_are_additive() {
        let blacklist = Blacklist::new(vec!["10.0.0.0/8".parse().unwrap()]);
        assert!(blacklist.is_blacklisted("10.1.1.1".parse().unwrap()));
        assert!(!blacklist.is_blacklisted("9.1.1.1".parse().unwrap()));
    }

    #[test]
    fn v4_mapped_v6_addresses_are_normalized() {
        let blacklist = Blacklist::default();
        // ::ffff:0.0.0.1 should be caught by the 0.0.0.0/8 rule.
        assert!(blacklist.is_blacklisted("::ffff:0.0.0.1".parse().unwrap()));
    }
}
