use std::collections::HashMap;
use std::fs::read_to_string;
use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use serde::Deserialize;

use service::core::blacklist::{Blacklist, Subnet};

/// `[min, max]` inclusive range the relay port advertised in
/// `XOR-RELAYED-ADDRESS` is drawn from.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub struct PortRange {
    #[serde(default = "PortRange::min")]
    pub min: u16,
    #[serde(default = "PortRange::max")]
    pub max: u16,
}

impl PortRange {
    fn min() -> u16 {
        49152
    }

    fn max() -> u16 {
        65535
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            min: Self::min(),
            max: Self::max(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Turn {
    /// turn server realm
    ///
    /// specify the domain where the server is located. for a single node
    /// this configuration is fixed, but each node can be configured as a
    /// different domain.
    #[serde(default = "Turn::realm")]
    pub realm: String,

    /// the address and port the UDP server binds to.
    #[serde(default = "Turn::listen")]
    pub listen: SocketAddr,

    /// the relay address advertised to clients in `XOR-RELAYED-ADDRESS`.
    ///
    /// this core never opens the real relay socket itself (see
    /// [`crate::relay`]); this is a mock relay address standing in for
    /// the one a real parent process would bind.
    #[serde(default = "Turn::mock_relay_ip")]
    pub mock_relay_ip: IpAddr,

    /// the relay address the server allocates from for IPv4 requests.
    #[serde(default = "Turn::relay_ipv4")]
    pub relay_ipv4: IpAddr,

    /// the relay address the server allocates from for IPv6 requests, if
    /// this deployment relays IPv6 at all. `None` means
    /// REQUESTED-ADDRESS-FAMILY=ipv6 is always rejected.
    #[serde(default)]
    pub relay_ipv6: Option<IpAddr>,

    #[serde(default)]
    pub port_range: PortRange,

    /// cap on the number of simultaneous peer permissions one allocation
    /// may hold.
    #[serde(default = "Turn::max_permissions")]
    pub max_permissions: usize,

    /// per-user allocation quota handed to the allocation registry; the
    /// registry only counts against it, enforcement is the registry's
    /// business and not the core's.
    #[serde(default = "Turn::max_allocations")]
    pub max_allocations: u32,

    /// default allocation lifetime in seconds; values below 600 or absent
    /// fall back to the RFC default (see
    /// `service::core::normalize_configured_lifetime`).
    #[serde(default)]
    pub lifetime: Option<u64>,

    /// extra subnets merged into the fixed default blacklist (loopback,
    /// Teredo, 6to4).
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Turn {
    fn realm() -> String {
        "localhost".to_string()
    }

    fn listen() -> SocketAddr {
        "0.0.0.0:3478".parse().unwrap()
    }

    fn mock_relay_ip() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    fn relay_ipv4() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    fn max_permissions() -> usize {
        10
    }

    fn max_allocations() -> u32 {
        10
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self {
            realm: Self::realm(),
            listen: Self::listen(),
            mock_relay_ip: Self::mock_relay_ip(),
            relay_ipv4: Self::relay_ipv4(),
            relay_ipv6: None,
            port_range: PortRange::default(),
            max_permissions: Self::max_permissions(),
            max_allocations: Self::max_allocations(),
            lifetime: None,
            blacklist: Vec::new(),
        }
    }
}

impl Turn {
    /// Build the blacklist this configuration describes: the fixed
    /// defaults (always present) plus whatever extra subnets the
    /// operator listed.
    pub fn build_blacklist(&self) -> anyhow::Result<Blacklist> {
        let mut extra = Vec::with_capacity(self.blacklist.len());
        for entry in &self.blacklist {
            extra.push(
                entry
                    .parse::<Subnet>()
                    .map_err(|_| anyhow::anyhow!("invalid blacklist entry: {entry}"))?,
            );
        }
        Ok(Blacklist::new(extra))
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Auth {
    /// static `username -> password` table used to derive the long-term
    /// credential key every allocation is constructed with. the core
    /// itself never authenticates anything; it is only ever handed a
    /// pre-derived key.
    #[serde(default)]
    pub static_credentials: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub turn: Turn,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub auth: Auth,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
struct Cli {
    /// specify the configuration file path.
    ///
    /// the file is parsed as JSON5, so comments and trailing commas are
    /// allowed, matching the rest of this codebase's configuration style.
    #[arg(long, short)]
    config: Option<String>,
}

impl Config {
    /// Load command line parameters, then the configuration file if one
    /// was given, falling back to every field's default otherwise.
    pub fn load() -> anyhow::Result<Self> {
        let cli = Cli::parse();
        Ok(match cli.config {
            Some(path) => serde_json5::from_str(&read_to_string(path)?)?,
            None => Self::default(),
        })
    }
}
