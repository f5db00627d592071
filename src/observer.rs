//! Logs every allocation lifecycle and per-operation hook the core fires.

use service::core::hooks::{SessionObserver, SessionStartInfo, SessionStopInfo};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_session_start(&self, info: SessionStartInfo<'_>) {
        log::info!(
            "session start: client={} user={} realm={} relay={} transport={:?}",
            info.client,
            info.username,
            info.realm,
            info.relay,
            info.transport,
        );
    }

    fn on_session_stop(&self, info: SessionStopInfo<'_>) {
        log::info!(
            "session stop: client={} user={} realm={} relay={} sent={}b/{}pkt rcvd={}b/{}pkt duration={:?}",
            info.client,
            info.username,
            info.realm,
            info.relay,
            info.sent_bytes,
            info.sent_packets,
            info.received_bytes,
            info.received_packets,
            info.duration,
        );
    }

    /// allocate request
    ///
    /// [rfc8489](https://tools.ietf.org/html/rfc8489)
    ///
    /// In all cases, the server SHOULD only allocate ports from the range
    /// 49152 - 65535 (the Dynamic and/or Private Port range
    /// [PORT-NUMBERS]), unless the TURN server application knows, through
    /// some means not specified here, that other applications running on
    /// the same host as the TURN server application will not be impacted
    /// by allocating ports outside this range.
    fn on_allocated(&self, client: std::net::SocketAddr, username: &str, port: u16) {
        log::info!("allocate: client={client} user={username} port={port}");
    }

    fn on_channel_bind(&self, client: std::net::SocketAddr, username: &str, channel: u16) {
        log::info!("channel bind: client={client} user={username} channel={channel:#06x}");
    }

    fn on_create_permission(
        &self,
        client: std::net::SocketAddr,
        username: &str,
        peers: &[std::net::SocketAddr],
    ) {
        log::info!("create permission: client={client} user={username} peers={peers:?}");
    }

    fn on_refresh(&self, client: std::net::SocketAddr, username: &str, lifetime: u32) {
        log::info!("refresh: client={client} user={username} lifetime={lifetime}s");
    }
}
