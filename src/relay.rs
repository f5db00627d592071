//! Stand-in for the parent process that owns the real relay socket.
//!
//! The core never opens the relay socket itself; that lives in a parent
//! process this repository does not implement (the "mock relay address"
//! the core advertises is supplied by the caller). This binary has no
//! such parent to wire up, so forwarding
//! a client's payload here only logs what would have been sent -- there is
//! nothing upstream of it that can deliver the payload to an actual peer.
//! A deployment that needs real peer connectivity supplies its own
//! [`ParentResolver`]/[`Parent`] pair instead of this one.

use std::net::SocketAddr;
use std::sync::Arc;

use service::core::error::CoreError;
use service::core::ice::ConnectivityCheck;
use service::core::relay::{Parent, ParentResolver};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingParent;

impl Parent for LoggingParent {
    fn send_to_peer(&self, peer: SocketAddr, bytes: &[u8]) -> Result<(), CoreError> {
        log::debug!("relay (unwired): {} bytes toward peer {peer}", bytes.len());
        Ok(())
    }

    fn send_connectivity_check(
        &self,
        peer: SocketAddr,
        check: ConnectivityCheck,
        _raw: &[u8],
    ) -> Result<(), CoreError> {
        log::debug!("relay (unwired): connectivity check toward peer {peer}: {check:?}");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingParentResolver;

impl ParentResolver for LoggingParentResolver {
    fn resolve(&self, relay_port: u16) -> Result<Arc<dyn Parent>, CoreError> {
        log::debug!("resolving parent for relay port {relay_port} (unwired, always succeeds)");
        Ok(Arc::new(LoggingParent))
    }
}
