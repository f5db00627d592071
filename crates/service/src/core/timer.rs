use std::net::IpAddr;
use std::time::Duration;

/// Which internal clock a timer fire event is for. Each carries the
/// generation the core handed out when arming it, so a stale fire -- one
/// whose underlying state has since been replaced by a fresher arm -- can
/// be told apart from a live one without any locking between the sleep
/// task and the allocation's own event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Lifetime,
    Permission(IpAddr),
    Channel(u16),
}

/// A request, returned by a core handler method, to arm a new timer.
/// Owning the actual `sleep` + channel-send is left to whatever drives the
/// core (see the crate-level docs on the actor wrapper); the core itself
/// never touches the clock.
#[derive(Debug, Clone, Copy)]
pub struct ArmedTimer {
    pub kind: TimerKind,
    pub generation: u64,
    pub after: Duration,
}
