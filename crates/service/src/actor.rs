//! Drives one [`AllocationCore`] as a `tokio::task`.
//!
//! [`AllocationCore`] itself is a plain, non-async state machine: it never
//! sleeps and never touches a runtime. Something has to turn its handler
//! methods into an actual event loop -- reading events off a channel,
//! arming `tokio::time::sleep` for the timers it asks for, and feeding
//! their expiry back in -- without reintroducing the reordering that a
//! `tokio::select!` over several independently-polled sources would risk.
//! This module is that driver.
//!
//! Every event for a given allocation, from whatever source, funnels
//! through the same [`mpsc::UnboundedSender<Event>`]: client datagrams,
//! parent deliveries, owner-down notifications and timer fires all go
//! through [`AllocationHandle`]. A single channel has exactly one arrival
//! order by construction, which is what keeps event handling from
//! reordering client messages against timer fires and parent deliveries.

use tokio::sync::mpsc;

use crate::core::relay::FromParent;
use crate::core::timer::TimerKind;
use crate::core::{AllocationCore, CoreOptions, OwnerLink};

/// One event an [`AllocationCore`] can react to. Constructed by whoever
/// owns the client socket, the parent link, or a fired timer, and handed
/// to the allocation's own task through its [`AllocationHandle`].
pub enum Event {
    /// Bytes the client transport received: a STUN message or a
    /// ChannelData frame.
    ClientMessage(Vec<u8>),
    /// A payload the parent wants delivered to the client.
    ParentMessage(FromParent),
    /// A timer armed by a previous handler call has fired.
    Timer { kind: TimerKind, generation: u64 },
    /// The connection or process that owns this allocation is gone.
    OwnerDown,
}

/// A cheaply-cloneable handle to a running allocation's event channel.
/// Dropping every clone lets the actor's task observe channel closure and
/// exit, but normal teardown goes through `Event::OwnerDown` or an
/// `Outcome::terminated` from the core itself -- a dropped handle with no
/// such signal is itself treated as the owner going away.
#[derive(Clone)]
pub struct AllocationHandle {
    sender: mpsc::UnboundedSender<Event>,
}

impl AllocationHandle {
    pub fn send(&self, event: Event) {
        // The task only stops reading once the core tells it to terminate
        // or the channel is empty and every sender has been dropped; a
        // `send` after that point is a harmless no-op.
        let _ = self.sender.send(event);
    }
}

/// Spawn an [`AllocationCore`] onto its own `tokio::task`, returning a
/// handle to feed it events. The task runs until the core reports
/// `Outcome::terminated`, draining its own cleanup (registry
/// deregistration, stop hooks) before the task exits.
pub fn spawn(mut opts: CoreOptions) -> AllocationHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let handle = AllocationHandle { sender: tx.clone() };
    let owner = opts.owner.take();

    tokio::spawn(async move {
        let mut core = AllocationCore::new(opts);
        arm_timers(core.initial_timer(), &tx);
        let mut owner = owner;

        loop {
            let event = match owner.as_mut() {
                Some(OwnerLink { down, .. }) => tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    _ = down => Event::OwnerDown,
                },
                None => match rx.recv().await {
                    Some(event) => event,
                    None => break,
                },
            };

            let outcome = match event {
                Event::ClientMessage(bytes) => core.on_client_message(&bytes),
                Event::ParentMessage(msg) => core.on_parent_message(msg),
                Event::Timer { kind, generation } => core.on_timer(kind, generation),
                Event::OwnerDown => core.on_owner_down(),
            };

            arm_timers(core.take_armed_timers(), &tx);

            if outcome.terminated {
                if let Some(OwnerLink { stopped, .. }) = owner.take() {
                    let _ = stopped.send(());
                }
                break;
            }
        }
    });

    handle
}

/// Turn every timer a handler call asked for into a detached sleep task
/// that reports back on the same channel the handler itself is driven
/// from. The core never compares its own generation counters against
/// anything here -- `on_timer` does that internally -- so a cancelled and
/// re-armed timer's earlier sleep simply delivers a stale event that gets
/// silently ignored.
fn arm_timers(timers: Vec<crate::core::timer::ArmedTimer>, tx: &mpsc::UnboundedSender<Event>) {
    for timer in timers {
        let tx = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timer.after).await;
            let _ = tx.send(Event::Timer {
                kind: timer.kind,
                generation: timer.generation,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blacklist::Blacklist;
    use crate::core::error::CoreError;
    use crate::core::hooks::NullHooks;
    use crate::core::registry::NullRegistry;
    use crate::core::relay::{Parent, ParentResolver};
    use crate::core::transport::{ClientTransport, TransportKind};
    use codec::crypto::Password;
    use codec::message::methods::{Method, MethodType};
    use codec::message::MessageEncoder;
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    struct CapturingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl ClientTransport for CapturingTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Datagram
        }

        fn send(&self, bytes: &[u8]) -> Result<(), CoreError> {
            self.sent.lock().push(bytes.to_vec());
            Ok(())
        }
    }

    struct NullResolver;

    impl ParentResolver for NullResolver {
        fn resolve(&self, relay_port: u16) -> Result<Arc<dyn Parent>, CoreError> {
            Err(CoreError::ParentUnavailable(relay_port))
        }
    }

    #[tokio::test]
    async fn allocate_through_the_actor_produces_one_response() {
        let transport = Arc::new(CapturingTransport { sent: Mutex::new(Vec::new()) });
        let auth_key = Password::Md5(*b"0123456789abcdef");

        let handle = spawn(CoreOptions {
            client: "10.0.0.1:4000".parse::<SocketAddr>().unwrap(),
            transport: transport.clone(),
            realm: "example.org".into(),
            username: "alice".into(),
            auth_key: auth_key.clone(),
            relay_ipv4: "203.0.113.1".parse().unwrap(),
            relay_ipv6: None,
            mock_relay_ip: "203.0.113.1".parse().unwrap(),
            relay_port_range: (50000, 50000),
            max_permissions: 4,
            max_allocations: 10,
            blacklist: Arc::new(Blacklist::default()),
            parent_resolver: Arc::new(NullResolver),
            registry: Arc::new(NullRegistry),
            hooks: Arc::new(NullHooks),
            lifetime_secs: None,
            owner: None,
        });

        let mut buf = bytes::BytesMut::with_capacity(256);
        {
            let mut enc = MessageEncoder::new(Method::Allocate(MethodType::Request), &[1u8; 12], &mut buf);
            enc.append::<codec::message::attributes::RequestedTransport>(
                codec::message::attributes::RequestedTransport::Udp,
            );
            enc.flush(Some(&auth_key)).unwrap();
        }

        handle.send(Event::ClientMessage(buf.to_vec()));

        // Give the spawned task a chance to run.
        for _ in 0..50 {
            if !transport.sent.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(transport.sent.lock().len(), 1);
    }

    /// Dropping the owner's sending half terminates the allocation and
    /// fires the `stopped` signal back, even with no allocation ever made.
    #[tokio::test]
    async fn owner_going_away_terminates_the_allocation() {
        let transport = Arc::new(CapturingTransport { sent: Mutex::new(Vec::new()) });
        let (down_tx, down_rx) = tokio::sync::oneshot::channel();
        let (stopped_tx, stopped_rx) = tokio::sync::oneshot::channel();

        let handle = spawn(CoreOptions {
            client: "10.0.0.1:4000".parse::<SocketAddr>().unwrap(),
            transport,
            realm: "example.org".into(),
            username: "alice".into(),
            auth_key: Password::Md5(*b"0123456789abcdef"),
            relay_ipv4: "203.0.113.1".parse().unwrap(),
            relay_ipv6: None,
            mock_relay_ip: "203.0.113.1".parse().unwrap(),
            relay_port_range: (50000, 50000),
            max_permissions: 4,
            max_allocations: 10,
            blacklist: Arc::new(Blacklist::default()),
            parent_resolver: Arc::new(NullResolver),
            registry: Arc::new(NullRegistry),
            hooks: Arc::new(NullHooks),
            lifetime_secs: None,
            owner: Some(crate::core::OwnerLink {
                down: down_rx,
                stopped: stopped_tx,
            }),
        });

        drop(down_tx);

        stopped_rx.await.expect("core signals stopped on owner-down termination");
        drop(handle);
    }
}
