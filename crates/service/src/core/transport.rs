use crate::core::error::CoreError;

/// How the client is reached. Datagram transports are unreliable: a send
/// failure is dropped on the floor and the allocation carries on.
/// Stream-oriented transports are reliable; a send failure there means the
/// connection is gone and the allocation must tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Datagram,
    Stream,
    StreamTls,
}

impl TransportKind {
    pub fn is_reliable(self) -> bool {
        !matches!(self, Self::Datagram)
    }
}

/// The opaque handle used to deliver bytes back to a client. Whatever owns
/// the real socket (a UDP socket shared across clients, or one TCP/TLS
/// connection) implements this; the core never touches the socket itself.
pub trait ClientTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn send(&self, bytes: &[u8]) -> Result<(), CoreError>;
}
