use std::fmt;

/// Infrastructure-level failures raised while driving an allocation.
///
/// These are distinct from protocol errors (malformed requests, quota
/// violations, blacklist hits): a protocol error always produces a STUN
/// error response to the client, while a `CoreError` means something the
/// core itself cannot route around -- a parent that could not be resolved,
/// a transport that refused to carry a reliable response, a codec failure
/// decoding bytes that were not a well-formed STUN/TURN message.
#[derive(Debug)]
pub enum CoreError {
    Codec(codec::Error),
    Transport(String),
    ParentUnavailable(u16),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(err) => write!(f, "codec error: {err}"),
            Self::Transport(reason) => write!(f, "transport error: {reason}"),
            Self::ParentUnavailable(port) => write!(f, "no parent registered for port {port}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<codec::Error> for CoreError {
    fn from(err: codec::Error) -> Self {
        Self::Codec(err)
    }
}
