//! ICE connectivity-check tunneling (RFC 8445 section 7) over a TURN
//! allocation's relayed candidate.
//!
//! A peer that runs connectivity checks directly against the relayed
//! candidate sends ordinary STUN Binding request/response/error
//! messages to it. The core does not run an ICE agent -- answering
//! these checks is the parent's job -- but decoding them into a
//! structured shape lets the parent read `USERNAME`/`PRIORITY`/
//! `USE-CANDIDATE`/the ICE role attributes without re-implementing the
//! wire codec, and the reverse path lets the parent ask the core to
//! build and sign the reply without handing it a raw short-term
//! password to manage itself.

use std::net::SocketAddr;

use bytes::BytesMut;

use codec::Attributes;
use codec::message::attributes::error::ErrorType;
use codec::message::attributes::{
    ErrorCode, IceControlled, IceControlling, Priority, UseCandidate, UserName, XorMappedAddress,
};
use codec::message::methods::{Method, MethodType};
use codec::message::{Message, MessageEncoder};

/// Binding message class, mirrored from the STUN message class a check
/// was decoded from (or is to be encoded as).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingClass {
    Request,
    Response,
    Error,
}

impl From<MethodType> for BindingClass {
    fn from(kind: MethodType) -> Self {
        match kind {
            MethodType::Request => BindingClass::Request,
            MethodType::Response => BindingClass::Response,
            MethodType::Error => BindingClass::Error,
        }
    }
}

impl From<BindingClass> for MethodType {
    fn from(class: BindingClass) -> Self {
        match class {
            BindingClass::Request => MethodType::Request,
            BindingClass::Response => MethodType::Response,
            BindingClass::Error => MethodType::Error,
        }
    }
}

/// A decoded view of a STUN Binding message a peer sent to the relayed
/// candidate, handed to the parent instead of raw bytes.
#[derive(Debug, Clone)]
pub struct ConnectivityCheck {
    pub class: BindingClass,
    pub magic: u32,
    pub trid: [u8; 12],
    pub username: Option<String>,
    pub priority: Option<u32>,
    pub use_candidate: bool,
    pub ice_controlled: Option<u64>,
    pub ice_controlling: Option<u64>,
    /// Identifies which allocation this check arrived on, so the parent
    /// can route `send_connectivity_check`/`send_ice_payload` back to
    /// the right core without tracking the mapping itself.
    pub sender_handle: u64,
}

/// STUN's magic cookie; connectivity checks always carry it, same as
/// every other STUN message this codec produces.
const MAGIC_NUMBER: u32 = 0x2112A442;

impl ConnectivityCheck {
    /// Decode a Binding request/response/error the way it arrived on the
    /// relay socket. Returns `None` if it isn't a Binding message at all
    /// -- the caller is expected to have already classified the payload
    /// as STUN-like via [`super::relay::classify`] before calling this.
    pub fn decode(bytes: &[u8], sender_handle: u64) -> Option<Self> {
        let mut attributes = Attributes::default();
        let msg = Message::decode(bytes, &mut attributes).ok()?;

        let class = match msg.method() {
            Method::Binding(kind) => BindingClass::from(kind),
            _ => return None,
        };

        let mut trid = [0u8; 12];
        trid.copy_from_slice(msg.token());

        Some(Self {
            class,
            magic: MAGIC_NUMBER,
            trid,
            username: msg.get::<UserName>().map(str::to_owned),
            priority: msg.get::<Priority>(),
            use_candidate: msg.get::<UseCandidate>().is_some(),
            ice_controlled: msg.get::<IceControlled>(),
            ice_controlling: msg.get::<IceControlling>(),
            sender_handle,
        })
    }
}

/// Parameters the parent supplies to have the core build and sign a
/// Binding message on its behalf (the `send_connectivity_check` branch
/// of the data-relay peer-to-client path).
#[derive(Debug, Clone)]
pub struct SendConnectivityCheck {
    pub class: BindingClass,
    pub trid: [u8; 12],
    pub username: Option<String>,
    pub priority: Option<u32>,
    pub use_candidate: bool,
    pub ice_controlling: Option<u64>,
    pub ice_controlled: Option<u64>,
    pub error: Option<ErrorType>,
    /// The short-term ICE password used to sign the outgoing message;
    /// this is never the allocation's own long-term credential.
    pub ice_password: Vec<u8>,
}

/// Build and sign a Binding message per the parent's parameters, ready
/// to hand to the client. `relay_addr` is attached as
/// `XOR-MAPPED-ADDRESS` only for a response, per the data-relay design.
pub fn encode_connectivity_check(params: &SendConnectivityCheck, relay_addr: SocketAddr) -> Vec<u8> {
    let method = Method::Binding(params.class.into());

    let mut buf = BytesMut::with_capacity(256);
    {
        let mut enc = MessageEncoder::new(method, &params.trid, &mut buf);

        if let Some(username) = &params.username {
            enc.append::<UserName>(username);
        }

        if let Some(priority) = params.priority {
            enc.append::<Priority>(priority);
        }

        if params.use_candidate {
            enc.append::<UseCandidate>(());
        }

        if let Some(tie) = params.ice_controlling {
            enc.append::<IceControlling>(tie);
        }

        if let Some(tie) = params.ice_controlled {
            enc.append::<IceControlled>(tie);
        }

        if matches!(params.class, BindingClass::Response) {
            enc.append::<XorMappedAddress>(relay_addr);
        }

        if let Some(error) = params.error {
            enc.append::<ErrorCode>(ErrorCode::from(error));
        }

        let _ = enc.flush_with_raw_key(Some(params.ice_password.as_slice()));
    }

    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::message::attributes::RequestedTransport;

    #[test]
    fn non_binding_message_is_not_a_connectivity_check() {
        let trid = [1u8; 12];
        let mut buf = BytesMut::with_capacity(64);
        {
            let mut enc = MessageEncoder::new(Method::Allocate(MethodType::Request), &trid, &mut buf);
            enc.append::<RequestedTransport>(RequestedTransport::Udp);
            enc.flush(None).unwrap();
        }

        assert!(ConnectivityCheck::decode(&buf, 1).is_none());
    }

    #[test]
    fn binding_request_round_trips_ice_attributes() {
        let trid = [2u8; 12];
        let mut buf = BytesMut::with_capacity(64);
        {
            let mut enc = MessageEncoder::new(Method::Binding(MethodType::Request), &trid, &mut buf);
            enc.append::<UserName>("frag:whole");
            enc.append::<Priority>(12345);
            enc.append::<UseCandidate>(());
            enc.append::<IceControlling>(42);
            enc.flush_with_raw_key(Some(b"ice-pwd")).unwrap();
        }

        let check = ConnectivityCheck::decode(&buf, 7).expect("decodes as a connectivity check");
        assert_eq!(check.class, BindingClass::Request);
        assert_eq!(check.trid, trid);
        assert_eq!(check.username.as_deref(), Some("frag:whole"));
        assert_eq!(check.priority, Some(12345));
        assert!(check.use_candidate);
        assert_eq!(check.ice_controlling, Some(42));
        assert_eq!(check.sender_handle, 7);
    }

    #[test]
    fn encode_connectivity_check_response_carries_mapped_address() {
        let params = SendConnectivityCheck {
            class: BindingClass::Response,
            trid: [3u8; 12],
            username: None,
            priority: None,
            use_candidate: false,
            ice_controlling: None,
            ice_controlled: Some(9),
            error: None,
            ice_password: b"ice-pwd".to_vec(),
        };

        let relay_addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let bytes = encode_connectivity_check(&params, relay_addr);

        let check = ConnectivityCheck::decode(&bytes, 0).expect("re-decodes");
        assert_eq!(check.class, BindingClass::Response);
        assert_eq!(check.ice_controlled, Some(9));
    }
}
