use num_enum::TryFromPrimitive;

/// The following error codes, along with their recommended reason
/// phrases, are defined:
///
/// 300  Try Alternate: The client should contact an alternate server for
///      this request.
///
/// 400  Bad Request: The request was malformed.
///
/// 401  Unauthenticated: The request did not contain the correct
///      credentials to proceed.
///
/// 403  Forbidden: The request is valid but cannot be performed due to
///      administrative or policy restrictions.
///
/// 420  Unknown Attribute: The server received a STUN packet containing
///      a comprehension-required attribute that it did not understand.
///      The server MUST put this unknown attribute in the UNKNOWN-
///      ATTRIBUTE attribute of its error response.
///
/// 437  Allocation Mismatch: A request was received by the server that
///      requires an allocation to be in place, but no allocation exists,
///      or a request was received that requires no allocation, but one
///      exists.
///
/// 438  Stale Nonce: The NONCE used by the client was no longer valid.
///      The client should retry, using the NONCE provided in the
///      response.
///
/// 440  Address Family not Supported: the server does not support the
///      address family requested by the client.
///
/// 441  Wrong Credentials: the client's credentials do not match those
///      previously used.
///
/// 442  Unsupported Transport Address: the REQUESTED-TRANSPORT attribute
///      specified a transport protocol that is not supported by the
///      server.
///
/// 443  Peer Address Family Mismatch: a peer address was supplied whose
///      family does not match that of the relayed transport address used
///      to contact it.
///
/// 486  Allocation Quota Reached: no more allocations are permitted for
///      this username or this client's IP address.
///
/// 500  Server Error: The server has suffered a temporary error.  The
///      client should try again.
///
/// 508  Insufficient Capacity: the server is unable to carry out the
///      request due to a shortage of relayed transport addresses at this
///      time.
const fn errno(code: u16) -> u16 {
    ((code / 100) << 8) | (code % 100)
}

#[repr(u16)]
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash, TryFromPrimitive)]
pub enum ErrorType {
    TryAlternate = errno(300),
    BadRequest = errno(400),
    Unauthorized = errno(401),
    Forbidden = errno(403),
    UnknownAttribute = errno(420),
    AllocationMismatch = errno(437),
    StaleNonce = errno(438),
    AddressFamilyNotSupported = errno(440),
    WrongCredentials = errno(441),
    UnsupportedTransportAddress = errno(442),
    PeerAddressFamilyMismatch = errno(443),
    AllocationQuotaReached = errno(486),
    ServerError = errno(500),
    InsufficientCapacity = errno(508),
}

impl From<ErrorType> for &'static str {
    /// # Test
    ///
    /// ```
    /// use std::convert::Into;
    /// use turn_server_codec::message::attributes::error::ErrorType;
    ///
    /// let err: &'static str = ErrorType::TryAlternate.into();
    /// assert_eq!(err, "Try Alternate");
    /// ```
    #[rustfmt::skip]
    fn from(val: ErrorType) -> Self {
        match val {
            ErrorType::TryAlternate => "Try Alternate",
            ErrorType::BadRequest => "Bad Request",
            ErrorType::Unauthorized => "Unauthorized",
            ErrorType::Forbidden => "Forbidden",
            ErrorType::UnknownAttribute => "Unknown Attribute",
            ErrorType::AllocationMismatch => "Allocation Mismatch",
            ErrorType::StaleNonce => "Stale Nonce",
            ErrorType::AddressFamilyNotSupported => "Address Family not Supported",
            ErrorType::WrongCredentials => "Wrong Credentials",
            ErrorType::UnsupportedTransportAddress => "Unsupported Transport Address",
            ErrorType::AllocationQuotaReached => "Allocation Quota Reached",
            ErrorType::ServerError => "Server Error",
            ErrorType::InsufficientCapacity => "Insufficient Capacity",
            ErrorType::PeerAddressFamilyMismatch => "Peer Address Family Mismatch",
        }
    }
}
