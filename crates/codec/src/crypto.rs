//! Long-term credential keys and the digests built from them.
//!
//! [RFC8489 Section 9.2]: https://datatracker.ietf.org/doc/html/rfc8489#section-9.2
//!
//! The long-term credential mechanism relies on a pre-shared key, understood
//! to be an OpaqueString [RFC8265] of the `username`, `realm` and `password`.
//! Rather than passing plaintext passwords around, callers derive the key
//! once with `generate_password` and hand the resulting `Password` to
//! whatever signs or verifies a message.

use aws_lc_rs::{digest, hmac};
use md5::{Digest, Md5}; // aws-lc-rs不支持MD5，保留

use crate::message::attributes::PasswordAlgorithm;

/// A long-term credential key, already hashed for one of the two algorithms
/// STUN/TURN supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Password {
    Md5([u8; 16]),
    Sha256([u8; 32]),
}

impl Password {
    pub fn algorithm(&self) -> PasswordAlgorithm {
        match self {
            Self::Md5(_) => PasswordAlgorithm::Md5,
            Self::Sha256(_) => PasswordAlgorithm::Sha256,
        }
    }
}

impl AsRef<[u8]> for Password {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Md5(it) => it.as_slice(),
            Self::Sha256(it) => it.as_slice(),
        }
    }
}

/// derive a long-term credential key for the requested algorithm.
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::{generate_password, Password};
/// use turn_server_codec::message::attributes::PasswordAlgorithm;
///
/// let buffer = [
///     0x3eu8, 0x2f, 0x79, 0x1e, 0x1f, 0x14, 0xd1, 0x73, 0xfc, 0x91, 0xff,
///     0x2f, 0x59, 0xb5, 0x0f, 0xd1,
/// ];
///
/// let key = generate_password("panda", "panda", "raspberry", PasswordAlgorithm::Md5);
/// assert_eq!(key, Password::Md5(buffer));
/// ```
pub fn generate_password(
    username: &str,
    password: &str,
    realm: &str,
    algorithm: PasswordAlgorithm,
) -> Password {
    match algorithm {
        PasswordAlgorithm::Md5 => Password::Md5(password_md5(username, password, realm)),
        PasswordAlgorithm::Sha256 => Password::Sha256(password_sha256(username, password, realm)),
    }
}

/// HMAC SHA1 digest.
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::{hmac_sha1, Password};
///
/// let buffer = [
///     0x00u8, 0x03, 0x00, 0x50, 0x21, 0x12, 0xa4, 0x42, 0x64, 0x4f, 0x5a,
///     0x78, 0x6a, 0x56, 0x33, 0x62, 0x4b, 0x52, 0x33, 0x31, 0x00, 0x19, 0x00,
///     0x04, 0x11, 0x00, 0x00, 0x00, 0x00, 0x06, 0x00, 0x05, 0x70, 0x61, 0x6e,
///     0x64, 0x61, 0x00, 0x00, 0x00, 0x00, 0x14, 0x00, 0x09, 0x72, 0x61, 0x73,
///     0x70, 0x62, 0x65, 0x72, 0x72, 0x79, 0x00, 0x00, 0x00, 0x00, 0x15, 0x00,
///     0x10, 0x31, 0x63, 0x31, 0x33, 0x64, 0x32, 0x62, 0x32, 0x34, 0x35, 0x62,
///     0x33, 0x61, 0x37, 0x33, 0x34,
/// ];
///
/// let key = Password::Md5([
///     0x3eu8, 0x2f, 0x79, 0x1e, 0x1f, 0x14, 0xd1, 0x73, 0xfc, 0x91, 0xff,
///     0x2f, 0x59, 0xb5, 0x0f, 0xd1,
/// ]);
///
/// let sign = [
///     0xd6u8, 0x78, 0x26, 0x99, 0x0e, 0x15, 0x56, 0x15, 0xe5, 0xf4, 0x24,
///     0x74, 0xe2, 0x3c, 0x26, 0xc5, 0xb1, 0x03, 0xb2, 0x6d,
/// ];
///
/// assert_eq!(&hmac_sha1(&key, &[&buffer]), &sign);
/// ```
pub fn hmac_sha1(password: &Password, source: &[&[u8]]) -> [u8; 20] {
    hmac_sha1_raw(password.as_ref(), source)
}

/// HMAC SHA1 digest over an arbitrary key.
///
/// Long-term credential keys are always pre-hashed into a [`Password`], but
/// short-term credentials (e.g. the ICE connectivity-check password tunneled
/// through an allocation) sign directly with the raw password bytes, so this
/// is exposed separately from [`hmac_sha1`].
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::hmac_sha1_raw;
///
/// let a = hmac_sha1_raw(b"secret", &[b"hello"]);
/// let b = hmac_sha1_raw(b"secret", &[b"hello"]);
/// assert_eq!(a, b);
/// ```
pub fn hmac_sha1_raw(key: &[u8], source: &[&[u8]]) -> [u8; 20] {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    let mut ctx = hmac::Context::with_key(&key);

    for buf in source {
        ctx.update(buf);
    }

    let signature = ctx.sign();
    let mut result = [0u8; 20];
    result.copy_from_slice(signature.as_ref());
    result
}

/// CRC32 Fingerprint.
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::fingerprint;
///
/// assert_eq!(fingerprint(b"1"), 3498621689);
/// ```
pub fn fingerprint(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes) ^ 0x5354_554e
}

/// create long term credential for md5.
///
/// > key = MD5(username ":" OpaqueString(realm) ":" OpaqueString(password))
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::password_md5;
///
/// let buffer = [
///     0x3eu8, 0x2f, 0x79, 0x1e, 0x1f, 0x14, 0xd1, 0x73, 0xfc, 0x91, 0xff,
///     0x2f, 0x59, 0xb5, 0x0f, 0xd1,
/// ];
///
/// let key = password_md5(
///     "panda",
///     "panda",
///     "raspberry",
/// );
///
/// assert_eq!(key, buffer);
/// ```
pub fn password_md5(username: &str, password: &str, realm: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update([username, realm, password].join(":"));
    hasher.finalize().into()
}

/// create long term credential for sha256.
///
/// > key = SHA256(username ":" OpaqueString(realm) ":" OpaqueString(password))
///
/// # Test
///
/// ```
/// use turn_server_codec::crypto::password_sha256;
///
/// let key = password_sha256(
///     "panda",
///     "panda",
///     "raspberry",
/// );
///
/// // SHA256 produces 32 bytes
/// assert_eq!(key.len(), 32);
/// ```
pub fn password_sha256(username: &str, password: &str, realm: &str) -> [u8; 32] {
    let mut ctx = digest::Context::new(&digest::SHA256);
    let input = [username, realm, password].join(":");
    ctx.update(input.as_bytes());
    let digest = ctx.finish();
    let mut result = [0u8; 32];
    result.copy_from_slice(digest.as_ref());
    result
}
