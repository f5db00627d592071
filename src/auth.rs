//! Derives the long-term credential key an [`AllocationCore`] is
//! constructed with. The core never authenticates anything itself; it
//! only ever holds a key handed to it by whatever owns the client socket.
//!
//! [`AllocationCore`]: service::core::AllocationCore

use codec::crypto::{Password, generate_password};
use codec::message::attributes::PasswordAlgorithm;

use crate::config::Auth;

/// A lookup over the operator's static `username -> password` table.
pub struct StaticCredentials {
    realm: String,
    entries: std::collections::HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new(realm: String, auth: &Auth) -> Self {
        Self {
            realm,
            entries: auth.static_credentials.clone(),
        }
    }

    /// Derive the MD5 long-term credential key for `username`, or `None`
    /// if no static entry exists for it. Looking credentials up across
    /// multiple sources (hooks, a database) is left to a different
    /// implementation of this lookup.
    pub fn derive(&self, username: &str) -> Option<Password> {
        let password = self.entries.get(username)?;
        Some(generate_password(
            username,
            password,
            &self.realm,
            PasswordAlgorithm::Md5,
        ))
    }

    /// A key for a client whose `USERNAME` matched nothing in the table.
    /// The allocation still needs some key to construct a `CoreOptions`
    /// with; this one never matches a real credential, so long-term
    /// message-integrity verification against it fails exactly the way it
    /// should for an unrecognized user.
    pub fn derive_unknown(&self) -> Password {
        generate_password("", "", &self.realm, PasswordAlgorithm::Md5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_username_has_no_key() {
        let creds = StaticCredentials::new("example.org".into(), &Auth::default());
        assert!(creds.derive("nobody").is_none());
    }

    #[test]
    fn known_username_derives_a_key() {
        let mut auth = Auth::default();
        auth.static_credentials.insert("alice".into(), "secret".into());
        let creds = StaticCredentials::new("example.org".into(), &auth);
        assert!(matches!(creds.derive("alice"), Some(Password::Md5(_))));
    }
}
