//! Unlock credentials
//!
//! A KeePass database is unlocked with a composite key made of one or more
//! factors. This module assembles those factors and derives their key
//! material the same way the KDBX format does:
//!
//! - a password contributes `SHA-256(UTF-8(password))`
//! - the platform identity contributes 32 bytes of per-user key material
//! - the composite key is `SHA-256` over the concatenated contributions,
//!   in factor order
//!
//! # Example
//!
//! ```rust
//! use keepass_config::credential::UnlockCredential;
//!
//! let credential = UnlockCredential::from_inputs(Some("1234"), false);
//! assert_eq!(credential.len(), 1);
//! ```

use crate::error::StoreError;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Length of a single factor's key material
pub const KEY_LENGTH: usize = 32;

/// One factor of an unlock credential
#[derive(Clone)]
pub enum CredentialFactor {
    /// Knowledge factor (master password)
    Password(Zeroizing<String>),
    /// Identity of the current user on this host
    PlatformIdentity,
}

impl CredentialFactor {
    /// Create a password factor
    pub fn password(password: impl Into<String>) -> Self {
        CredentialFactor::Password(Zeroizing::new(password.into()))
    }

    /// Key material contributed by this factor
    fn key_data(
        &self,
        platform: Option<&dyn PlatformKeySource>,
    ) -> Result<Zeroizing<[u8; KEY_LENGTH]>, StoreError> {
        match self {
            CredentialFactor::Password(password) => Ok(hash_password(password)),
            CredentialFactor::PlatformIdentity => match platform {
                Some(source) => source.user_key(),
                None => Err(StoreError::PlatformIdentityUnavailable(
                    "no platform key source configured".to_string(),
                )),
            },
        }
    }
}

impl fmt::Debug for CredentialFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialFactor::Password(_) => f.write_str("Password(<redacted>)"),
            CredentialFactor::PlatformIdentity => f.write_str("PlatformIdentity"),
        }
    }
}

impl PartialEq for CredentialFactor {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CredentialFactor::Password(a), CredentialFactor::Password(b)) => a.as_str() == b.as_str(),
            (CredentialFactor::PlatformIdentity, CredentialFactor::PlatformIdentity) => true,
            _ => false,
        }
    }
}

impl Eq for CredentialFactor {}

fn hash_password(password: &str) -> Zeroizing<[u8; KEY_LENGTH]> {
    let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
    out.copy_from_slice(&Sha256::digest(password.as_bytes()));
    out
}

/// Supplies the per-user key material behind [`CredentialFactor::PlatformIdentity`]
///
/// The operating system facility that protects this key differs per host,
/// so hosts plug in their own source.
pub trait PlatformKeySource: Send + Sync + fmt::Debug {
    /// Return the 32-byte key contributed by the current user's identity
    fn user_key(&self) -> Result<Zeroizing<[u8; KEY_LENGTH]>, StoreError>;
}

/// A fixed user key, for hosts that provision it out of band
#[derive(Clone)]
pub struct StaticUserKey {
    key: Zeroizing<[u8; KEY_LENGTH]>,
}

impl StaticUserKey {
    /// Wrap raw key bytes
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Parse a key from 64 hex characters
    pub fn from_hex(hex_key: &str) -> Result<Self, StoreError> {
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        hex::decode_to_slice(hex_key.trim(), key.as_mut_slice())
            .map_err(|e| StoreError::PlatformIdentityUnavailable(format!("invalid user key: {}", e)))?;
        Ok(Self { key })
    }
}

impl fmt::Debug for StaticUserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticUserKey").finish_non_exhaustive()
    }
}

impl PlatformKeySource for StaticUserKey {
    fn user_key(&self) -> Result<Zeroizing<[u8; KEY_LENGTH]>, StoreError> {
        Ok(self.key.clone())
    }
}

/// Ordered collection of credential factors used to unlock a store
///
/// An empty credential is valid to build; whether it can open anything is
/// decided by the store when it is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockCredential {
    factors: Vec<CredentialFactor>,
}

impl UnlockCredential {
    /// Create an empty credential
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a credential from raw inputs
    ///
    /// The password factor comes first and the platform identity second
    /// when both are requested.
    pub fn from_inputs(password: Option<&str>, use_platform_identity: bool) -> Self {
        let mut credential = Self::new();
        if let Some(password) = password {
            credential.add_factor(CredentialFactor::password(password));
        }
        if use_platform_identity {
            credential.add_factor(CredentialFactor::PlatformIdentity);
        }
        credential
    }

    /// Add a password factor (builder pattern)
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.add_factor(CredentialFactor::password(password));
        self
    }

    /// Add the platform-identity factor (builder pattern)
    pub fn with_platform_identity(mut self) -> Self {
        self.add_factor(CredentialFactor::PlatformIdentity);
        self
    }

    /// Append a factor
    pub fn add_factor(&mut self, factor: CredentialFactor) {
        self.factors.push(factor);
    }

    /// Factors in the order they were added
    pub fn factors(&self) -> &[CredentialFactor] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// First password factor, if any
    pub fn password(&self) -> Option<&str> {
        self.factors.iter().find_map(|factor| match factor {
            CredentialFactor::Password(password) => Some(password.as_str()),
            CredentialFactor::PlatformIdentity => None,
        })
    }

    /// Whether the platform-identity factor is present
    pub fn uses_platform_identity(&self) -> bool {
        self.factors
            .iter()
            .any(|factor| matches!(factor, CredentialFactor::PlatformIdentity))
    }

    /// Key material of the first password factor
    pub fn password_key_data(&self) -> Option<Zeroizing<[u8; KEY_LENGTH]>> {
        self.password().map(hash_password)
    }

    /// Derive the composite key over every factor
    ///
    /// Fails for an empty credential, and for a platform-identity factor
    /// when no key source is given.
    pub fn composite_key(
        &self,
        platform: Option<&dyn PlatformKeySource>,
    ) -> Result<Zeroizing<[u8; KEY_LENGTH]>, StoreError> {
        if self.factors.is_empty() {
            return Err(StoreError::invalid_credential("credential has no key factors"));
        }

        let mut hasher = Sha256::new();
        for factor in &self.factors {
            hasher.update(factor.key_data(platform)?.as_slice());
        }

        let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
        out.copy_from_slice(&hasher.finalize());
        Ok(out)
    }
}
