//! KeePass Configuration Provider
//!
//! Exposes the entries of a KeePass (KDBX) database as flat,
//! colon-delimited configuration keys for a layered configuration builder.
//!
//! ## Features
//!
//! - **Unlock credentials**: password and/or platform-identity factors
//! - **Pluggable mapping**: replaceable entry selection, key and value strategies
//! - **No dropped entries**: clashing keys are renamed ``key`1``, ``key`2``, ...
//! - **File contexts**: absolute and relative paths resolve uniformly
//! - **Declarative options**: describe a source in the host's config files via serde
//!
//! ## Key Format
//!
//! By default every entry becomes `<group path>:<title>:<user name>` with
//! the entry's password as its value, e.g.
//! `KeePassTestDatabase:Internet:Facebook:Takent33`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keepass_config::extensions::KeePassConfigurationExt;
//! use keepass_config::framework::ConfigurationBuilder;
//!
//! let config = ConfigurationBuilder::new()
//!     .add_keepass("/etc/app/secrets.kdbx", Some("1234"), false)
//!     .build()?;
//!
//! let token = config.get("secrets:Internet:GitHub:deploy-bot");
//! # Ok::<(), keepass_config::ConfigError>(())
//! ```

pub mod credential;
pub mod error;
pub mod extensions;
pub mod file_access;
pub mod framework;
pub mod kdbx;
pub mod options;
pub mod provider;
pub mod source;
pub mod store;
pub mod strategy;

// Re-export core types
pub use credential::{CredentialFactor, PlatformKeySource, StaticUserKey, UnlockCredential};
pub use error::{ConfigError, Result, StoreError};
pub use extensions::KeePassConfigurationExt;
pub use framework::{ConfigData, Configuration, ConfigurationBuilder, ConfigurationProvider, ConfigurationSource};
pub use kdbx::KdbxOpener;
pub use options::KeePassOptions;
pub use provider::KeePassConfigurationProvider;
pub use source::{KeePassSource, KeePassSourceBuilder, StoreConnection};
pub use store::{MemoryStore, SecretDatabase, SecretEntry, SecretGroup, StoreOpener};
pub use strategy::{EntrySelector, KeyResolver, ValueResolver};
