//! Registration helpers for [`ConfigurationBuilder`]
//!
//! # Example
//!
//! ```rust
//! use keepass_config::credential::UnlockCredential;
//! use keepass_config::extensions::KeePassConfigurationExt;
//! use keepass_config::framework::ConfigurationBuilder;
//!
//! let mut builder = ConfigurationBuilder::new();
//! builder
//!     .add_keepass("secrets.kdbx", Some("1234"), false)
//!     .add_keepass_with("shared.kdbx", UnlockCredential::new().with_password("s"), |source| {
//!         source.optional(true)
//!     });
//!
//! assert_eq!(builder.sources().len(), 2);
//! ```

use crate::credential::UnlockCredential;
use crate::error::Result;
use crate::framework::ConfigurationBuilder;
use crate::options::KeePassOptions;
use crate::source::{KeePassSource, KeePassSourceBuilder};
use std::path::PathBuf;

/// Adds KeePass sources to a configuration builder
pub trait KeePassConfigurationExt {
    /// Add a database unlocked by a password and/or the platform identity
    fn add_keepass(
        &mut self,
        path: impl Into<PathBuf>,
        password: Option<&str>,
        use_platform_identity: bool,
    ) -> &mut Self;

    /// Add a database unlocked by `credential`, customising the source with `configure`
    fn add_keepass_with<F>(&mut self, path: impl Into<PathBuf>, credential: UnlockCredential, configure: F) -> &mut Self
    where
        F: FnOnce(KeePassSourceBuilder) -> KeePassSourceBuilder;

    /// Add a prepared source
    fn add_keepass_source(&mut self, source: KeePassSource) -> &mut Self;

    /// Add a source described by declarative options
    fn add_keepass_options(&mut self, options: KeePassOptions) -> Result<&mut Self>;
}

impl KeePassConfigurationExt for ConfigurationBuilder {
    fn add_keepass(
        &mut self,
        path: impl Into<PathBuf>,
        password: Option<&str>,
        use_platform_identity: bool,
    ) -> &mut Self {
        let credential = UnlockCredential::from_inputs(password, use_platform_identity);
        self.add_keepass_with(path, credential, |source| source)
    }

    fn add_keepass_with<F>(&mut self, path: impl Into<PathBuf>, credential: UnlockCredential, configure: F) -> &mut Self
    where
        F: FnOnce(KeePassSourceBuilder) -> KeePassSourceBuilder,
    {
        let source = configure(KeePassSource::builder(path).credential(credential)).build();
        self.add_keepass_source(source)
    }

    fn add_keepass_source(&mut self, source: KeePassSource) -> &mut Self {
        self.add(source)
    }

    fn add_keepass_options(&mut self, options: KeePassOptions) -> Result<&mut Self> {
        let source = options.into_source()?;
        Ok(self.add_keepass_source(source))
    }
}
