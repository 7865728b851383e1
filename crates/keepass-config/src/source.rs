//! KeePass configuration source
//!
//! A [`KeePassSource`] describes how to open and flatten one database:
//! where it lives, how to unlock it, and which strategies map its entries.
//! It is immutable once built and can be shared between providers.
//!
//! # Example
//!
//! ```rust
//! use keepass_config::source::KeePassSource;
//!
//! let source = KeePassSource::builder("secrets.kdbx")
//!     .password("1234")
//!     .optional(true)
//!     .build();
//!
//! assert_eq!(source.path().to_str(), Some("secrets.kdbx"));
//! ```

use crate::credential::{CredentialFactor, UnlockCredential};
use crate::file_access::{self, FileContext};
use crate::framework::{ConfigurationBuilder, ConfigurationProvider, ConfigurationSource};
use crate::kdbx::KdbxOpener;
use crate::provider::KeePassConfigurationProvider;
use crate::store::{SecretDatabase, SecretEntry, StoreOpener};
use crate::strategy::{select_with, EntrySelector, KeyResolver, ValueResolver};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Connection information for a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConnection {
    path: PathBuf,
}

impl StoreConnection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Immutable description of a KeePass configuration source
#[derive(Clone)]
pub struct KeePassSource {
    path: PathBuf,
    connection: StoreConnection,
    credential: UnlockCredential,
    file_context: Option<FileContext>,
    opener: Arc<dyn StoreOpener>,
    entry_selector: Option<Arc<dyn EntrySelector>>,
    key_resolver: Option<Arc<dyn KeyResolver>>,
    value_resolver: Option<Arc<dyn ValueResolver>>,
    optional: bool,
    reload_on_change: bool,
}

impl KeePassSource {
    /// Start describing a source for the database at `path`
    pub fn builder(path: impl Into<PathBuf>) -> KeePassSourceBuilder {
        KeePassSourceBuilder::new(path)
    }

    /// Store path, relative to the file context when one is set
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &StoreConnection {
        &self.connection
    }

    pub fn credential(&self) -> &UnlockCredential {
        &self.credential
    }

    pub fn file_context(&self) -> Option<&FileContext> {
        self.file_context.as_ref()
    }

    pub fn opener(&self) -> &Arc<dyn StoreOpener> {
        &self.opener
    }

    pub fn entry_selector(&self) -> Option<&Arc<dyn EntrySelector>> {
        self.entry_selector.as_ref()
    }

    pub fn key_resolver(&self) -> Option<&Arc<dyn KeyResolver>> {
        self.key_resolver.as_ref()
    }

    pub fn value_resolver(&self) -> Option<&Arc<dyn ValueResolver>> {
        self.value_resolver.as_ref()
    }

    pub fn optional(&self) -> bool {
        self.optional
    }

    pub fn reload_on_change(&self) -> bool {
        self.reload_on_change
    }

    /// Location handed to the opener
    ///
    /// A relative connection path is resolved against the file context.
    pub fn location(&self) -> PathBuf {
        match &self.file_context {
            Some(context) => context.resolve(self.connection.path()),
            None => self.connection.path().to_path_buf(),
        }
    }

    /// Copy of this source using `context` when it has none of its own
    pub(crate) fn with_default_context(&self, context: Option<&FileContext>) -> Self {
        let mut source = self.clone();
        if source.file_context.is_none() {
            source.file_context = context.cloned();
        }
        source
    }
}

impl fmt::Debug for KeePassSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeePassSource")
            .field("path", &self.path)
            .field("connection", &self.connection)
            .field("credential", &self.credential)
            .field("file_context", &self.file_context)
            .field("opener", &self.opener)
            .field("entry_selector", &self.entry_selector.is_some())
            .field("key_resolver", &self.key_resolver.is_some())
            .field("value_resolver", &self.value_resolver.is_some())
            .field("optional", &self.optional)
            .field("reload_on_change", &self.reload_on_change)
            .finish()
    }
}

impl ConfigurationSource for KeePassSource {
    fn build(&self, builder: &ConfigurationBuilder) -> Box<dyn ConfigurationProvider> {
        Box::new(KeePassConfigurationProvider::new(
            self.with_default_context(builder.file_context()),
        ))
    }

    fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Builder for [`KeePassSource`]
#[must_use]
pub struct KeePassSourceBuilder {
    path: PathBuf,
    connection: Option<StoreConnection>,
    credential: UnlockCredential,
    file_context: Option<FileContext>,
    opener: Option<Arc<dyn StoreOpener>>,
    entry_selector: Option<Arc<dyn EntrySelector>>,
    key_resolver: Option<Arc<dyn KeyResolver>>,
    value_resolver: Option<Arc<dyn ValueResolver>>,
    optional: bool,
    reload_on_change: bool,
}

impl KeePassSourceBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            connection: None,
            credential: UnlockCredential::new(),
            file_context: None,
            opener: None,
            entry_selector: None,
            key_resolver: None,
            value_resolver: None,
            optional: false,
            reload_on_change: false,
        }
    }

    /// Replace the unlock credential
    pub fn credential(mut self, credential: UnlockCredential) -> Self {
        self.credential = credential;
        self
    }

    /// Append a password factor
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credential.add_factor(CredentialFactor::password(password));
        self
    }

    /// Append the platform-identity factor when `enabled`
    pub fn platform_identity(mut self, enabled: bool) -> Self {
        if enabled {
            self.credential.add_factor(CredentialFactor::PlatformIdentity);
        }
        self
    }

    /// Use explicit connection information instead of one built from the path
    pub fn connection(mut self, connection: StoreConnection) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn file_context(mut self, context: FileContext) -> Self {
        self.file_context = Some(context);
        self
    }

    /// Open the store with `opener` instead of the KDBX reader
    pub fn opener(mut self, opener: impl StoreOpener + 'static) -> Self {
        self.opener = Some(Arc::new(opener));
        self
    }

    pub fn entry_selector(mut self, selector: impl EntrySelector + 'static) -> Self {
        self.entry_selector = Some(Arc::new(selector));
        self
    }

    /// Select entries with a closure over the opened database
    pub fn filter_entries<F>(self, filter: F) -> Self
    where
        F: for<'a> Fn(&'a SecretDatabase) -> Vec<&'a SecretEntry> + Send + Sync + 'static,
    {
        self.entry_selector(select_with(filter))
    }

    pub fn key_resolver(mut self, resolver: impl KeyResolver + 'static) -> Self {
        self.key_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn value_resolver(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.value_resolver = Some(Arc::new(resolver));
        self
    }

    /// Treat a missing database file as empty configuration
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn reload_on_change(mut self, reload_on_change: bool) -> Self {
        self.reload_on_change = reload_on_change;
        self
    }

    /// Finish the source
    ///
    /// Without an explicit file context an absolute path is split into a
    /// context for its directory and the bare file name. The connection
    /// defaults to the resulting path.
    pub fn build(self) -> KeePassSource {
        let (file_context, path) = match self.file_context {
            Some(context) => (Some(context), self.path),
            None => match file_access::split_absolute(&self.path) {
                Some((context, file_name)) => (Some(context), file_name),
                None => (None, self.path),
            },
        };

        let connection = self
            .connection
            .unwrap_or_else(|| StoreConnection::new(path.clone()));

        KeePassSource {
            path,
            connection,
            credential: self.credential,
            file_context,
            opener: self.opener.unwrap_or_else(|| Arc::new(KdbxOpener::new())),
            entry_selector: self.entry_selector,
            key_resolver: self.key_resolver,
            value_resolver: self.value_resolver,
            optional: self.optional,
            reload_on_change: self.reload_on_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path_is_kept() {
        for path in ["KeePassTestDatabase.kdbx", "../../../KeePassTestDatabase.kdbx"] {
            let source = KeePassSource::builder(path).build();
            assert_eq!(source.path(), Path::new(path));
            assert_eq!(source.connection().path(), Path::new(path));
            assert!(source.file_context().is_none());
            assert_eq!(source.location(), PathBuf::from(path));
        }
    }

    #[test]
    fn test_absolute_path_is_split() {
        let dir = TempDir::new().unwrap();
        let absolute = dir.path().join("secrets.kdbx");

        let source = KeePassSource::builder(&absolute).build();
        assert_eq!(source.path(), Path::new("secrets.kdbx"));
        assert_eq!(source.connection().path(), Path::new("secrets.kdbx"));
        assert_eq!(source.file_context().unwrap().root(), dir.path());
        assert_eq!(source.location(), absolute);
    }

    #[test]
    fn test_explicit_context_keeps_path() {
        let dir = TempDir::new().unwrap();
        let absolute = dir.path().join("secrets.kdbx");

        let source = KeePassSource::builder(&absolute)
            .file_context(FileContext::new("/elsewhere"))
            .build();
        assert_eq!(source.path(), absolute.as_path());
        assert_eq!(source.location(), absolute);
    }

    #[test]
    fn test_explicit_connection() {
        let source = KeePassSource::builder("a.kdbx")
            .connection(StoreConnection::new("b.kdbx"))
            .build();
        assert_eq!(source.path(), Path::new("a.kdbx"));
        assert_eq!(source.location(), PathBuf::from("b.kdbx"));
    }

    #[test]
    fn test_credential_inputs() {
        let source = KeePassSource::builder("a.kdbx")
            .password("1234")
            .platform_identity(true)
            .build();
        assert_eq!(
            source.credential(),
            &UnlockCredential::from_inputs(Some("1234"), true)
        );

        let replaced = KeePassSource::builder("a.kdbx")
            .password("ignored")
            .credential(UnlockCredential::new())
            .build();
        assert!(replaced.credential().is_empty());
    }

    #[test]
    fn test_builder_context_is_a_default() {
        let mut builder = ConfigurationBuilder::new();
        builder.set_base_path("/base");

        let relative = KeePassSource::builder("a.kdbx").build();
        let resolved = relative.with_default_context(builder.file_context());
        assert_eq!(resolved.location(), PathBuf::from("/base/a.kdbx"));

        let own = KeePassSource::builder("a.kdbx")
            .file_context(FileContext::new("/own"))
            .build();
        let kept = own.with_default_context(builder.file_context());
        assert_eq!(kept.location(), PathBuf::from("/own/a.kdbx"));
    }

    #[test]
    fn test_hooks_and_flags() {
        let source = KeePassSource::builder("a.kdbx")
            .opener(MemoryStore::new())
            .filter_entries(|db| db.all_entries())
            .key_resolver(|entry: &SecretEntry| entry.title().to_string())
            .value_resolver(|_: &str, _: &SecretEntry| None)
            .optional(true)
            .reload_on_change(true)
            .build();

        assert!(source.entry_selector().is_some());
        assert!(source.key_resolver().is_some());
        assert!(source.value_resolver().is_some());
        assert!(source.optional());
        assert!(source.is_optional());
        assert!(source.reload_on_change());

        let rendered = format!("{:?}", source);
        assert!(rendered.contains("MemoryStore"));
    }
}
