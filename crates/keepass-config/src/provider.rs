//! KeePass configuration provider
//!
//! Loading runs one pass over the store:
//!
//! 1. open the database with the source's location and credential
//! 2. select entries (every entry unless the source filters them)
//! 3. resolve each entry's key and value with the source's strategies
//! 4. insert the pairs in selection order, renaming clashing keys
//! 5. publish the finished mapping
//!
//! # Key Collisions
//!
//! No entry is ever dropped. When a key is already taken the entry is
//! stored under the first free key of the form ``<key>`<n>`` for
//! n = 1, 2, 3, ...
//!
//! # Example
//!
//! ```rust
//! use keepass_config::credential::UnlockCredential;
//! use keepass_config::framework::ConfigurationProvider;
//! use keepass_config::provider::KeePassConfigurationProvider;
//! use keepass_config::source::KeePassSource;
//! use keepass_config::store::{MemoryStore, SecretDatabase, SecretEntry, SecretGroup};
//!
//! let credential = UnlockCredential::new().with_password("1234");
//! let database = SecretDatabase::new(
//!     SecretGroup::new("Vault").with_entry(SecretEntry::with_credentials("Db", "admin", "pw")),
//! );
//! let store = MemoryStore::new().with_database("vault.kdbx", credential.clone(), database);
//!
//! let source = KeePassSource::builder("vault.kdbx")
//!     .credential(credential)
//!     .opener(store)
//!     .build();
//!
//! let mut provider = KeePassConfigurationProvider::new(source);
//! provider.load().unwrap();
//! assert_eq!(provider.try_get("Vault:Db:admin"), Some(Some("pw")));
//! ```

use crate::error::Result;
use crate::framework::{ConfigData, ConfigurationProvider};
use crate::source::KeePassSource;
use crate::strategy::{
    AllEntries, DefaultKeyResolver, DefaultValueResolver, EntrySelector, KeyResolver, ValueResolver,
};

/// Marker between a clashing key and its counter
pub const COLLISION_MARKER: char = '`';

/// Insert `value` under `key`, or under the first free ``<key>`<n>``
///
/// Returns the key the value was stored under.
pub fn insert_unique(data: &mut ConfigData, key: String, value: Option<String>) -> String {
    if !data.contains_key(&key) {
        data.try_add(key.clone(), value);
        return key;
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{}{}{}", key, COLLISION_MARKER, counter);
        if !data.contains_key(&candidate) {
            tracing::debug!(key = %key, assigned = %candidate, "Resolved configuration key collision");
            data.try_add(candidate.clone(), value);
            return candidate;
        }
        counter += 1;
    }
}

/// Build a mapping from ordered candidates, renaming clashing keys
pub fn resolve_collisions<I>(candidates: I) -> ConfigData
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let mut data = ConfigData::new();
    for (key, value) in candidates {
        insert_unique(&mut data, key, value);
    }
    data
}

/// Provides configuration key/values from a KeePass database
#[derive(Debug)]
pub struct KeePassConfigurationProvider {
    source: KeePassSource,
    data: ConfigData,
    loaded: bool,
}

impl KeePassConfigurationProvider {
    pub fn new(source: KeePassSource) -> Self {
        Self {
            source,
            data: ConfigData::new(),
            loaded: false,
        }
    }

    pub fn source(&self) -> &KeePassSource {
        &self.source
    }

    /// Whether a load has completed successfully
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Open the store and compute the mapping without publishing it
    fn read(&self) -> Result<ConfigData> {
        let location = self.source.location();
        let database = self
            .source
            .opener()
            .open(&location, self.source.credential())?;

        let selector: &dyn EntrySelector = match self.source.entry_selector() {
            Some(selector) => selector.as_ref(),
            None => &AllEntries,
        };
        let key_resolver: &dyn KeyResolver = match self.source.key_resolver() {
            Some(resolver) => resolver.as_ref(),
            None => &DefaultKeyResolver,
        };
        let value_resolver: &dyn ValueResolver = match self.source.value_resolver() {
            Some(resolver) => resolver.as_ref(),
            None => &DefaultValueResolver,
        };

        let entries = selector.select(&database);
        let count = entries.len();

        let data = resolve_collisions(entries.into_iter().map(|entry| {
            let key = key_resolver.resolve_key(entry);
            let value = value_resolver.resolve_value(&key, entry);
            (key, value)
        }));

        tracing::info!(
            path = %location.display(),
            entries = count,
            "Loaded KeePass configuration"
        );

        Ok(data)
    }
}

impl ConfigurationProvider for KeePassConfigurationProvider {
    fn name(&self) -> &str {
        "keepass"
    }

    /// Rebuild the mapping from the store
    ///
    /// The previous mapping is replaced only when the load succeeds.
    fn load(&mut self) -> Result<()> {
        let data = self.read()?;
        self.data = data;
        self.loaded = true;
        Ok(())
    }

    fn data(&self) -> &ConfigData {
        &self.data
    }
}
