//! Layered configuration framework
//!
//! This is the hosting side of a provider: sources are registered on a
//! [`ConfigurationBuilder`], each source builds a [`ConfigurationProvider`],
//! and the loaded providers are composed into a [`Configuration`].
//!
//! # Key Conventions
//!
//! - Keys are colon-delimited paths: `section:subsection:name`
//! - Keys compare case-insensitively; the first spelling seen is kept
//! - Values are nullable strings
//! - Providers registered later override earlier ones
//!
//! # Example
//!
//! ```rust
//! use keepass_config::framework::{ConfigData, ConfigurationBuilder, MemoryConfigSource};
//!
//! let mut data = ConfigData::new();
//! data.try_add("database:host", Some("localhost".to_string()));
//!
//! let config = ConfigurationBuilder::new()
//!     .add(MemoryConfigSource::new(data))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.get("Database:Host"), Some("localhost"));
//! ```

use crate::error::Result;
use crate::file_access::FileContext;
use crate::strategy::KEY_DELIMITER;
use std::cmp::Ordering;
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::path::PathBuf;

/// Flat mapping of configuration keys to nullable values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigData {
    /// Folded key -> (original key, value)
    entries: BTreeMap<String, (String, Option<String>)>,
}

/// Case fold used for key equality
///
/// Unicode lowercasing, so it is slightly broader than a strict ordinal
/// ignore-case match: keys differing only in non-ASCII case (`Ä` and `ä`)
/// are equal here as well.
fn fold(key: &str) -> String {
    key.to_lowercase()
}

impl ConfigData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key` unless an equal key is already present
    ///
    /// Returns `false` and leaves the existing value alone on a clash.
    pub fn try_add(&mut self, key: impl Into<String>, value: Option<String>) -> bool {
        let key = key.into();
        match self.entries.entry(fold(&key)) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert((key, value));
                true
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    /// Value under `key`; the outer `None` means the key is absent
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .get(&fold(key))
            .map(|(_, value)| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in their original spelling
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    /// Immediate child segments below `parent`, one per matching key
    ///
    /// With `parent` unset every key's first segment is returned.
    /// Duplicates are kept; callers merge and de-duplicate.
    pub fn child_segments(&self, parent: Option<&str>) -> Vec<String> {
        let prefix = parent.map(|p| format!("{}{}", p, KEY_DELIMITER));

        self.entries
            .values()
            .filter_map(|(key, _)| {
                let rest = match &prefix {
                    Some(prefix) => strip_prefix_ignore_case(key, prefix)?,
                    None => key.as_str(),
                };
                let segment = rest.split(KEY_DELIMITER).next().unwrap_or(rest);
                Some(segment.to_string())
            })
            .collect()
    }
}

fn strip_prefix_ignore_case<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = key.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    Some(chars.as_str())
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for ConfigData {
    /// Later duplicates are ignored
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut data = ConfigData::new();
        for (key, value) in iter {
            data.try_add(key, value);
        }
        data
    }
}

/// Order configuration keys segment by segment
///
/// Segments that both parse as integers compare numerically; all others
/// compare case-insensitively.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    let mut left = a.split(KEY_DELIMITER);
    let mut right = b.split(KEY_DELIMITER);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<i64>(), y.parse::<i64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => fold(x).cmp(&fold(y)),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Provides configuration key/values from one source
pub trait ConfigurationProvider: Send + Sync + fmt::Debug {
    /// Returns the name of this provider (for logging)
    fn name(&self) -> &str;

    /// Load (or reload) data from the underlying source
    fn load(&mut self) -> Result<()>;

    /// Published data
    fn data(&self) -> &ConfigData;

    /// Value under `key`; the outer `None` means the key is absent
    fn try_get(&self, key: &str) -> Option<Option<&str>> {
        self.data().get(key)
    }

    /// Child keys directly under `parent`, merged with `earlier` and sorted
    ///
    /// `earlier` goes first so the stable sort keeps its spellings ahead of
    /// this provider's.
    fn child_keys(&self, earlier: &[String], parent: Option<&str>) -> Vec<String> {
        let mut keys = earlier.to_vec();
        keys.extend(self.data().child_segments(parent));
        keys.sort_by(|a, b| compare_keys(a, b));
        keys
    }
}

/// Registers a provider with a [`ConfigurationBuilder`]
pub trait ConfigurationSource: fmt::Debug {
    /// Build the provider for this source
    fn build(&self, builder: &ConfigurationBuilder) -> Box<dyn ConfigurationProvider>;

    /// Whether a missing backing file yields empty configuration instead of an error
    fn is_optional(&self) -> bool {
        false
    }
}

/// Collects configuration sources in registration order
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    sources: Vec<Box<dyn ConfigurationSource>>,
    file_context: Option<FileContext>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source
    pub fn add<S: ConfigurationSource + 'static>(&mut self, source: S) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn sources(&self) -> &[Box<dyn ConfigurationSource>] {
        &self.sources
    }

    /// Directory that sources without their own file context resolve against
    pub fn set_base_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.file_context = Some(FileContext::new(path));
        self
    }

    pub fn file_context(&self) -> Option<&FileContext> {
        self.file_context.as_ref()
    }

    /// Build and load every registered source
    ///
    /// An optional source whose backing file is missing contributes no
    /// keys. Every other load failure is returned unchanged.
    pub fn build(&self) -> Result<Configuration> {
        let mut providers = Vec::with_capacity(self.sources.len());
        let mut optional = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let mut provider = source.build(self);
            load_provider(provider.as_mut(), source.is_optional())?;
            providers.push(provider);
            optional.push(source.is_optional());
        }

        Ok(Configuration { providers, optional })
    }
}

/// Load `provider`, tolerating a missing backing file when `optional`
fn load_provider(provider: &mut dyn ConfigurationProvider, optional: bool) -> Result<()> {
    match provider.load() {
        Ok(()) => Ok(()),
        Err(e) if optional && e.is_not_found() => {
            tracing::warn!(
                provider = provider.name(),
                error = %e,
                "Optional configuration source is missing, skipping"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Loaded providers, queried with later registrations taking precedence
#[derive(Debug)]
pub struct Configuration {
    providers: Vec<Box<dyn ConfigurationProvider>>,
    /// Parallel to `providers`
    optional: Vec<bool>,
}

impl Configuration {
    /// Value for `key`, `None` when absent or null
    pub fn get(&self, key: &str) -> Option<&str> {
        self.providers
            .iter()
            .rev()
            .find_map(|p| p.try_get(key))
            .flatten()
    }

    /// Distinct child keys directly under `parent`, sorted
    pub fn child_keys(&self, parent: Option<&str>) -> Vec<String> {
        let mut keys = self
            .providers
            .iter()
            .fold(Vec::new(), |earlier, p| p.child_keys(&earlier, parent));
        keys.dedup_by(|a, b| fold(a) == fold(b));
        keys
    }

    pub fn providers(&self) -> &[Box<dyn ConfigurationProvider>] {
        &self.providers
    }

    /// Re-run every provider's load
    ///
    /// Optional sources get the same missing-file tolerance as in
    /// [`ConfigurationBuilder::build`].
    pub fn reload(&mut self) -> Result<()> {
        for (provider, optional) in self.providers.iter_mut().zip(&self.optional) {
            load_provider(provider.as_mut(), *optional)?;
        }
        Ok(())
    }
}

/// Source backed by fixed in-memory data
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    data: ConfigData,
}

impl MemoryConfigSource {
    pub fn new(data: ConfigData) -> Self {
        Self { data }
    }
}

impl ConfigurationSource for MemoryConfigSource {
    fn build(&self, _builder: &ConfigurationBuilder) -> Box<dyn ConfigurationProvider> {
        Box::new(MemoryConfigProvider {
            data: self.data.clone(),
        })
    }
}

#[derive(Debug)]
struct MemoryConfigProvider {
    data: ConfigData,
}

impl ConfigurationProvider for MemoryConfigProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn data(&self) -> &ConfigData {
        &self.data
    }
}
