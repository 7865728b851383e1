//! Secret store model
//!
//! A [`StoreOpener`] unlocks a database and returns a [`SecretDatabase`]
//! snapshot. The snapshot is a tree of named [`SecretGroup`]s holding
//! [`SecretEntry`] records. Each entry remembers the chain of groups above
//! it so that its full group path can be formatted without walking back up
//! the tree.
//!
//! [`MemoryStore`] is an in-memory opener for tests and for hosts that
//! assemble the tree themselves.

use crate::credential::{PlatformKeySource, UnlockCredential};
use crate::error::StoreError;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Well-known entry field names
pub mod fields {
    pub const TITLE: &str = "Title";
    pub const USER_NAME: &str = "UserName";
    pub const PASSWORD: &str = "Password";
}

/// Opens a secret store and reads its tree
///
/// The handle behind the returned snapshot is released before `open`
/// returns.
#[cfg_attr(test, mockall::automock)]
pub trait StoreOpener: Send + Sync + fmt::Debug {
    /// Open the store at `location` using `credential`
    fn open(&self, location: &Path, credential: &UnlockCredential) -> Result<SecretDatabase, StoreError>;
}

/// One record in the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretEntry {
    /// Group names from the root (inclusive) to the parent (inclusive)
    ancestors: Vec<String>,
    fields: HashMap<String, String>,
}

impl SecretEntry {
    /// Create an entry with no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry with title, user name and password fields
    pub fn with_credentials(
        title: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new()
            .with_field(fields::TITLE, title)
            .with_field(fields::USER_NAME, user_name)
            .with_field(fields::PASSWORD, password)
    }

    /// Set a field (builder pattern)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Field value, if present
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value, or `""` when the field is missing
    pub fn read_safe(&self, name: &str) -> &str {
        self.field(name).unwrap_or("")
    }

    pub fn title(&self) -> &str {
        self.read_safe(fields::TITLE)
    }

    pub fn user_name(&self) -> &str {
        self.read_safe(fields::USER_NAME)
    }

    /// Names of the groups above this entry, root first
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Full path of the entry's parent group
    ///
    /// Segments are joined with `separator`. With `include_root` the root
    /// group's name leads the path; without it the path starts at the
    /// first group below the root, and an entry in the root group has an
    /// empty path.
    pub fn group_path(&self, separator: &str, include_root: bool) -> String {
        let skip = if include_root { 0 } else { 1 };
        self.ancestors
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// A named container of entries and subgroups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretGroup {
    name: String,
    entries: Vec<SecretEntry>,
    groups: Vec<SecretGroup>,
}

impl SecretGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an entry (builder pattern)
    pub fn with_entry(mut self, entry: SecretEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Add a subgroup (builder pattern)
    pub fn with_group(mut self, group: SecretGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn push_entry(&mut self, entry: SecretEntry) {
        self.entries.push(entry);
    }

    pub fn push_group(&mut self, group: SecretGroup) {
        self.groups.push(group);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[SecretGroup] {
        &self.groups
    }

    /// Entries of this group, and with `recursive` of every nested group
    ///
    /// A group's own entries come before those of its subgroups, which are
    /// visited depth-first in insertion order.
    pub fn entries(&self, recursive: bool) -> Vec<&SecretEntry> {
        let mut out = Vec::new();
        self.collect_entries(recursive, &mut out);
        out
    }

    fn collect_entries<'a>(&'a self, recursive: bool, out: &mut Vec<&'a SecretEntry>) {
        out.extend(self.entries.iter());
        if recursive {
            for group in &self.groups {
                group.collect_entries(true, out);
            }
        }
    }

    /// Find a direct subgroup by name
    pub fn group(&self, name: &str) -> Option<&SecretGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn stamp_ancestors(&mut self, chain: &mut Vec<String>) {
        chain.push(self.name.clone());
        for entry in &mut self.entries {
            entry.ancestors = chain.clone();
        }
        for group in &mut self.groups {
            group.stamp_ancestors(chain);
        }
        chain.pop();
    }
}

/// Unlocked snapshot of a secret store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDatabase {
    root: SecretGroup,
}

impl SecretDatabase {
    /// Wrap a root group, recording every entry's ancestor chain
    pub fn new(mut root: SecretGroup) -> Self {
        root.stamp_ancestors(&mut Vec::new());
        Self { root }
    }

    pub fn root(&self) -> &SecretGroup {
        &self.root
    }

    /// Every entry in the tree
    pub fn all_entries(&self) -> Vec<&SecretEntry> {
        self.root.entries(true)
    }

    /// Name of the database, which is the root group's name
    pub fn name(&self) -> &str {
        self.root.name()
    }
}

/// In-memory secret store
///
/// Each database is registered under a path together with the credential
/// that unlocks it. Opening compares composite keys, so factor order and
/// content must match.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    databases: HashMap<PathBuf, LockedDatabase>,
    platform_key: Option<Arc<dyn PlatformKeySource>>,
}

#[derive(Debug, Clone)]
struct LockedDatabase {
    database: SecretDatabase,
    credential: UnlockCredential,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database at `path`, locked with `credential`
    pub fn with_database(
        mut self,
        path: impl Into<PathBuf>,
        credential: UnlockCredential,
        database: SecretDatabase,
    ) -> Self {
        self.insert(path, credential, database);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, credential: UnlockCredential, database: SecretDatabase) {
        self.databases
            .insert(path.into(), LockedDatabase { database, credential });
    }

    /// Use `source` for platform-identity factors
    pub fn with_platform_key(mut self, source: Arc<dyn PlatformKeySource>) -> Self {
        self.platform_key = Some(source);
        self
    }
}

impl StoreOpener for MemoryStore {
    fn open(&self, location: &Path, credential: &UnlockCredential) -> Result<SecretDatabase, StoreError> {
        let locked = self.databases.get(location).ok_or_else(|| StoreError::NotFound {
            path: location.to_path_buf(),
        })?;

        let platform = self.platform_key.as_deref();
        let expected = locked.credential.composite_key(platform)?;
        let offered = credential.composite_key(platform)?;

        if expected.as_slice() != offered.as_slice() {
            return Err(StoreError::invalid_credential(
                "the composite key does not match",
            ));
        }

        Ok(locked.database.clone())
    }
}
