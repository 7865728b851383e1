//! Entry selection and key/value mapping strategies
//!
//! A provider turns store entries into configuration pairs through three
//! independently replaceable strategies:
//!
//! - [`EntrySelector`] picks the entries to publish ([`AllEntries`] by default)
//! - [`KeyResolver`] maps an entry to its key ([`DefaultKeyResolver`])
//! - [`ValueResolver`] maps an entry to its value ([`DefaultValueResolver`])
//!
//! Key and value resolvers are implemented for plain closures. Closure
//! selectors go through [`select_with`] so their lifetimes are inferred.

use crate::store::{fields, SecretDatabase, SecretEntry};
use std::fmt;

/// Separator between configuration key segments
pub const KEY_DELIMITER: &str = ":";

/// Chooses which entries of an opened store are published
pub trait EntrySelector: Send + Sync {
    fn select<'a>(&self, database: &'a SecretDatabase) -> Vec<&'a SecretEntry>;
}

/// Maps an entry to its configuration key
pub trait KeyResolver: Send + Sync {
    fn resolve_key(&self, entry: &SecretEntry) -> String;
}

/// Maps an entry (and its resolved key) to its configuration value
pub trait ValueResolver: Send + Sync {
    fn resolve_value(&self, key: &str, entry: &SecretEntry) -> Option<String>;
}

/// Every entry in the store, nested groups included
#[derive(Debug, Clone, Copy, Default)]
pub struct AllEntries;

impl EntrySelector for AllEntries {
    fn select<'a>(&self, database: &'a SecretDatabase) -> Vec<&'a SecretEntry> {
        database.all_entries()
    }
}

/// `<group path>:<title>:<user name>`
///
/// The group path includes the root group's name as its first segment.
/// Missing fields contribute empty segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyResolver;

impl KeyResolver for DefaultKeyResolver {
    fn resolve_key(&self, entry: &SecretEntry) -> String {
        format!(
            "{}{}{}{}{}",
            entry.group_path(KEY_DELIMITER, true),
            KEY_DELIMITER,
            entry.title(),
            KEY_DELIMITER,
            entry.user_name()
        )
    }
}

/// The entry's password field
///
/// A password equal to the literal field name is an unset placeholder and
/// resolves to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueResolver;

impl ValueResolver for DefaultValueResolver {
    fn resolve_value(&self, _key: &str, entry: &SecretEntry) -> Option<String> {
        let value = entry.read_safe(fields::PASSWORD);
        if value == fields::PASSWORD {
            None
        } else {
            Some(value.to_string())
        }
    }
}

impl<F> KeyResolver for F
where
    F: Fn(&SecretEntry) -> String + Send + Sync,
{
    fn resolve_key(&self, entry: &SecretEntry) -> String {
        self(entry)
    }
}

impl<F> ValueResolver for F
where
    F: Fn(&str, &SecretEntry) -> Option<String> + Send + Sync,
{
    fn resolve_value(&self, key: &str, entry: &SecretEntry) -> Option<String> {
        self(key, entry)
    }
}

/// Selector backed by a closure, see [`select_with`]
pub struct SelectWith<F>(F);

impl<F> fmt::Debug for SelectWith<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelectWith(..)")
    }
}

impl<F> EntrySelector for SelectWith<F>
where
    F: for<'a> Fn(&'a SecretDatabase) -> Vec<&'a SecretEntry> + Send + Sync,
{
    fn select<'a>(&self, database: &'a SecretDatabase) -> Vec<&'a SecretEntry> {
        (self.0)(database)
    }
}

/// Wrap a closure as an [`EntrySelector`]
///
/// ```rust
/// use keepass_config::strategy::select_with;
///
/// let internet_only = select_with(|db| {
///     db.root()
///         .group("Internet")
///         .map(|g| g.entries(true))
///         .unwrap_or_default()
/// });
/// # let _ = internet_only;
/// ```
pub fn select_with<F>(f: F) -> SelectWith<F>
where
    F: for<'a> Fn(&'a SecretDatabase) -> Vec<&'a SecretEntry> + Send + Sync,
{
    SelectWith(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretGroup;

    fn database() -> SecretDatabase {
        SecretDatabase::new(
            SecretGroup::new("KeePassTestDatabase")
                .with_group(
                    SecretGroup::new("Internet")
                        .with_entry(SecretEntry::with_credentials("Facebook", "Takent33", "s3cret")),
                )
                .with_group(
                    SecretGroup::new("Banking")
                        .with_entry(SecretEntry::with_credentials("Bank", "me", "Password")),
                ),
        )
    }

    #[test]
    fn test_default_key() {
        let db = database();
        let entries = AllEntries.select(&db);
        assert_eq!(
            DefaultKeyResolver.resolve_key(entries[0]),
            "KeePassTestDatabase:Internet:Facebook:Takent33"
        );
    }

    #[test]
    fn test_default_key_missing_fields() {
        let db = SecretDatabase::new(
            SecretGroup::new("Root").with_entry(SecretEntry::new().with_field(fields::PASSWORD, "x")),
        );
        let entries = db.all_entries();
        assert_eq!(DefaultKeyResolver.resolve_key(entries[0]), "Root::");
    }

    #[test]
    fn test_default_value() {
        let db = database();
        let entries = db.all_entries();
        assert_eq!(
            DefaultValueResolver.resolve_value("k", entries[0]),
            Some("s3cret".to_string())
        );
        assert_eq!(DefaultValueResolver.resolve_value("k", entries[1]), None);
    }

    #[test]
    fn test_default_value_missing_password() {
        let entry = SecretEntry::new().with_field(fields::TITLE, "no password");
        assert_eq!(DefaultValueResolver.resolve_value("k", &entry), Some(String::new()));
    }

    #[test]
    fn test_closure_strategies() {
        let db = database();
        let selector = select_with(|db: &SecretDatabase| {
            db.root()
                .group("Banking")
                .map(|g| g.entries(true))
                .unwrap_or_default()
        });
        let key = |entry: &SecretEntry| entry.title().to_lowercase();
        let value = |key: &str, entry: &SecretEntry| Some(format!("{}={}", key, entry.user_name()));

        let selected = selector.select(&db);
        assert_eq!(selected.len(), 1);
        assert_eq!(key.resolve_key(selected[0]), "bank");
        assert_eq!(
            value.resolve_value("bank", selected[0]),
            Some("bank=me".to_string())
        );
    }
}
