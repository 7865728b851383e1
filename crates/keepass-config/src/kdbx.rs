//! KDBX database binding
//!
//! Opens KeePass database files through the `keepass` crate and converts
//! the decrypted tree into a [`SecretDatabase`]. Decryption, key
//! derivation and parsing are all done by that crate; this module only
//! maps credentials in and nodes out.

use crate::credential::{CredentialFactor, PlatformKeySource, UnlockCredential};
use crate::error::StoreError;
use crate::store::{SecretDatabase, SecretEntry, SecretGroup, StoreOpener};
use keepass::db::{Entry, Group, Node};
use keepass::{Database, DatabaseKey};
use std::fs::File;
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;

/// [`StoreOpener`] for KDBX files on disk
#[derive(Debug, Clone, Default)]
pub struct KdbxOpener {
    platform_key: Option<Arc<dyn PlatformKeySource>>,
}

impl KdbxOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `source` to resolve platform-identity factors
    pub fn with_platform_key(mut self, source: Arc<dyn PlatformKeySource>) -> Self {
        self.platform_key = Some(source);
        self
    }

    /// Translate an unlock credential into the reader's key type
    ///
    /// Platform key material is handed over as a 32-byte key file, which the
    /// reader uses verbatim as that factor's contribution. The reader keys
    /// on a single password, so a credential holding more than one password
    /// factor is rejected.
    fn database_key(&self, credential: &UnlockCredential) -> Result<DatabaseKey, StoreError> {
        let passwords = credential
            .factors()
            .iter()
            .filter(|f| matches!(f, CredentialFactor::Password(_)))
            .count();
        if passwords > 1 {
            return Err(StoreError::invalid_credential(format!(
                "KDBX databases take one password factor, got {}",
                passwords
            )));
        }

        let mut key = DatabaseKey::new();

        for factor in credential.factors() {
            key = match factor {
                CredentialFactor::Password(password) => key.with_password(password.as_str()),
                CredentialFactor::PlatformIdentity => {
                    let source = self.platform_key.as_deref().ok_or_else(|| {
                        StoreError::PlatformIdentityUnavailable(
                            "no platform key source configured".to_string(),
                        )
                    })?;
                    let user_key = source.user_key()?;
                    key.with_keyfile(&mut Cursor::new(user_key.as_slice()))?
                }
            };
        }

        Ok(key)
    }
}

impl StoreOpener for KdbxOpener {
    fn open(&self, location: &Path, credential: &UnlockCredential) -> Result<SecretDatabase, StoreError> {
        let mut file = File::open(location).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound {
                path: location.to_path_buf(),
            },
            _ => StoreError::Io(e),
        })?;

        tracing::debug!(
            path = %location.display(),
            factors = credential.len(),
            "Opening KDBX database"
        );

        let key = self.database_key(credential)?;
        let database = Database::open(&mut file, key)?;

        Ok(SecretDatabase::new(convert_group(&database.root)))
    }
}

fn convert_group(group: &Group) -> SecretGroup {
    let mut converted = SecretGroup::new(group.name.clone());

    for node in &group.children {
        match node {
            Node::Group(child) => converted.push_group(convert_group(child)),
            Node::Entry(entry) => converted.push_entry(convert_entry(entry)),
        }
    }

    converted
}

fn convert_entry(entry: &Entry) -> SecretEntry {
    let mut converted = SecretEntry::new();

    for name in entry.fields.keys() {
        // Binary fields have no string form and are skipped.
        if let Some(value) = entry.get(name) {
            converted.set_field(name.clone(), value);
        }
    }

    converted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticUserKey;
    use crate::framework::{ConfigData, ConfigurationProvider};
    use crate::provider::KeePassConfigurationProvider;
    use crate::source::KeePassSource;
    use crate::store::fields;
    use keepass::config::DatabaseConfig;
    use keepass::db::Value;
    use keepass::error::DatabaseOpenError;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.kdbx");

        let result = KdbxOpener::new().open(&path, &UnlockCredential::new().with_password("1234"));
        match result {
            Err(StoreError::NotFound { path: reported }) => assert_eq!(reported, path),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_file_fails_to_unlock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.kdbx");
        std::fs::write(&path, b"this is not a keepass database").unwrap();

        let err = KdbxOpener::new()
            .open(&path, &UnlockCredential::new().with_password("1234"))
            .unwrap_err();
        assert!(err.is_unlock_failure(), "unexpected error: {:?}", err);
    }

    #[test]
    fn test_platform_identity_without_source() {
        let opener = KdbxOpener::new();
        let result = opener.database_key(&UnlockCredential::new().with_platform_identity());
        assert!(matches!(result, Err(StoreError::PlatformIdentityUnavailable(_))));

        let opener = KdbxOpener::new().with_platform_key(Arc::new(StaticUserKey::new([3u8; 32])));
        assert!(opener
            .database_key(&UnlockCredential::new().with_password("pw").with_platform_identity())
            .is_ok());
    }

    #[test]
    fn test_two_passwords_are_rejected() {
        let credential = UnlockCredential::new().with_password("one").with_password("two");
        let result = KdbxOpener::new().database_key(&credential);
        assert!(matches!(result, Err(StoreError::InvalidCredential(_))));
    }

    fn text(value: &str) -> Value {
        Value::Unprotected(value.to_string())
    }

    fn entry(title: &str, user_name: &str, password: &str) -> Node {
        let mut entry = Entry::new();
        entry.fields.insert(fields::TITLE.to_string(), text(title));
        entry.fields.insert(fields::USER_NAME.to_string(), text(user_name));
        entry.fields.insert(fields::PASSWORD.to_string(), text(password));
        Node::Entry(entry)
    }

    /// Write a small database to `path`, locked with `credential`
    fn write_database(opener: &KdbxOpener, path: &Path, credential: &UnlockCredential) {
        let mut db = Database::new(DatabaseConfig::default());
        db.root.name = "KeePassTestDatabase".to_string();

        let mut internet = Group::new("Internet");
        internet.children.push(entry("Facebook", "Takent33", "ohs1Ahquae"));
        internet
            .children
            .push(entry("npm", "FrancesRBenjamin@teleworm.us", "Password"));
        db.root.children.push(Node::Group(internet));

        let mut duplicates = Group::new("Duplicate Entries");
        for password in ["first", "second"] {
            duplicates
                .children
                .push(entry("Duplicate Entry", "BaconRules", password));
        }
        db.root.children.push(Node::Group(duplicates));

        let key = opener.database_key(credential).unwrap();
        let mut file = File::create(path).unwrap();
        db.save(&mut file, key).unwrap();
    }

    fn load(opener: KdbxOpener, path: &Path, credential: UnlockCredential) -> ConfigData {
        let source = KeePassSource::builder(path)
            .credential(credential)
            .opener(opener)
            .build();
        let mut provider = KeePassConfigurationProvider::new(source);
        provider.load().unwrap();
        provider.data().clone()
    }

    #[test]
    fn test_password_database_maps_default_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.kdbx");
        let credential = UnlockCredential::new().with_password("1234");
        write_database(&KdbxOpener::new(), &path, &credential);

        let data = load(KdbxOpener::new(), &path, credential);
        assert_eq!(data.len(), 4);
        assert_eq!(
            data.get("KeePassTestDatabase:Internet:Facebook:Takent33"),
            Some(Some("ohs1Ahquae"))
        );
        assert_eq!(
            data.get("KeePassTestDatabase:Internet:npm:FrancesRBenjamin@teleworm.us"),
            Some(None)
        );
        assert_eq!(
            data.get("KeePassTestDatabase:Duplicate Entries:Duplicate Entry:BaconRules"),
            Some(Some("first"))
        );
        assert_eq!(
            data.get("KeePassTestDatabase:Duplicate Entries:Duplicate Entry:BaconRules`1"),
            Some(Some("second"))
        );
    }

    #[test]
    fn test_password_and_platform_key_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.kdbx");
        let opener = KdbxOpener::new().with_platform_key(Arc::new(StaticUserKey::new([7u8; 32])));
        let credential = UnlockCredential::from_inputs(Some("1234"), true);
        write_database(&opener, &path, &credential);

        let data = load(opener, &path, credential);
        assert_eq!(
            data.get("KeePassTestDatabase:Internet:Facebook:Takent33"),
            Some(Some("ohs1Ahquae"))
        );

        // The password alone does not open it
        let result = KdbxOpener::new().open(&path, &UnlockCredential::new().with_password("1234"));
        assert!(matches!(result, Err(StoreError::Kdbx(_))));
    }

    #[test]
    fn test_empty_credential_is_rejected_by_reader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.kdbx");
        write_database(&KdbxOpener::new(), &path, &UnlockCredential::new().with_password("1234"));

        let result = KdbxOpener::new().open(&path, &UnlockCredential::new());
        assert!(matches!(
            result,
            Err(StoreError::Kdbx(DatabaseOpenError::Key(_)))
        ));
    }
}
