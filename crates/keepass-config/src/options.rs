//! Declarative source options
//!
//! Lets a KeePass source be described in the host's own configuration
//! files. The password can be given inline or, preferably, through an
//! environment variable.
//!
//! ```toml
//! path = "/etc/app/secrets.kdbx"
//! password_env = "APP_KEEPASS_PASSWORD"
//! optional = true
//! ```

use crate::credential::UnlockCredential;
use crate::error::{ConfigError, Result};
use crate::source::KeePassSource;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Options describing one KeePass source
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeePassOptions {
    /// Path to the database file
    pub path: PathBuf,
    /// Master password
    pub password: Option<String>,
    /// Environment variable holding the master password
    pub password_env: Option<String>,
    /// Add the platform-identity factor
    pub use_platform_identity: bool,
    /// Treat a missing file as empty configuration
    pub optional: bool,
    pub reload_on_change: bool,
}

impl fmt::Debug for KeePassOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeePassOptions")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("use_platform_identity", &self.use_platform_identity)
            .field("optional", &self.optional)
            .field("reload_on_change", &self.reload_on_change)
            .finish()
    }
}

impl KeePassOptions {
    /// Resolve the password from the inline value or the environment
    fn resolve_password(&self) -> Result<Option<String>> {
        match (&self.password, &self.password_env) {
            (Some(_), Some(_)) => Err(ConfigError::invalid_options(
                "password and password_env are mutually exclusive",
            )),
            (Some(password), None) => Ok(Some(password.clone())),
            (None, Some(var)) => std::env::var(var)
                .map(Some)
                .map_err(|_| ConfigError::MissingEnvironment(var.clone())),
            (None, None) => Ok(None),
        }
    }

    /// Build the described source
    pub fn into_source(self) -> Result<KeePassSource> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid_options("path must not be empty"));
        }

        let password = self.resolve_password()?;
        let credential = UnlockCredential::from_inputs(password.as_deref(), self.use_platform_identity);

        Ok(KeePassSource::builder(self.path)
            .credential(credential)
            .optional(self.optional)
            .reload_on_change(self.reload_on_change)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_toml() {
        let options: KeePassOptions = toml::from_str(
            r#"
            path = "secrets.kdbx"
            password = "1234"
            optional = true
            "#,
        )
        .unwrap();

        assert_eq!(options.path, PathBuf::from("secrets.kdbx"));
        assert!(options.optional);
        assert!(!options.use_platform_identity);

        let source = options.into_source().unwrap();
        assert_eq!(source.path(), Path::new("secrets.kdbx"));
        assert_eq!(source.credential(), &UnlockCredential::new().with_password("1234"));
        assert!(source.optional());
    }

    #[test]
    fn test_parse_json_rejects_unknown_fields() {
        let result: std::result::Result<KeePassOptions, _> =
            serde_json::from_str(r#"{"path": "a.kdbx", "pasword": "typo"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_password_from_environment() {
        std::env::set_var("KEEPASS_CONFIG_TEST_PASSWORD", "from-env");
        let options = KeePassOptions {
            path: "a.kdbx".into(),
            password_env: Some("KEEPASS_CONFIG_TEST_PASSWORD".into()),
            use_platform_identity: true,
            ..Default::default()
        };

        let source = options.into_source().unwrap();
        assert_eq!(
            source.credential(),
            &UnlockCredential::from_inputs(Some("from-env"), true)
        );
        std::env::remove_var("KEEPASS_CONFIG_TEST_PASSWORD");
    }

    #[test]
    fn test_missing_environment_variable() {
        let options = KeePassOptions {
            path: "a.kdbx".into(),
            password_env: Some("KEEPASS_CONFIG_TEST_UNSET_VARIABLE".into()),
            ..Default::default()
        };
        assert!(matches!(
            options.into_source(),
            Err(ConfigError::MissingEnvironment(var)) if var == "KEEPASS_CONFIG_TEST_UNSET_VARIABLE"
        ));
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(matches!(
            KeePassOptions::default().into_source(),
            Err(ConfigError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let options = KeePassOptions {
            path: "a.kdbx".into(),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", options).contains("hunter2"));
    }
}
