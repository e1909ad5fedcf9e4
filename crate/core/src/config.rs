//! Configuration of the workflows, read from a TOML file.
//!
//! ```toml
//! [fapi]
//! library = "libtss2-fapi.so.1"
//! rc_library = "libtss2-rc.so.0"
//!
//! [keys]
//! application_key_path = "/HS/SRK/locker"
//!
//! [auth]
//! lockout_secret = "..."
//! default_secret = "..."
//!
//! [auth.path_secrets]
//! "/HS/SRK" = "..."
//! ```

use std::{
    collections::BTreeMap,
    env,
    fmt::{self, Debug, Formatter},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tpm_locker_fapi::{FAPI_LIB_DEFAULT, RC_LIB_DEFAULT};
use tpm_locker_logger::{debug, info};
use zeroize::Zeroizing;

use crate::{LockerError, LockerResult};

/// Environment variable holding the path of the configuration file
pub const TPM_LOCKER_CONF_ENV: &str = "TPM_LOCKER_CONF";
/// Environment variable overriding `auth.lockout_secret`
pub const TPM_LOCKER_LOCKOUT_SECRET_ENV: &str = "TPM_LOCKER_LOCKOUT_SECRET";
/// Environment variable overriding `auth.default_secret`
pub const TPM_LOCKER_AUTH_SECRET_ENV: &str = "TPM_LOCKER_AUTH_SECRET";
/// Configuration file used when none is specified
pub const DEFAULT_CONF_PATH: &str = "/etc/tpm-locker/tpm-locker.toml";

const STORAGE_ROOT_PATH_DEFAULT: &str = "/HS/SRK";
const STORAGE_ROOT_TYPE_DEFAULT: &str = "restricted,decrypt,noDa";
const APPLICATION_KEY_PATH_DEFAULT: &str = "/HS/SRK/locker";
const APPLICATION_KEY_TYPE_DEFAULT: &str = "sign,decrypt";
const PAYLOAD_LENGTH_DEFAULT: usize = 128;
/// RSA-OAEP with a 4096-bit key and SHA-1 takes at most 470 bytes
pub const PAYLOAD_LENGTH_MAX: usize = 512;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TpmConfig {
    pub fapi: FapiConfig,
    pub keys: KeysConfig,
    pub auth: AuthConfig,
    pub encrypt: EncryptConfig,
}

/// Location of the tpm2-tss libraries
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct FapiConfig {
    pub library: String,
    /// The decoding library is optional; without it, the built-in descriptions are used
    pub rc_library: Option<String>,
}

impl Default for FapiConfig {
    fn default() -> Self {
        Self {
            library: FAPI_LIB_DEFAULT.to_owned(),
            rc_library: Some(RC_LIB_DEFAULT.to_owned()),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct KeysConfig {
    pub storage_root_path: String,
    /// Create the storage root key explicitly after provisioning
    pub create_storage_root: bool,
    pub storage_root_type: String,
    /// Key used by the encryption test
    pub application_key_path: String,
    pub application_key_type: String,
    pub policy_path: Option<String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            storage_root_path: STORAGE_ROOT_PATH_DEFAULT.to_owned(),
            create_storage_root: true,
            storage_root_type: STORAGE_ROOT_TYPE_DEFAULT.to_owned(),
            application_key_path: APPLICATION_KEY_PATH_DEFAULT.to_owned(),
            application_key_type: APPLICATION_KEY_TYPE_DEFAULT.to_owned(),
            policy_path: None,
        }
    }
}

/// Authorization values. None of them is ever logged.
#[derive(Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Lockout authorization set when provisioning
    pub lockout_secret: Option<Zeroizing<String>>,
    /// Answer to authorization requests for paths without a specific secret
    pub default_secret: Option<Zeroizing<String>>,
    /// Secrets per object path; a path also covers the objects below it
    pub path_secrets: BTreeMap<String, Zeroizing<String>>,
    /// Authorization value of the application key
    pub key_auth: Option<Zeroizing<String>>,
}

impl Debug for AuthConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";
        let redact = |secret: &Option<Zeroizing<String>>| secret.as_ref().map(|_| REDACTED);
        f.debug_struct("AuthConfig")
            .field("lockout_secret", &redact(&self.lockout_secret))
            .field("default_secret", &redact(&self.default_secret))
            .field("path_secrets", &self.path_secrets.keys().collect::<Vec<_>>())
            .field("key_auth", &redact(&self.key_auth))
            .finish()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EncryptConfig {
    /// Length of the test plaintext, in bytes
    pub payload_length: usize,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            payload_length: PAYLOAD_LENGTH_DEFAULT,
        }
    }
}

impl TpmConfig {
    /// Load the configuration.
    ///
    /// The file is, in order: `conf_path`, then the default file if it exists.
    /// Without a file, the built-in defaults are used. The secrets found in
    /// the environment override those of the file.
    pub fn load(conf_path: Option<&Path>) -> LockerResult<Self> {
        let mut conf = match Self::locate(conf_path) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("no configuration file, using the defaults");
                Self::default()
            }
        };
        conf.apply_secrets(
            env::var(TPM_LOCKER_LOCKOUT_SECRET_ENV).ok(),
            env::var(TPM_LOCKER_AUTH_SECRET_ENV).ok(),
        );
        conf.validate()?;
        Ok(conf)
    }

    fn locate(conf_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = conf_path {
            return Some(path.to_path_buf());
        }
        let default = PathBuf::from(DEFAULT_CONF_PATH);
        default.exists().then_some(default)
    }

    pub fn from_file(path: &Path) -> LockerResult<Self> {
        info!("reading the configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            LockerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let conf: Self = toml::from_str(&content)?;
        Ok(conf)
    }

    /// Override the lockout and default secrets, ignoring empty values
    pub fn apply_secrets(&mut self, lockout: Option<String>, default: Option<String>) {
        if let Some(lockout) = lockout.filter(|s| !s.is_empty()) {
            self.auth.lockout_secret = Some(Zeroizing::new(lockout));
        }
        if let Some(default) = default.filter(|s| !s.is_empty()) {
            self.auth.default_secret = Some(Zeroizing::new(default));
        }
    }

    pub fn validate(&self) -> LockerResult<()> {
        for (name, path) in [
            ("keys.storage_root_path", &self.keys.storage_root_path),
            ("keys.application_key_path", &self.keys.application_key_path),
        ] {
            if !path.starts_with('/') {
                return Err(LockerError::Config(format!(
                    "{name} must be an absolute FAPI path, got {path:?}"
                )));
            }
        }
        if self.keys.application_key_type.trim().is_empty() {
            return Err(LockerError::Config(
                "keys.application_key_type must not be empty".to_owned(),
            ));
        }
        if !(1..=PAYLOAD_LENGTH_MAX).contains(&self.encrypt.payload_length) {
            return Err(LockerError::Config(format!(
                "encrypt.payload_length must be between 1 and {PAYLOAD_LENGTH_MAX}, got {}",
                self.encrypt.payload_length
            )));
        }
        if self.fapi.library.is_empty() {
            return Err(LockerError::Config("fapi.library must not be empty".to_owned()));
        }
        Ok(())
    }
}
