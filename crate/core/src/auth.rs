use std::collections::BTreeMap;

use tpm_locker_fapi::{AuthCallback, FError, FResult};
use tpm_locker_logger::{debug, info};
use zeroize::Zeroizing;

use crate::config::AuthConfig;

/// Answers the authorization requests of the module.
///
/// A secret is resolved from, in order: the secret configured for the exact
/// object path, the secret of the longest configured path containing it,
/// and the default secret. Paths are compared without their cryptographic
/// profile, so `/P_ECCP256SHA256/HS/SRK` is covered by an `/HS/SRK` entry.
#[derive(Clone, Default)]
pub struct AuthorizationProvider {
    path_secrets: BTreeMap<String, Zeroizing<String>>,
    default_secret: Option<Zeroizing<String>>,
}

impl AuthorizationProvider {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            path_secrets: config
                .path_secrets
                .iter()
                .map(|(path, secret)| (normalize(path).to_owned(), secret.clone()))
                .collect(),
            default_secret: config.default_secret.clone(),
        }
    }

    /// A provider answering every request with `secret`
    #[must_use]
    pub fn single(secret: &str) -> Self {
        Self {
            path_secrets: BTreeMap::new(),
            default_secret: Some(Zeroizing::new(secret.to_owned())),
        }
    }

    /// Resolve the secret of an object.
    ///
    /// # Errors
    /// - `BadValue` when the path is absent or empty
    /// - `AuthorizationUnknown` when no secret covers the path
    pub fn resolve(&self, object_path: Option<&str>) -> FResult<Zeroizing<String>> {
        let path = match object_path.map(normalize) {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(FError::BadValue(
                    "authorization requested without an object path".to_owned(),
                ));
            }
        };
        if let Some(secret) = self.path_secrets.get(path) {
            return Ok(secret.clone());
        }
        let prefix = self
            .path_secrets
            .iter()
            .filter(|(prefix, _)| covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((_, secret)) = prefix {
            return Ok(secret.clone());
        }
        self.default_secret
            .clone()
            .ok_or_else(|| FError::AuthorizationUnknown(path.to_owned()))
    }

    /// The callback to register with the session
    #[must_use]
    pub fn into_callback(self) -> AuthCallback {
        Box::new(move |object_path, description| {
            info!(
                "authorization requested for {} ({})",
                object_path.unwrap_or("<no path>"),
                description.unwrap_or("no description")
            );
            let secret = self.resolve(object_path);
            if let Err(e) = &secret {
                debug!("no authorization value returned: {e}");
            }
            secret
        })
    }
}

/// Leading component naming the FAPI profile, e.g. `/P_ECCP256SHA256`
const PROFILE_PREFIX: &str = "/P_";

fn normalize(path: &str) -> &str {
    let trimmed = path.trim();
    let trimmed = if trimmed.len() > 1 {
        trimmed.trim_end_matches('/')
    } else {
        trimmed
    };
    strip_profile(trimmed)
}

fn strip_profile(path: &str) -> &str {
    if !path.starts_with(PROFILE_PREFIX) {
        return path;
    }
    match path[1..].find('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// `prefix` is `path` itself or one of its ancestors
fn covers(prefix: &str, path: &str) -> bool {
    prefix == "/"
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use tpm_locker_fapi::FError;
    use zeroize::Zeroizing;

    use super::AuthorizationProvider;
    use crate::config::AuthConfig;

    fn provider() -> AuthorizationProvider {
        let mut config = AuthConfig {
            default_secret: Some(Zeroizing::new("default".to_owned())),
            ..AuthConfig::default()
        };
        config
            .path_secrets
            .insert("/HS/SRK".to_owned(), Zeroizing::new("srk".to_owned()));
        config
            .path_secrets
            .insert("/HS/SRK/locker/".to_owned(), Zeroizing::new("locker".to_owned()));
        AuthorizationProvider::new(&config)
    }

    #[test]
    fn test_missing_path_is_bad_value() {
        let provider = AuthorizationProvider::single("secret");
        assert!(matches!(provider.resolve(None), Err(FError::BadValue(_))));
        assert!(matches!(provider.resolve(Some("")), Err(FError::BadValue(_))));
        assert!(matches!(provider.resolve(Some("  ")), Err(FError::BadValue(_))));
    }

    #[test]
    fn test_single_secret() {
        let provider = AuthorizationProvider::single("35b5835b28fe42d0");
        for path in ["/HS", "/HS/SRK", "/HS/SRK/locker", "/P_ECCP256SHA256/HS/SRK"] {
            assert_eq!(provider.resolve(Some(path)).unwrap().as_str(), "35b5835b28fe42d0");
        }
    }

    #[test]
    fn test_resolution_order() {
        let provider = provider();
        assert_eq!(provider.resolve(Some("/HS/SRK")).unwrap().as_str(), "srk");
        assert_eq!(provider.resolve(Some("/HS/SRK/locker")).unwrap().as_str(), "locker");
        assert_eq!(provider.resolve(Some("/HS/SRK/locker/child")).unwrap().as_str(), "locker");
        assert_eq!(provider.resolve(Some("/HS/SRK/other")).unwrap().as_str(), "srk");
        // a prefix only covers whole path components
        assert_eq!(provider.resolve(Some("/HS/SRKX")).unwrap().as_str(), "default");
        assert_eq!(provider.resolve(Some("/HE")).unwrap().as_str(), "default");
    }

    #[test]
    fn test_profile_prefixed_paths() {
        let mut config = AuthConfig::default();
        config
            .path_secrets
            .insert("/HS/SRK".to_owned(), Zeroizing::new("srk".to_owned()));
        config.path_secrets.insert(
            "/P_RSA2048SHA256/HS/SRK/locker".to_owned(),
            Zeroizing::new("locker".to_owned()),
        );
        let provider = AuthorizationProvider::new(&config);
        assert_eq!(
            provider.resolve(Some("/P_ECCP256SHA256/HS/SRK")).unwrap().as_str(),
            "srk"
        );
        assert_eq!(
            provider.resolve(Some("/P_ECCP256SHA256/HS/SRK/other")).unwrap().as_str(),
            "srk"
        );
        assert_eq!(provider.resolve(Some("/HS/SRK/locker")).unwrap().as_str(), "locker");
        assert!(matches!(
            provider.resolve(Some("/P_ECCP256SHA256/HE/EK")),
            Err(FError::AuthorizationUnknown(path)) if path == "/HE/EK"
        ));
    }

    #[test]
    fn test_unknown_path() {
        let mut config = AuthConfig::default();
        config
            .path_secrets
            .insert("/HS/SRK".to_owned(), Zeroizing::new("srk".to_owned()));
        let provider = AuthorizationProvider::new(&config);
        assert!(matches!(
            provider.resolve(Some("/HE/EK")),
            Err(FError::AuthorizationUnknown(path)) if path == "/HE/EK"
        ));
    }

    #[test]
    fn test_callback() {
        let mut callback = AuthorizationProvider::single("pw").into_callback();
        assert_eq!(callback(Some("/HS"), Some("owner hierarchy")).unwrap().as_str(), "pw");
        assert!(callback(None, None).is_err());
        // the module may ask any number of times
        assert_eq!(callback(Some("/HS"), None).unwrap().as_str(), "pw");
    }
}
