//! In-memory stand-in for the FAPI library.
//!
//! Behaves like a TPM with a software FAPI keystore: provisioning creates the
//! storage root key once, keys live under their FAPI path, and failures can be
//! injected per operation. Authorization callbacks are invoked the way FAPI
//! invokes them, so the workflows can be exercised end to end.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use tpm_locker_logger::debug;

use crate::{
    AuthCallback, FError, KeyRequest, StatusDecoder, TpmContext, TpmModule, TpmStatus,
    sys::{
        TSS2_FAPI_RC_AUTHORIZATION_FAILED, TSS2_FAPI_RC_NOT_PROVISIONED,
        TSS2_FAPI_RC_PATH_NOT_FOUND, TSS2_RC,
    },
};

/// Path of the storage root key created by provisioning
pub const MOCK_SRK_PATH: &str = "/HS/SRK";

const INFO: &str = r#"{"version":"tpm2-tss mock","fapi_config":{"profile_name":"P_ECCP256SHA256"}}"#;

#[derive(Default)]
struct MockState {
    provisioned: bool,
    keys: BTreeSet<String>,
    lockout_auth: Option<String>,
    acquired: usize,
    released: usize,
    fail_initialize: Option<TSS2_RC>,
    fail_get_info: Option<TSS2_RC>,
    fail_provision: Option<TSS2_RC>,
    fail_create_key: BTreeMap<String, TSS2_RC>,
    fail_encrypt: Option<TSS2_RC>,
    passthrough: bool,
    anonymous_auth: bool,
    recover_auth_failure: bool,
    auth_requests: Vec<Option<String>>,
    secrets: Vec<String>,
}

/// Mock TPM module. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockTpm {
    state: Rc<RefCell<MockState>>,
}

impl MockTpm {
    /// A TPM on which provisioning already happened
    #[must_use]
    pub fn provisioned() -> Self {
        let tpm = Self::default();
        {
            let mut state = tpm.state.borrow_mut();
            state.provisioned = true;
            state.keys.insert(MOCK_SRK_PATH.to_owned());
        }
        tpm
    }

    pub fn insert_key(&self, path: &str) {
        self.state.borrow_mut().keys.insert(path.to_owned());
    }

    #[must_use]
    pub fn has_key(&self, path: &str) -> bool {
        self.state.borrow().keys.contains(path)
    }

    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.state.borrow().provisioned
    }

    #[must_use]
    pub fn lockout_auth(&self) -> Option<String> {
        self.state.borrow().lockout_auth.clone()
    }

    /// Number of contexts successfully initialized
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.state.borrow().acquired
    }

    /// Number of contexts finalized
    #[must_use]
    pub fn released(&self) -> usize {
        self.state.borrow().released
    }

    /// Object paths of the authorization requests, in order
    #[must_use]
    pub fn auth_requests(&self) -> Vec<Option<String>> {
        self.state.borrow().auth_requests.clone()
    }

    /// Authorization values returned by the callback, in order
    #[must_use]
    pub fn secrets(&self) -> Vec<String> {
        self.state.borrow().secrets.clone()
    }

    pub fn fail_initialize(&self, rc: TSS2_RC) {
        self.state.borrow_mut().fail_initialize = Some(rc);
    }

    pub fn fail_get_info(&self, rc: TSS2_RC) {
        self.state.borrow_mut().fail_get_info = Some(rc);
    }

    pub fn fail_provision(&self, rc: TSS2_RC) {
        self.state.borrow_mut().fail_provision = Some(rc);
    }

    pub fn fail_create_key(&self, path: &str, rc: TSS2_RC) {
        self.state
            .borrow_mut()
            .fail_create_key
            .insert(path.to_owned(), rc);
    }

    pub fn fail_encrypt(&self, rc: TSS2_RC) {
        self.state.borrow_mut().fail_encrypt = Some(rc);
    }

    /// Make encryption return the plaintext unchanged
    pub fn passthrough(&self) {
        self.state.borrow_mut().passthrough = true;
    }

    /// Make authorization requests omit the object path
    pub fn anonymous_auth(&self) {
        self.state.borrow_mut().anonymous_auth = true;
    }

    /// Make operations go on when the callback fails, as FAPI does when
    /// another authorization mechanism satisfies the object
    pub fn recover_auth_failure(&self) {
        self.state.borrow_mut().recover_auth_failure = true;
    }
}

impl StatusDecoder for MockTpm {
    fn decode_status(&self, rc: TSS2_RC) -> Option<String> {
        TpmStatus::from_raw(rc).describe().map(ToOwned::to_owned)
    }
}

impl TpmModule for MockTpm {
    type Context = MockContext;

    fn initialize(&self) -> Result<MockContext, TpmStatus> {
        let mut state = self.state.borrow_mut();
        if let Some(rc) = state.fail_initialize {
            return Err(TpmStatus::from_raw(rc));
        }
        state.acquired += 1;
        Ok(MockContext {
            state: self.state.clone(),
            callback: None,
            callback_error: None,
            finalized: false,
        })
    }
}

pub struct MockContext {
    state: Rc<RefCell<MockState>>,
    callback: Option<AuthCallback>,
    callback_error: Option<FError>,
    finalized: bool,
}

impl MockContext {
    /// Ask the callback for the authorization value of `path`, as FAPI does
    /// before using a protected object.
    fn authorize(&mut self, path: &str) -> Result<(), TpmStatus> {
        let Some(callback) = self.callback.as_mut() else {
            return Err(TpmStatus::Other(TSS2_FAPI_RC_AUTHORIZATION_FAILED));
        };
        let object_path = if self.state.borrow().anonymous_auth {
            None
        } else {
            Some(path)
        };
        self.state
            .borrow_mut()
            .auth_requests
            .push(object_path.map(ToOwned::to_owned));
        match callback(object_path, Some("mock object")) {
            Ok(secret) => {
                self.state.borrow_mut().secrets.push(secret.as_str().to_owned());
                Ok(())
            }
            Err(e) => {
                let status = TpmStatus::from_raw(e.return_code());
                self.callback_error = Some(e);
                if self.state.borrow().recover_auth_failure {
                    return Ok(());
                }
                Err(status)
            }
        }
    }

    fn parent(path: &str) -> &str {
        match path.rfind('/') {
            Some(0) | None => path,
            Some(index) => &path[..index],
        }
    }
}

impl TpmContext for MockContext {
    fn finalize(&mut self) {
        if !self.finalized {
            self.finalized = true;
            self.callback = None;
            self.state.borrow_mut().released += 1;
        }
    }

    fn get_info(&mut self) -> Result<String, TpmStatus> {
        if let Some(rc) = self.state.borrow().fail_get_info {
            return Err(TpmStatus::from_raw(rc));
        }
        Ok(INFO.to_owned())
    }

    fn set_auth_callback(&mut self, callback: AuthCallback) -> Result<(), TpmStatus> {
        self.callback = Some(callback);
        Ok(())
    }

    fn take_callback_error(&mut self) -> Option<FError> {
        self.callback_error.take()
    }

    fn provision(&mut self, lockout_auth: Option<&str>) -> Result<(), TpmStatus> {
        if let Some(rc) = self.state.borrow().fail_provision {
            return Err(TpmStatus::from_raw(rc));
        }
        if self.state.borrow().provisioned {
            return Err(TpmStatus::AlreadyProvisioned);
        }
        self.authorize("/HS")?;
        let mut state = self.state.borrow_mut();
        state.provisioned = true;
        state.lockout_auth = lockout_auth.map(ToOwned::to_owned);
        state.keys.insert(MOCK_SRK_PATH.to_owned());
        debug!("mock TPM provisioned");
        Ok(())
    }

    fn create_key(&mut self, request: &KeyRequest<'_>) -> Result<(), TpmStatus> {
        let injected = self.state.borrow().fail_create_key.get(request.path).copied();
        if let Some(rc) = injected {
            return Err(TpmStatus::from_raw(rc));
        }
        if !self.state.borrow().provisioned {
            return Err(TpmStatus::Other(TSS2_FAPI_RC_NOT_PROVISIONED));
        }
        if self.state.borrow().keys.contains(request.path) {
            return Err(TpmStatus::AlreadyExists);
        }
        self.authorize(Self::parent(request.path))?;
        self.state
            .borrow_mut()
            .keys
            .insert(request.path.to_owned());
        Ok(())
    }

    fn encrypt(&mut self, key_path: &str, plaintext: &[u8]) -> Result<Vec<u8>, TpmStatus> {
        let state = self.state.borrow();
        if let Some(rc) = state.fail_encrypt {
            return Err(TpmStatus::from_raw(rc));
        }
        if !state.keys.contains(key_path) {
            return Err(TpmStatus::Other(TSS2_FAPI_RC_PATH_NOT_FOUND));
        }
        if state.passthrough {
            return Ok(plaintext.to_vec());
        }
        Ok(plaintext.iter().map(|byte| byte ^ 0xa5).collect())
    }
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use zeroize::Zeroizing;

    use super::{MOCK_SRK_PATH, MockContext, MockTpm};
    use crate::{KeyRequest, TpmContext, TpmModule, TpmStatus};

    #[test]
    fn test_parent() {
        assert_eq!(MockContext::parent("/HS/SRK/locker"), "/HS/SRK");
        assert_eq!(MockContext::parent("/HS"), "/HS");
    }

    #[test]
    fn test_mock_lifecycle() {
        let tpm = MockTpm::default();
        let mut context = tpm.initialize().unwrap();
        context
            .set_auth_callback(Box::new(|_path, _description| {
                Ok(Zeroizing::new("pw".to_owned()))
            }))
            .unwrap();

        let request = KeyRequest::new("/HS/SRK/locker", "sign,decrypt");
        assert!(context.create_key(&request).is_err());
        context.provision(Some("lockout")).unwrap();
        assert_eq!(context.provision(None), Err(TpmStatus::AlreadyProvisioned));
        context.create_key(&request).unwrap();
        assert_eq!(context.create_key(&request), Err(TpmStatus::AlreadyExists));
        assert!(tpm.has_key(MOCK_SRK_PATH));

        let ciphertext = context.encrypt("/HS/SRK/locker", &[0, 1, 2]).unwrap();
        assert_eq!(ciphertext, vec![0xa5, 0xa4, 0xa7]);
        assert_eq!(tpm.lockout_auth().as_deref(), Some("lockout"));

        drop(context);
        assert_eq!(tpm.released(), 1);
    }
}
