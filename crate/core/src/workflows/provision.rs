use tpm_locker_fapi::{KeyRequest, Session, TpmContext, TpmModule, TpmStatus};
use tpm_locker_logger::{error, info, warn};

use super::{step_error, with_session};
use crate::{AuthorizationProvider, LockerError, LockerResult, TpmConfig};

/// Result of a provisioning step that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Completed,
    /// The module was already in the state the step brings it to
    AlreadyDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub hierarchy: StepState,
    /// `None` when the creation of the storage root key is disabled
    pub storage_root: Option<StepState>,
    pub application_key: StepState,
}

/// Brings the module from any state to one holding the application key.
///
/// Running it again on a provisioned module succeeds without changing anything.
pub struct Provisioner<'a> {
    config: &'a TpmConfig,
    provider: AuthorizationProvider,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(config: &'a TpmConfig) -> Self {
        Self {
            config,
            provider: AuthorizationProvider::new(&config.auth),
        }
    }

    #[must_use]
    pub const fn with_provider(config: &'a TpmConfig, provider: AuthorizationProvider) -> Self {
        Self { config, provider }
    }

    pub fn run<M: TpmModule>(&self, module: &M) -> LockerResult<ProvisionSummary> {
        with_session(module, |session| self.run_steps(session))
    }

    fn run_steps<C: TpmContext>(&self, session: &mut Session<C>) -> LockerResult<ProvisionSummary> {
        session
            .set_auth_callback(self.provider.clone().into_callback())
            .map_err(|status| {
                error!("cannot register the authorization callback: {status}");
                LockerError::Callback(status)
            })?;

        let lockout_auth = self.config.auth.lockout_secret.as_deref().map(String::as_str);
        info!("provisioning the storage hierarchy");
        let hierarchy = match session.provision(lockout_auth) {
            Ok(()) => StepState::Completed,
            Err(TpmStatus::AlreadyProvisioned) => {
                info!("the module is already provisioned");
                StepState::AlreadyDone
            }
            Err(status) => {
                error!("Fapi_Provision failed: {status}");
                return Err(step_error(session, status, LockerError::Provision));
            }
        };
        Self::discard_callback_error(session);

        let keys = &self.config.keys;
        let storage_root = if keys.create_storage_root {
            let request = KeyRequest::new(&keys.storage_root_path, &keys.storage_root_type);
            Some(Self::create_key(session, &request)?)
        } else {
            None
        };

        let request = KeyRequest {
            path: &keys.application_key_path,
            key_type: &keys.application_key_type,
            policy_path: keys.policy_path.as_deref(),
            auth_value: self.config.auth.key_auth.as_deref().map(String::as_str),
        };
        let application_key = Self::create_key(session, &request)?;

        Ok(ProvisionSummary {
            hierarchy,
            storage_root,
            application_key,
        })
    }

    fn create_key<C: TpmContext>(
        session: &mut Session<C>,
        request: &KeyRequest<'_>,
    ) -> LockerResult<StepState> {
        info!("creating the key {}", request.path);
        let state = match session.create_key(request) {
            Ok(()) => StepState::Completed,
            Err(TpmStatus::AlreadyExists) => {
                info!("the key {} already exists", request.path);
                StepState::AlreadyDone
            }
            Err(status) => {
                error!("Fapi_CreateKey failed for {}: {status}", request.path);
                return Err(step_error(session, status, |status| LockerError::KeyCreate {
                    path: request.path.to_owned(),
                    status,
                }));
            }
        };
        Self::discard_callback_error(session);
        Ok(state)
    }

    /// A step may succeed after the module recovered from a failed
    /// authorization request. The error must not leak into the next step.
    fn discard_callback_error<C: TpmContext>(session: &mut Session<C>) {
        if let Some(e) = session.take_callback_error() {
            warn!("authorization callback failed during a successful step: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use tpm_locker_fapi::{
        TpmStatus,
        mock::{MOCK_SRK_PATH, MockTpm},
        sys::{TSS2_FAPI_RC_BAD_VALUE, TSS2_FAPI_RC_NO_TPM, TSS2_FAPI_RC_PATH_NOT_FOUND},
    };

    use super::{ProvisionSummary, Provisioner, StepState};
    use crate::{AuthorizationProvider, LockerError, TpmConfig};

    fn config() -> TpmConfig {
        let mut config = TpmConfig::default();
        config.apply_secrets(Some("lockout".to_owned()), Some("secret".to_owned()));
        config
    }

    #[test]
    fn test_fresh_module() {
        let config = config();
        let tpm = MockTpm::default();
        let summary = Provisioner::new(&config).run(&tpm).unwrap();
        assert_eq!(
            summary,
            ProvisionSummary {
                hierarchy: StepState::Completed,
                storage_root: Some(StepState::AlreadyDone),
                application_key: StepState::Completed,
            }
        );
        assert!(tpm.is_provisioned());
        assert!(tpm.has_key("/HS/SRK/locker"));
        assert_eq!(tpm.lockout_auth().as_deref(), Some("lockout"));
        assert!(tpm.secrets().iter().all(|secret| secret == "secret"));
        assert_eq!(tpm.acquired(), 1);
        assert_eq!(tpm.released(), 1);
    }

    #[test]
    fn test_provisioned_module() {
        let config = config();
        let tpm = MockTpm::provisioned();
        tpm.insert_key("/HS/SRK/locker");
        let summary = Provisioner::new(&config).run(&tpm).unwrap();
        assert_eq!(summary.hierarchy, StepState::AlreadyDone);
        assert_eq!(summary.application_key, StepState::AlreadyDone);
        assert_eq!(tpm.released(), 1);
    }

    #[test]
    fn test_provision_twice() {
        let config = config();
        let tpm = MockTpm::default();
        Provisioner::new(&config).run(&tpm).unwrap();
        Provisioner::new(&config).run(&tpm).unwrap();
        assert_eq!(tpm.acquired(), 2);
        assert_eq!(tpm.released(), 2);
    }

    #[test]
    fn test_storage_root_step_disabled() {
        let mut config = config();
        config.keys.create_storage_root = false;
        let tpm = MockTpm::default();
        let summary = Provisioner::new(&config).run(&tpm).unwrap();
        assert_eq!(summary.storage_root, None);
        assert!(tpm.has_key(MOCK_SRK_PATH));
    }

    #[test]
    fn test_init_failure() {
        let config = config();
        let tpm = MockTpm::default();
        tpm.fail_initialize(TSS2_FAPI_RC_NO_TPM);
        assert!(matches!(
            Provisioner::new(&config).run(&tpm),
            Err(LockerError::Init(TpmStatus::Other(TSS2_FAPI_RC_NO_TPM)))
        ));
        assert_eq!(tpm.released(), 0);
    }

    #[test]
    fn test_provision_failure() {
        let config = config();
        let tpm = MockTpm::default();
        tpm.fail_provision(TSS2_FAPI_RC_NO_TPM);
        assert!(matches!(
            Provisioner::new(&config).run(&tpm),
            Err(LockerError::Provision(_))
        ));
        assert_eq!(tpm.released(), 1);
    }

    #[test]
    fn test_key_failure() {
        let config = config();
        let tpm = MockTpm::default();
        tpm.fail_create_key("/HS/SRK/locker", TSS2_FAPI_RC_PATH_NOT_FOUND);
        match Provisioner::new(&config).run(&tpm) {
            Err(LockerError::KeyCreate { path, status }) => {
                assert_eq!(path, "/HS/SRK/locker");
                assert_eq!(status.raw(), TSS2_FAPI_RC_PATH_NOT_FOUND);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(tpm.released(), 1);
    }

    #[test]
    fn test_recovered_callback_error_is_not_reported_later() {
        let config = config();
        let tpm = MockTpm::default();
        tpm.anonymous_auth();
        tpm.recover_auth_failure();
        tpm.fail_create_key("/HS/SRK/locker", TSS2_FAPI_RC_PATH_NOT_FOUND);
        // provisioning succeeds despite the failed request, the key step
        // then fails on its own
        assert!(matches!(
            Provisioner::new(&config).run(&tpm),
            Err(LockerError::KeyCreate { status, .. })
                if status.raw() == TSS2_FAPI_RC_PATH_NOT_FOUND
        ));
        assert!(tpm.is_provisioned());
        assert_eq!(tpm.auth_requests(), vec![None]);
        assert_eq!(tpm.released(), 1);
    }

    #[test]
    fn test_callback_without_path() {
        let config = config();
        let tpm = MockTpm::default();
        tpm.anonymous_auth();
        let result = Provisioner::new(&config).run(&tpm);
        assert!(matches!(
            result,
            Err(LockerError::Callback(TpmStatus::Other(TSS2_FAPI_RC_BAD_VALUE)))
        ));
        assert_eq!(tpm.auth_requests(), vec![None]);
        assert!(tpm.secrets().is_empty());
        assert_eq!(tpm.released(), 1);
    }

    #[test]
    fn test_single_secret_passed_unchanged() {
        let config = TpmConfig::default();
        let tpm = MockTpm::default();
        Provisioner::with_provider(&config, AuthorizationProvider::single("35b5835b28fe42d0"))
            .run(&tpm)
            .unwrap();
        let secrets = tpm.secrets();
        assert!(!secrets.is_empty());
        assert!(secrets.iter().all(|secret| secret == "35b5835b28fe42d0"));
    }
}
