use tpm_locker_logger::{debug, trace};

use crate::{
    AuthCallback, FError, KeyRequest, TpmContext, TpmModule, TpmStatus,
    sys::TSS2_FAPI_RC_BAD_SEQUENCE,
};

/// A scoped FAPI context.
///
/// The context is created by [`Session::acquire`] and released exactly once,
/// either explicitly with [`Session::release`] or when the session is dropped,
/// whichever comes first. Operations on a released session fail with
/// `TSS2_FAPI_RC_BAD_SEQUENCE`.
pub struct Session<C: TpmContext> {
    context: Option<C>,
}

impl<C: TpmContext> Session<C> {
    /// Initialize a new context on the module.
    pub fn acquire<M>(module: &M) -> Result<Self, TpmStatus>
    where
        M: TpmModule<Context = C>,
    {
        let context = module.initialize()?;
        debug!("FAPI session acquired");
        Ok(Self {
            context: Some(context),
        })
    }

    /// Release the context. Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.finalize();
            debug!("FAPI session released");
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.context.is_some()
    }

    fn context(&mut self) -> Result<&mut C, TpmStatus> {
        self.context.as_mut().ok_or_else(|| {
            trace!("operation on a released FAPI session");
            TpmStatus::Other(TSS2_FAPI_RC_BAD_SEQUENCE)
        })
    }

    pub fn get_info(&mut self) -> Result<String, TpmStatus> {
        self.context()?.get_info()
    }

    pub fn set_auth_callback(&mut self, callback: AuthCallback) -> Result<(), TpmStatus> {
        self.context()?.set_auth_callback(callback)
    }

    /// Error raised by the authorization callback since the last call, if any
    pub fn take_callback_error(&mut self) -> Option<FError> {
        self.context.as_mut().and_then(TpmContext::take_callback_error)
    }

    pub fn provision(&mut self, lockout_auth: Option<&str>) -> Result<(), TpmStatus> {
        self.context()?.provision(lockout_auth)
    }

    pub fn create_key(&mut self, request: &KeyRequest<'_>) -> Result<(), TpmStatus> {
        self.context()?.create_key(request)
    }

    pub fn encrypt(&mut self, key_path: &str, plaintext: &[u8]) -> Result<Vec<u8>, TpmStatus> {
        self.context()?.encrypt(key_path, plaintext)
    }
}

impl<C: TpmContext> Drop for Session<C> {
    fn drop(&mut self) {
        self.release();
    }
}
