//! [`TpmModule`] implementation over the dynamically loaded FAPI library.

use std::{
    ffi::{CStr, CString, OsStr, c_char, c_void},
    ptr,
    sync::Arc,
};

use tpm_locker_logger::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::{
    AuthCallback, FError, FResult, KeyRequest, StatusDecoder, TpmContext, TpmModule, TpmStatus,
    fapi_lib::{FapiLib, fapi_call},
    sys::{
        FAPI_CONTEXT, Fapi_Free_Fn, TSS2_FAPI_RC_BAD_REFERENCE, TSS2_FAPI_RC_BAD_VALUE, TSS2_RC,
        TSS2_RC_SUCCESS,
    },
};

/// The TPM, reached through the TCG Feature API.
pub struct FapiModule {
    lib: Arc<FapiLib>,
}

impl FapiModule {
    /// Load the FAPI library, and optionally the `tss2-rc` decoding library.
    ///
    /// # Errors
    /// Fails if the FAPI library or one of the required functions cannot be loaded.
    /// A missing decoding library is only logged.
    pub fn instantiate<P, R>(fapi_path: P, rc_path: Option<R>) -> FResult<Self>
    where
        P: AsRef<OsStr>,
        R: AsRef<OsStr>,
    {
        Ok(Self {
            lib: Arc::new(FapiLib::instantiate(fapi_path, rc_path)?),
        })
    }
}

impl StatusDecoder for FapiModule {
    fn decode_status(&self, rc: TSS2_RC) -> Option<String> {
        self.lib.decode(rc)
    }
}

impl TpmModule for FapiModule {
    type Context = FapiContext;

    fn initialize(&self) -> Result<FapiContext, TpmStatus> {
        let mut context: *mut FAPI_CONTEXT = ptr::null_mut();
        fapi_call!(self.lib, Fapi_Initialize, &raw mut context, ptr::null())?;
        if context.is_null() {
            return Err(TpmStatus::Other(TSS2_FAPI_RC_BAD_REFERENCE));
        }
        Ok(FapiContext {
            lib: self.lib.clone(),
            context,
            auth: None,
        })
    }
}

/// An initialized `FAPI_CONTEXT`.
///
/// The authorization state registered with `Fapi_SetAuthCB` is owned here and
/// only dropped after `Fapi_Finalize`, so the pointer handed to the library
/// stays valid for the whole life of the context.
pub struct FapiContext {
    lib: Arc<FapiLib>,
    context: *mut FAPI_CONTEXT,
    auth: Option<Box<AuthState>>,
}

impl FapiContext {
    fn buffer(&self, ptr: *mut c_void) -> FapiBuffer {
        FapiBuffer::new(self.lib.Fapi_Free, ptr)
    }
}

impl TpmContext for FapiContext {
    fn finalize(&mut self) {
        if !self.context.is_null() {
            debug!("calling Fapi_Finalize");
            #[allow(unsafe_code)]
            unsafe {
                (self.lib.Fapi_Finalize)(&raw mut self.context);
            }
            self.context = ptr::null_mut();
        }
        self.auth = None;
    }

    fn get_info(&mut self) -> Result<String, TpmStatus> {
        let mut info: *mut c_char = ptr::null_mut();
        let rc = fapi_call!(self.lib, Fapi_GetInfo, self.context, &raw mut info);
        let buffer = self.buffer(info.cast());
        rc?;
        if buffer.is_null() {
            return Err(TpmStatus::Other(TSS2_FAPI_RC_BAD_REFERENCE));
        }
        #[allow(unsafe_code)]
        let text = unsafe { CStr::from_ptr(info) }
            .to_string_lossy()
            .into_owned();
        Ok(text)
    }

    fn set_auth_callback(&mut self, callback: AuthCallback) -> Result<(), TpmStatus> {
        let mut state = Box::new(AuthState::new(callback));
        let user_data = ptr::from_mut::<AuthState>(state.as_mut()).cast::<c_void>();
        fapi_call!(
            self.lib,
            Fapi_SetAuthCB,
            self.context,
            Some(auth_trampoline),
            user_data
        )?;
        // the previous state, if any, is no longer referenced by the library
        self.auth = Some(state);
        Ok(())
    }

    fn take_callback_error(&mut self) -> Option<FError> {
        self.auth.as_mut().and_then(|state| state.error.take())
    }

    fn provision(&mut self, lockout_auth: Option<&str>) -> Result<(), TpmStatus> {
        let lockout_auth = optional_c_string(lockout_auth)?;
        fapi_call!(
            self.lib,
            Fapi_Provision,
            self.context,
            ptr::null(),
            ptr::null(),
            as_ptr(lockout_auth.as_ref())
        )
    }

    fn create_key(&mut self, request: &KeyRequest<'_>) -> Result<(), TpmStatus> {
        let path = c_string(request.path)?;
        let key_type = c_string(request.key_type)?;
        let policy_path = optional_c_string(request.policy_path)?;
        let auth_value = optional_c_string(request.auth_value)?;
        fapi_call!(
            self.lib,
            Fapi_CreateKey,
            self.context,
            path.as_ptr(),
            key_type.as_ptr(),
            as_ptr(policy_path.as_ref()),
            as_ptr(auth_value.as_ref())
        )
    }

    fn encrypt(&mut self, key_path: &str, plaintext: &[u8]) -> Result<Vec<u8>, TpmStatus> {
        let key_path = c_string(key_path)?;
        let mut ciphertext: *mut u8 = ptr::null_mut();
        let mut ciphertext_len: usize = 0;
        let rc = fapi_call!(
            self.lib,
            Fapi_Encrypt,
            self.context,
            key_path.as_ptr(),
            plaintext.as_ptr(),
            plaintext.len(),
            &raw mut ciphertext,
            &raw mut ciphertext_len
        );
        // freed on every path, including a failure after a partial allocation
        let buffer = self.buffer(ciphertext.cast());
        rc?;
        if buffer.is_null() {
            return Err(TpmStatus::Other(TSS2_FAPI_RC_BAD_REFERENCE));
        }
        #[allow(unsafe_code)]
        let bytes = unsafe { std::slice::from_raw_parts(ciphertext, ciphertext_len) }.to_vec();
        Ok(bytes)
    }
}

impl Drop for FapiContext {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// A buffer allocated by the library, released with `Fapi_Free` when dropped.
pub(crate) struct FapiBuffer {
    free: Fapi_Free_Fn,
    ptr: *mut c_void,
}

impl FapiBuffer {
    pub(crate) const fn new(free: Fapi_Free_Fn, ptr: *mut c_void) -> Self {
        Self { free, ptr }
    }

    pub(crate) fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl Drop for FapiBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            trace!("calling Fapi_Free");
            #[allow(unsafe_code)]
            unsafe {
                (self.free)(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// State reached by [`auth_trampoline`] through the `userData` pointer
struct AuthState {
    callback: AuthCallback,
    /// NUL terminated copy of the last answer, alive until the next request
    answer: Option<Zeroizing<Vec<u8>>>,
    error: Option<FError>,
}

impl AuthState {
    fn new(callback: AuthCallback) -> Self {
        Self {
            callback,
            answer: None,
            error: None,
        }
    }

    fn answer(
        &mut self,
        object_path: Option<&str>,
        description: Option<&str>,
    ) -> FResult<*const c_char> {
        let secret = (self.callback)(object_path, description)?;
        if secret.as_bytes().contains(&0) {
            return Err(FError::BadValue(
                "the authorization value contains a NUL byte".to_owned(),
            ));
        }
        let mut bytes = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
        bytes.extend_from_slice(secret.as_bytes());
        bytes.push(0);
        let answer = bytes.as_ptr().cast::<c_char>();
        self.answer = Some(bytes);
        Ok(answer)
    }
}

/// `Fapi_CB_Auth` forwarding the request to the registered [`AuthCallback`]
#[allow(unsafe_code)]
unsafe extern "C" fn auth_trampoline(
    object_path: *const c_char,
    description: *const c_char,
    auth: *mut *const c_char,
    user_data: *mut c_void,
) -> TSS2_RC {
    if auth.is_null() || user_data.is_null() {
        return TSS2_FAPI_RC_BAD_REFERENCE;
    }
    let state = unsafe { &mut *user_data.cast::<AuthState>() };
    let object_path = unsafe { optional_str(object_path) };
    let description = unsafe { optional_str(description) };
    match state.answer(object_path.as_deref(), description.as_deref()) {
        Ok(answer) => {
            unsafe { *auth = answer };
            TSS2_RC_SUCCESS
        }
        Err(e) => {
            warn!("authorization callback failed: {e}");
            let rc = e.return_code();
            state.error = Some(e);
            rc
        }
    }
}

#[allow(unsafe_code)]
unsafe fn optional_str(value: *const c_char) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(
            unsafe { CStr::from_ptr(value) }
                .to_string_lossy()
                .into_owned(),
        )
    }
}

fn c_string(value: &str) -> Result<CString, TpmStatus> {
    CString::new(value).map_err(|e| {
        warn!("invalid FAPI argument: {e}");
        TpmStatus::Other(TSS2_FAPI_RC_BAD_VALUE)
    })
}

fn optional_c_string(value: Option<&str>) -> Result<Option<CString>, TpmStatus> {
    value.map(c_string).transpose()
}

fn as_ptr(value: Option<&CString>) -> *const c_char {
    value.map_or(ptr::null(), |value| value.as_ptr())
}
