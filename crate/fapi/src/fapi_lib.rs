#![allow(non_snake_case)]

use std::ffi::{CStr, OsStr};

use libloading::Library;
use tpm_locker_logger::{debug, warn};

use crate::{
    FResult,
    sys::{
        Fapi_CreateKey_Fn, Fapi_Encrypt_Fn, Fapi_Finalize_Fn, Fapi_Free_Fn, Fapi_GetInfo_Fn,
        Fapi_Initialize_Fn, Fapi_Provision_Fn, Fapi_SetAuthCB_Fn, TSS2_RC, Tss2_RC_Decode_Fn,
    },
};

/// Default name of the TCG Feature API library
pub const FAPI_LIB_DEFAULT: &str = "libtss2-fapi.so.1";
/// Default name of the TSS2 return code decoding library
pub const RC_LIB_DEFAULT: &str = "libtss2-rc.so.0";

/// Call a FAPI function, logging the call, and convert its return code.
///
/// Evaluates to `Result<(), TpmStatus>`.
macro_rules! fapi_call {
    ($lib:expr, $function:ident $(, $arg:expr)* $(,)?) => {{
        tpm_locker_logger::debug!("calling {}", stringify!($function));
        #[allow(unsafe_code)]
        let rc = unsafe { ($lib.$function)($($arg),*) };
        $crate::TpmStatus::check(rc)
    }};
}
pub(crate) use fapi_call;

/// The FAPI library and the functions of it this crate calls.
///
/// The libraries are loaded at runtime so that the binary starts, and the
/// module-free commands work, on hosts without tpm2-tss installed.
///
/// The `tss2-rc` library is optional: when it cannot be loaded, status codes
/// are described from the built-in table instead.
pub(crate) struct FapiLib {
    pub(crate) Fapi_Initialize: Fapi_Initialize_Fn,
    pub(crate) Fapi_Finalize: Fapi_Finalize_Fn,
    pub(crate) Fapi_GetInfo: Fapi_GetInfo_Fn,
    pub(crate) Fapi_Free: Fapi_Free_Fn,
    pub(crate) Fapi_Provision: Fapi_Provision_Fn,
    pub(crate) Fapi_CreateKey: Fapi_CreateKey_Fn,
    pub(crate) Fapi_Encrypt: Fapi_Encrypt_Fn,
    pub(crate) Fapi_SetAuthCB: Fapi_SetAuthCB_Fn,
    Tss2_RC_Decode: Option<Tss2_RC_Decode_Fn>,
    // the symbols above are only valid while the libraries stay loaded
    _rc_library: Option<Library>,
    _library: Library,
}

impl FapiLib {
    pub(crate) fn instantiate<P, R>(path: P, rc_path: Option<R>) -> FResult<Self>
    where
        P: AsRef<OsStr>,
        R: AsRef<OsStr>,
    {
        debug!(
            "loading the FAPI library from {}",
            path.as_ref().to_string_lossy()
        );
        #[allow(unsafe_code)]
        unsafe {
            let library = Library::new(path)?;
            let (rc_library, decode) = match rc_path {
                Some(rc_path) => Self::load_decoder(rc_path.as_ref()),
                None => (None, None),
            };
            Ok(Self {
                Fapi_Initialize: symbol(&library, b"Fapi_Initialize")?,
                Fapi_Finalize: symbol(&library, b"Fapi_Finalize")?,
                Fapi_GetInfo: symbol(&library, b"Fapi_GetInfo")?,
                Fapi_Free: symbol(&library, b"Fapi_Free")?,
                Fapi_Provision: symbol(&library, b"Fapi_Provision")?,
                Fapi_CreateKey: symbol(&library, b"Fapi_CreateKey")?,
                Fapi_Encrypt: symbol(&library, b"Fapi_Encrypt")?,
                Fapi_SetAuthCB: symbol(&library, b"Fapi_SetAuthCB")?,
                Tss2_RC_Decode: decode,
                _rc_library: rc_library,
                _library: library,
            })
        }
    }

    /// A missing decoder is not an error: decoding must never fail an operation.
    #[allow(unsafe_code)]
    unsafe fn load_decoder(path: &OsStr) -> (Option<Library>, Option<Tss2_RC_Decode_Fn>) {
        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(e) => {
                warn!(
                    "cannot load {}: {e}; using the built-in status descriptions",
                    path.to_string_lossy()
                );
                return (None, None);
            }
        };
        let decode = match unsafe { symbol::<Tss2_RC_Decode_Fn>(&library, b"Tss2_RC_Decode") } {
            Ok(decode) => decode,
            Err(e) => {
                warn!("Tss2_RC_Decode not available: {e}");
                return (None, None);
            }
        };
        (Some(library), Some(decode))
    }

    pub(crate) fn decode(&self, rc: TSS2_RC) -> Option<String> {
        let decode = self.Tss2_RC_Decode?;
        #[allow(unsafe_code)]
        let message = unsafe { decode(rc) };
        if message.is_null() {
            return None;
        }
        // Tss2_RC_Decode returns a pointer to a static, thread-local buffer
        #[allow(unsafe_code)]
        let message = unsafe { CStr::from_ptr(message) };
        Some(message.to_string_lossy().into_owned())
    }
}

/// Resolve a function of the library, copying the pointer out of the symbol.
///
/// # Safety
/// `T` must be the exact signature of the exported function.
#[allow(unsafe_code)]
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T, libloading::Error> {
    Ok(*unsafe { library.get::<T>(name) }?)
}
