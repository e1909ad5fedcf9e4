//! Raw declarations for the subset of `tss2_fapi.h` and `tss2_rc.h` used by this crate.
//!
//! Only the symbols listed here are resolved when the libraries are loaded.
#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_void};

pub type TSS2_RC = u32;

/// Opaque FAPI context, only ever handled through a pointer
#[repr(C)]
pub struct FAPI_CONTEXT {
    _private: [u8; 0],
}

pub const TSS2_RC_SUCCESS: TSS2_RC = 0;

const TSS2_RC_LAYER_SHIFT: u32 = 16;
pub const TSS2_FAPI_RC_LAYER: TSS2_RC = 6 << TSS2_RC_LAYER_SHIFT;

pub const TSS2_BASE_RC_GENERAL_FAILURE: TSS2_RC = 1;
pub const TSS2_BASE_RC_NOT_IMPLEMENTED: TSS2_RC = 2;
pub const TSS2_BASE_RC_BAD_CONTEXT: TSS2_RC = 3;
pub const TSS2_BASE_RC_BAD_REFERENCE: TSS2_RC = 5;
pub const TSS2_BASE_RC_BAD_SEQUENCE: TSS2_RC = 7;
pub const TSS2_BASE_RC_IO_ERROR: TSS2_RC = 10;
pub const TSS2_BASE_RC_BAD_VALUE: TSS2_RC = 11;
pub const TSS2_BASE_RC_MEMORY: TSS2_RC = 23;
pub const TSS2_BASE_RC_NO_CONFIG: TSS2_RC = 28;
pub const TSS2_BASE_RC_BAD_PATH: TSS2_RC = 29;
pub const TSS2_BASE_RC_PATH_ALREADY_EXISTS: TSS2_RC = 31;
pub const TSS2_BASE_RC_KEY_NOT_FOUND: TSS2_RC = 32;
pub const TSS2_BASE_RC_PATH_NOT_FOUND: TSS2_RC = 36;
pub const TSS2_BASE_RC_AUTHORIZATION_FAILED: TSS2_RC = 41;
pub const TSS2_BASE_RC_AUTHORIZATION_UNKNOWN: TSS2_RC = 42;
pub const TSS2_BASE_RC_NO_TPM: TSS2_RC = 49;
pub const TSS2_BASE_RC_NOT_PROVISIONED: TSS2_RC = 52;
pub const TSS2_BASE_RC_ALREADY_PROVISIONED: TSS2_RC = 53;

pub const TSS2_FAPI_RC_GENERAL_FAILURE: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_GENERAL_FAILURE;
pub const TSS2_FAPI_RC_NOT_IMPLEMENTED: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_NOT_IMPLEMENTED;
pub const TSS2_FAPI_RC_BAD_CONTEXT: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_BAD_CONTEXT;
pub const TSS2_FAPI_RC_BAD_REFERENCE: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_BAD_REFERENCE;
pub const TSS2_FAPI_RC_BAD_SEQUENCE: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_BAD_SEQUENCE;
pub const TSS2_FAPI_RC_IO_ERROR: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_IO_ERROR;
pub const TSS2_FAPI_RC_BAD_VALUE: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_BAD_VALUE;
pub const TSS2_FAPI_RC_MEMORY: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_MEMORY;
pub const TSS2_FAPI_RC_NO_CONFIG: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_NO_CONFIG;
pub const TSS2_FAPI_RC_BAD_PATH: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_BAD_PATH;
pub const TSS2_FAPI_RC_PATH_ALREADY_EXISTS: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_PATH_ALREADY_EXISTS;
pub const TSS2_FAPI_RC_KEY_NOT_FOUND: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_KEY_NOT_FOUND;
pub const TSS2_FAPI_RC_PATH_NOT_FOUND: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_PATH_NOT_FOUND;
pub const TSS2_FAPI_RC_AUTHORIZATION_FAILED: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_AUTHORIZATION_FAILED;
pub const TSS2_FAPI_RC_AUTHORIZATION_UNKNOWN: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_AUTHORIZATION_UNKNOWN;
pub const TSS2_FAPI_RC_NO_TPM: TSS2_RC = TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_NO_TPM;
pub const TSS2_FAPI_RC_NOT_PROVISIONED: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_NOT_PROVISIONED;
pub const TSS2_FAPI_RC_ALREADY_PROVISIONED: TSS2_RC =
    TSS2_FAPI_RC_LAYER | TSS2_BASE_RC_ALREADY_PROVISIONED;

pub type Fapi_CB_Auth = Option<
    unsafe extern "C" fn(
        objectPath: *const c_char,
        description: *const c_char,
        auth: *mut *const c_char,
        userData: *mut c_void,
    ) -> TSS2_RC,
>;

pub type Fapi_Initialize_Fn =
    unsafe extern "C" fn(context: *mut *mut FAPI_CONTEXT, uri: *const c_char) -> TSS2_RC;
pub type Fapi_Finalize_Fn = unsafe extern "C" fn(context: *mut *mut FAPI_CONTEXT);
pub type Fapi_GetInfo_Fn =
    unsafe extern "C" fn(context: *mut FAPI_CONTEXT, info: *mut *mut c_char) -> TSS2_RC;
pub type Fapi_Free_Fn = unsafe extern "C" fn(ptr: *mut c_void);
pub type Fapi_Provision_Fn = unsafe extern "C" fn(
    context: *mut FAPI_CONTEXT,
    authValueEh: *const c_char,
    authValueSh: *const c_char,
    authValueLockout: *const c_char,
) -> TSS2_RC;
pub type Fapi_CreateKey_Fn = unsafe extern "C" fn(
    context: *mut FAPI_CONTEXT,
    path: *const c_char,
    keyType: *const c_char,
    policyPath: *const c_char,
    authValue: *const c_char,
) -> TSS2_RC;
pub type Fapi_Encrypt_Fn = unsafe extern "C" fn(
    context: *mut FAPI_CONTEXT,
    keyPath: *const c_char,
    plainText: *const u8,
    plainTextSize: usize,
    cipherText: *mut *mut u8,
    cipherTextSize: *mut usize,
) -> TSS2_RC;
pub type Fapi_SetAuthCB_Fn = unsafe extern "C" fn(
    context: *mut FAPI_CONTEXT,
    callback: Fapi_CB_Auth,
    userData: *mut c_void,
) -> TSS2_RC;
pub type Tss2_RC_Decode_Fn = unsafe extern "C" fn(rc: TSS2_RC) -> *const c_char;
