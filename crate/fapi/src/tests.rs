//! These tests require tpm2-tss and a TPM (or the swtpm simulator) and are gated behind the `tpm` feature.
//! The FAPI configuration is taken from `TSS2_FAPICONF`, point it at a throw-away keystore:
//! ```sh
//! TSS2_FAPICONF=/tmp/fapi-config.json cargo test --features tpm -- --ignored tests::
//! ```
use std::env;

use zeroize::Zeroizing;

use crate::{
    FAPI_LIB_DEFAULT, FResult, FapiModule, KeyRequest, RC_LIB_DEFAULT, Session, StatusDecoder,
    TpmStatus,
};

fn lib_path(env_var: &str, default: &str) -> String {
    env::var(env_var).unwrap_or_else(|_| default.to_owned())
}

fn module() -> FResult<FapiModule> {
    tpm_locker_logger::log_init(None);
    FapiModule::instantiate(
        lib_path("TPM_LOCKER_FAPI_LIB", FAPI_LIB_DEFAULT),
        Some(lib_path("TPM_LOCKER_RC_LIB", RC_LIB_DEFAULT)),
    )
}

#[test]
#[ignore = "Requires tpm2-tss and a TPM or simulator"]
fn test_tpm_all() -> FResult<()> {
    test_tpm_get_info()?;
    test_tpm_decode()?;
    test_tpm_provision_and_encrypt()?;
    Ok(())
}

#[test]
#[ignore = "Requires tpm2-tss and a TPM or simulator"]
fn test_tpm_get_info() -> FResult<()> {
    let module = module()?;
    let mut session = Session::acquire(&module)?;
    let info = session.get_info()?;
    assert!(info.contains("version"));
    Ok(())
}

#[test]
#[ignore = "Requires tpm2-tss and a TPM or simulator"]
fn test_tpm_decode() -> FResult<()> {
    let module = module()?;
    let message = module.describe_status(TpmStatus::AlreadyProvisioned);
    assert!(!message.is_empty());
    Ok(())
}

#[test]
#[ignore = "Requires tpm2-tss and a TPM or simulator"]
fn test_tpm_provision_and_encrypt() -> FResult<()> {
    let module = module()?;
    let mut session = Session::acquire(&module)?;
    session.set_auth_callback(Box::new(|_path, _description| {
        Ok(Zeroizing::new(String::new()))
    }))?;
    match session.provision(None) {
        Ok(()) | Err(TpmStatus::AlreadyProvisioned) => {}
        Err(status) => return Err(status.into()),
    }
    let request = KeyRequest::new("/HS/SRK/tpm_locker_test", "sign,decrypt");
    match session.create_key(&request) {
        Ok(()) | Err(TpmStatus::AlreadyExists) => {}
        Err(status) => return Err(status.into()),
    }
    let plaintext: Vec<u8> = (0..128_u8).collect();
    let ciphertext = session.encrypt(request.path, &plaintext)?;
    assert!(!ciphertext.is_empty());
    assert_ne!(ciphertext, plaintext);
    session.release();
    Ok(())
}
