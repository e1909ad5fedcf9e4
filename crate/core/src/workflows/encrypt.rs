use tpm_locker_fapi::TpmModule;
use tpm_locker_logger::{error, info};

use super::with_session;
use crate::{LockerError, LockerResult, TpmConfig};

/// Plaintext of the encryption test: the bytes `0, 1, 2, ...` wrapping at 256
#[must_use]
pub fn test_payload(length: usize) -> Vec<u8> {
    (0..=u8::MAX).cycle().take(length).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionSummary {
    pub plaintext_length: usize,
    pub ciphertext: Vec<u8>,
}

impl EncryptionSummary {
    /// Lowercase hexadecimal form of the ciphertext
    #[must_use]
    pub fn ciphertext_hex(&self) -> String {
        hex::encode(&self.ciphertext)
    }
}

/// Encrypt the test payload with the application key.
///
/// The configuration is validated first, so that no session is opened and
/// nothing is allocated for an out of range payload length.
pub fn encrypt_test_payload<M: TpmModule>(
    module: &M,
    config: &TpmConfig,
) -> LockerResult<EncryptionSummary> {
    config.validate()?;
    let plaintext = test_payload(config.encrypt.payload_length);
    let key_path = config.keys.application_key_path.as_str();
    with_session(module, |session| {
        info!(
            "encrypting {} bytes with the key {key_path}",
            plaintext.len()
        );
        let ciphertext = session.encrypt(key_path, &plaintext).map_err(|status| {
            error!("Fapi_Encrypt failed: {status}");
            LockerError::Encrypt(status)
        })?;
        if ciphertext == plaintext {
            error!("the ciphertext is identical to the plaintext");
            return Err(LockerError::PassThrough);
        }
        info!("encryption successful, {} bytes", ciphertext.len());
        Ok(EncryptionSummary {
            plaintext_length: plaintext.len(),
            ciphertext,
        })
    })
}
