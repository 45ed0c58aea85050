// AeroShare Cryptographic Primitives
// Argon2id key derivation + AES-256-GCM authenticated encryption
// Used by the share token codec

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit};
use argon2::Argon2;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 19 MiB, t=2, p=1: fast enough to run on every link open
    fn default() -> Self {
        Self { mem_cost: 19_456, time_cost: 2, parallelism: 1 }
    }
}

impl KdfParams {
    /// Minimal cost for unit tests
    #[cfg(test)]
    pub fn insecure_fast() -> Self {
        Self { mem_cost: 64, time_cost: 1, parallelism: 1 }
    }
}

/// Derive a 256-bit key from password + salt using Argon2id
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<[u8; 32], String> {
    let params = argon2::Params::new(params.mem_cost, params.time_cost, params.parallelism, Some(32))
        .map_err(|e| format!("Argon2 params: {}", e))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| format!("Argon2 derive: {}", e))?;
    Ok(key)
}

/// Encrypt plaintext using AES-256-GCM, authenticating `aad` alongside
pub fn encrypt_aes_gcm(key: &[u8; 32], nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, String> {
    if nonce.len() != NONCE_LEN {
        return Err(format!("AES-GCM nonce must be {} bytes", NONCE_LEN));
    }
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    let nonce = GenericArray::from_slice(nonce);
    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| format!("AES-GCM encrypt: {}", e))
}

/// Decrypt ciphertext using AES-256-GCM
pub fn decrypt_aes_gcm(key: &[u8; 32], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, String> {
    if nonce.len() != NONCE_LEN {
        return Err(format!("AES-GCM nonce must be {} bytes", NONCE_LEN));
    }
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    let nonce = GenericArray::from_slice(nonce);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|e| format!("AES-GCM decrypt: {}", e))
}

/// Generate cryptographically secure random bytes using OS entropy
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}
