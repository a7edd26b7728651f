//! # Vote Encryption
//!
//! RSA helpers for the vote payload: loading the server's public key the way
//! Votifier stores it (base64 of a DER SubjectPublicKeyInfo, the `public.key`
//! file in the plugin folder) and encrypting one PKCS#1 v1.5 block with it.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::der::asn1::Null;
use rsa::pkcs8::SubjectPublicKeyInfoRef;
use rsa::{pkcs1, BigUint, Pkcs1v15Encrypt, RsaPublicKey};

use super::error::{Result, VoteError};

/// Largest modulus accepted from a key file, in bits.
pub const MAX_KEY_BITS: usize = 16384;

/// Read and decode a Votifier `public.key` file.
///
/// # Errors
/// Returns [`VoteError::Key`] if the file is unreadable, is not base64, or
/// does not hold an RSA SubjectPublicKeyInfo.
pub fn load_public_key<P: AsRef<Path>>(path: P) -> Result<RsaPublicKey> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| VoteError::Key {
        reason: format!("could not be read at {}: {}", path.display(), e),
    })?;
    decode_public_key(&text)
}

/// Decode a base64 DER public key. Whitespace (line breaks included) is ignored.
///
/// Any modulus up to [`MAX_KEY_BITS`] is accepted, not just the common
/// 2048-bit size.
pub fn decode_public_key(text: &str) -> Result<RsaPublicKey> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let der = STANDARD.decode(compact.as_bytes()).map_err(|e| VoteError::Key {
        reason: format!("could not be decoded as base64: {}", e),
    })?;

    let spki = SubjectPublicKeyInfoRef::try_from(der.as_slice()).map_err(|e| VoteError::Key {
        reason: format!("is not a PKIX public key: {}", e),
    })?;

    spki.algorithm
        .assert_algorithm_oid(pkcs1::ALGORITHM_OID)
        .map_err(|e| VoteError::Key {
            reason: format!("is not an RSA key: {}", e),
        })?;
    if spki.algorithm.parameters_any().ok() != Some(Null.into()) {
        return Err(VoteError::Key {
            reason: "has malformed RSA algorithm parameters".to_string(),
        });
    }

    let key_bytes = spki.subject_public_key.as_bytes().ok_or_else(|| VoteError::Key {
        reason: "has a malformed key bit string".to_string(),
    })?;
    let parts = pkcs1::RsaPublicKey::try_from(key_bytes).map_err(|e| VoteError::Key {
        reason: format!("is not a PKCS#1 RSA public key: {}", e),
    })?;

    let n = BigUint::from_bytes_be(parts.modulus.as_bytes());
    let exponent = BigUint::from_bytes_be(parts.public_exponent.as_bytes());
    RsaPublicKey::new_with_max_size(n, exponent, MAX_KEY_BITS).map_err(|e| VoteError::Key {
        reason: format!("is not usable: {}", e),
    })
}

/// Encrypt one block with PKCS#1 v1.5 padding.
///
/// Padding bytes come from the OS RNG, so repeated calls with the same block
/// yield different ciphertexts.
pub fn encrypt_block(key: &RsaPublicKey, block: &[u8]) -> Result<Vec<u8>> {
    Ok(key.encrypt(&mut OsRng, Pkcs1v15Encrypt, block)?)
}

/// Shared 2048-bit key for unit tests; generating one is slow in debug builds.
#[cfg(test)]
pub(crate) fn test_key() -> &'static rsa::RsaPrivateKey {
    use std::sync::OnceLock;

    static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| rsa::RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation"))
}
