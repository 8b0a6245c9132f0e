/* cipher.rs : single-part encrypt then decrypt, CKM_AES_CBC_PAD and CKM_RSA_PKCS
   Functions used:
   C_EncryptInit
   C_Encrypt   (twice: length query with NULL output, then the transfer)
   C_DecryptInit
   C_Decrypt   (twice, as above)
   Padding and chaining are done by the provider; nothing is chunked.
 */

use cryptoki::mechanism::Mechanism;
use tracing::debug;

use crate::error::{HsmError, Result};
use crate::keys::RsaKeyPair;
use crate::session::Token;

pub const AES_BLOCK_LEN: usize = 16;
pub const AES_CBC_IV: [u8; AES_BLOCK_LEN] = *b"1234567812345678";

pub fn aes_cbc_pad() -> Mechanism<'static> {
    Mechanism::AesCbcPad(AES_CBC_IV)
}

pub fn rsa_pkcs() -> Mechanism<'static> {
    Mechanism::RsaPkcs
}

pub fn encrypt<T: Token>(token: &T, mechanism: &Mechanism<'_>, key: T::Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ciphertext = token.encrypt(mechanism, key, plaintext)?;
    debug!(key = %key, input = plaintext.len(), output = ciphertext.len(), "encrypted");
    Ok(ciphertext)
}

pub fn decrypt<T: Token>(token: &T, mechanism: &Mechanism<'_>, key: T::Key, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let plaintext = token.decrypt(mechanism, key, ciphertext)?;
    debug!(key = %key, input = ciphertext.len(), output = plaintext.len(), "decrypted");
    Ok(plaintext)
}

/// CBC with PKCS#7 padding always adds 1..=16 bytes, so a valid ciphertext
/// is a positive multiple of the block length.
pub fn is_block_aligned(len: usize) -> bool {
    len > 0 && len % AES_BLOCK_LEN == 0
}

/// The three buffers of one encrypt/decrypt round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTrip {
    pub plaintext: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub decrypted: Vec<u8>,
}

impl RoundTrip {
    pub fn verify(&self) -> Result<()> {
        if self.decrypted == self.plaintext {
            Ok(())
        } else {
            Err(HsmError::RoundTripMismatch)
        }
    }
}

pub fn aes_round_trip<T: Token>(token: &T, key: T::Key, plaintext: &[u8]) -> Result<RoundTrip> {
    let mechanism = aes_cbc_pad();
    let ciphertext = encrypt(token, &mechanism, key, plaintext)?;
    let decrypted = decrypt(token, &mechanism, key, &ciphertext)?;
    Ok(RoundTrip { plaintext: plaintext.to_vec(), ciphertext, decrypted })
}

/// Encrypts with the public key, decrypts with the private key.
pub fn rsa_round_trip<T: Token>(token: &T, pair: &RsaKeyPair<T::Key>, plaintext: &[u8]) -> Result<RoundTrip> {
    let mechanism = rsa_pkcs();
    let ciphertext = encrypt(token, &mechanism, pair.public, plaintext)?;
    let decrypted = decrypt(token, &mechanism, pair.private, &ciphertext)?;
    Ok(RoundTrip { plaintext: plaintext.to_vec(), ciphertext, decrypted })
}
