/* testing.rs : in-memory Token double for unit tests, and for the binaries' flow tests
   through the `testing` feature
   The transforms are toys (xor streams) with the output shape of the real mechanisms:
   CBC_PAD ciphertext is padded to the next block, RSA PKCS#1 output is one modulus-sized block.
 */

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use cryptoki::mechanism::Mechanism;
use cryptoki::object::Attribute;

use crate::cipher::AES_BLOCK_LEN;
use crate::error::{HsmError, Result};
use crate::session::Token;

pub const RSA_BLOCK_LEN: usize = 256;
const RSA_MAX_INPUT: usize = RSA_BLOCK_LEN - 11;

#[derive(Debug, Clone, Copy)]
enum MockKey {
    Secret(u8),
    Public(u8),
    Private(u8),
}

#[derive(Default)]
pub struct MockToken {
    next_handle: Cell<u64>,
    keys: RefCell<HashMap<u64, MockKey>>,
    fail_on: Option<&'static str>,
    calls: RefCell<HashMap<&'static str, usize>>,
}

fn rejected(call: &'static str) -> HsmError {
    HsmError::Provider { call, source: cryptoki::error::Error::InvalidValue }
}

impl MockToken {
    pub fn failing_on(call: &'static str) -> Self {
        MockToken { fail_on: Some(call), ..MockToken::default() }
    }

    pub fn generated(&self) -> usize {
        self.keys.borrow().len()
    }

    /// How often `call` was issued, including a failing attempt.
    pub fn calls(&self, call: &str) -> usize {
        self.calls.borrow().get(call).copied().unwrap_or(0)
    }

    fn check(&self, call: &'static str) -> Result<()> {
        *self.calls.borrow_mut().entry(call).or_insert(0) += 1;
        match self.fail_on {
            Some(failing) if failing == call => Err(rejected(call)),
            _ => Ok(()),
        }
    }

    fn store(&self, key: MockKey) -> u64 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        self.keys.borrow_mut().insert(handle, key);
        handle
    }

    fn key(&self, call: &'static str, handle: u64) -> Result<MockKey> {
        self.keys.borrow().get(&handle).copied().ok_or_else(|| rejected(call))
    }
}

fn xor_cbc(data: &[u8], seed: u8, iv: &[u8; AES_BLOCK_LEN]) -> Vec<u8> {
    data.iter().enumerate().map(|(i, b)| b ^ seed ^ iv[i % AES_BLOCK_LEN]).collect()
}

/* two-phase like the provider contract: learn the length, allocate once, fill */
fn sized_output(required: usize, fill: impl FnOnce(&mut [u8])) -> Vec<u8> {
    let mut out = vec![0_u8; required];
    fill(&mut out);
    out
}

impl Token for MockToken {
    type Key = u64;

    fn generate_key(&self, mechanism: &Mechanism<'_>, _template: &[Attribute]) -> Result<u64> {
        self.check("C_GenerateKey")?;
        match mechanism {
            Mechanism::AesKeyGen => {
                let seed = 0x5A ^ (self.next_handle.get() as u8);
                Ok(self.store(MockKey::Secret(seed)))
            }
            _ => Err(rejected("C_GenerateKey")),
        }
    }

    fn generate_key_pair(&self, mechanism: &Mechanism<'_>, _public: &[Attribute], _private: &[Attribute]) -> Result<(u64, u64)> {
        self.check("C_GenerateKeyPair")?;
        match mechanism {
            Mechanism::RsaPkcsKeyPairGen => {
                let seed = 0xC3 ^ (self.next_handle.get() as u8);
                Ok((self.store(MockKey::Public(seed)), self.store(MockKey::Private(seed))))
            }
            _ => Err(rejected("C_GenerateKeyPair")),
        }
    }

    fn encrypt(&self, mechanism: &Mechanism<'_>, key: u64, data: &[u8]) -> Result<Vec<u8>> {
        self.check("C_Encrypt")?;
        match (mechanism, self.key("C_Encrypt", key)?) {
            (Mechanism::AesCbcPad(iv), MockKey::Secret(seed)) => {
                let pad = AES_BLOCK_LEN - data.len() % AES_BLOCK_LEN;
                let mut padded = data.to_vec();
                padded.resize(data.len() + pad, pad as u8);
                let encrypted = xor_cbc(&padded, seed, iv);
                Ok(sized_output(encrypted.len(), |out| out.copy_from_slice(&encrypted)))
            }
            (Mechanism::RsaPkcs, MockKey::Public(seed)) if data.len() <= RSA_MAX_INPUT => {
                Ok(sized_output(RSA_BLOCK_LEN, |out| {
                    out[1] = 0x02;
                    out[2] = data.len() as u8;
                    for (dst, src) in out[3..].iter_mut().zip(data) {
                        *dst = src ^ seed;
                    }
                }))
            }
            _ => Err(rejected("C_Encrypt")),
        }
    }

    fn decrypt(&self, mechanism: &Mechanism<'_>, key: u64, data: &[u8]) -> Result<Vec<u8>> {
        self.check("C_Decrypt")?;
        match (mechanism, self.key("C_Decrypt", key)?) {
            (Mechanism::AesCbcPad(iv), MockKey::Secret(seed)) if data.len() % AES_BLOCK_LEN == 0 && !data.is_empty() => {
                let padded = xor_cbc(data, seed, iv);
                let pad = usize::from(padded[padded.len() - 1]);
                if pad == 0 || pad > AES_BLOCK_LEN {
                    return Err(rejected("C_Decrypt"));
                }
                let plain = &padded[..padded.len() - pad];
                Ok(sized_output(plain.len(), |out| out.copy_from_slice(plain)))
            }
            (Mechanism::RsaPkcs, MockKey::Private(seed)) if data.len() == RSA_BLOCK_LEN && data[1] == 0x02 => {
                let len = usize::from(data[2]);
                Ok(sized_output(len, |out| {
                    for (dst, src) in out.iter_mut().zip(&data[3..]) {
                        *dst = src ^ seed;
                    }
                }))
            }
            _ => Err(rejected("C_Decrypt")),
        }
    }
}
