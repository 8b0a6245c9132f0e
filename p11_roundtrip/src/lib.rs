//! Shared plumbing of the `aes_roundtrip` and `rsa_roundtrip` programs: drive a
//! PKCS#11 provider (named by `P11_LIB`) through one authenticated session,
//! generate a session key, and encrypt then decrypt a buffer with it.
//!
//! All cryptography, padding and key storage happen inside the provider;
//! key material never leaves it.

pub mod cipher;
pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod measure;
pub mod report;
pub mod session;

#[cfg(any(test, feature = "testing"))]
#[doc(hidden)]
pub mod testing;

pub use config::Config;
pub use error::{finish, HsmError, Result};
pub use session::{HsmSession, SessionState, Token};
