/* keys.rs : fixed key templates, AES-256 secret key and RSA-2048 key pair, session objects only */

use cryptoki::mechanism::Mechanism;
use cryptoki::object::Attribute;
use tracing::info;

use crate::error::Result;
use crate::session::Token;

pub const AES_KEY_LEN: u64 = 32;
pub const AES_KEY_LABEL: &[u8] = b"aes_key";
pub const RSA_MODULUS_BITS: u64 = 2048;
pub const RSA_PUBLIC_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01]; // 65537

/// Non-extractable and sensitive: the provider must refuse to export the key value.
pub fn aes_key_template() -> Vec<Attribute> {
    vec![
        Attribute::Token(false),
        Attribute::Private(true),
        Attribute::Sensitive(true),
        Attribute::Extractable(false),
        Attribute::Modifiable(false),
        Attribute::Encrypt(true),
        Attribute::Decrypt(true),
        Attribute::ValueLen(AES_KEY_LEN.into()),
        Attribute::Label(AES_KEY_LABEL.to_vec()),
    ]
}

pub fn rsa_public_template() -> Vec<Attribute> {
    vec![
        Attribute::Token(false),
        Attribute::Private(false),
        Attribute::Encrypt(true),
        Attribute::Verify(true),
        Attribute::ModulusBits(RSA_MODULUS_BITS.into()),
        Attribute::PublicExponent(RSA_PUBLIC_EXPONENT.to_vec()),
    ]
}

pub fn rsa_private_template() -> Vec<Attribute> {
    vec![
        Attribute::Token(false),
        Attribute::Private(true),
        Attribute::Sensitive(true),
        Attribute::Decrypt(true),
        Attribute::Sign(true),
    ]
}

pub fn generate_aes_key<T: Token>(token: &T) -> Result<T::Key> {
    let key = token.generate_key(&Mechanism::AesKeyGen, &aes_key_template())?;
    info!(handle = %key, "AES-256 key generated");
    Ok(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsaKeyPair<K> {
    pub public: K,
    pub private: K,
}

pub fn generate_rsa_key_pair<T: Token>(token: &T) -> Result<RsaKeyPair<T::Key>> {
    let (public, private) = token.generate_key_pair(
        &Mechanism::RsaPkcsKeyPairGen,
        &rsa_public_template(),
        &rsa_private_template(),
    )?;
    info!(public = %public, private = %private, "RSA-2048 key pair generated");
    Ok(RsaKeyPair { public, private })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockToken;
    use cryptoki::types::Ulong;

    #[test]
    fn test_aes_template_is_sensitive_and_not_extractable() {
        let template = aes_key_template();
        assert!(template.iter().any(|a| matches!(a, Attribute::Sensitive(true))));
        assert!(template.iter().any(|a| matches!(a, Attribute::Extractable(false))));
        assert!(template.iter().any(|a| matches!(a, Attribute::Token(false))));
        assert!(template.iter().any(|a| matches!(a, Attribute::ValueLen(len) if *len == Ulong::from(AES_KEY_LEN))));
        assert!(template.iter().any(|a| matches!(a, Attribute::Label(l) if l.as_slice() == b"aes_key")));
    }

    #[test]
    fn test_rsa_templates() {
        let public = rsa_public_template();
        assert!(public.iter().any(|a| matches!(a, Attribute::ModulusBits(bits) if *bits == Ulong::from(RSA_MODULUS_BITS))));
        assert!(public.iter().any(|a| matches!(a, Attribute::PublicExponent(e) if e.as_slice() == [1, 0, 1])));
        assert!(public.iter().any(|a| matches!(a, Attribute::Encrypt(true))));

        let private = rsa_private_template();
        assert!(private.iter().any(|a| matches!(a, Attribute::Sensitive(true))));
        assert!(private.iter().any(|a| matches!(a, Attribute::Decrypt(true))));
        assert!(!private.iter().any(|a| matches!(a, Attribute::Extractable(true))));
    }

    #[test]
    fn test_generate_keys_returns_distinct_handles() {
        let token = MockToken::default();
        let aes = generate_aes_key(&token).unwrap();
        let pair = generate_rsa_key_pair(&token).unwrap();
        assert_ne!(aes, pair.public);
        assert_ne!(pair.public, pair.private);
        assert_eq!(token.generated(), 3);
    }
}
