//! Envelope encryption for archive payloads.
//!
//! Every encrypted object gets a fresh 256-bit content key and a fresh
//! 96-bit nonce. The payload is sealed with AES-256-GCM (128-bit tag) under
//! the content key, and the content key is wrapped with the long-lived
//! master RSA public key using OAEP(SHA-256). Decryption unwraps the
//! content key with the master private key and opens the ciphertext; a tag
//! mismatch fails the whole operation and never yields plaintext.
//!
//! Master key material is provisioned externally as PEM. The engine refuses
//! to operate without it; no key is embedded in source.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::ArkivError;
use crate::model::EncryptedEnvelope;

pub const CONTENT_KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 16;

const MASTER_KEY_BITS: usize = 2048;

/// Master public key used to wrap per-object content keys.
#[derive(Clone, Debug)]
pub struct MasterPublicKey(RsaPublicKey);

impl MasterPublicKey {
    /// Parse from PEM. Accepts SubjectPublicKeyInfo (PKCS#8) and the older
    /// PKCS#1 `RSA PUBLIC KEY` form.
    pub fn from_pem(pem: &str) -> Result<Self, ArkivError> {
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(Self)
            .map_err(|e| ArkivError::Configuration {
                message: format!("invalid master public key: {e}"),
            })
    }

    /// Export as SubjectPublicKeyInfo PEM, for provisioning tooling.
    pub fn to_pem(&self) -> Result<String, ArkivError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ArkivError::Configuration {
                message: format!("public key export failed: {e}"),
            })
    }
}

/// Master private key used to unwrap per-object content keys on restore.
#[derive(Clone, Debug)]
pub struct MasterPrivateKey(RsaPrivateKey);

impl MasterPrivateKey {
    /// Parse from PEM. Accepts PKCS#8 and PKCS#1 private key forms.
    pub fn from_pem(pem: &str) -> Result<Self, ArkivError> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(Self)
            .map_err(|e| ArkivError::Configuration {
                message: format!("invalid master private key: {e}"),
            })
    }

    pub fn public_key(&self) -> MasterPublicKey {
        MasterPublicKey(RsaPublicKey::from(&self.0))
    }

    /// Export as PKCS#8 PEM, for provisioning tooling.
    pub fn to_pem(&self) -> Result<String, ArkivError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| ArkivError::Configuration {
                message: format!("private key export failed: {e}"),
            })
    }
}

/// Generate a fresh master keypair. Intended for provisioning tooling and
/// tests; production deployments supply PEM material from an external
/// secret store.
pub fn generate_master_keypair() -> Result<(MasterPublicKey, MasterPrivateKey), ArkivError> {
    let private =
        RsaPrivateKey::new(&mut rand::thread_rng(), MASTER_KEY_BITS).map_err(|e| {
            ArkivError::Configuration {
                message: format!("master key generation failed: {e}"),
            }
        })?;
    let public = RsaPublicKey::from(&private);
    Ok((MasterPublicKey(public), MasterPrivateKey(private)))
}

/// Envelope encryption service. Holds whichever halves of the master
/// keypair the current role needs: backup jobs encrypt with the public
/// half, restore jobs decrypt with the private half.
pub struct CipherService {
    public: Option<MasterPublicKey>,
    private: Option<MasterPrivateKey>,
}

impl CipherService {
    pub fn new(public: Option<MasterPublicKey>, private: Option<MasterPrivateKey>) -> Self {
        Self { public, private }
    }

    pub fn for_backup(public: MasterPublicKey) -> Self {
        Self::new(Some(public), None)
    }

    pub fn for_restore(private: MasterPrivateKey) -> Self {
        Self::new(None, Some(private))
    }

    /// Encrypt a payload into an envelope. The content key is generated
    /// fresh for this object, wrapped, and zeroized before returning; it is
    /// never persisted in the clear.
    pub fn encrypt(&self, payload: &[u8]) -> Result<EncryptedEnvelope, ArkivError> {
        let public = self.public.as_ref().ok_or_else(|| ArkivError::Configuration {
            message: "no master public key configured".to_string(),
        })?;

        let mut content_key = [0u8; CONTENT_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut content_key);
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&content_key).map_err(|e| {
            ArkivError::Configuration {
                message: format!("content key rejected: {e}"),
            }
        })?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), Payload::from(payload))
            .map_err(|_| ArkivError::Integrity {
                message: "payload encryption failed".to_string(),
            })?;
        // aes-gcm appends the 16-byte tag to the ciphertext; the envelope
        // carries the two separately.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_BYTES);

        let wrapped_key = public
            .0
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), &content_key)
            .map_err(|e| ArkivError::Configuration {
                message: format!("content key wrap failed: {e}"),
            })?;
        content_key.zeroize();

        Ok(EncryptedEnvelope {
            ciphertext: general_purpose::STANDARD.encode(ciphertext),
            wrapped_key: general_purpose::STANDARD.encode(wrapped_key),
            nonce: general_purpose::STANDARD.encode(nonce_bytes),
            tag: general_purpose::STANDARD.encode(tag),
        })
    }

    /// Decrypt an envelope back to the original payload. Fails with an
    /// integrity error on key unwrap failure or tag mismatch.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, ArkivError> {
        let private = self.private.as_ref().ok_or_else(|| ArkivError::Configuration {
            message: "no master private key configured".to_string(),
        })?;

        let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;
        let wrapped_key = decode_field("wrapped_key", &envelope.wrapped_key)?;
        let nonce_bytes = decode_field("nonce", &envelope.nonce)?;
        let tag = decode_field("tag", &envelope.tag)?;

        if nonce_bytes.len() != NONCE_BYTES {
            return Err(ArkivError::Integrity {
                message: format!("invalid nonce length: {}", nonce_bytes.len()),
            });
        }
        if tag.len() != TAG_BYTES {
            return Err(ArkivError::Integrity {
                message: format!("invalid tag length: {}", tag.len()),
            });
        }

        let mut content_key = private
            .0
            .decrypt(Oaep::new::<Sha256>(), &wrapped_key)
            .map_err(|_| ArkivError::Integrity {
                message: "content key unwrap failed".to_string(),
            })?;
        if content_key.len() != CONTENT_KEY_BYTES {
            content_key.zeroize();
            return Err(ArkivError::Integrity {
                message: "unwrapped content key has wrong length".to_string(),
            });
        }

        let cipher = Aes256Gcm::new_from_slice(&content_key).map_err(|e| {
            ArkivError::Configuration {
                message: format!("content key rejected: {e}"),
            }
        })?;
        content_key.zeroize();

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_ref())
            .map_err(|_| ArkivError::Integrity {
                message: "authentication tag mismatch".to_string(),
            })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, ArkivError> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|_| ArkivError::Deserialization {
            message: format!("envelope field {name} is not valid base64"),
        })
}
