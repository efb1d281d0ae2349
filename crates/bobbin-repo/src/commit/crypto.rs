//! Multikey public keys for commit signature verification.
//!
//! Repository signing keys are published in DID documents as Multikey
//! `publicKeyMultibase` strings: a multibase string wrapping a multicodec
//! varint and a SEC1-encoded point. AT Protocol uses two curves, secp256k1
//! and NIST P-256.

use crate::error::CommitError;
use crate::varint::decode_uvarint;
use bytes::Bytes;

/// Known multicodec key codecs for Multikey public keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCodec {
    /// secp256k1-pub (0xe7)
    Secp256k1,
    /// p256-pub (0x1200)
    P256,
}

impl KeyCodec {
    /// Multicodec code for this key type
    pub fn code(&self) -> u64 {
        match self {
            KeyCodec::Secp256k1 => 0xE7,
            KeyCodec::P256 => 0x1200,
        }
    }
}

/// Public key decoded from a Multikey `publicKeyMultibase` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// Codec used to encode the public key
    pub codec: KeyCodec,
    /// SEC1 bytes of the public key (compressed or uncompressed)
    pub bytes: Bytes,
}

impl PublicKey {
    /// Decode a Multikey public key from a multibase-encoded string
    pub fn decode(multibase_str: &str) -> Result<Self, CommitError> {
        let (_base, data) = multibase::decode(multibase_str)
            .map_err(|e| CommitError::InvalidKey(e.to_string()))?;
        let (code, offset) = decode_uvarint(&data)
            .ok_or_else(|| CommitError::InvalidKey("bad multicodec varint".into()))?;
        let codec = match code {
            0xE7 => KeyCodec::Secp256k1,
            0x1200 => KeyCodec::P256,
            other => return Err(CommitError::UnsupportedKeyType(other)),
        };

        let bytes = &data[offset..];
        // 0x02/0x03 compressed, 0x04 uncompressed
        match (bytes.len(), bytes.first()) {
            (33, Some(0x02 | 0x03)) | (65, Some(0x04)) => {}
            _ => {
                return Err(CommitError::InvalidKey(format!(
                    "expected a 33 or 65 byte SEC1 point, got {} bytes",
                    bytes.len()
                )));
            }
        }

        Ok(Self {
            codec,
            bytes: Bytes::copy_from_slice(bytes),
        })
    }

    /// Verify a compact (r ‖ s) ECDSA signature over `message`
    ///
    /// The message is hashed with SHA-256 as part of verification.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CommitError> {
        match self.codec {
            KeyCodec::Secp256k1 => {
                use k256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
                let vk = VerifyingKey::from_sec1_bytes(&self.bytes)
                    .map_err(|e| CommitError::InvalidKey(e.to_string()))?;
                let sig = Signature::from_slice(signature)
                    .map_err(|e| CommitError::InvalidSignature(e.to_string()))?;
                vk.verify(message, &sig)
                    .map_err(|_| CommitError::SignatureVerificationFailed)
            }
            KeyCodec::P256 => {
                use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
                let vk = VerifyingKey::from_sec1_bytes(&self.bytes)
                    .map_err(|e| CommitError::InvalidKey(e.to_string()))?;
                let sig = Signature::from_slice(signature)
                    .map_err(|e| CommitError::InvalidSignature(e.to_string()))?;
                vk.verify(message, &sig)
                    .map_err(|_| CommitError::SignatureVerificationFailed)
            }
        }
    }

    /// Encode as a Multikey `publicKeyMultibase` string (base58btc)
    pub fn to_multibase(&self) -> String {
        let mut buf = crate::varint::encode_uvarint(self.codec.code());
        buf.extend_from_slice(&self.bytes);
        multibase::encode(multibase::Base::Base58Btc, buf)
    }
}
