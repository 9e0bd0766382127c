//! Standard Security Handler, revisions 2 to 4 (ISO 32000-1 Section 7.6.3)

use super::aes;
use super::encryption_dict::CryptFilterMethod;
use super::rc4::{rc4_crypt, Rc4Key};
use crate::error::{PdfError, Result};
use crate::objects::ObjectId;

/// Padding used in password processing
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Salt appended to the object key input for AESV2
const AES_SALT: &[u8; 4] = b"sAlT";

/// File encryption key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    pub key: Vec<u8>,
}

impl EncryptionKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Security handler revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityHandlerRevision {
    /// RC4 40-bit
    R2 = 2,
    /// RC4 up to 128-bit
    R3 = 3,
    /// Crypt filters (RC4 or AES-128)
    R4 = 4,
}

impl SecurityHandlerRevision {
    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            2 => Some(Self::R2),
            3 => Some(Self::R3),
            4 => Some(Self::R4),
            _ => None,
        }
    }

    pub fn number(self) -> i64 {
        self as i64
    }
}

/// Key derivation and per-object ciphers for one revision and key length
#[derive(Debug, Clone)]
pub struct StandardSecurityHandler {
    revision: SecurityHandlerRevision,
    /// Key length in bytes
    key_length: usize,
    encrypt_metadata: bool,
}

impl StandardSecurityHandler {
    pub fn new(revision: SecurityHandlerRevision, key_length: usize, encrypt_metadata: bool) -> Self {
        let key_length = match revision {
            SecurityHandlerRevision::R2 => 5,
            _ => key_length.clamp(5, 16),
        };
        Self {
            revision,
            key_length,
            encrypt_metadata,
        }
    }

    /// Create handler for RC4 40-bit encryption
    pub fn rc4_40bit() -> Self {
        Self::new(SecurityHandlerRevision::R2, 5, true)
    }

    /// Create handler for RC4 128-bit encryption
    pub fn rc4_128bit() -> Self {
        Self::new(SecurityHandlerRevision::R3, 16, true)
    }

    /// Create handler for AES-128 through a revision 4 crypt filter
    pub fn aes_128(encrypt_metadata: bool) -> Self {
        Self::new(SecurityHandlerRevision::R4, 16, encrypt_metadata)
    }

    pub fn revision(&self) -> SecurityHandlerRevision {
        self.revision
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    /// Pad or truncate password to 32 bytes
    pub fn pad_password(password: &[u8]) -> [u8; 32] {
        let mut padded = [0u8; 32];
        let len = password.len().min(32);
        padded[..len].copy_from_slice(&password[..len]);
        padded[len..].copy_from_slice(&PADDING[..32 - len]);
        padded
    }

    /// RC4 key derived from the owner password (Algorithm 3, steps a to d)
    fn owner_rc4_key(&self, owner_password: &[u8]) -> Rc4Key {
        let mut hash = md5::compute(Self::pad_password(owner_password)).0;
        if self.revision >= SecurityHandlerRevision::R3 {
            for _ in 0..50 {
                hash = md5::compute(hash).0;
            }
        }
        Rc4Key::from_slice(&hash[..self.key_length])
    }

    /// Compute the `O` entry (Algorithm 3)
    pub fn compute_owner_hash(&self, owner_password: &[u8], user_password: &[u8]) -> Vec<u8> {
        let key = self.owner_rc4_key(owner_password);
        let mut result = rc4_crypt(&key, &Self::pad_password(user_password));

        if self.revision >= SecurityHandlerRevision::R3 {
            for i in 1..=19u8 {
                result = rc4_crypt(&key.xored(i), &result);
            }
        }
        result
    }

    /// Compute the file encryption key from a user password (Algorithm 2)
    pub fn compute_encryption_key(
        &self,
        user_password: &[u8],
        owner_hash: &[u8],
        permissions: i32,
        file_id: &[u8],
    ) -> EncryptionKey {
        let mut data = Vec::with_capacity(72 + file_id.len());
        data.extend_from_slice(&Self::pad_password(user_password));
        data.extend_from_slice(owner_hash);
        data.extend_from_slice(&permissions.to_le_bytes());
        data.extend_from_slice(file_id);
        if self.revision >= SecurityHandlerRevision::R4 && !self.encrypt_metadata {
            data.extend_from_slice(&[0xFF; 4]);
        }
        let mut hash = md5::compute(&data).0;

        if self.revision >= SecurityHandlerRevision::R3 {
            for _ in 0..50 {
                hash = md5::compute(&hash[..self.key_length]).0;
            }
        }

        EncryptionKey::new(hash[..self.key_length].to_vec())
    }

    /// Compute the `U` entry for a file key (Algorithms 4 and 5)
    pub fn compute_user_hash(&self, key: &EncryptionKey, file_id: &[u8]) -> Vec<u8> {
        let rc4_key = Rc4Key::from_slice(&key.key);
        match self.revision {
            SecurityHandlerRevision::R2 => rc4_crypt(&rc4_key, &PADDING),
            SecurityHandlerRevision::R3 | SecurityHandlerRevision::R4 => {
                let mut data = PADDING.to_vec();
                data.extend_from_slice(file_id);
                let mut result = rc4_crypt(&rc4_key, &md5::compute(&data).0);

                for i in 1..=19u8 {
                    result = rc4_crypt(&rc4_key.xored(i), &result);
                }

                // 16 bytes of hash followed by arbitrary padding
                result.extend_from_slice(&PADDING[..16]);
                result
            }
        }
    }

    /// Check a user password against `U` (Algorithm 6), returning the file key.
    pub fn authenticate_user(
        &self,
        user_password: &[u8],
        owner_hash: &[u8],
        user_hash: &[u8],
        permissions: i32,
        file_id: &[u8],
    ) -> Option<EncryptionKey> {
        let key = self.compute_encryption_key(user_password, owner_hash, permissions, file_id);
        let computed = self.compute_user_hash(&key, file_id);
        // Only the first 16 bytes are significant from revision 3 on
        let significant = match self.revision {
            SecurityHandlerRevision::R2 => 32,
            _ => 16,
        };
        if user_hash.len() >= significant && computed[..significant] == user_hash[..significant] {
            Some(key)
        } else {
            None
        }
    }

    /// Check an owner password (Algorithm 7): recover the user password from
    /// `O` and authenticate with it.
    pub fn authenticate_owner(
        &self,
        owner_password: &[u8],
        owner_hash: &[u8],
        user_hash: &[u8],
        permissions: i32,
        file_id: &[u8],
    ) -> Option<EncryptionKey> {
        let key = self.owner_rc4_key(owner_password);
        let user_password = match self.revision {
            SecurityHandlerRevision::R2 => rc4_crypt(&key, owner_hash),
            _ => (0..=19u8)
                .rev()
                .fold(owner_hash.to_vec(), |data, i| rc4_crypt(&key.xored(i), &data)),
        };
        self.authenticate_user(&user_password, owner_hash, user_hash, permissions, file_id)
    }

    /// Per-object key (Algorithm 1)
    pub fn object_key(&self, key: &EncryptionKey, id: ObjectId, method: CryptFilterMethod) -> Vec<u8> {
        let mut data = key.key.clone();
        data.extend_from_slice(&id.number().to_le_bytes()[..3]);
        data.extend_from_slice(&id.generation().to_le_bytes());
        if method == CryptFilterMethod::AesV2 {
            data.extend_from_slice(AES_SALT);
        }
        let hash = md5::compute(&data).0;
        hash[..(key.len() + 5).min(16)].to_vec()
    }

    /// Encrypt a string or stream body belonging to object `id`
    pub fn encrypt_bytes(
        &self,
        key: &EncryptionKey,
        id: ObjectId,
        method: CryptFilterMethod,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        match method {
            CryptFilterMethod::Identity => Ok(data.to_vec()),
            CryptFilterMethod::V2 => {
                let object_key = Rc4Key::from_slice(&self.object_key(key, id, method));
                Ok(rc4_crypt(&object_key, data))
            }
            CryptFilterMethod::AesV2 => aes::encrypt_cbc(&self.object_key(key, id, method), data)
                .map_err(|e| PdfError::Encryption(format!("AES encryption of {id} failed: {e}"))),
        }
    }

    /// Decrypt a string or stream body belonging to object `id`
    pub fn decrypt_bytes(
        &self,
        key: &EncryptionKey,
        id: ObjectId,
        method: CryptFilterMethod,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        match method {
            CryptFilterMethod::Identity | CryptFilterMethod::V2 => {
                self.encrypt_bytes(key, id, method, data)
            }
            CryptFilterMethod::AesV2 => aes::decrypt_cbc(&self.object_key(key, id, method), data)
                .map_err(|e| PdfError::Encryption(format!("AES decryption of {id} failed: {e}"))),
        }
    }
}

/// Password bytes: Latin-1 where possible, UTF-8 for anything else
pub fn password_bytes(password: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(password.len());
    for c in password.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => bytes.push(byte),
            Err(_) => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }
    bytes
}
