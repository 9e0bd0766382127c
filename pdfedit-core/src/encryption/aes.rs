//! AES-128-CBC for the AESV2 crypt filter (ISO 32000-1 Section 7.6.2)
//!
//! Every encrypted string or stream is a random 16-byte IV followed by the
//! CBC ciphertext of the PKCS#7-padded plaintext.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const BLOCK_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AesError {
    #[error("Invalid key length: expected 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Ciphertext of {0} bytes is not an IV followed by whole blocks")]
    InvalidCiphertextLength(usize),

    #[error("Invalid PKCS#7 padding")]
    InvalidPadding,
}

/// Fresh random IV
pub fn generate_iv() -> [u8; BLOCK_SIZE] {
    rand::random()
}

/// Encrypt with a freshly generated IV, returned as the first block.
pub fn encrypt_cbc(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AesError> {
    encrypt_cbc_with_iv(key, &generate_iv(), data)
}

pub fn encrypt_cbc_with_iv(
    key: &[u8],
    iv: &[u8; BLOCK_SIZE],
    data: &[u8],
) -> Result<Vec<u8>, AesError> {
    let mut cipher =
        Aes128CbcEnc::new_from_slices(key, iv).map_err(|_| AesError::InvalidKeyLength(key.len()))?;

    let mut buffer = add_pkcs7_padding(data);
    for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }

    let mut output = Vec::with_capacity(BLOCK_SIZE + buffer.len());
    output.extend_from_slice(iv);
    output.extend_from_slice(&buffer);
    Ok(output)
}

/// Decrypt IV-prefixed ciphertext and strip the padding.
pub fn decrypt_cbc(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AesError> {
    if data.len() < BLOCK_SIZE || data.len() % BLOCK_SIZE != 0 {
        return Err(AesError::InvalidCiphertextLength(data.len()));
    }
    let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
    let mut cipher =
        Aes128CbcDec::new_from_slices(key, iv).map_err(|_| AesError::InvalidKeyLength(key.len()))?;

    let mut buffer = ciphertext.to_vec();
    for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    remove_pkcs7_padding(buffer)
}

fn add_pkcs7_padding(data: &[u8]) -> Vec<u8> {
    let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + pad);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad, pad as u8);
    padded
}

fn remove_pkcs7_padding(mut data: Vec<u8>) -> Result<Vec<u8>, AesError> {
    // An IV with no ciphertext is an empty value
    let Some(&last) = data.last() else {
        return Ok(data);
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
        return Err(AesError::InvalidPadding);
    }
    if !data[data.len() - pad..].iter().all(|&b| b == last) {
        return Err(AesError::InvalidPadding);
    }
    data.truncate(data.len() - pad);
    Ok(data)
}
