//! Encryption and decryption of the strings and stream bodies of an object

use super::encryption_dict::{CryptFilterMethod, EncryptionDictionary};
use super::standard_security::{EncryptionKey, StandardSecurityHandler};
use crate::error::Result;
use crate::objects::{Object, ObjectId, Stream};

/// Applies the document's ciphers to objects, keyed by object id
pub struct ObjectEncryptor {
    handler: StandardSecurityHandler,
    key: EncryptionKey,
    string_method: CryptFilterMethod,
    stream_method: CryptFilterMethod,
    encrypt_metadata: bool,
}

impl ObjectEncryptor {
    pub fn new(handler: StandardSecurityHandler, key: EncryptionKey, dict: &EncryptionDictionary) -> Self {
        Self {
            handler,
            key,
            string_method: dict.string_method,
            stream_method: dict.stream_method,
            encrypt_metadata: dict.encrypt_metadata,
        }
    }

    pub fn encrypt_object(&self, object: &mut Object, id: ObjectId) -> Result<()> {
        self.transform(object, id, Direction::Encrypt)
    }

    /// Reverse [`ObjectEncryptor::encrypt_object`]. A string that does not
    /// decrypt cleanly is left as it was.
    pub fn decrypt_object(&self, object: &mut Object, id: ObjectId) -> Result<()> {
        self.transform(object, id, Direction::Decrypt)
    }

    fn transform(&self, object: &mut Object, id: ObjectId, direction: Direction) -> Result<()> {
        match object {
            Object::String(bytes) => {
                *bytes = self.apply(bytes, id, self.string_method, direction)?;
            }
            Object::Array(items) => {
                for item in items {
                    self.transform(item, id, direction)?;
                }
            }
            Object::Dictionary(dict) => {
                for value in dict.values_mut() {
                    self.transform(value, id, direction)?;
                }
            }
            Object::Stream(stream) => {
                for value in stream.dictionary_mut().values_mut() {
                    self.transform(value, id, direction)?;
                }
                if self.should_transform_stream(stream) {
                    let data = self.apply(stream.data(), id, self.stream_method, direction)?;
                    stream.set_data(data);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply(&self, data: &[u8], id: ObjectId, method: CryptFilterMethod, direction: Direction) -> Result<Vec<u8>> {
        match direction {
            Direction::Encrypt => self.handler.encrypt_bytes(&self.key, id, method, data),
            // Some writers leave empty strings unencrypted under AES
            Direction::Decrypt if data.is_empty() => Ok(Vec::new()),
            Direction::Decrypt => match self.handler.decrypt_bytes(&self.key, id, method, data) {
                Ok(plain) => Ok(plain),
                Err(e) => {
                    tracing::warn!("Keeping undecryptable data in {}: {}", id, e);
                    Ok(data.to_vec())
                }
            },
        }
    }

    fn should_transform_stream(&self, stream: &Stream) -> bool {
        let dict = stream.dictionary();
        match dict.get_type() {
            Some("XRef") => return false,
            Some("Metadata") if !self.encrypt_metadata => return false,
            _ => {}
        }
        // A stream with its own Crypt filter is handled by that filter
        !stream.filters().contains(&"Crypt")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}
