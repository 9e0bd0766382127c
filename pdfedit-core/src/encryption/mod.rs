//! PDF encryption support according to ISO 32000-1 Section 7.6
//!
//! Only the Standard security handler is implemented, at revisions 2 (RC4
//! 40-bit), 3 (RC4 128-bit) and 4 (crypt filters, RC4 or AES-128). A single
//! password serves as both user and owner password.
//!
//! ```rust
//! use pdfedit::encryption::{decrypt_document, encrypt_document, EncryptionOptions};
//! use pdfedit::Document;
//!
//! # fn main() -> pdfedit::Result<()> {
//! let mut doc = Document::new();
//! encrypt_document(&mut doc, "secret", &EncryptionOptions::default())?;
//! assert!(doc.is_encrypted());
//!
//! let mut reopened = Document::parse(&doc.to_bytes()?)?;
//! decrypt_document(&mut reopened, "secret")?;
//! assert!(!reopened.is_encrypted());
//! # Ok(())
//! # }
//! ```

mod aes;
mod encryption_dict;
mod object_encryption;
mod permissions;
mod rc4;
mod standard_security;

pub use encryption_dict::{CryptFilterMethod, EncryptionDictionary};
pub use object_encryption::ObjectEncryptor;
pub use permissions::Permissions;
pub use standard_security::{
    password_bytes, EncryptionKey, SecurityHandlerRevision, StandardSecurityHandler,
};

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Object, ObjectId};
use crate::parser::PdfVersion;

/// Cipher and key length written by [`encrypt_document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionAlgorithm {
    /// RC4 with a 40-bit key (revision 2)
    Rc4_40,
    /// RC4 with a 128-bit key (revision 3)
    #[default]
    Rc4_128,
    /// AES-128-CBC through an AESV2 crypt filter (revision 4)
    Aes128,
}

impl EncryptionAlgorithm {
    fn handler(self, encrypt_metadata: bool) -> StandardSecurityHandler {
        match self {
            EncryptionAlgorithm::Rc4_40 => StandardSecurityHandler::rc4_40bit(),
            EncryptionAlgorithm::Rc4_128 => StandardSecurityHandler::rc4_128bit(),
            EncryptionAlgorithm::Aes128 => StandardSecurityHandler::aes_128(encrypt_metadata),
        }
    }

    /// `V` entry and cipher
    fn version_and_method(self) -> (i64, CryptFilterMethod) {
        match self {
            EncryptionAlgorithm::Rc4_40 => (1, CryptFilterMethod::V2),
            EncryptionAlgorithm::Rc4_128 => (2, CryptFilterMethod::V2),
            EncryptionAlgorithm::Aes128 => (4, CryptFilterMethod::AesV2),
        }
    }

    /// Oldest PDF version that defines this algorithm
    fn minimum_version(self) -> PdfVersion {
        match self {
            EncryptionAlgorithm::Rc4_40 => PdfVersion::new(1, 3),
            EncryptionAlgorithm::Rc4_128 => PdfVersion::new(1, 4),
            EncryptionAlgorithm::Aes128 => PdfVersion::new(1, 6),
        }
    }
}

/// Options for [`encrypt_document`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionOptions {
    pub algorithm: EncryptionAlgorithm,
    pub permissions: Permissions,
    /// Whether the XML metadata stream is encrypted. Only revision 4 can
    /// leave it in clear text.
    pub encrypt_metadata: bool,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self {
            algorithm: EncryptionAlgorithm::default(),
            permissions: Permissions::all(),
            encrypt_metadata: true,
        }
    }
}

/// Encrypt every string and stream reachable from the trailer with a key
/// derived from `password`, and attach the Encrypt dictionary.
///
/// A document ID is generated first if the trailer has none.
pub fn encrypt_document(doc: &mut Document, password: &str, options: &EncryptionOptions) -> Result<()> {
    if doc.is_encrypted() {
        return Err(PdfError::Encryption(
            "document is already encrypted".to_string(),
        ));
    }

    let encrypt_metadata = match options.algorithm {
        EncryptionAlgorithm::Aes128 => options.encrypt_metadata,
        _ if !options.encrypt_metadata => {
            tracing::warn!("RC4 revisions always encrypt metadata; ignoring encrypt_metadata = false");
            true
        }
        _ => true,
    };

    let live = doc.load_reachable()?;
    let file_id = ensure_document_id(doc);

    let handler = options.algorithm.handler(encrypt_metadata);
    let password = password_bytes(password);
    let permissions = options.permissions.to_p_value();
    let owner_hash = handler.compute_owner_hash(&password, &password);
    let key = handler.compute_encryption_key(&password, &owner_hash, permissions, &file_id);
    let user_hash = handler.compute_user_hash(&key, &file_id);

    let (version, method) = options.algorithm.version_and_method();
    let dict = EncryptionDictionary {
        version,
        revision: handler.revision(),
        key_length: handler.key_length(),
        owner_hash,
        user_hash,
        permissions,
        encrypt_metadata,
        string_method: method,
        stream_method: method,
    };

    let encryptor = ObjectEncryptor::new(handler, key, &dict);
    for &id in &live {
        encryptor.encrypt_object(doc.get_mut(id)?, id)?;
    }

    let encrypt_id = doc.add_object(dict.to_dict());
    doc.trailer_mut().dict_mut().set("Encrypt", encrypt_id);

    let required = options.algorithm.minimum_version();
    if doc.version() < required {
        doc.set_version(required);
    }

    tracing::debug!(
        "Encrypted {} objects with {:?} (revision {})",
        live.len(),
        options.algorithm,
        dict.revision.number()
    );
    Ok(())
}

/// Authenticate `password` and decrypt the document in place, removing its
/// Encrypt dictionary.
///
/// A wrong password yields [`PdfError::AuthenticationFailure`] and leaves the
/// document untouched.
pub fn decrypt_document(doc: &mut Document, password: &str) -> Result<()> {
    let encrypt_entry = doc
        .trailer()
        .dict()
        .get("Encrypt")
        .cloned()
        .ok_or_else(|| PdfError::Encryption("document is not encrypted".to_string()))?;
    let encrypt_id = encrypt_entry.as_reference();

    let dict = match doc.resolve(&encrypt_entry)?.as_dict() {
        Some(encrypt) => EncryptionDictionary::from_dict(encrypt, doc)?,
        None => {
            return Err(PdfError::InvalidStructure(
                "Encrypt entry is not a dictionary".to_string(),
            ))
        }
    };

    let file_id = doc.trailer().first_id().map(<[u8]>::to_vec).unwrap_or_default();
    let handler = StandardSecurityHandler::new(dict.revision, dict.key_length, dict.encrypt_metadata);
    let password = password_bytes(password);
    let key = handler
        .authenticate_user(&password, &dict.owner_hash, &dict.user_hash, dict.permissions, &file_id)
        .or_else(|| {
            handler.authenticate_owner(&password, &dict.owner_hash, &dict.user_hash, dict.permissions, &file_id)
        })
        .ok_or(PdfError::AuthenticationFailure)?;

    let encryptor = ObjectEncryptor::new(handler, key, &dict);

    // Object streams first: the objects inside them are only readable once
    // the container is in clear text.
    let object_streams = doc.object_stream_ids();
    for &id in &object_streams {
        encryptor.decrypt_object(doc.get_mut(id)?, id)?;
    }
    doc.reset_object_streams();

    let targets: Vec<ObjectId> = doc
        .object_ids()
        .filter(|&id| Some(id) != encrypt_id && !doc.is_compressed(id) && !object_streams.contains(&id))
        .collect();

    let mut decrypted = 0usize;
    for id in targets {
        let object = match doc.get_mut(id) {
            Ok(object) => object,
            Err(e) => {
                tracing::warn!("Skipping unreadable object {} during decryption: {}", id, e);
                continue;
            }
        };
        if is_xref_stream(object) {
            continue;
        }
        encryptor.decrypt_object(object, id)?;
        decrypted += 1;
    }

    doc.trailer_mut().dict_mut().remove("Encrypt");
    if let Some(id) = encrypt_id {
        doc.remove(id);
    }

    tracing::debug!(
        "Decrypted {} objects and {} object streams (revision {})",
        decrypted,
        object_streams.len(),
        dict.revision.number()
    );
    Ok(())
}

fn is_xref_stream(object: &Object) -> bool {
    object
        .as_stream()
        .is_some_and(|stream| stream.dictionary().get_type() == Some("XRef"))
}

/// The first element of the trailer `ID`, generated from the current time and
/// document size when missing.
fn ensure_document_id(doc: &mut Document) -> Vec<u8> {
    if let Some(id) = doc.trailer().first_id().filter(|id| !id.is_empty()) {
        return id.to_vec();
    }

    let mut seed = chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
        .into_bytes();
    seed.extend_from_slice(&(doc.source_len() as u64).to_le_bytes());
    seed.extend_from_slice(&(doc.object_ids().count() as u64).to_le_bytes());
    let id = md5::compute(&seed).0.to_vec();

    doc.trailer_mut().dict_mut().set(
        "ID",
        vec![Object::string(id.clone()), Object::string(id.clone())],
    );
    tracing::debug!("Generated document ID");
    id
}
