//! The Standard security handler's encryption dictionary

use super::standard_security::SecurityHandlerRevision;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};

/// Name of the single crypt filter written for revision 4
const STANDARD_CRYPT_FILTER: &str = "StdCF";

/// How strings or streams are encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptFilterMethod {
    /// Left as is
    Identity,
    /// RC4
    V2,
    /// AES-128-CBC
    AesV2,
}

impl CryptFilterMethod {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            CryptFilterMethod::Identity => "None",
            CryptFilterMethod::V2 => "V2",
            CryptFilterMethod::AesV2 => "AESV2",
        }
    }
}

/// Parsed or to-be-written Encrypt dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionDictionary {
    /// Algorithm version (`V`)
    pub version: i64,
    pub revision: SecurityHandlerRevision,
    /// Key length in bytes
    pub key_length: usize,
    /// `O`
    pub owner_hash: Vec<u8>,
    /// `U`
    pub user_hash: Vec<u8>,
    /// `P`
    pub permissions: i32,
    pub encrypt_metadata: bool,
    pub string_method: CryptFilterMethod,
    pub stream_method: CryptFilterMethod,
}

impl EncryptionDictionary {
    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Standard"));
        dict.set("V", self.version);
        dict.set("R", self.revision.number());
        dict.set("Length", (self.key_length * 8) as i64);
        dict.set("O", Object::string(self.owner_hash.clone()));
        dict.set("U", Object::string(self.user_hash.clone()));
        dict.set("P", i64::from(self.permissions));

        if self.revision == SecurityHandlerRevision::R4 {
            let mut filter = Dictionary::new();
            filter.set("Type", Object::name("CryptFilter"));
            filter.set("CFM", Object::name(self.stream_method.pdf_name()));
            filter.set("AuthEvent", Object::name("DocOpen"));
            filter.set("Length", self.key_length);

            let mut filters = Dictionary::new();
            filters.set(STANDARD_CRYPT_FILTER, filter);
            dict.set("CF", filters);
            dict.set("StmF", Object::name(STANDARD_CRYPT_FILTER));
            dict.set("StrF", Object::name(STANDARD_CRYPT_FILTER));
            dict.set("EncryptMetadata", self.encrypt_metadata);
        }
        dict
    }

    /// Read an Encrypt dictionary, resolving indirect values through `doc`.
    ///
    /// Anything other than the Standard handler at revisions 2 to 4 is
    /// reported as [`PdfError::UnsupportedFeature`].
    pub fn from_dict(dict: &Dictionary, doc: &Document) -> Result<Self> {
        let filter = entry(dict, doc, "Filter")?.and_then(Object::as_name).unwrap_or("");
        if filter != "Standard" {
            return Err(PdfError::UnsupportedFeature(format!(
                "security handler '{filter}'"
            )));
        }

        let revision_number = entry(dict, doc, "R")?
            .and_then(Object::as_integer)
            .ok_or_else(|| {
                PdfError::InvalidStructure("Encrypt dictionary has no R entry".to_string())
            })?;
        let revision = SecurityHandlerRevision::from_number(revision_number).ok_or_else(|| {
            PdfError::UnsupportedFeature(format!(
                "security handler revision {revision_number}"
            ))
        })?;
        let version = entry(dict, doc, "V")?.and_then(Object::as_integer).unwrap_or(0);

        let key_length = match revision {
            SecurityHandlerRevision::R2 => 5,
            _ => {
                let bits = entry(dict, doc, "Length")?
                    .and_then(Object::as_integer)
                    .unwrap_or(128);
                (bits / 8).clamp(5, 16) as usize
            }
        };

        let owner_hash = password_hash(dict, doc, "O")?;
        let user_hash = password_hash(dict, doc, "U")?;

        let permissions = entry(dict, doc, "P")?
            .and_then(Object::as_integer)
            .ok_or_else(|| {
                PdfError::InvalidStructure("Encrypt dictionary has no P entry".to_string())
            })? as i32;
        let encrypt_metadata = entry(dict, doc, "EncryptMetadata")?
            .and_then(Object::as_bool)
            .unwrap_or(true);

        let (string_method, stream_method) = if version >= 4 {
            let filters = entry(dict, doc, "CF")?.and_then(Object::as_dict);
            let string_name = entry(dict, doc, "StrF")?.and_then(Object::as_name);
            let stream_name = entry(dict, doc, "StmF")?.and_then(Object::as_name);
            (
                crypt_filter_method(string_name.unwrap_or("Identity"), filters, doc)?,
                crypt_filter_method(stream_name.unwrap_or("Identity"), filters, doc)?,
            )
        } else {
            (CryptFilterMethod::V2, CryptFilterMethod::V2)
        };

        Ok(Self {
            version,
            revision,
            key_length,
            owner_hash,
            user_hash,
            permissions,
            encrypt_metadata,
            string_method,
            stream_method,
        })
    }
}

fn entry<'a>(dict: &'a Dictionary, doc: &'a Document, key: &str) -> Result<Option<&'a Object>> {
    match dict.get(key) {
        Some(value) => Ok(Some(doc.resolve(value)?)),
        None => Ok(None),
    }
}

/// `O` or `U`: 32 bytes for revisions 2 to 4
fn password_hash(dict: &Dictionary, doc: &Document, key: &str) -> Result<Vec<u8>> {
    match entry(dict, doc, key)?.and_then(Object::as_string) {
        Some(bytes) if bytes.len() >= 32 => Ok(bytes[..32].to_vec()),
        _ => Err(PdfError::Encryption(format!(
            "Encrypt dictionary has a missing or short {key} entry"
        ))),
    }
}

fn crypt_filter_method(
    name: &str,
    filters: Option<&Dictionary>,
    doc: &Document,
) -> Result<CryptFilterMethod> {
    if name == "Identity" {
        return Ok(CryptFilterMethod::Identity);
    }
    let filter = match filters.and_then(|cf| cf.get(name)) {
        Some(value) => doc.resolve(value)?.as_dict(),
        None => None,
    };
    let filter = filter.ok_or_else(|| {
        PdfError::InvalidStructure(format!("crypt filter '{name}' is not defined"))
    })?;

    match filter.get_name("CFM").unwrap_or("None") {
        "None" => Ok(CryptFilterMethod::Identity),
        "V2" => Ok(CryptFilterMethod::V2),
        "AESV2" => Ok(CryptFilterMethod::AesV2),
        other => Err(PdfError::UnsupportedFeature(format!(
            "crypt filter method {other}"
        ))),
    }
}
