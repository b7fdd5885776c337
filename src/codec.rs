//! Canonical text encoding for identifiers and JSON documents.
//!
//! Identifiers are serialized with the store's [`JsonCodec`]. A JSON string
//! literal loses its outer quotes so plain string keys stay readable in the
//! `nodes`/`edges` tables; every other value keeps its full JSON text. Escape
//! sequences inside a string are kept, so re-adding the quotes restores the
//! exact literal.
//!
//! Objects are encoded in the codec's field order. Two objects that are equal
//! as JSON but list their keys in a different order produce different keys and
//! never match each other in storage.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{CodecError, GraphError, Result};

pub const EMPTY_DOCUMENT: &str = "{}";

/// Pluggable JSON serializer used for identifiers, node bodies and edge properties.
pub trait JsonCodec {
    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> std::result::Result<Vec<u8>, CodecError>;

    fn from_json<T: DeserializeOwned>(&self, bytes: &[u8]) -> std::result::Result<T, CodecError>;
}

/// Compact `serde_json` codec; the default for every store.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> std::result::Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_json<T: DeserializeOwned>(&self, bytes: &[u8]) -> std::result::Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Canonical text form of an identifier, exactly as stored in `nodes.id`,
/// `edges.source` and `edges.target`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdKey(String);

impl IdKey {
    /// Wraps text that is already in canonical form (e.g. read back from the database).
    pub fn from_canonical<T: Into<String>>(text: T) -> Self {
        IdKey(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn decode<T: DeserializeOwned, C: JsonCodec>(&self, codec: &C) -> Result<T> {
        decode_id(codec, self)
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn encode_id<T: Serialize + ?Sized, C: JsonCodec>(codec: &C, value: &T) -> Result<IdKey> {
    let mut bytes = codec.to_json(value).map_err(GraphError::EncodingError)?;
    if is_string_literal(&bytes) {
        bytes.pop();
        bytes.remove(0);
    }
    let text = String::from_utf8(bytes).map_err(GraphError::encoding)?;
    Ok(IdKey(text))
}

pub fn encode_document<T: Serialize + ?Sized, C: JsonCodec>(codec: &C, value: &T) -> Result<String> {
    let bytes = codec.to_json(value).map_err(GraphError::EncodingError)?;
    if bytes.is_empty() {
        return Ok(EMPTY_DOCUMENT.to_string());
    }
    String::from_utf8(bytes).map_err(GraphError::encoding)
}

pub fn decode<T: DeserializeOwned, C: JsonCodec>(codec: &C, bytes: &[u8]) -> Result<T> {
    codec.from_json(bytes).map_err(GraphError::DecodingError)
}

/// Inverse of [`encode_id`]. The key text is first parsed as JSON; when that
/// fails it is parsed again as the body of a string literal.
pub fn decode_id<T: DeserializeOwned, C: JsonCodec>(codec: &C, key: &IdKey) -> Result<T> {
    match codec.from_json(key.as_str().as_bytes()) {
        Ok(value) => Ok(value),
        Err(err) => {
            let quoted = format!("\"{}\"", key.as_str());
            codec
                .from_json(quoted.as_bytes())
                .map_err(|_| GraphError::DecodingError(err))
        }
    }
}

fn is_string_literal(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"'
}
