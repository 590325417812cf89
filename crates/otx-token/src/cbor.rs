//! Canonical CBOR encoding.
//!
//! Every structure that is hashed or signed is first encoded to CBOR
//! (RFC 8949) with [`ciborium`]. Struct fields are emitted in declaration
//! order, so the encoding of a value is deterministic.
//!
//! Decoding is strict: [`from_slice_canonical`] re-encodes the decoded value
//! and rejects input that does not reproduce byte for byte. Trailing bytes,
//! non-minimal integers and any other alternative encodings are refused.

use serde::{de::DeserializeOwned, Serialize};

use crate::{Result, TokenError};

/// Serialize a value to CBOR bytes, naming the type in the error.
pub fn to_vec_named<T: Serialize>(value: &T, type_name: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| {
        TokenError::Serialization(format!("CBOR serialization of {type_name} failed: {e}"))
    })?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes, naming the type in the error.
pub fn from_slice_named<T: DeserializeOwned>(data: &[u8], type_name: &str) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| {
        TokenError::Deserialization(format!("CBOR deserialization of {type_name} failed: {e}"))
    })
}

/// Deserialize and require that `data` is the canonical encoding of the result.
pub fn from_slice_canonical<T: DeserializeOwned + Serialize>(
    data: &[u8],
    type_name: &str,
) -> Result<T> {
    let value: T = from_slice_named(data, type_name)?;
    let reencoded = to_vec_named(&value, type_name)?;
    if reencoded != data {
        return Err(TokenError::Deserialization(format!(
            "{type_name} is not canonically encoded"
        )));
    }
    Ok(value)
}
