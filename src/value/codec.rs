//! Value codec
//!
//! Converts a [`Value`] into a self-describing [`Envelope`] and back.
//!
//! ## Envelope Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Tag (1)  │          Payload            │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! The payload is the bincode encoding of the variant's inner value:
//! fixed-width little-endian scalars, `u64` length prefixes for strings,
//! byte sequences and arrays. Trailing bytes are rejected.

use bincode::Options;
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{KvError, Result};

use super::{Value, ValueKind};

/// Maximum encoded payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u64 = 16 * 1024 * 1024;

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_PAYLOAD_SIZE)
        .with_little_endian()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// A (type tag, encoded payload) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    tag: u8,
    payload: Bytes,
}

impl Envelope {
    /// Build an envelope from a raw tag and payload
    ///
    /// No validation happens here; `unmarshal` reports bad tags and
    /// malformed payloads.
    pub fn new(tag: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Kind named by the tag
    pub fn kind(&self) -> Result<ValueKind> {
        ValueKind::try_from(self.tag)
    }

    /// Length of the encoded form
    pub fn encoded_len(&self) -> usize {
        1 + self.payload.len()
    }

    /// Encode as `tag | payload`
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.tag);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode from `tag | payload`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&tag, payload)) => Ok(Self::new(tag, Bytes::copy_from_slice(payload))),
            None => Err(KvError::Decode("empty envelope".to_string())),
        }
    }
}

// =============================================================================
// Marshal
// =============================================================================

/// Encode a value into an envelope tagged with its kind
pub fn marshal(value: &Value) -> Result<Envelope> {
    let payload = match value {
        Value::String(v) => encode_payload(v),
        Value::Bytes(v) => encode_payload(v),
        Value::Bool(v) => encode_payload(v),
        Value::I32(v) => encode_payload(v),
        Value::I64(v) => encode_payload(v),
        Value::U32(v) => encode_payload(v),
        Value::U64(v) => encode_payload(v),
        Value::F32(v) => encode_payload(v),
        Value::F64(v) => encode_payload(v),
        Value::StringArray(v) => encode_payload(v),
        Value::I32Array(v) => encode_payload(v),
        Value::I64Array(v) => encode_payload(v),
        Value::F32Array(v) => encode_payload(v),
        Value::F64Array(v) => encode_payload(v),
    }
    .map_err(|e| KvError::Encode(format!("{} payload: {}", value.kind(), e)))?;

    Ok(Envelope::new(value.kind().tag(), payload))
}

fn encode_payload<T: Serialize + ?Sized>(value: &T) -> bincode::Result<Vec<u8>> {
    payload_options().serialize(value)
}

// =============================================================================
// Unmarshal
// =============================================================================

/// Decode an envelope into the value its tag names
pub fn unmarshal(envelope: &Envelope) -> Result<Value> {
    let kind = envelope.kind()?;
    let bytes = envelope.payload();

    let value = match kind {
        ValueKind::String => Value::String(decode_payload(kind, bytes)?),
        ValueKind::Bytes => Value::Bytes(decode_payload(kind, bytes)?),
        ValueKind::Bool => Value::Bool(decode_payload(kind, bytes)?),
        ValueKind::I32 => Value::I32(decode_payload(kind, bytes)?),
        ValueKind::I64 => Value::I64(decode_payload(kind, bytes)?),
        ValueKind::U32 => Value::U32(decode_payload(kind, bytes)?),
        ValueKind::U64 => Value::U64(decode_payload(kind, bytes)?),
        ValueKind::F32 => Value::F32(decode_payload(kind, bytes)?),
        ValueKind::F64 => Value::F64(decode_payload(kind, bytes)?),
        ValueKind::StringArray => Value::StringArray(decode_payload(kind, bytes)?),
        ValueKind::I32Array => Value::I32Array(decode_payload(kind, bytes)?),
        ValueKind::I64Array => Value::I64Array(decode_payload(kind, bytes)?),
        ValueKind::F32Array => Value::F32Array(decode_payload(kind, bytes)?),
        ValueKind::F64Array => Value::F64Array(decode_payload(kind, bytes)?),
    };

    Ok(value)
}

fn decode_payload<T: DeserializeOwned>(kind: ValueKind, bytes: &[u8]) -> Result<T> {
    payload_options()
        .deserialize(bytes)
        .map_err(|e| KvError::Decode(format!("malformed {} payload: {}", kind, e)))
}

/// Decode an envelope and convert it to `T`
///
/// The envelope must carry the canonical kind of `T` (see the module
/// docs); narrow integer types are truncated back from their wire width.
pub fn unmarshal_typed<T: FromValue>(envelope: &Envelope) -> Result<T> {
    // Check the tag before touching the payload so a mismatch is reported
    // as such even when the payload would not decode as T.
    let found = envelope.kind()?;
    if found != T::KIND {
        return Err(KvError::TypeMismatch {
            expected: T::KIND,
            found,
        });
    }
    T::from_value(unmarshal(envelope)?)
}

// =============================================================================
// Typed Extraction
// =============================================================================

/// Native types that can be extracted from a [`Value`]
pub trait FromValue: Sized {
    /// Canonical kind this type is carried as
    const KIND: ValueKind;

    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! from_value_exact {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl FromValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(KvError::TypeMismatch {
                        expected: Self::KIND,
                        found: other.kind(),
                    }),
                }
            }
        }
    )*};
}

macro_rules! from_value_narrowing {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl FromValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v as $ty),
                    other => Err(KvError::TypeMismatch {
                        expected: Self::KIND,
                        found: other.kind(),
                    }),
                }
            }
        }
    )*};
}

from_value_exact! {
    String => String,
    Vec<u8> => Bytes,
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<String> => StringArray,
    Vec<i32> => I32Array,
    Vec<i64> => I64Array,
    Vec<f32> => F32Array,
    Vec<f64> => F64Array,
}

from_value_narrowing! {
    i8 => I32,
    i16 => I32,
    isize => I64,
    u8 => U32,
    u16 => U32,
    usize => U64,
}
