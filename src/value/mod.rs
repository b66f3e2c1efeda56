//! Value Module
//!
//! The closed catalog of value kinds the store holds and the codec
//! carries across process boundaries.
//!
//! ## Canonical Widths
//! Narrow integers are widened on the way in and narrowed on the way out:
//! - `i8`, `i16`, `i32`      → `I32`
//! - `i64`, `isize`          → `I64`
//! - `u8`, `u16`, `u32`      → `U32`
//! - `u64`, `usize`          → `U64`
//!
//! Narrowing truncates. Callers must not store values that overflow the
//! type they later ask for.

mod codec;

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};

pub use codec::{marshal, unmarshal, unmarshal_typed, Envelope, FromValue, MAX_PAYLOAD_SIZE};

/// A dynamically typed value from the supported catalog
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    StringArray(Vec<String>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

/// The kind of a [`Value`]; the discriminant doubles as the envelope tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    String = 1,
    Bytes = 2,
    Bool = 3,
    I32 = 4,
    I64 = 5,
    U32 = 6,
    U64 = 7,
    F32 = 8,
    F64 = 9,
    StringArray = 10,
    I32Array = 11,
    I64Array = 12,
    F32Array = 13,
    F64Array = 14,
}

impl ValueKind {
    /// Every kind, in tag order
    pub const ALL: [ValueKind; 14] = [
        ValueKind::String,
        ValueKind::Bytes,
        ValueKind::Bool,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::U32,
        ValueKind::U64,
        ValueKind::F32,
        ValueKind::F64,
        ValueKind::StringArray,
        ValueKind::I32Array,
        ValueKind::I64Array,
        ValueKind::F32Array,
        ValueKind::F64Array,
    ];

    /// Envelope tag for this kind
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Short name used in messages and on the command line
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Bool => "bool",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::StringArray => "string[]",
            ValueKind::I32Array => "i32[]",
            ValueKind::I64Array => "i64[]",
            ValueKind::F32Array => "f32[]",
            ValueKind::F64Array => "f64[]",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for ValueKind {
    type Error = KvError;

    fn try_from(tag: u8) -> Result<Self> {
        ValueKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| KvError::Decode(format!("unrecognized envelope tag 0x{:02x}", tag)))
    }
}

impl FromStr for ValueKind {
    type Err = KvError;

    fn from_str(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let kind = match normalized.as_str() {
            "str" => ValueKind::String,
            "int" => ValueKind::I64,
            "uint" => ValueKind::U64,
            "float" | "double" => ValueKind::F64,
            other => ValueKind::ALL
                .iter()
                .copied()
                .find(|kind| kind.name() == other)
                .ok_or_else(|| KvError::UnsupportedType(name.to_string()))?,
        };
        Ok(kind)
    }
}

impl Value {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Bool(_) => ValueKind::Bool,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::StringArray(_) => ValueKind::StringArray,
            Value::I32Array(_) => ValueKind::I32Array,
            Value::I64Array(_) => ValueKind::I64Array,
            Value::F32Array(_) => ValueKind::F32Array,
            Value::F64Array(_) => ValueKind::F64Array,
        }
    }

    /// Parse text into a value of the given kind
    ///
    /// Array kinds take comma separated elements; an empty string is an
    /// empty array. `bytes` takes the UTF-8 bytes of the text as-is.
    pub fn parse(kind: ValueKind, raw: &str) -> Result<Value> {
        let value = match kind {
            ValueKind::String => Value::String(raw.to_string()),
            ValueKind::Bytes => Value::Bytes(raw.as_bytes().to_vec()),
            ValueKind::Bool => Value::Bool(parse_scalar(kind, raw)?),
            ValueKind::I32 => Value::I32(parse_scalar(kind, raw)?),
            ValueKind::I64 => Value::I64(parse_scalar(kind, raw)?),
            ValueKind::U32 => Value::U32(parse_scalar(kind, raw)?),
            ValueKind::U64 => Value::U64(parse_scalar(kind, raw)?),
            ValueKind::F32 => Value::F32(parse_scalar(kind, raw)?),
            ValueKind::F64 => Value::F64(parse_scalar(kind, raw)?),
            ValueKind::StringArray => Value::StringArray(parse_list(kind, raw)?),
            ValueKind::I32Array => Value::I32Array(parse_list(kind, raw)?),
            ValueKind::I64Array => Value::I64Array(parse_list(kind, raw)?),
            ValueKind::F32Array => Value::F32Array(parse_list(kind, raw)?),
            ValueKind::F64Array => Value::F64Array(parse_list(kind, raw)?),
        };
        Ok(value)
    }
}

fn parse_scalar<T>(kind: ValueKind, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| KvError::Parse(format!("{:?} as {}: {}", raw, kind, e)))
}

fn parse_list<T>(kind: ValueKind, raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|item| parse_scalar(kind, item)).collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => {
                f.write_str("0x")?;
                for byte in v {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::StringArray(v) => write!(f, "{:?}", v),
            Value::I32Array(v) => write!(f, "{:?}", v),
            Value::I64Array(v) => write!(f, "{:?}", v),
            Value::F32Array(v) => write!(f, "{:?}", v),
            Value::F64Array(v) => write!(f, "{:?}", v),
        }
    }
}

// =============================================================================
// Native Conversions
// =============================================================================

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

macro_rules! value_from_widening {
    ($($ty:ty => $variant:ident($wide:ty)),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v as $wide)
            }
        }
    )*};
}

value_from! {
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

value_from_widening! {
    i8 => I32(i32),
    i16 => I32(i32),
    isize => I64(i64),
    u8 => U32(u32),
    u16 => U32(u32),
    usize => U64(u64),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}
