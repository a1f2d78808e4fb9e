//! Dynamic field values carried through decode and encode.

use crate::error::{Result, StructError};
use std::fmt;

/// A value held by one field of a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer, up to 64 bits
    UInt(u64),
    /// Signed integer, up to 64 bits
    Int(i64),
    /// Raw byte run
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the unsigned integer payload, or a value error.
    pub fn as_uint(&self) -> Result<u64> {
        match self {
            Value::UInt(v) => Ok(*v),
            other => Err(StructError::Value(format!(
                "expected an unsigned integer, got {}",
                other.type_name()
            ))),
        }
    }

    /// Returns the signed integer payload, or a value error.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(StructError::Value(format!(
                "expected a signed integer, got {}",
                other.type_name()
            ))),
        }
    }

    /// Returns the byte payload, or a value error.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(v) => Ok(v),
            other => Err(StructError::Value(format!(
                "expected bytes, got {}",
                other.type_name()
            ))),
        }
    }

    /// Short variant name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::UInt(_) => "uint",
            Value::Int(_) => "int",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::UInt(7).as_uint().unwrap(), 7);
        assert_eq!(Value::Int(-3).as_int().unwrap(), -3);
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes().unwrap(), &[1, 2]);
    }

    #[test]
    fn test_accessor_mismatch() {
        let err = Value::Bytes(vec![0]).as_uint().unwrap_err();
        match err {
            StructError::Value(msg) => assert!(msg.contains("bytes")),
            _ => panic!("Expected Value error"),
        }
    }

    #[test]
    fn test_display_bytes_as_hex() {
        let v = Value::Bytes(vec![0xde, 0xad]);
        assert_eq!(v.to_string(), "0xdead");
    }
}
