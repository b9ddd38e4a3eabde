//! Canonical binary encoding.
//!
//! The byte layout here is protocol. Never inline encoding in business
//! logic; every persisted or hashed structure goes through [`Encoder`] and
//! [`Decoder`].
//!
//! Layout conventions:
//!
//! - unsigned integers: fixed-width little-endian
//! - big unsigned integers: one length byte, then the magnitude big-endian
//!   (the empty magnitude is zero)
//! - booleans: one byte, `0` or `1`
//! - 32-byte identifiers: raw bytes, no prefix
//! - variable slices: u64 length prefix, then the raw bytes

use num_bigint::BigUint;
use num_traits::Zero;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("trailing bytes after decoding")]
    TrailingBytes,

    #[error("invalid boolean byte")]
    InvalidBool,

    #[error("big unsigned integer has a leading zero byte")]
    NonCanonicalBigUint,

    #[error("invalid hex string")]
    InvalidHex,

    #[error("invalid length")]
    InvalidLength,

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("unknown unlock condition type {0}")]
    UnknownConditionType(u8),
}

/// Append-only canonical encoder.
#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bytes_32(&mut self, v: &[u8; 32]) {
        self.buf.extend_from_slice(v);
    }

    pub fn put_slice(&mut self, v: &[u8]) {
        self.put_u64(v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    /// Length byte + big-endian magnitude. Zero encodes as a single `0`
    /// length byte; the magnitude never carries a leading zero.
    pub fn put_big_uint(&mut self, v: &BigUint) {
        if v.is_zero() {
            self.buf.push(0);
            return;
        }
        let bytes = v.to_bytes_be();
        debug_assert!(bytes.len() <= u8::MAX as usize);
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(&bytes);
    }

    /// Raw access for embedding pre-encoded fragments.
    pub fn put_raw(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a canonical byte string.
pub struct Decoder<'a> {
    rest: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.rest.len() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    pub fn take_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn take_bool(&mut self) -> Result<bool, CodecError> {
        match self.take_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CodecError::InvalidBool),
        }
    }

    pub fn take_u64(&mut self) -> Result<u64, CodecError> {
        let raw = self.take(8)?;
        Ok(u64::from_le_bytes(raw.try_into().expect("8-byte slice")))
    }

    pub fn take_bytes_32(&mut self) -> Result<[u8; 32], CodecError> {
        let raw = self.take(32)?;
        Ok(raw.try_into().expect("32-byte slice"))
    }

    pub fn take_slice(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.take_u64()? as usize;
        self.take(len)
    }

    pub fn take_big_uint(&mut self) -> Result<BigUint, CodecError> {
        let len = self.take_u8()? as usize;
        let raw = self.take(len)?;
        if len > 0 && raw[0] == 0 {
            return Err(CodecError::NonCanonicalBigUint);
        }
        Ok(BigUint::from_bytes_be(raw))
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Fails unless the input has been fully consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes)
        }
    }
}
