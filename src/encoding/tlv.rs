//! NDN-TLV primitives: VarNumber, nonNegativeInteger and a bounded reader.

use thiserror::Error;

/// TLV type numbers used by the packet codec.
pub mod types {
    pub const IMPLICIT_SHA256_DIGEST_COMPONENT: u64 = 0x01;
    pub const INTEREST: u64 = 0x05;
    pub const DATA: u64 = 0x06;
    pub const NAME: u64 = 0x07;
    pub const GENERIC_NAME_COMPONENT: u64 = 0x08;
    pub const NONCE: u64 = 0x0a;
    pub const INTEREST_LIFETIME: u64 = 0x0c;
    pub const MUST_BE_FRESH: u64 = 0x12;
    pub const META_INFO: u64 = 0x14;
    pub const CONTENT: u64 = 0x15;
    pub const SIGNATURE_INFO: u64 = 0x16;
    pub const SIGNATURE_VALUE: u64 = 0x17;
    pub const CONTENT_TYPE: u64 = 0x18;
    pub const FRESHNESS_PERIOD: u64 = 0x19;
    pub const SIGNATURE_TYPE: u64 = 0x1b;
    pub const KEY_LOCATOR: u64 = 0x1c;
    pub const KEY_DIGEST: u64 = 0x1d;
    pub const CAN_BE_PREFIX: u64 = 0x21;
    pub const VERSION_NAME_COMPONENT: u64 = 0x36;
    pub const VALIDITY_PERIOD: u64 = 0xfd;
    pub const NOT_BEFORE: u64 = 0xfe;
    pub const NOT_AFTER: u64 = 0xff;
}

/// ContentType values.
pub mod content_types {
    pub const BLOB: u64 = 0;
    pub const LINK: u64 = 1;
    pub const KEY: u64 = 2;
    pub const NACK: u64 = 3;
}

/// SignatureType values.
pub mod signature_types {
    pub const DIGEST_SHA256: u64 = 0;
    pub const SHA256_WITH_RSA: u64 = 1;
    pub const SHA256_WITH_ECDSA: u64 = 3;
    pub const HMAC_WITH_SHA256: u64 = 4;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    #[error("Unexpected end of input at offset {offset}")]
    Truncated { offset: usize },

    #[error("Expected TLV type {expected}, got {actual}")]
    UnexpectedType { expected: u64, actual: u64 },

    #[error("Missing required element of type {0}")]
    MissingElement(u64),

    #[error("Unrecognized critical element of type {0}")]
    UnrecognizedCritical(u64),

    #[error("Invalid nonNegativeInteger length {0}")]
    InvalidNumberLength(usize),

    #[error("{0}")]
    Malformed(String),
}

/// Elements with a type of 31 or less, or with an odd type, must be understood by the decoder.
pub fn is_critical(typ: u64) -> bool {
    typ <= 31 || typ % 2 == 1
}

pub fn write_var_number(buf: &mut Vec<u8>, value: u64) {
    if value < 253 {
        buf.push(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.push(253);
        buf.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        buf.push(254);
        buf.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        buf.push(255);
        buf.extend_from_slice(&value.to_be_bytes());
    }
}

pub fn write_tlv(buf: &mut Vec<u8>, typ: u64, value: &[u8]) {
    write_var_number(buf, typ);
    write_var_number(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

pub fn write_non_negative_integer_tlv(buf: &mut Vec<u8>, typ: u64, value: u64) {
    write_tlv(buf, typ, &encode_non_negative_integer(value));
}

/// Shortest big-endian encoding of 1, 2, 4 or 8 octets.
pub fn encode_non_negative_integer(value: u64) -> Vec<u8> {
    if value <= u8::MAX as u64 {
        vec![value as u8]
    } else if value <= u16::MAX as u64 {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= u32::MAX as u64 {
        (value as u32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

pub fn decode_non_negative_integer(bytes: &[u8]) -> Result<u64, TlvError> {
    match bytes.len() {
        1 => Ok(bytes[0] as u64),
        2 => Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as u64),
        4 => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64),
        8 => {
            let mut array = [0u8; 8];
            array.copy_from_slice(bytes);
            Ok(u64::from_be_bytes(array))
        }
        len => Err(TlvError::InvalidNumberLength(len)),
    }
}

/// One decoded TLV element borrowed from the input buffer.
///
/// `start` and `end` are offsets of the whole element (type and length
/// included) inside the buffer the reader was created on.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub typ: u64,
    pub value: &'a [u8],
    pub start: usize,
    pub end: usize,
}

pub struct TlvReader<'a> {
    data: &'a [u8],
    pub position: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        TlvReader { data, position: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    fn read(&mut self, length: usize) -> Result<&'a [u8], TlvError> {
        let end = self
            .position
            .checked_add(length)
            .filter(|end| *end <= self.data.len())
            .ok_or(TlvError::Truncated {
                offset: self.position,
            })?;
        let result = &self.data[self.position..end];
        self.position = end;
        Ok(result)
    }

    pub fn read_var_number(&mut self) -> Result<u64, TlvError> {
        let first = self.read(1)?[0];
        let value = match first {
            253 => u16::from_be_bytes(self.read(2)?.try_into().unwrap_or([0; 2])) as u64,
            254 => u32::from_be_bytes(self.read(4)?.try_into().unwrap_or([0; 4])) as u64,
            255 => u64::from_be_bytes(self.read(8)?.try_into().unwrap_or([0; 8])),
            n => n as u64,
        };
        Ok(value)
    }

    pub fn read_element(&mut self) -> Result<Element<'a>, TlvError> {
        let start = self.position;
        let typ = self.read_var_number()?;
        let length = self.read_var_number()?;
        let length = usize::try_from(length).map_err(|_| TlvError::Truncated { offset: start })?;
        let value = self.read(length)?;
        Ok(Element {
            typ,
            value,
            start,
            end: self.position,
        })
    }

    /// Type of the next element without consuming it.
    pub fn peek_type(&self) -> Result<Option<u64>, TlvError> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut lookahead = TlvReader {
            data: self.data,
            position: self.position,
        };
        lookahead.read_var_number().map(Some)
    }

    pub fn read_expected(&mut self, typ: u64) -> Result<Element<'a>, TlvError> {
        match self.peek_type()? {
            None => Err(TlvError::MissingElement(typ)),
            Some(actual) if actual != typ => Err(TlvError::UnexpectedType {
                expected: typ,
                actual,
            }),
            Some(_) => self.read_element(),
        }
    }

    pub fn read_optional(&mut self, typ: u64) -> Result<Option<Element<'a>>, TlvError> {
        if self.peek_type()? == Some(typ) {
            self.read_element().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads one whole top-level element and rejects trailing bytes.
    pub fn read_single(data: &'a [u8], typ: u64) -> Result<Element<'a>, TlvError> {
        let mut reader = TlvReader::new(data);
        let element = reader.read_expected(typ)?;
        if !reader.is_empty() {
            return Err(TlvError::Malformed(format!(
                "{} trailing bytes after element of type {}",
                data.len() - reader.position,
                typ
            )));
        }
        Ok(element)
    }
}
