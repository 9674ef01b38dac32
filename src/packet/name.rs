//! Hierarchical NDN names.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::encoding::{
    decode_non_negative_integer, encode_non_negative_integer, types, write_tlv, TlvError,
    TlvReader,
};

const DIGEST_PREFIX: &str = "sha256digest=";
const VERSION_PREFIX: &str = "v=";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Invalid percent-encoding in `{0}`")]
    InvalidEscape(String),

    #[error("Illegal URI component `{0}`")]
    InvalidComponent(String),
}

/// One name component: a TLV type and an opaque value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    typ: u64,
    value: Vec<u8>,
}

impl Component {
    pub fn new(typ: u64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            typ,
            value: value.into(),
        }
    }

    pub fn generic(value: impl Into<Vec<u8>>) -> Self {
        Self::new(types::GENERIC_NAME_COMPONENT, value)
    }

    /// Generic component holding a nonNegativeInteger.
    pub fn from_number(number: u64) -> Self {
        Self::generic(encode_non_negative_integer(number))
    }

    pub fn from_version(version: u64) -> Self {
        Self::new(
            types::VERSION_NAME_COMPONENT,
            encode_non_negative_integer(version),
        )
    }

    pub fn implicit_sha256_digest(digest: [u8; 32]) -> Self {
        Self::new(types::IMPLICIT_SHA256_DIGEST_COMPONENT, digest.to_vec())
    }

    pub fn typ(&self) -> u64 {
        self.typ
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_generic(&self) -> bool {
        self.typ == types::GENERIC_NAME_COMPONENT
    }

    pub fn is_implicit_sha256_digest(&self) -> bool {
        self.typ == types::IMPLICIT_SHA256_DIGEST_COMPONENT && self.value.len() == 32
    }

    pub fn to_number(&self) -> Result<u64, TlvError> {
        decode_non_negative_integer(&self.value)
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        write_tlv(buf, self.typ, &self.value);
    }

    fn write_escaped(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.iter().all(|b| *b == b'.') {
            // An all-period value gains three extra periods so it cannot collide with "." or ".."
            return write!(f, "...{}", ".".repeat(self.value.len()));
        }
        for byte in &self.value {
            if byte.is_ascii_alphanumeric() || b"+-._~".contains(byte) {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "%{:02X}", byte)?;
            }
        }
        Ok(())
    }

    fn unescape(text: &str) -> Result<Vec<u8>, NameError> {
        let bytes = text.as_bytes();
        let mut value = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex_digits = text
                    .get(i + 1..i + 3)
                    .ok_or_else(|| NameError::InvalidEscape(text.to_string()))?;
                let byte = u8::from_str_radix(hex_digits, 16)
                    .map_err(|_| NameError::InvalidEscape(text.to_string()))?;
                value.push(byte);
                i += 3;
            } else {
                value.push(bytes[i]);
                i += 1;
            }
        }

        if !value.is_empty() && value.iter().all(|b| *b == b'.') {
            if value.len() < 3 {
                return Err(NameError::InvalidComponent(text.to_string()));
            }
            value.truncate(value.len() - 3);
        }
        Ok(value)
    }
}

impl FromStr for Component {
    type Err = NameError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Some(digest_hex) = text.strip_prefix(DIGEST_PREFIX) {
            let digest = hex::decode(digest_hex)
                .ok()
                .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
                .ok_or_else(|| NameError::InvalidComponent(text.to_string()))?;
            return Ok(Component::implicit_sha256_digest(digest));
        }
        if let Some(version) = text.strip_prefix(VERSION_PREFIX) {
            let number = version
                .parse::<u64>()
                .map_err(|_| NameError::InvalidComponent(text.to_string()))?;
            return Ok(Component::from_version(number));
        }
        if let Some((typ, rest)) = text.split_once('=') {
            if let Ok(typ) = typ.parse::<u64>() {
                if typ == 0 || typ > u16::MAX as u64 {
                    return Err(NameError::InvalidComponent(text.to_string()));
                }
                return Ok(Component::new(typ, Self::unescape(rest)?));
            }
        }
        Ok(Component::generic(Self::unescape(text)?))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            types::GENERIC_NAME_COMPONENT => self.write_escaped(f),
            types::IMPLICIT_SHA256_DIGEST_COMPONENT => {
                write!(f, "{}{}", DIGEST_PREFIX, hex::encode(&self.value))
            }
            types::VERSION_NAME_COMPONENT => match self.to_number() {
                Ok(version) => write!(f, "{}{}", VERSION_PREFIX, version),
                Err(_) => {
                    write!(f, "{}=", self.typ)?;
                    self.write_escaped(f)
                }
            },
            typ => {
                write!(f, "{}=", typ)?;
                self.write_escaped(f)
            }
        }
    }
}

impl Ord for Component {
    /// Canonical order: TLV-TYPE, then TLV-LENGTH, then value octets.
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then(self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An NDN name.
///
/// Names order component-wise with a proper prefix sorting before its
/// extensions, so every name under a prefix forms one contiguous range
/// starting at the prefix itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component at `index`; negative indices count from the end.
    pub fn get(&self, index: isize) -> Option<&Component> {
        let resolved = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.components.get(resolved)
    }

    /// The first `count` components; a negative count drops that many from the end.
    pub fn prefix(&self, count: isize) -> Name {
        let end = if count < 0 {
            self.components.len().saturating_sub(count.unsigned_abs())
        } else {
            (count as usize).min(self.components.len())
        };
        Name {
            components: self.components[..end].to_vec(),
        }
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn append(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn append_str(self, component: &str) -> Self {
        self.append(Component::generic(component.as_bytes()))
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self.components[..] == other.components[..self.components.len()]
    }

    pub fn to_uri(&self) -> String {
        self.to_string()
    }

    /// Concatenated component encodings (the Name TLV-VALUE).
    pub fn encode_components(&self, buf: &mut Vec<u8>) {
        for component in &self.components {
            component.encode(buf);
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut value = Vec::new();
        self.encode_components(&mut value);
        write_tlv(buf, types::NAME, &value);
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    pub fn decode_value(value: &[u8]) -> Result<Name, TlvError> {
        let mut reader = TlvReader::new(value);
        let mut components = Vec::new();
        while !reader.is_empty() {
            let element = reader.read_element()?;
            if element.typ == 0 || element.typ > u16::MAX as u64 {
                return Err(TlvError::Malformed(format!(
                    "Invalid name component type {}",
                    element.typ
                )));
            }
            if element.typ == types::IMPLICIT_SHA256_DIGEST_COMPONENT && element.value.len() != 32
            {
                return Err(TlvError::Malformed(
                    "ImplicitSha256DigestComponent must be 32 octets".to_string(),
                ));
            }
            components.push(Component::new(element.typ, element.value));
        }
        Ok(Name { components })
    }

    pub fn wire_decode(wire: &[u8]) -> Result<Name, TlvError> {
        let element = TlvReader::read_single(wire, types::NAME)?;
        Self::decode_value(element.value)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let path = uri.trim().strip_prefix("ndn:").unwrap_or(uri.trim());
        let components = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Component::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Name { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Name {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_uri_parsing_and_display() {
        let parsed = name("ndn:/hello/wor%20ld/v=7");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.get(1).unwrap().value(), b"wor ld");
        assert_eq!(parsed.get(-1).unwrap().to_number().unwrap(), 7);
        assert_eq!(parsed.to_uri(), "/hello/wor%20ld/v=7");
        assert_eq!(Name::new().to_uri(), "/");
    }

    #[test]
    fn test_period_components() {
        let parsed = name("/..../...");
        assert_eq!(parsed.get(0).unwrap().value(), b".");
        assert_eq!(parsed.get(1).unwrap().value(), b"");
        assert_eq!(parsed.to_uri(), "/..../...");
        assert!("/..".parse::<Name>().is_err());
    }

    #[test]
    fn test_digest_component() {
        let digest = [0xAB; 32];
        let full = name("/a").append(Component::implicit_sha256_digest(digest));
        assert!(full.get(-1).unwrap().is_implicit_sha256_digest());
        let reparsed = name(&full.to_uri());
        assert_eq!(reparsed, full);
    }

    #[test]
    fn test_prefix_and_get() {
        let key = name("/ndn/site/alice/KEY/abc");
        assert_eq!(key.prefix(-2), name("/ndn/site/alice"));
        assert_eq!(key.prefix(2), name("/ndn/site"));
        assert_eq!(key.prefix(10), key);
        assert_eq!(key.prefix(-10), Name::new());
        assert_eq!(key.get(-5).unwrap().value(), b"ndn");
        assert!(key.get(-6).is_none());
        assert!(key.get(5).is_none());
        assert!(name("/ndn/site").is_prefix_of(&key));
        assert!(!name("/ndn/other").is_prefix_of(&key));
        assert!(Name::new().is_prefix_of(&key));
    }

    #[test]
    fn test_canonical_order_keeps_prefix_ranges_contiguous() {
        let mut names = vec![
            name("/a/c"),
            name("/b"),
            name("/a"),
            name("/a/bb"),
            name("/a/b/x"),
            name("/a/b"),
        ];
        names.sort();
        assert_eq!(
            names,
            vec![
                name("/a"),
                name("/a/b"),
                name("/a/b/x"),
                name("/a/c"),
                name("/a/bb"),
                name("/b"),
            ]
        );
    }

    #[test]
    fn test_wire_round_trip() {
        let original = name("/ndn/KEY/%00%01/v=3");
        let decoded = Name::wire_decode(&original.wire_encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_short_digest() {
        let mut value = Vec::new();
        write_tlv(&mut value, types::IMPLICIT_SHA256_DIGEST_COMPONENT, &[1, 2, 3]);
        assert!(Name::decode_value(&value).is_err());
    }
}
