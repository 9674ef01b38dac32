use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::encoding::{
    content_types, decode_non_negative_integer, is_critical, types, write_non_negative_integer_tlv,
    write_tlv, TlvError, TlvReader,
};
use crate::packet::{Component, Name, Signature, SignatureInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub content_type: u64,
    pub freshness_period: Option<Duration>,
}

impl Default for MetaInfo {
    fn default() -> Self {
        MetaInfo {
            content_type: content_types::BLOB,
            freshness_period: None,
        }
    }
}

impl MetaInfo {
    fn is_default(&self) -> bool {
        self.content_type == content_types::BLOB && self.freshness_period.is_none()
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut value = Vec::new();
        if self.content_type != content_types::BLOB {
            write_non_negative_integer_tlv(&mut value, types::CONTENT_TYPE, self.content_type);
        }
        if let Some(freshness) = self.freshness_period {
            write_non_negative_integer_tlv(
                &mut value,
                types::FRESHNESS_PERIOD,
                freshness.as_millis() as u64,
            );
        }
        write_tlv(buf, types::META_INFO, &value);
    }

    pub fn decode_value(value: &[u8]) -> Result<MetaInfo, TlvError> {
        let mut meta_info = MetaInfo::default();
        let mut reader = TlvReader::new(value);
        while !reader.is_empty() {
            let element = reader.read_element()?;
            match element.typ {
                types::CONTENT_TYPE => {
                    meta_info.content_type = decode_non_negative_integer(element.value)?
                }
                types::FRESHNESS_PERIOD => {
                    meta_info.freshness_period = Some(Duration::from_millis(
                        decode_non_negative_integer(element.value)?,
                    ))
                }
                // FinalBlockId and application extensions are carried but not interpreted
                _ => {}
            }
        }
        Ok(meta_info)
    }
}

/// A Data packet.
///
/// Packets produced by [`Data::wire_decode`] remember their exact wire and
/// signed portion so that verification covers the bytes that were actually
/// signed. Every setter drops that cache.
#[derive(Debug, Clone)]
pub struct Data {
    name: Name,
    meta_info: MetaInfo,
    content: Vec<u8>,
    signature: Signature,
    wire: Option<DecodedWire>,
}

#[derive(Debug, Clone)]
struct DecodedWire {
    wire: Vec<u8>,
    signed_start: usize,
    signed_end: usize,
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.wire_encode() == other.wire_encode()
    }
}

impl Eq for Data {}

impl Data {
    pub fn new(name: Name) -> Self {
        Data {
            name,
            meta_info: MetaInfo::default(),
            content: Vec::new(),
            signature: Signature::default(),
            wire: None,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn signature_info(&self) -> &SignatureInfo {
        &self.signature.info
    }

    pub fn set_name(&mut self, name: Name) -> &mut Self {
        self.name = name;
        self.wire = None;
        self
    }

    pub fn set_meta_info(&mut self, meta_info: MetaInfo) -> &mut Self {
        self.meta_info = meta_info;
        self.wire = None;
        self
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) -> &mut Self {
        self.content = content.into();
        self.wire = None;
        self
    }

    pub fn set_signature_info(&mut self, info: SignatureInfo) -> &mut Self {
        self.signature.info = info;
        self.wire = None;
        self
    }

    pub fn set_signature_value(&mut self, value: Vec<u8>) -> &mut Self {
        self.signature.value = value;
        self.wire = None;
        self
    }

    /// Bytes covered by the signature: Name through SignatureInfo.
    pub fn signed_portion(&self) -> Vec<u8> {
        if let Some(decoded) = &self.wire {
            return decoded.wire[decoded.signed_start..decoded.signed_end].to_vec();
        }
        let mut buf = Vec::new();
        self.name.encode(&mut buf);
        if !self.meta_info.is_default() {
            self.meta_info.encode(&mut buf);
        }
        if !self.content.is_empty() {
            write_tlv(&mut buf, types::CONTENT, &self.content);
        }
        self.signature.info.encode(&mut buf);
        buf
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        if let Some(decoded) = &self.wire {
            return decoded.wire.clone();
        }
        let mut value = self.signed_portion();
        self.signature.encode_value(&mut value);
        let mut buf = Vec::with_capacity(value.len() + 4);
        write_tlv(&mut buf, types::DATA, &value);
        buf
    }

    pub fn wire_decode(wire: &[u8]) -> Result<Data, TlvError> {
        let outer = TlvReader::read_single(wire, types::DATA)?;
        // Offset of the Data TLV-VALUE inside `wire`
        let value_offset = outer.end - outer.value.len();

        let mut reader = TlvReader::new(outer.value);
        let name_element = reader.read_expected(types::NAME)?;
        let name = Name::decode_value(name_element.value)?;

        let mut meta_info = MetaInfo::default();
        let mut content = Vec::new();
        let mut signature_info = None;
        let mut signed_end = None;
        let mut signature_value = None;

        while !reader.is_empty() {
            let element = reader.read_element()?;
            match element.typ {
                types::META_INFO => meta_info = MetaInfo::decode_value(element.value)?,
                types::CONTENT => content = element.value.to_vec(),
                types::SIGNATURE_INFO => {
                    signature_info = Some(SignatureInfo::decode_value(element.value)?);
                    signed_end = Some(element.end);
                }
                types::SIGNATURE_VALUE => {
                    signature_value = Some(element.value.to_vec());
                    break;
                }
                typ if is_critical(typ) => return Err(TlvError::UnrecognizedCritical(typ)),
                _ => {}
            }
        }

        let info = signature_info.ok_or(TlvError::MissingElement(types::SIGNATURE_INFO))?;
        let value = signature_value.ok_or(TlvError::MissingElement(types::SIGNATURE_VALUE))?;
        let signed_end = signed_end.ok_or(TlvError::MissingElement(types::SIGNATURE_INFO))?;

        Ok(Data {
            name,
            meta_info,
            content,
            signature: Signature::new(info, value),
            wire: Some(DecodedWire {
                wire: wire.to_vec(),
                signed_start: value_offset + name_element.start,
                signed_end: value_offset + signed_end,
            }),
        })
    }

    /// Name with the implicit SHA-256 digest of the full wire encoding appended.
    pub fn full_name(&self) -> Name {
        let digest: [u8; 32] = Sha256::digest(self.wire_encode()).into();
        self.name
            .clone()
            .append(Component::implicit_sha256_digest(digest))
    }
}
