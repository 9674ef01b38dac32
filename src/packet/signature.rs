//! Signature information carried by Data packets and signed Interests.
//!
//! `SignatureInfo` is a closed enum over the signature types this crate
//! understands. Each variant carries only the fields its type can hold, so
//! looking up a key locator or validity period is a pattern match.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::encoding::{
    decode_non_negative_integer, is_critical, signature_types, types, write_non_negative_integer_tlv,
    write_tlv, TlvError, TlvReader,
};
use crate::packet::Name;

const VALIDITY_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocator {
    Name(Name),
    KeyDigest(Vec<u8>),
}

impl KeyLocator {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut value = Vec::new();
        match self {
            KeyLocator::Name(name) => name.encode(&mut value),
            KeyLocator::KeyDigest(digest) => write_tlv(&mut value, types::KEY_DIGEST, digest),
        }
        write_tlv(buf, types::KEY_LOCATOR, &value);
    }

    pub fn decode_value(value: &[u8]) -> Result<KeyLocator, TlvError> {
        let mut reader = TlvReader::new(value);
        let element = reader.read_element()?;
        match element.typ {
            types::NAME => Ok(KeyLocator::Name(Name::decode_value(element.value)?)),
            types::KEY_DIGEST => Ok(KeyLocator::KeyDigest(element.value.to_vec())),
            other => Err(TlvError::Malformed(format!(
                "Unsupported KeyLocator type {}",
                other
            ))),
        }
    }
}

/// Inclusive `[not_before, not_after]` window, at one-second granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ValidityPeriod {
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        use chrono::Timelike;
        Self {
            not_before: not_before.with_nanosecond(0).unwrap_or(not_before),
            not_after: not_after.with_nanosecond(0).unwrap_or(not_after),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut value = Vec::new();
        write_tlv(
            &mut value,
            types::NOT_BEFORE,
            self.not_before.format(VALIDITY_TIME_FORMAT).to_string().as_bytes(),
        );
        write_tlv(
            &mut value,
            types::NOT_AFTER,
            self.not_after.format(VALIDITY_TIME_FORMAT).to_string().as_bytes(),
        );
        write_tlv(buf, types::VALIDITY_PERIOD, &value);
    }

    pub fn decode_value(value: &[u8]) -> Result<ValidityPeriod, TlvError> {
        let mut reader = TlvReader::new(value);
        let not_before = parse_time(reader.read_expected(types::NOT_BEFORE)?.value)?;
        let not_after = parse_time(reader.read_expected(types::NOT_AFTER)?.value)?;
        Ok(ValidityPeriod {
            not_before,
            not_after,
        })
    }
}

fn parse_time(value: &[u8]) -> Result<DateTime<Utc>, TlvError> {
    let text = std::str::from_utf8(value)
        .map_err(|_| TlvError::Malformed("ValidityPeriod time is not ASCII".to_string()))?;
    NaiveDateTime::parse_from_str(text, VALIDITY_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TlvError::Malformed(format!("Invalid ValidityPeriod time `{}`: {}", text, e)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureInfo {
    DigestSha256,
    Sha256WithRsa {
        key_locator: Option<KeyLocator>,
        validity_period: Option<ValidityPeriod>,
    },
    Sha256WithEcdsa {
        key_locator: Option<KeyLocator>,
        validity_period: Option<ValidityPeriod>,
    },
    HmacWithSha256 {
        key_locator: Option<KeyLocator>,
    },
    /// A signature type this crate cannot verify.
    Generic {
        signature_type: u64,
        key_locator: Option<KeyLocator>,
        validity_period: Option<ValidityPeriod>,
    },
}

impl SignatureInfo {
    pub fn signature_type(&self) -> u64 {
        match self {
            SignatureInfo::DigestSha256 => signature_types::DIGEST_SHA256,
            SignatureInfo::Sha256WithRsa { .. } => signature_types::SHA256_WITH_RSA,
            SignatureInfo::Sha256WithEcdsa { .. } => signature_types::SHA256_WITH_ECDSA,
            SignatureInfo::HmacWithSha256 { .. } => signature_types::HMAC_WITH_SHA256,
            SignatureInfo::Generic { signature_type, .. } => *signature_type,
        }
    }

    pub fn key_locator(&self) -> Option<&KeyLocator> {
        match self {
            SignatureInfo::DigestSha256 => None,
            SignatureInfo::Sha256WithRsa { key_locator, .. }
            | SignatureInfo::Sha256WithEcdsa { key_locator, .. }
            | SignatureInfo::HmacWithSha256 { key_locator }
            | SignatureInfo::Generic { key_locator, .. } => key_locator.as_ref(),
        }
    }

    pub fn validity_period(&self) -> Option<&ValidityPeriod> {
        match self {
            SignatureInfo::Sha256WithRsa {
                validity_period, ..
            }
            | SignatureInfo::Sha256WithEcdsa {
                validity_period, ..
            }
            | SignatureInfo::Generic {
                validity_period, ..
            } => validity_period.as_ref(),
            SignatureInfo::DigestSha256 | SignatureInfo::HmacWithSha256 { .. } => None,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut value = Vec::new();
        write_non_negative_integer_tlv(&mut value, types::SIGNATURE_TYPE, self.signature_type());
        if let Some(key_locator) = self.key_locator() {
            key_locator.encode(&mut value);
        }
        if let Some(validity_period) = self.validity_period() {
            validity_period.encode(&mut value);
        }
        write_tlv(buf, types::SIGNATURE_INFO, &value);
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    pub fn decode_value(value: &[u8]) -> Result<SignatureInfo, TlvError> {
        let mut reader = TlvReader::new(value);
        let signature_type =
            decode_non_negative_integer(reader.read_expected(types::SIGNATURE_TYPE)?.value)?;

        let mut key_locator = None;
        let mut validity_period = None;
        while !reader.is_empty() {
            let element = reader.read_element()?;
            match element.typ {
                types::KEY_LOCATOR => key_locator = Some(KeyLocator::decode_value(element.value)?),
                types::VALIDITY_PERIOD => {
                    validity_period = Some(ValidityPeriod::decode_value(element.value)?)
                }
                typ if is_critical(typ) => return Err(TlvError::UnrecognizedCritical(typ)),
                _ => {}
            }
        }

        Ok(match signature_type {
            signature_types::DIGEST_SHA256 => SignatureInfo::DigestSha256,
            signature_types::SHA256_WITH_RSA => SignatureInfo::Sha256WithRsa {
                key_locator,
                validity_period,
            },
            signature_types::SHA256_WITH_ECDSA => SignatureInfo::Sha256WithEcdsa {
                key_locator,
                validity_period,
            },
            signature_types::HMAC_WITH_SHA256 => SignatureInfo::HmacWithSha256 { key_locator },
            signature_type => SignatureInfo::Generic {
                signature_type,
                key_locator,
                validity_period,
            },
        })
    }
}

/// A decoded signature: the info block plus the raw signature bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub info: SignatureInfo,
    pub value: Vec<u8>,
}

impl Signature {
    pub fn new(info: SignatureInfo, value: Vec<u8>) -> Self {
        Self { info, value }
    }

    pub fn encode_value(&self, buf: &mut Vec<u8>) {
        write_tlv(buf, types::SIGNATURE_VALUE, &self.value);
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature::new(SignatureInfo::DigestSha256, Vec::new())
    }
}

/// Decodes a complete SignatureInfo TLV and a complete SignatureValue TLV,
/// as embedded in the last two components of a signed Interest name.
pub fn decode_signature_info_and_value(
    info_wire: &[u8],
    value_wire: &[u8],
) -> Result<Signature, TlvError> {
    let info = TlvReader::read_single(info_wire, types::SIGNATURE_INFO)?;
    let value = TlvReader::read_single(value_wire, types::SIGNATURE_VALUE)?;
    Ok(Signature {
        info: SignatureInfo::decode_value(info.value)?,
        value: value.value.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn period() -> ValidityPeriod {
        ValidityPeriod::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2034, 1, 1, 12, 30, 15).unwrap(),
        )
    }

    #[test]
    fn test_validity_period_bounds_are_inclusive() {
        let validity = period();
        assert!(validity.is_valid(validity.not_before));
        assert!(validity.is_valid(validity.not_after));
        assert!(!validity.is_valid(validity.not_after + chrono::Duration::seconds(1)));
        assert!(!validity.is_valid(validity.not_before - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_ecdsa_info_round_trip() {
        let info = SignatureInfo::Sha256WithEcdsa {
            key_locator: Some(KeyLocator::Name("/a/KEY/1".parse().unwrap())),
            validity_period: Some(period()),
        };
        let wire = info.wire_encode();
        let element = TlvReader::read_single(&wire, types::SIGNATURE_INFO).unwrap();
        let decoded = SignatureInfo::decode_value(element.value).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.validity_period(), Some(&period()));
    }

    #[test]
    fn test_unknown_type_decodes_as_generic() {
        let mut value = Vec::new();
        write_non_negative_integer_tlv(&mut value, types::SIGNATURE_TYPE, 200);
        KeyLocator::KeyDigest(vec![1, 2]).encode(&mut value);
        let decoded = SignatureInfo::decode_value(&value).unwrap();
        assert_eq!(decoded.signature_type(), 200);
        assert_eq!(decoded.key_locator(), Some(&KeyLocator::KeyDigest(vec![1, 2])));
    }

    #[test]
    fn test_digest_sha256_has_no_key_locator() {
        assert!(SignatureInfo::DigestSha256.key_locator().is_none());
        let hmac = SignatureInfo::HmacWithSha256 { key_locator: None };
        assert!(hmac.validity_period().is_none());
    }

    #[test]
    fn test_decode_signature_info_and_value() {
        let info = SignatureInfo::Sha256WithRsa {
            key_locator: Some(KeyLocator::Name("/k".parse().unwrap())),
            validity_period: None,
        };
        let signature = Signature::new(info.clone(), vec![9; 16]);
        let mut value_wire = Vec::new();
        signature.encode_value(&mut value_wire);

        let decoded = decode_signature_info_and_value(&info.wire_encode(), &value_wire).unwrap();
        assert_eq!(decoded, signature);

        assert!(decode_signature_info_and_value(&value_wire, &value_wire).is_err());
    }
}
