//! NDN certificates: Data packets that carry a public key.
//!
//! A certificate is named `/<identity>/KEY/<key-id>/<issuer-id>/<version>`,
//! has ContentType KEY, carries the SubjectPublicKeyInfo DER of the key as
//! its content, and holds a ValidityPeriod in its SignatureInfo.

use std::convert::TryFrom;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::encoding::{content_types, TlvError};
use crate::packet::{Component, Data, KeyLocator, Name, SignatureInfo, ValidityPeriod};

pub const KEY_COMPONENT: &[u8] = b"KEY";

/// Position of the `KEY` marker counted from the end of a certificate name.
const KEY_COMPONENT_OFFSET: isize = -4;
const MIN_CERT_NAME_LENGTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("Name `{0}` does not follow the naming convention for certificates")]
    InvalidName(Name),

    #[error("Expecting ContentType Key, got {0}")]
    WrongContentType(u64),

    #[error("Certificate content is empty")]
    EmptyContent,

    #[error("Certificate is missing a ValidityPeriod")]
    MissingValidityPeriod,

    #[error("Failed to decode certificate: {0}")]
    Decode(#[from] TlvError),

    #[error("Certificate is not valid base64: {0}")]
    Base64(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    data: Data,
    validity_period: ValidityPeriod,
}

impl Certificate {
    /// Checks whether `name` is shaped like a certificate name.
    pub fn is_valid_name(name: &Name) -> bool {
        name.len() >= MIN_CERT_NAME_LENGTH
            && name
                .get(KEY_COMPONENT_OFFSET)
                .map(|c| c.is_generic() && c.value() == KEY_COMPONENT)
                .unwrap_or(false)
    }

    /// Builds the key name `/<identity>/KEY/<key-id>`.
    pub fn to_key_name(identity: &Name, key_id: Component) -> Name {
        identity
            .clone()
            .append(Component::generic(KEY_COMPONENT))
            .append(key_id)
    }

    pub fn wire_decode(wire: &[u8]) -> Result<Certificate, CertificateError> {
        Certificate::try_from(Data::wire_decode(wire)?)
    }

    pub fn from_base64(text: &str) -> Result<Certificate, CertificateError> {
        let compact: String = text.split_whitespace().collect();
        let wire = STANDARD
            .decode(compact)
            .map_err(|e| CertificateError::Base64(e.to_string()))?;
        Certificate::wire_decode(&wire)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.data.wire_encode())
    }

    pub fn name(&self) -> &Name {
        self.data.name()
    }

    /// `/<identity>/KEY/<key-id>`
    pub fn key_name(&self) -> Name {
        self.data.name().prefix(-2)
    }

    pub fn identity(&self) -> Name {
        self.data.name().prefix(KEY_COMPONENT_OFFSET)
    }

    pub fn key_id(&self) -> Option<&Component> {
        self.data.name().get(-3)
    }

    pub fn issuer_id(&self) -> Option<&Component> {
        self.data.name().get(-2)
    }

    /// SubjectPublicKeyInfo DER of the certified key.
    pub fn public_key(&self) -> &[u8] {
        self.data.content()
    }

    pub fn validity_period(&self) -> &ValidityPeriod {
        &self.validity_period
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.validity_period.is_valid(now)
    }

    pub fn signature_info(&self) -> &SignatureInfo {
        self.data.signature_info()
    }

    /// Name in the KeyLocator of this certificate's signature, if any.
    pub fn issuer_key_name(&self) -> Option<&Name> {
        match self.data.signature_info().key_locator() {
            Some(KeyLocator::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn is_self_signed(&self) -> bool {
        self.issuer_key_name()
            .map(|issuer| issuer.is_prefix_of(self.name()))
            .unwrap_or(false)
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn into_data(self) -> Data {
        self.data
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        self.data.wire_encode()
    }
}

impl TryFrom<Data> for Certificate {
    type Error = CertificateError;

    fn try_from(data: Data) -> Result<Self, Self::Error> {
        if !Certificate::is_valid_name(data.name()) {
            return Err(CertificateError::InvalidName(data.name().clone()));
        }
        if data.meta_info().content_type != content_types::KEY {
            return Err(CertificateError::WrongContentType(
                data.meta_info().content_type,
            ));
        }
        if data.content().is_empty() {
            return Err(CertificateError::EmptyContent);
        }
        let validity_period = *data
            .signature_info()
            .validity_period()
            .ok_or(CertificateError::MissingValidityPeriod)?;
        Ok(Certificate {
            data,
            validity_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MetaInfo;
    use chrono::Duration;

    fn certificate_data(name: &str) -> Data {
        let now = Utc::now();
        let mut data = Data::new(name.parse().unwrap());
        data.set_meta_info(MetaInfo {
            content_type: content_types::KEY,
            freshness_period: None,
        })
        .set_content(vec![1, 2, 3])
        .set_signature_info(SignatureInfo::Sha256WithEcdsa {
            key_locator: Some(KeyLocator::Name("/root/KEY/r".parse().unwrap())),
            validity_period: Some(ValidityPeriod::new(now, now + Duration::days(1))),
        })
        .set_signature_value(vec![0; 8]);
        data
    }

    #[test]
    fn test_certificate_name_parts() {
        let certificate =
            Certificate::try_from(certificate_data("/site/alice/KEY/k1/root/v=5")).unwrap();
        assert_eq!(certificate.identity().to_uri(), "/site/alice");
        assert_eq!(certificate.key_name().to_uri(), "/site/alice/KEY/k1");
        assert_eq!(certificate.issuer_id().unwrap().value(), b"root");
        assert_eq!(certificate.public_key(), &[1, 2, 3]);
        assert!(!certificate.is_self_signed());
        assert!(certificate.is_valid(Utc::now()));
    }

    #[test]
    fn test_rejects_bad_name() {
        let err = Certificate::try_from(certificate_data("/site/alice/k1/root/v=5")).unwrap_err();
        assert!(matches!(err, CertificateError::InvalidName(_)));
    }

    #[test]
    fn test_rejects_blob_content_type() {
        let mut data = certificate_data("/a/KEY/k/i/v=1");
        data.set_meta_info(MetaInfo::default());
        assert_eq!(
            Certificate::try_from(data).unwrap_err(),
            CertificateError::WrongContentType(content_types::BLOB)
        );
    }

    #[test]
    fn test_rejects_missing_validity() {
        let mut data = certificate_data("/a/KEY/k/i/v=1");
        data.set_signature_info(SignatureInfo::Sha256WithEcdsa {
            key_locator: None,
            validity_period: None,
        });
        assert_eq!(
            Certificate::try_from(data).unwrap_err(),
            CertificateError::MissingValidityPeriod
        );
    }

    #[test]
    fn test_base64_round_trip_tolerates_line_breaks() {
        let certificate = Certificate::try_from(certificate_data("/a/KEY/k/i/v=1")).unwrap();
        let encoded = certificate.to_base64();
        let wrapped = format!("{}\n{}\n", &encoded[..10], &encoded[10..]);
        assert_eq!(Certificate::from_base64(&wrapped).unwrap(), certificate);
    }
}
