//! ECDSA P-256 signing for Data packets, signed Interests and certificates.
//!
//! The validator never signs anything. This module exists so tools and tests
//! can build a PKI, publish certificates, and issue command Interests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::trace;
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use rand_core::{OsRng, RngCore};
use thiserror::Error;

use crate::encoding::{content_types, types, write_tlv};
use crate::packet::{
    Component, Data, Interest, KeyLocator, MetaInfo, Name, SignatureInfo, ValidityPeriod,
};
use crate::security::{Certificate, CertificateError};
use crate::time::{Clock, SystemClock};

const SELF_ISSUER_ID: &[u8] = b"self";

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Failed to encode public key: {0}")]
    PublicKeyEncoding(String),

    #[error("Issued certificate is invalid: {0}")]
    Certificate(#[from] CertificateError),
}

/// A named P-256 key that signs with SHA256-with-ECDSA.
#[derive(Clone)]
pub struct KeySigner {
    key_name: Name,
    signing_key: SigningKey,
}

impl std::fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySigner")
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

impl KeySigner {
    /// Generates a fresh key under `/<identity>/KEY/<random key-id>`.
    pub fn generate(identity: &Name) -> Self {
        let mut key_id = [0u8; 8];
        OsRng.fill_bytes(&mut key_id);
        let key_name = Certificate::to_key_name(identity, Component::generic(key_id.to_vec()));
        Self::from_signing_key(key_name, SigningKey::random(&mut OsRng))
    }

    pub fn from_signing_key(key_name: Name, signing_key: SigningKey) -> Self {
        KeySigner {
            key_name,
            signing_key,
        }
    }

    pub fn key_name(&self) -> &Name {
        &self.key_name
    }

    pub fn identity(&self) -> Name {
        self.key_name.prefix(-2)
    }

    /// SubjectPublicKeyInfo DER of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>, SignerError> {
        self.signing_key
            .verifying_key()
            .to_public_key_der()
            .map(|document| document.as_bytes().to_vec())
            .map_err(|e| SignerError::PublicKeyEncoding(e.to_string()))
    }

    fn signature_info(&self, validity_period: Option<ValidityPeriod>) -> SignatureInfo {
        SignatureInfo::Sha256WithEcdsa {
            key_locator: Some(KeyLocator::Name(self.key_name.clone())),
            validity_period,
        }
    }

    /// DER-encoded ECDSA signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: EcdsaSignature = self.signing_key.sign(message);
        signature.to_der().as_bytes().to_vec()
    }

    pub fn sign_data(&self, data: &mut Data) {
        let validity_period = data.signature_info().validity_period().copied();
        data.set_signature_info(self.signature_info(validity_period));
        let value = self.sign(&data.signed_portion());
        data.set_signature_value(value);
        trace!("Signed {} with {}", data.name(), self.key_name);
    }

    /// Appends SignatureInfo and SignatureValue components to the Interest name.
    pub fn sign_interest(&self, interest: &mut Interest) {
        let info = self.signature_info(None);
        interest
            .name
            .push(Component::generic(info.wire_encode()));
        // Signed portion excludes the last component, so a placeholder keeps the math uniform
        interest.name.push(Component::generic(Vec::new()));
        let value = self.sign(&interest.signed_portion());
        let mut value_wire = Vec::new();
        write_tlv(&mut value_wire, types::SIGNATURE_VALUE, &value);
        interest.name = interest.name.prefix(-1).append(Component::generic(value_wire));
        trace!("Signed Interest {} with {}", interest.name, self.key_name);
    }

    /// Certifies `public_key` as `subject_key_name`, signed by this key.
    pub fn issue_certificate(
        &self,
        subject_key_name: &Name,
        public_key: Vec<u8>,
        validity_period: ValidityPeriod,
    ) -> Result<Certificate, SignerError> {
        let issuer_id = self
            .key_name
            .get(-1)
            .cloned()
            .unwrap_or_else(|| Component::generic(SELF_ISSUER_ID));
        self.make_certificate(subject_key_name, issuer_id, public_key, validity_period)
    }

    pub fn self_sign(&self, validity_period: ValidityPeriod) -> Result<Certificate, SignerError> {
        self.make_certificate(
            &self.key_name,
            Component::generic(SELF_ISSUER_ID),
            self.public_key_der()?,
            validity_period,
        )
    }

    fn make_certificate(
        &self,
        subject_key_name: &Name,
        issuer_id: Component,
        public_key: Vec<u8>,
        validity_period: ValidityPeriod,
    ) -> Result<Certificate, SignerError> {
        let name = subject_key_name
            .clone()
            .append(issuer_id)
            .append(Component::from_version(Utc::now().timestamp_millis() as u64));
        let mut data = Data::new(name);
        data.set_meta_info(MetaInfo {
            content_type: content_types::KEY,
            freshness_period: Some(std::time::Duration::from_secs(3600)),
        })
        .set_content(public_key)
        .set_signature_info(self.signature_info(Some(validity_period)));
        self.sign_data(&mut data);
        Ok(Certificate::try_from(data)?)
    }
}

/// Issues command Interests: `<prefix>/<timestamp>/<nonce>/<SignatureInfo>/<SignatureValue>`.
///
/// Timestamps are milliseconds since the Unix epoch and strictly increase
/// across Interests from the same signer, even when the clock does not.
pub struct CommandInterestSigner {
    signer: KeySigner,
    clock: Arc<dyn Clock>,
    last_timestamp: Option<u64>,
}

impl CommandInterestSigner {
    pub fn new(signer: KeySigner) -> Self {
        Self::with_clock(signer, Arc::new(SystemClock))
    }

    pub fn with_clock(signer: KeySigner, clock: Arc<dyn Clock>) -> Self {
        CommandInterestSigner {
            signer,
            clock,
            last_timestamp: None,
        }
    }

    pub fn signer(&self) -> &KeySigner {
        &self.signer
    }

    fn next_timestamp(&mut self, now: DateTime<Utc>) -> u64 {
        let now = now.timestamp_millis().max(0) as u64;
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    pub fn make_command_interest(&mut self, prefix: &Name) -> Interest {
        let timestamp = self.next_timestamp(self.clock.now());
        self.make_command_interest_at(prefix, timestamp)
    }

    /// Builds a command Interest with an explicit timestamp, bypassing the monotonic counter.
    pub fn make_command_interest_at(&self, prefix: &Name, timestamp: u64) -> Interest {
        let mut nonce = [0u8; 8];
        OsRng.fill_bytes(&mut nonce);
        let name = prefix
            .clone()
            .append(Component::from_number(timestamp))
            .append(Component::generic(nonce.to_vec()));
        let mut interest = Interest::new(name);
        interest.refresh_nonce();
        self.signer.sign_interest(&mut interest);
        interest
    }
}
