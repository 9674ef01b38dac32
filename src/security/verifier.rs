//! Signature verification against a certificate's public key.

use log::{debug, warn};
use p256::ecdsa::signature::Verifier as _;
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256};

use crate::packet::{Data, Interest, Signature, SignatureInfo};
use crate::security::Certificate;

/// Verification capability used by validation sessions.
///
/// Implementations only answer "does this signature match this key"; all
/// trust decisions are made by the validator.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, signed_portion: &[u8], signature: &Signature, public_key: &[u8]) -> bool;

    fn verify_data_signature(&self, data: &Data, signer: &Certificate) -> bool {
        self.verify(&data.signed_portion(), data.signature(), signer.public_key())
    }

    fn verify_interest_signature(&self, interest: &Interest, signer: &Certificate) -> bool {
        match interest.signature() {
            Ok(signature) => {
                self.verify(&interest.signed_portion(), &signature, signer.public_key())
            }
            Err(e) => {
                debug!("Cannot decode signature of {}: {}", interest.name(), e);
                false
            }
        }
    }
}

/// Verifies SHA256-with-ECDSA (P-256), SHA256-with-RSA and DigestSha256.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultVerifier;

impl DefaultVerifier {
    fn verify_ecdsa(signed_portion: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let verifying_key = match p256::ecdsa::VerifyingKey::from_public_key_der(public_key) {
            Ok(key) => key,
            Err(e) => {
                warn!("Invalid P-256 public key: {}", e);
                return false;
            }
        };
        let signature = match p256::ecdsa::Signature::from_der(signature) {
            Ok(signature) => signature,
            Err(e) => {
                debug!("Invalid ECDSA signature encoding: {}", e);
                return false;
            }
        };
        verifying_key.verify(signed_portion, &signature).is_ok()
    }

    fn verify_rsa(signed_portion: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey};
        use rsa::pkcs8::DecodePublicKey as _;
        use rsa::signature::Verifier;

        let public_key = match rsa::RsaPublicKey::from_public_key_der(public_key) {
            Ok(key) => key,
            Err(e) => {
                warn!("Invalid RSA public key: {}", e);
                return false;
            }
        };
        let signature = match RsaSignature::try_from(signature) {
            Ok(signature) => signature,
            Err(e) => {
                debug!("Invalid RSA signature encoding: {}", e);
                return false;
            }
        };
        VerifyingKey::<Sha256>::new(public_key)
            .verify(signed_portion, &signature)
            .is_ok()
    }
}

impl SignatureVerifier for DefaultVerifier {
    fn verify(&self, signed_portion: &[u8], signature: &Signature, public_key: &[u8]) -> bool {
        match &signature.info {
            SignatureInfo::Sha256WithEcdsa { .. } => {
                Self::verify_ecdsa(signed_portion, &signature.value, public_key)
            }
            SignatureInfo::Sha256WithRsa { .. } => {
                Self::verify_rsa(signed_portion, &signature.value, public_key)
            }
            SignatureInfo::DigestSha256 => {
                Sha256::digest(signed_portion).as_slice() == signature.value.as_slice()
            }
            SignatureInfo::HmacWithSha256 { .. } => {
                warn!("HMAC signatures cannot be verified with a public key");
                false
            }
            SignatureInfo::Generic { signature_type, .. } => {
                warn!("Unsupported signature type {}", signature_type);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::KeyLocator;
    use crate::security::KeySigner;

    #[test]
    fn test_ecdsa_verifies_own_signature_only() {
        let signer = KeySigner::generate(&"/alice".parse().unwrap());
        let public_key = signer.public_key_der().unwrap();
        let mut data = Data::new("/alice/data".parse().unwrap());
        data.set_content(b"payload".to_vec());
        signer.sign_data(&mut data);

        let verifier = DefaultVerifier;
        assert!(verifier.verify(&data.signed_portion(), data.signature(), &public_key));

        let other = KeySigner::generate(&"/mallory".parse().unwrap());
        assert!(!verifier.verify(
            &data.signed_portion(),
            data.signature(),
            &other.public_key_der().unwrap()
        ));

        data.set_content(b"tampered".to_vec());
        assert!(!verifier.verify(&data.signed_portion(), data.signature(), &public_key));
    }

    #[test]
    fn test_digest_sha256() {
        let signed = b"signed bytes";
        let signature = Signature::new(
            SignatureInfo::DigestSha256,
            Sha256::digest(signed).to_vec(),
        );
        assert!(DefaultVerifier.verify(signed, &signature, &[]));
        assert!(!DefaultVerifier.verify(b"other", &signature, &[]));
    }

    #[test]
    fn test_hmac_and_unknown_types_fail() {
        let hmac = Signature::new(
            SignatureInfo::HmacWithSha256 {
                key_locator: Some(KeyLocator::KeyDigest(vec![1])),
            },
            vec![0; 32],
        );
        assert!(!DefaultVerifier.verify(b"x", &hmac, &[]));

        let generic = Signature::new(
            SignatureInfo::Generic {
                signature_type: 42,
                key_locator: None,
                validity_period: None,
            },
            vec![0; 32],
        );
        assert!(!DefaultVerifier.verify(b"x", &generic, &[]));
    }

    #[test]
    fn test_garbage_key_is_rejected() {
        let signature = Signature::new(
            SignatureInfo::Sha256WithEcdsa {
                key_locator: None,
                validity_period: None,
            },
            vec![0x30, 0x00],
        );
        assert!(!DefaultVerifier.verify(b"x", &signature, &[1, 2, 3]));
    }
}
