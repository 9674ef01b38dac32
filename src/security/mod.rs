//! Certificates, signature verification and signing.

pub mod certificate;
pub mod signer;
pub mod verifier;

pub use certificate::{Certificate, CertificateError};
pub use signer::{CommandInterestSigner, KeySigner, SignerError};
pub use verifier::{DefaultVerifier, SignatureVerifier};
