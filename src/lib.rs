//! Named Data Networking trust: packet codec, certificates and an
//! asynchronous certificate-chain validator.

// NDN-TLV wire primitives
pub mod encoding;

// Names, Interests, Data and signature blocks
pub mod packet;

// Certificates, verification and signing
pub mod security;

// Injectable wall clock
pub mod time;

// Validation policies, certificate storage and the validator
pub mod trust;

pub use packet::{Data, Interest, Name};
pub use security::Certificate;
pub use trust::{ValidationError, ValidationErrorCode, Validator};
