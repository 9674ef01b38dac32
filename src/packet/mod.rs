//! Packet types consumed by the validator.

pub mod data;
pub mod interest;
pub mod name;
pub mod signature;

pub use data::{Data, MetaInfo};
pub use interest::{Interest, DEFAULT_INTEREST_LIFETIME};
pub use name::{Component, Name, NameError};
pub use signature::{
    decode_signature_info_and_value, KeyLocator, Signature, SignatureInfo, ValidityPeriod,
};
