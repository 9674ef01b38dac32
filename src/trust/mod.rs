//! Certificate-chain validation for Data packets and signed Interests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌────────────────────┐
//! │  Validator   │────▶│   PolicyChain    │────▶│  PolicyVerdict     │
//! │ (session     │     │ (CommandInterest,│     │ Accept / Reject /  │
//! │   loop)      │     │  SimpleHierarchy)│     │ Request / Continue │
//! └──────────────┘     └──────────────────┘     └────────────────────┘
//!        │
//!        ▼
//! ┌──────────────────────┐     ┌────────────────────────┐
//! │ CertificateStorage   │◀────│  CertificateFetcher    │
//! │ anchors + verified + │     │ (FromNetwork / Offline)│
//! │ unverified caches    │     └────────────────────────┘
//! └──────────────────────┘                 │
//!                                          ▼
//!                                   ┌─────────────┐
//!                                   │    Face     │
//!                                   └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ndn::trust::{CertificateFetcherOffline, PolicyChain, ValidationPolicySimpleHierarchy, Validator};
//!
//! let validator = Validator::new(
//!     PolicyChain::new(ValidationPolicySimpleHierarchy),
//!     Arc::new(CertificateFetcherOffline::new()),
//! );
//! validator.load_anchor("root", root_certificate)?;
//!
//! match validator.check_data(data).await {
//!     Ok(data) => { /* trusted */ }
//!     Err(e) => { /* e.code() says why */ }
//! }
//! ```

pub mod anchors;
pub mod cache;
pub mod command_interest;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod policy;
pub mod state;
pub mod storage;
pub mod types;
pub mod validator;

pub use anchors::{AnchorError, TrustAnchorContainer, TrustAnchorGroup};
pub use cache::CertificateCache;
pub use command_interest::ValidationPolicyCommandInterest;
pub use config::{CommandInterestOptions, ConfigError, ValidatorOptions};
pub use error::{ValidationError, ValidationErrorCode, USER_MIN};
pub use fetcher::{
    CertificateFetcher, CertificateFetcherFromNetwork, CertificateFetcherOffline, Face,
    InterestResponse, NackReason, StorageSlot,
};
pub use policy::{
    key_locator_name, key_locator_name_from_signature, PolicyChain, PolicyVerdict,
    ValidationPolicy, ValidationPolicyAcceptAll, ValidationPolicySimpleHierarchy,
};
pub use state::{PacketState, ValidationState};
pub use storage::{lock_storage, CertificateStorage, SharedCertificateStorage};
pub use types::CertificateRequest;
pub use validator::{Validator, DEFAULT_MAX_DEPTH};
