//! Request for the certificate that signed the packet under validation.

use std::time::Duration;

use crate::packet::{Interest, Name};

pub const DEFAULT_RETRIES: i32 = 3;
pub const DEFAULT_WAIT_AFTER_NACK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Interest naming the key or certificate to retrieve.
    pub interest: Interest,
    /// Remaining attempts after a timeout or NACK. Exhausted once it drops below zero.
    pub retries_left: i32,
    /// Back-off before the next retry after a NACK; doubles after each NACK.
    pub wait_after_nack: Duration,
}

impl CertificateRequest {
    /// Request for `name` as a prefix, since key names prefix certificate names.
    pub fn new(name: Name) -> Self {
        Self::from_interest(Interest::new(name).with_can_be_prefix(true))
    }

    pub fn from_interest(interest: Interest) -> Self {
        CertificateRequest {
            interest,
            retries_left: DEFAULT_RETRIES,
            wait_after_nack: DEFAULT_WAIT_AFTER_NACK,
        }
    }

    pub fn name(&self) -> &Name {
        &self.interest.name
    }
}
