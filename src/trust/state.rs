//! Per-session validation state.
//!
//! A `ValidationState` is created for every top-level validation and owned by
//! the session future that drives it. It holds the packet being validated,
//! the certificates collected so far and the callbacks that report the
//! outcome. The outcome is set exactly once.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, trace};

use crate::packet::{Data, Interest, Name};
use crate::security::{Certificate, SignatureVerifier};
use crate::trust::error::{ValidationError, ValidationErrorCode};

pub type DataSuccessCallback = Box<dyn FnOnce(&Data) + Send + Sync>;
pub type DataFailureCallback = Box<dyn FnOnce(&Data, &ValidationError) + Send + Sync>;
pub type InterestSuccessCallback = Box<dyn FnOnce(&Interest) + Send + Sync>;
pub type InterestFailureCallback = Box<dyn FnOnce(&Interest, &ValidationError) + Send + Sync>;
/// Runs after the success callback of an Interest session.
pub type SuccessHook = Box<dyn FnOnce(&Interest) + Send + Sync>;

pub enum PacketState {
    Data {
        data: Arc<Data>,
        on_success: Option<DataSuccessCallback>,
        on_failure: Option<DataFailureCallback>,
    },
    Interest {
        interest: Arc<Interest>,
        on_success: Option<InterestSuccessCallback>,
        on_failure: Option<InterestFailureCallback>,
        success_hooks: Vec<SuccessHook>,
    },
}

pub struct ValidationState {
    packet: PacketState,
    certificate_chain: VecDeque<Certificate>,
    seen_certificate_names: HashSet<Name>,
    outcome: Option<bool>,
    verifier: Arc<dyn SignatureVerifier>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs a user callback, logging instead of propagating any panic.
fn invoke_guarded(what: &str, name: &Name, callback: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
        error!(
            "Validation {} callback for {} panicked: {}",
            what,
            name,
            panic_message(payload.as_ref())
        );
    }
}

impl ValidationState {
    pub fn for_data(
        data: impl Into<Arc<Data>>,
        on_success: DataSuccessCallback,
        on_failure: DataFailureCallback,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self::with_packet(
            PacketState::Data {
                data: data.into(),
                on_success: Some(on_success),
                on_failure: Some(on_failure),
            },
            verifier,
        )
    }

    pub fn for_interest(
        interest: impl Into<Arc<Interest>>,
        on_success: InterestSuccessCallback,
        on_failure: InterestFailureCallback,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self::with_packet(
            PacketState::Interest {
                interest: interest.into(),
                on_success: Some(on_success),
                on_failure: Some(on_failure),
                success_hooks: Vec::new(),
            },
            verifier,
        )
    }

    fn with_packet(packet: PacketState, verifier: Arc<dyn SignatureVerifier>) -> Self {
        ValidationState {
            packet,
            certificate_chain: VecDeque::new(),
            seen_certificate_names: HashSet::new(),
            outcome: None,
            verifier,
        }
    }

    pub fn packet(&self) -> &PacketState {
        &self.packet
    }

    /// Name of the Data or Interest under validation.
    pub fn original_name(&self) -> &Name {
        match &self.packet {
            PacketState::Data { data, .. } => data.name(),
            PacketState::Interest { interest, .. } => interest.name(),
        }
    }

    pub fn original_data(&self) -> Option<Arc<Data>> {
        match &self.packet {
            PacketState::Data { data, .. } => Some(Arc::clone(data)),
            PacketState::Interest { .. } => None,
        }
    }

    pub fn original_interest(&self) -> Option<Arc<Interest>> {
        match &self.packet {
            PacketState::Interest { interest, .. } => Some(Arc::clone(interest)),
            PacketState::Data { .. } => None,
        }
    }

    /// `None` while the session is still running.
    pub fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    fn set_outcome(&mut self, outcome: bool) {
        if let Some(previous) = self.outcome {
            panic!(
                "Validation outcome for {} already set to {}",
                self.original_name(),
                previous
            );
        }
        self.outcome = Some(outcome);
    }

    /// Number of certificates collected so far.
    pub fn depth(&self) -> usize {
        self.certificate_chain.len()
    }

    /// Collected certificates; the front is the one closest to the trust anchor.
    pub fn certificate_chain(&self) -> &VecDeque<Certificate> {
        &self.certificate_chain
    }

    pub(crate) fn take_certificate_chain(&mut self) -> VecDeque<Certificate> {
        std::mem::take(&mut self.certificate_chain)
    }

    pub fn add_certificate(&mut self, certificate: Certificate) {
        self.seen_certificate_names
            .insert(certificate.name().clone());
        self.certificate_chain.push_front(certificate);
    }

    pub fn has_seen_certificate_name(&self, name: &Name) -> bool {
        self.seen_certificate_names.contains(name)
    }

    /// Returns `false` if the name was already recorded.
    pub fn add_seen_certificate_name(&mut self, name: Name) -> bool {
        self.seen_certificate_names.insert(name)
    }

    /// Registers a hook run after a successful Interest validation.
    ///
    /// # Panics
    ///
    /// When called on a Data session.
    pub fn add_success_hook(&mut self, hook: SuccessHook) {
        match &mut self.packet {
            PacketState::Interest { success_hooks, .. } => success_hooks.push(hook),
            PacketState::Data { data, .. } => {
                panic!("Success hooks are not supported for Data {}", data.name())
            }
        }
    }

    /// Ends the session with `error` and reports it to the failure callback.
    pub fn fail(&mut self, error: ValidationError) {
        self.set_outcome(false);
        debug!("Validation of {} failed: {}", self.original_name(), error);
        match &mut self.packet {
            PacketState::Data {
                data, on_failure, ..
            } => {
                if let Some(callback) = on_failure.take() {
                    let data = Arc::clone(data);
                    invoke_guarded("failure", data.name(), || callback(&data, &error));
                }
            }
            PacketState::Interest {
                interest,
                on_failure,
                ..
            } => {
                if let Some(callback) = on_failure.take() {
                    let interest = Arc::clone(interest);
                    invoke_guarded("failure", interest.name(), || callback(&interest, &error));
                }
            }
        }
    }

    fn succeed(&mut self) {
        self.set_outcome(true);
        match &mut self.packet {
            PacketState::Data {
                data, on_success, ..
            } => {
                if let Some(callback) = on_success.take() {
                    let data = Arc::clone(data);
                    invoke_guarded("success", data.name(), || callback(&data));
                }
            }
            PacketState::Interest {
                interest,
                on_success,
                success_hooks,
                ..
            } => {
                let interest = Arc::clone(interest);
                if let Some(callback) = on_success.take() {
                    invoke_guarded("success", interest.name(), || callback(&interest));
                }
                for hook in success_hooks.drain(..) {
                    invoke_guarded("after-success", interest.name(), || hook(&interest));
                }
            }
        }
    }

    /// Verifies the original packet against `trusted` and reports the result.
    pub fn verify_original_packet(&mut self, trusted: &Certificate) {
        let verified = match &self.packet {
            PacketState::Data { data, .. } => self.verifier.verify_data_signature(data, trusted),
            PacketState::Interest { interest, .. } => {
                self.verifier.verify_interest_signature(interest, trusted)
            }
        };
        if verified {
            debug!(
                "Signature of {} verified with {}",
                self.original_name(),
                trusted.name()
            );
            self.succeed();
        } else {
            let name = self.original_name().clone();
            let kind = match self.packet {
                PacketState::Data { .. } => "data",
                PacketState::Interest { .. } => "interest",
            };
            self.fail(ValidationError::new(
                ValidationErrorCode::InvalidSignature,
                format!("Invalid signature of {} `{}`", kind, name),
            ));
        }
    }

    /// Accepts the packet without any signature check.
    pub fn bypass_validation(&mut self) {
        debug!("Signature verification bypassed for {}", self.original_name());
        self.succeed();
    }

    /// Verifies the collected chain starting from `trust_anchor`.
    ///
    /// Each certificate must be signed by its predecessor (the anchor for the
    /// first). On the first mismatch the chain is truncated at that position,
    /// the session fails with INVALID_SIGNATURE and `None` is returned.
    /// Otherwise returns the certificate that signed the original packet.
    pub fn verify_certificate_chain(&mut self, trust_anchor: &Certificate) -> Option<Certificate> {
        let mut signer = trust_anchor.clone();
        for index in 0..self.certificate_chain.len() {
            let certificate = &self.certificate_chain[index];
            if !self
                .verifier
                .verify_data_signature(certificate.data(), &signer)
            {
                let name = certificate.name().clone();
                self.certificate_chain.truncate(index);
                self.fail(ValidationError::new(
                    ValidationErrorCode::InvalidSignature,
                    format!("Invalid signature of certificate `{}`", name),
                ));
                return None;
            }
            trace!("{} verified by {}", certificate.name(), signer.name());
            signer = certificate.clone();
        }
        Some(signer)
    }
}

impl Drop for ValidationState {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            debug!(
                "Validation session for {} ended without an outcome",
                self.original_name()
            );
        }
    }
}
