//! The certificate-chain validator.
//!
//! Each call to `validate_data` or `validate_interest` runs one session: the
//! policy chain looks at the packet, the validator retrieves the requested
//! certificate (from a trust anchor, the verified cache, or the fetcher), the
//! policy chain looks at that certificate, and so on until a trust anchor is
//! reached or the session fails. The chain is then verified from the anchor
//! down and the original packet is verified against the last certificate.

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, trace};
use tokio::task::JoinHandle;

use crate::packet::{Data, Interest};
use crate::security::{Certificate, DefaultVerifier, SignatureVerifier};
use crate::time::{Clock, SystemClock};
use crate::trust::anchors::AnchorError;
use crate::trust::config::ValidatorOptions;
use crate::trust::error::{ValidationError, ValidationErrorCode};
use crate::trust::fetcher::CertificateFetcher;
use crate::trust::policy::{PolicyChain, PolicyVerdict};
use crate::trust::state::ValidationState;
use crate::trust::storage::{lock_storage, CertificateStorage, SharedCertificateStorage};
use crate::trust::types::CertificateRequest;

/// Maximum number of certificates collected in one session.
pub const DEFAULT_MAX_DEPTH: usize = 25;

/// Next thing a session has to do.
enum Step {
    RequestCertificate(CertificateRequest),
    ValidateCertificate(Certificate),
    Done,
}

pub struct Validator {
    policy: PolicyChain,
    fetcher: Arc<dyn CertificateFetcher>,
    storage: SharedCertificateStorage,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    max_depth: usize,
}

impl Validator {
    /// Validator with default options, the default verifier and the system clock.
    pub fn new(policy: PolicyChain, fetcher: Arc<dyn CertificateFetcher>) -> Self {
        Self::with_options(
            policy,
            fetcher,
            &ValidatorOptions::default(),
            Arc::new(DefaultVerifier),
            Arc::new(SystemClock),
        )
    }

    /// Builds a validator and hands its storage to `fetcher`.
    ///
    /// # Panics
    ///
    /// If `fetcher` already has a storage.
    pub fn with_options(
        policy: PolicyChain,
        fetcher: Arc<dyn CertificateFetcher>,
        options: &ValidatorOptions,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        assert!(!policy.is_empty(), "Policy chain must not be empty");
        let storage = CertificateStorage::with_lifetimes(
            Arc::clone(&clock),
            options.verified_cache_lifetime(),
            options.unverified_cache_lifetime(),
        );
        let storage = Arc::new(Mutex::new(storage));
        fetcher.set_certificate_storage(Arc::clone(&storage));
        Validator {
            policy,
            fetcher,
            storage,
            verifier,
            clock,
            max_depth: options.max_depth,
        }
    }

    /// Policy chain consulted for every packet and certificate.
    pub fn policy(&self) -> &PolicyChain {
        &self.policy
    }

    /// Mutable access to the policy chain, e.g. to append an inner policy.
    pub fn policy_mut(&mut self) -> &mut PolicyChain {
        &mut self.policy
    }

    /// Fetcher used to retrieve missing certificates.
    pub fn fetcher(&self) -> &Arc<dyn CertificateFetcher> {
        &self.fetcher
    }

    /// Anchors and certificate caches shared with the fetcher.
    pub fn storage(&self) -> &SharedCertificateStorage {
        &self.storage
    }

    /// Longest certificate chain followed before giving up.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sets the longest certificate chain followed before giving up.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Validates `data`, reporting through exactly one of the callbacks.
    /// Resolves when the session has ended.
    pub async fn validate_data(
        &self,
        data: Data,
        on_success: impl FnOnce(&Data) + Send + Sync + 'static,
        on_failure: impl FnOnce(&Data, &ValidationError) + Send + Sync + 'static,
    ) {
        debug!("Start validating data {}", data.name());
        let data = Arc::new(data);
        let mut state = ValidationState::for_data(
            Arc::clone(&data),
            Box::new(on_success),
            Box::new(on_failure),
            Arc::clone(&self.verifier),
        );
        let verdict = self.policy.check_data_policy(&data, &mut state);
        self.run_session(state, verdict).await;
    }

    /// Validates `interest`, reporting through exactly one of the callbacks.
    /// Resolves when the session has ended.
    pub async fn validate_interest(
        &self,
        interest: Interest,
        on_success: impl FnOnce(&Interest) + Send + Sync + 'static,
        on_failure: impl FnOnce(&Interest, &ValidationError) + Send + Sync + 'static,
    ) {
        debug!("Start validating interest {}", interest.name());
        let interest = Arc::new(interest);
        let mut state = ValidationState::for_interest(
            Arc::clone(&interest),
            Box::new(on_success),
            Box::new(on_failure),
            Arc::clone(&self.verifier),
        );
        let verdict = self.policy.check_interest_policy(&interest, &mut state);
        self.run_session(state, verdict).await;
    }

    /// Runs a Data session in the background.
    pub fn spawn_validate_data(
        self: &Arc<Self>,
        data: Data,
        on_success: impl FnOnce(&Data) + Send + Sync + 'static,
        on_failure: impl FnOnce(&Data, &ValidationError) + Send + Sync + 'static,
    ) -> JoinHandle<()> {
        let validator = Arc::clone(self);
        tokio::spawn(async move { validator.validate_data(data, on_success, on_failure).await })
    }

    /// Runs an Interest session in the background.
    pub fn spawn_validate_interest(
        self: &Arc<Self>,
        interest: Interest,
        on_success: impl FnOnce(&Interest) + Send + Sync + 'static,
        on_failure: impl FnOnce(&Interest, &ValidationError) + Send + Sync + 'static,
    ) -> JoinHandle<()> {
        let validator = Arc::clone(self);
        tokio::spawn(async move {
            validator
                .validate_interest(interest, on_success, on_failure)
                .await
        })
    }

    /// Validates `data` and returns it when trusted.
    pub async fn check_data(&self, data: Data) -> Result<Data, ValidationError> {
        let outcome = Arc::new(Mutex::new(None));
        let success = Arc::clone(&outcome);
        let failure = Arc::clone(&outcome);
        self.validate_data(
            data,
            move |data| store_outcome(&success, Ok(data.clone())),
            move |_, error| store_outcome(&failure, Err(error.clone())),
        )
        .await;
        take_outcome(&outcome)
    }

    /// Validates `interest` and returns it when trusted.
    pub async fn check_interest(&self, interest: Interest) -> Result<Interest, ValidationError> {
        let outcome = Arc::new(Mutex::new(None));
        let success = Arc::clone(&outcome);
        let failure = Arc::clone(&outcome);
        self.validate_interest(
            interest,
            move |interest| store_outcome(&success, Ok(interest.clone())),
            move |_, error| store_outcome(&failure, Err(error.clone())),
        )
        .await;
        take_outcome(&outcome)
    }

    async fn run_session(&self, mut state: ValidationState, verdict: PolicyVerdict) {
        let mut step = match verdict {
            PolicyVerdict::Accept => {
                state.bypass_validation();
                Step::Done
            }
            PolicyVerdict::Reject(error) => {
                state.fail(error);
                Step::Done
            }
            PolicyVerdict::Request(request) => Step::RequestCertificate(request),
            PolicyVerdict::Continue => {
                state.fail(ValidationError::new(
                    ValidationErrorCode::ImplementationError,
                    "Policy chain deferred without a decision",
                ));
                Step::Done
            }
        };

        loop {
            step = match step {
                Step::RequestCertificate(request) => {
                    self.request_certificate(request, &mut state).await
                }
                Step::ValidateCertificate(certificate) => {
                    self.validate_certificate(certificate, &mut state)
                }
                Step::Done => break,
            };
        }
    }

    async fn request_certificate(
        &self,
        request: CertificateRequest,
        state: &mut ValidationState,
    ) -> Step {
        if state.depth() >= self.max_depth {
            state.fail(ValidationError::new(
                ValidationErrorCode::ExceededDepthLimit,
                self.max_depth.to_string(),
            ));
            return Step::Done;
        }

        if state.has_seen_certificate_name(request.name()) {
            state.fail(ValidationError::new(
                ValidationErrorCode::LoopDetected,
                format!("`{}`", request.name()),
            ));
            return Step::Done;
        }
        state.add_seen_certificate_name(request.name().clone());

        debug!(
            "[depth {}] Retrieving {}",
            state.depth(),
            request.name()
        );
        let trusted = lock_storage(&self.storage).find_trusted_certificate(&request.interest);
        if let Some(trusted) = trusted {
            trace!("Found trusted certificate {}", trusted.name());
            if let Some(signer) = state.verify_certificate_chain(&trusted) {
                state.verify_original_packet(&signer);
            }
            let chain = state.take_certificate_chain();
            let mut storage = lock_storage(&self.storage);
            for certificate in chain {
                storage.cache_verified_certificate(certificate);
            }
            return Step::Done;
        }

        match self.fetcher.fetch(request, state).await {
            Ok(certificate) => Step::ValidateCertificate(certificate),
            Err(error) => {
                state.fail(error);
                Step::Done
            }
        }
    }

    fn validate_certificate(&self, certificate: Certificate, state: &mut ValidationState) -> Step {
        debug!(
            "[depth {}] Validating {}",
            state.depth(),
            certificate.name()
        );
        if !certificate.is_valid(self.clock.now()) {
            state.fail(ValidationError::new(
                ValidationErrorCode::ExpiredCertificate,
                format!(
                    "Retrieved certificate is not yet valid or expired `{}`",
                    certificate.name()
                ),
            ));
            return Step::Done;
        }

        match self.policy.check_certificate_policy(&certificate, state) {
            PolicyVerdict::Request(request) => {
                state.add_certificate(certificate);
                Step::RequestCertificate(request)
            }
            PolicyVerdict::Accept => {
                state.fail(ValidationError::new(
                    ValidationErrorCode::PolicyError,
                    format!(
                        "Validation policy is not allowed to designate `{}` as a trust anchor",
                        certificate.name()
                    ),
                ));
                Step::Done
            }
            PolicyVerdict::Reject(error) => {
                state.fail(error);
                Step::Done
            }
            PolicyVerdict::Continue => {
                state.fail(ValidationError::new(
                    ValidationErrorCode::ImplementationError,
                    format!("Policy chain deferred on `{}`", certificate.name()),
                ));
                Step::Done
            }
        }
    }

    /// Adds `certificate` to the static anchor group `group_id`.
    pub fn load_anchor(&self, group_id: &str, certificate: Certificate) -> Result<(), AnchorError> {
        lock_storage(&self.storage).load_anchor(group_id, certificate)
    }

    /// Loads a dynamic anchor group from a file or directory, reloaded every `refresh_period`.
    pub fn load_anchor_from_path(
        &self,
        group_id: &str,
        path: &Path,
        refresh_period: std::time::Duration,
        is_directory: bool,
    ) -> Result<(), AnchorError> {
        lock_storage(&self.storage).load_anchor_from_path(group_id, path, refresh_period, is_directory)
    }

    /// Removes every trust anchor.
    pub fn reset_anchors(&self) {
        lock_storage(&self.storage).reset_anchors();
    }

    /// Trusts `certificate` as if it had been verified through a chain.
    pub fn cache_verified_certificate(&self, certificate: Certificate) {
        lock_storage(&self.storage).cache_verified_certificate(certificate);
    }

    /// Empties the verified certificate cache.
    pub fn reset_verified_certificates(&self) {
        lock_storage(&self.storage).reset_verified_certificates();
    }

    /// Empties the unverified certificate cache.
    pub fn reset_unverified_certificates(&self) {
        lock_storage(&self.storage).reset_unverified_certificates();
    }
}

type Outcome<T> = Arc<Mutex<Option<Result<T, ValidationError>>>>;

fn store_outcome<T>(slot: &Outcome<T>, outcome: Result<T, ValidationError>) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
}

fn take_outcome<T>(slot: &Outcome<T>) -> Result<T, ValidationError> {
    slot.lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .unwrap_or_else(|| {
            Err(ValidationError::new(
                ValidationErrorCode::ImplementationError,
                "Validation ended without an outcome",
            ))
        })
}
