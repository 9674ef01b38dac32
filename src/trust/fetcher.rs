//! Certificate retrieval.
//!
//! Every fetcher consults the unverified cache first and caches what it
//! retrieves. `CertificateFetcherFromNetwork` expresses Interests through a
//! [`Face`] and retries on timeout or NACK; `CertificateFetcherOffline` never
//! retrieves anything.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use once_cell::sync::OnceCell;

use crate::packet::{Data, Interest};
use crate::security::Certificate;
use crate::trust::error::{ValidationError, ValidationErrorCode};
use crate::trust::state::ValidationState;
use crate::trust::storage::{lock_storage, SharedCertificateStorage};
use crate::trust::types::CertificateRequest;

/// Write-once handle to the storage a fetcher caches into.
#[derive(Default)]
pub struct StorageSlot(OnceCell<SharedCertificateStorage>);

impl StorageSlot {
    /// # Panics
    ///
    /// If a storage was already set.
    pub fn set(&self, storage: SharedCertificateStorage) {
        if self.0.set(storage).is_err() {
            panic!("Certificate storage can only be set once");
        }
    }

    /// # Panics
    ///
    /// If no storage was set yet.
    pub fn get(&self) -> &SharedCertificateStorage {
        match self.0.get() {
            Some(storage) => storage,
            None => panic!("Certificate storage must be set before fetching"),
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }
}

#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    fn storage_slot(&self) -> &StorageSlot;

    /// Retrieves the certificate described by `request` from wherever this fetcher looks.
    async fn do_fetch(
        &self,
        request: CertificateRequest,
        state: &ValidationState,
    ) -> Result<Certificate, ValidationError>;

    /// Wires in the storage. Called once by the owning validator.
    fn set_certificate_storage(&self, storage: SharedCertificateStorage) {
        self.storage_slot().set(storage);
    }

    fn certificate_storage(&self) -> &SharedCertificateStorage {
        self.storage_slot().get()
    }

    async fn fetch(
        &self,
        request: CertificateRequest,
        state: &ValidationState,
    ) -> Result<Certificate, ValidationError> {
        let cached = lock_storage(self.certificate_storage())
            .unverified_cache_mut()
            .find_interest(&request.interest);
        if let Some(certificate) = cached {
            debug!(
                "Found certificate in unverified key cache {}",
                certificate.name()
            );
            return Ok(certificate);
        }

        let certificate = self.do_fetch(request, state).await?;
        lock_storage(self.certificate_storage()).cache_unverified_certificate(certificate.clone());
        Ok(certificate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

#[derive(Debug, Clone)]
pub enum InterestResponse {
    Data(Data),
    Timeout,
    NetworkNack(NackReason),
}

/// Where Interests go. Timeouts are the face's responsibility.
#[async_trait]
pub trait Face: Send + Sync {
    async fn express_interest(&self, interest: Interest) -> InterestResponse;
}

pub struct CertificateFetcherFromNetwork {
    face: Arc<dyn Face>,
    storage: StorageSlot,
}

impl CertificateFetcherFromNetwork {
    pub fn new(face: Arc<dyn Face>) -> Self {
        CertificateFetcherFromNetwork {
            face,
            storage: StorageSlot::default(),
        }
    }

    fn retries_exhausted(request: &CertificateRequest) -> ValidationError {
        ValidationError::new(
            ValidationErrorCode::CannotRetrieveCertificate,
            format!(
                "Cannot fetch certificate after all retries `{}`",
                request.name()
            ),
        )
    }
}

#[async_trait]
impl CertificateFetcher for CertificateFetcherFromNetwork {
    fn storage_slot(&self) -> &StorageSlot {
        &self.storage
    }

    async fn do_fetch(
        &self,
        mut request: CertificateRequest,
        state: &ValidationState,
    ) -> Result<Certificate, ValidationError> {
        let mut interest = request.interest.clone();
        interest.refresh_nonce();
        trace!(
            "Fetching {} for {} ({} retries left)",
            interest.name(),
            state.original_name(),
            request.retries_left
        );

        match self.face.express_interest(interest).await {
            InterestResponse::Data(data) => {
                debug!("Fetched certificate from network {}", data.name());
                let name = data.name().clone();
                Certificate::try_from(data).map_err(|e| {
                    ValidationError::new(
                        ValidationErrorCode::MalformedCertificate,
                        format!("Fetched a malformed certificate `{}` ({})", name, e),
                    )
                })
            }
            InterestResponse::Timeout => {
                debug!("Timeout while fetching certificate {}, retrying", request.name());
                request.retries_left -= 1;
                if request.retries_left >= 0 {
                    self.fetch(request, state).await
                } else {
                    Err(Self::retries_exhausted(&request))
                }
            }
            InterestResponse::NetworkNack(reason) => {
                debug!(
                    "NACK ({:?}) while fetching certificate {}",
                    reason,
                    request.name()
                );
                request.retries_left -= 1;
                if request.retries_left >= 0 {
                    tokio::time::sleep(request.wait_after_nack).await;
                    request.wait_after_nack *= 2;
                    self.fetch(request, state).await
                } else {
                    Err(Self::retries_exhausted(&request))
                }
            }
        }
    }
}

/// Fetcher for deployments without network access: every miss is final.
#[derive(Default)]
pub struct CertificateFetcherOffline {
    storage: StorageSlot,
}

impl CertificateFetcherOffline {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateFetcher for CertificateFetcherOffline {
    fn storage_slot(&self) -> &StorageSlot {
        &self.storage
    }

    async fn do_fetch(
        &self,
        request: CertificateRequest,
        _state: &ValidationState,
    ) -> Result<Certificate, ValidationError> {
        Err(ValidationError::new(
            ValidationErrorCode::CannotRetrieveCertificate,
            format!("Cannot fetch certificate `{}` in offline mode", request.name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::DefaultVerifier;
    use crate::time::SystemClock;
    use crate::trust::storage::CertificateStorage;

    fn state() -> ValidationState {
        ValidationState::for_data(
            Data::new("/a".parse().unwrap()),
            Box::new(|_| {}),
            Box::new(|_, _| {}),
            Arc::new(DefaultVerifier),
        )
    }

    #[tokio::test]
    async fn test_offline_fetch_fails() {
        let fetcher = CertificateFetcherOffline::new();
        fetcher.set_certificate_storage(CertificateStorage::new(Arc::new(SystemClock)).into_shared());
        let error = fetcher
            .fetch(CertificateRequest::new("/a/KEY/1".parse().unwrap()), &state())
            .await
            .unwrap_err();
        assert_eq!(error.code(), ValidationErrorCode::CannotRetrieveCertificate);
        assert!(error.info().contains("/a/KEY/1"));
    }

    #[test]
    #[should_panic(expected = "only be set once")]
    fn test_storage_set_twice_panics() {
        let fetcher = CertificateFetcherOffline::new();
        let storage = CertificateStorage::new(Arc::new(SystemClock)).into_shared();
        fetcher.set_certificate_storage(Arc::clone(&storage));
        fetcher.set_certificate_storage(storage);
    }

    #[tokio::test]
    #[should_panic(expected = "must be set before fetching")]
    async fn test_fetch_without_storage_panics() {
        let fetcher = CertificateFetcherOffline::new();
        let _ = fetcher
            .fetch(CertificateRequest::new("/a/KEY/1".parse().unwrap()), &state())
            .await;
    }
}
