//! Trust anchors plus the verified and unverified certificate caches.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;

use crate::packet::{Interest, Name};
use crate::security::Certificate;
use crate::time::Clock;
use crate::trust::anchors::{AnchorError, TrustAnchorContainer};
use crate::trust::cache::{default_unverified_lifetime, default_verified_lifetime, CertificateCache};

/// Storage shared by a validator and its fetcher.
pub type SharedCertificateStorage = Arc<Mutex<CertificateStorage>>;

/// Locks `storage`, recovering the guard if a previous holder panicked.
///
/// Callers must drop the guard before awaiting.
pub fn lock_storage(storage: &SharedCertificateStorage) -> MutexGuard<'_, CertificateStorage> {
    storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct CertificateStorage {
    trust_anchors: TrustAnchorContainer,
    verified_cache: CertificateCache,
    unverified_cache: CertificateCache,
}

impl CertificateStorage {
    /// Storage with the default cache lifetimes.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_lifetimes(
            clock,
            default_verified_lifetime(),
            default_unverified_lifetime(),
        )
    }

    /// Storage whose caches keep entries for at most the given lifetimes.
    pub fn with_lifetimes(
        clock: Arc<dyn Clock>,
        verified_lifetime: Duration,
        unverified_lifetime: Duration,
    ) -> Self {
        CertificateStorage {
            trust_anchors: TrustAnchorContainer::new(Arc::clone(&clock)),
            verified_cache: CertificateCache::new(verified_lifetime, Arc::clone(&clock)),
            unverified_cache: CertificateCache::new(unverified_lifetime, clock),
        }
    }

    /// Wraps the storage for sharing between a validator and its fetcher.
    pub fn into_shared(self) -> SharedCertificateStorage {
        Arc::new(Mutex::new(self))
    }

    /// Looks for a certificate satisfying `interest` among the trust anchors,
    /// then among the verified certificates.
    pub fn find_trusted_certificate(&mut self, interest: &Interest) -> Option<Certificate> {
        self.trust_anchors
            .find_interest(interest)
            .or_else(|| self.verified_cache.find_interest(interest))
    }

    /// Whether any anchor or cached certificate starts with `prefix`.
    pub fn is_certificate_known(&mut self, prefix: &Name) -> bool {
        self.trust_anchors.find(prefix).is_some()
            || self.verified_cache.find(prefix).is_some()
            || self.unverified_cache.find(prefix).is_some()
    }

    /// Adds `certificate` to the static anchor group `group_id`.
    pub fn load_anchor(&mut self, group_id: &str, certificate: Certificate) -> Result<(), AnchorError> {
        self.trust_anchors.insert(group_id, certificate)
    }

    /// Adds a dynamic anchor group read from `path`.
    pub fn load_anchor_from_path(
        &mut self,
        group_id: &str,
        path: &Path,
        refresh_period: std::time::Duration,
        is_directory: bool,
    ) -> Result<(), AnchorError> {
        self.trust_anchors
            .insert_from_path(group_id, path, refresh_period, is_directory)
    }

    /// Removes every trust anchor.
    pub fn reset_anchors(&mut self) {
        self.trust_anchors.clear();
    }

    /// Remembers a certificate whose chain has been verified.
    pub fn cache_verified_certificate(&mut self, certificate: Certificate) {
        self.verified_cache.insert(certificate);
    }

    /// Empties the verified certificate cache.
    pub fn reset_verified_certificates(&mut self) {
        self.verified_cache.clear();
    }

    /// Remembers a fetched certificate that is not yet verified.
    pub fn cache_unverified_certificate(&mut self, certificate: Certificate) {
        self.unverified_cache.insert(certificate);
    }

    /// Empties the unverified certificate cache.
    pub fn reset_unverified_certificates(&mut self) {
        self.unverified_cache.clear();
    }

    /// The trust anchor container.
    pub fn trust_anchors(&self) -> &TrustAnchorContainer {
        &self.trust_anchors
    }

    /// Mutable access to the trust anchor container.
    pub fn trust_anchors_mut(&mut self) -> &mut TrustAnchorContainer {
        &mut self.trust_anchors
    }

    /// Certificates verified up to a trust anchor.
    pub fn verified_cache_mut(&mut self) -> &mut CertificateCache {
        &mut self.verified_cache
    }

    /// Fetched certificates awaiting verification.
    pub fn unverified_cache_mut(&mut self) -> &mut CertificateCache {
        &mut self.unverified_cache
    }
}
