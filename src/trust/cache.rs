//! Time-bounded certificate cache.
//!
//! Entries are keyed by certificate name in canonical order so that every
//! certificate under a key-name prefix forms one contiguous range. Each entry
//! expires at `min(notAfter, insertion time + max lifetime)`; expired entries
//! are dropped lazily before every lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, trace};

use crate::packet::{Interest, Name};
use crate::security::Certificate;
use crate::time::Clock;

/// Default lifetime of the verified certificate cache (1 hour).
pub fn default_verified_lifetime() -> Duration {
    Duration::hours(1)
}

/// Default lifetime of the unverified certificate cache (5 minutes).
pub fn default_unverified_lifetime() -> Duration {
    Duration::minutes(5)
}

struct CacheEntry {
    certificate: Certificate,
    removal_time: DateTime<Utc>,
}

pub struct CertificateCache {
    max_lifetime: Duration,
    entries: BTreeMap<Name, CacheEntry>,
    removal_index: BTreeSet<(DateTime<Utc>, Name)>,
    clock: Arc<dyn Clock>,
}

impl CertificateCache {
    pub fn new(max_lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        CertificateCache {
            max_lifetime,
            entries: BTreeMap::new(),
            removal_index: BTreeSet::new(),
            clock,
        }
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `certificate`, replacing any entry with the same name.
    /// Certificates that have already expired are ignored.
    pub fn insert(&mut self, certificate: Certificate) {
        let now = self.clock.now();
        let not_after = certificate.validity_period().not_after;
        if not_after < now {
            debug!(
                "Not adding {}: already expired at {}",
                certificate.name(),
                not_after
            );
            return;
        }

        let removal_time = now
            .checked_add_signed(self.max_lifetime)
            .map_or(not_after, |limit| limit.min(not_after));
        let name = certificate.name().clone();
        trace!("Caching {} until {}", name, removal_time);
        if let Some(previous) = self.entries.insert(
            name.clone(),
            CacheEntry {
                certificate,
                removal_time,
            },
        ) {
            self.removal_index
                .remove(&(previous.removal_time, name.clone()));
        }
        self.removal_index.insert((removal_time, name));
    }

    pub fn erase(&mut self, name: &Name) {
        if let Some(entry) = self.entries.remove(name) {
            self.removal_index
                .remove(&(entry.removal_time, name.clone()));
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.removal_index.clear();
    }

    /// First certificate whose name starts with `prefix`.
    pub fn find(&mut self, prefix: &Name) -> Option<Certificate> {
        self.refresh();
        warn_on_implicit_digest(prefix);
        self.entries
            .range::<Name, _>((Bound::Included(prefix), Bound::Unbounded))
            .next()
            .filter(|(name, _)| prefix.is_prefix_of(name))
            .map(|(_, entry)| entry.certificate.clone())
    }

    /// First certificate under the Interest name that satisfies the Interest.
    pub fn find_interest(&mut self, interest: &Interest) -> Option<Certificate> {
        self.refresh();
        warn_on_implicit_digest(interest.name());
        self.entries
            .range::<Name, _>((Bound::Included(interest.name()), Bound::Unbounded))
            .take_while(|(name, _)| interest.name().is_prefix_of(name))
            .find(|(_, entry)| interest.matches_data(entry.certificate.data()))
            .map(|(_, entry)| entry.certificate.clone())
    }

    /// Drops every entry whose removal time has passed.
    pub fn refresh(&mut self) {
        let now = self.clock.now();
        while let Some((removal_time, _)) = self.removal_index.first() {
            if *removal_time >= now {
                break;
            }
            if let Some((_, name)) = self.removal_index.pop_first() {
                trace!("Evicting expired {}", name);
                self.entries.remove(&name);
            }
        }
    }
}

/// Logs lookups by full name, which only match when the digest is ignored.
/// Returns whether `name` ends with an implicit digest.
pub(crate) fn warn_on_implicit_digest(name: &Name) -> bool {
    let has_digest = name
        .get(-1)
        .map(|c| c.is_implicit_sha256_digest())
        .unwrap_or(false);
    if has_digest {
        info!(
            "Certificate search using a name with an implicit digest is not yet supported: {}",
            name
        );
    }
    has_digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ValidityPeriod;
    use crate::security::KeySigner;
    use crate::time::ManualClock;

    fn certificate(identity: &str, now: DateTime<Utc>, valid_for: Duration) -> Certificate {
        let signer = KeySigner::generate(&identity.parse().unwrap());
        signer
            .self_sign(ValidityPeriod::new(now - Duration::hours(1), now + valid_for))
            .unwrap()
    }

    #[test]
    fn test_find_by_key_prefix() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let mut cache = CertificateCache::new(default_verified_lifetime(), clock);
        let cert = certificate("/site/alice", now, Duration::days(1));
        cache.insert(cert.clone());
        cache.insert(certificate("/site/bob", now, Duration::days(1)));

        assert_eq!(cache.find(&cert.key_name()), Some(cert.clone()));
        assert_eq!(cache.find(cert.name()), Some(cert.clone()));
        let interest = Interest::new(cert.key_name()).with_can_be_prefix(true);
        assert_eq!(cache.find_interest(&interest), Some(cert));
        assert!(cache.find(&"/site/carol".parse().unwrap()).is_none());
    }

    #[test]
    fn test_exact_interest_needs_full_name() {
        let now = Utc::now();
        let mut cache =
            CertificateCache::new(default_verified_lifetime(), Arc::new(ManualClock::new(now)));
        let cert = certificate("/a", now, Duration::days(1));
        cache.insert(cert.clone());
        assert!(cache.find_interest(&Interest::new(cert.key_name())).is_none());
        assert!(cache
            .find_interest(&Interest::new(cert.name().clone()))
            .is_some());
    }

    #[test]
    fn test_entries_expire_after_max_lifetime() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let mut cache = CertificateCache::new(default_unverified_lifetime(), clock.clone());
        let cert = certificate("/a", now, Duration::days(1));
        cache.insert(cert.clone());

        clock.advance(Duration::minutes(5));
        assert!(cache.find(cert.name()).is_some());
        clock.advance(Duration::seconds(1));
        assert!(cache.find(cert.name()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire_with_certificate() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let mut cache = CertificateCache::new(default_verified_lifetime(), clock.clone());
        let cert = certificate("/a", now, Duration::minutes(10));
        cache.insert(cert.clone());

        clock.advance(Duration::minutes(11));
        assert!(cache.find(cert.name()).is_none());
    }

    #[test]
    fn test_expired_certificate_not_inserted() {
        let now = Utc::now();
        let mut cache =
            CertificateCache::new(default_verified_lifetime(), Arc::new(ManualClock::new(now)));
        cache.insert(certificate("/a", now, Duration::hours(-2)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_and_erase() {
        let now = Utc::now();
        let mut cache =
            CertificateCache::new(default_verified_lifetime(), Arc::new(ManualClock::new(now)));
        let cert = certificate("/a", now, Duration::days(1));
        cache.insert(cert.clone());
        cache.insert(cert.clone());
        assert_eq!(cache.len(), 1);
        cache.erase(cert.name());
        assert!(cache.is_empty());
        assert!(cache.removal_index.is_empty());
    }

    #[test]
    fn test_unbounded_lifetime_falls_back_to_not_after() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let mut cache = CertificateCache::new(Duration::MAX, clock.clone());
        let cert = certificate("/a", now, Duration::minutes(10));
        cache.insert(cert.clone());
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::minutes(9));
        assert!(cache.find(cert.name()).is_some());
        clock.advance(Duration::minutes(2));
        assert!(cache.find(cert.name()).is_none());
    }

    #[test]
    fn test_implicit_digest_lookup_is_flagged() {
        let now = Utc::now();
        let mut cache =
            CertificateCache::new(default_verified_lifetime(), Arc::new(ManualClock::new(now)));
        let cert = certificate("/a", now, Duration::days(1));
        cache.insert(cert.clone());

        let full = cert
            .name()
            .clone()
            .append(crate::packet::Component::implicit_sha256_digest([0; 32]));
        assert!(warn_on_implicit_digest(&full));
        assert!(!warn_on_implicit_digest(cert.name()));
        assert!(cache.find(&full).is_none());
    }
}
