#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use ndn::packet::{Data, Interest, Name, ValidityPeriod};
use ndn::security::{Certificate, KeySigner};
use ndn::trust::{
    CertificateFetcherFromNetwork, Face, InterestResponse, PolicyChain,
    ValidationPolicySimpleHierarchy, Validator,
};

pub fn name(uri: &str) -> Name {
    uri.parse().expect("valid NDN URI")
}

pub fn validity() -> ValidityPeriod {
    let now = Utc::now();
    ValidityPeriod::new(now - Duration::hours(1), now + Duration::days(30))
}

pub fn expired_validity() -> ValidityPeriod {
    let now = Utc::now();
    ValidityPeriod::new(now - Duration::days(30), now - Duration::days(1))
}

/// A key plus the certificate that certifies it.
pub struct Identity {
    pub signer: KeySigner,
    pub certificate: Certificate,
}

impl Identity {
    pub fn root(uri: &str) -> Self {
        let signer = KeySigner::generate(&name(uri));
        let certificate = signer.self_sign(validity()).expect("self-signed certificate");
        Identity {
            signer,
            certificate,
        }
    }

    /// A new key under `uri` certified by `self`.
    pub fn issue(&self, uri: &str, validity_period: ValidityPeriod) -> Identity {
        let signer = KeySigner::generate(&name(uri));
        let certificate = self
            .signer
            .issue_certificate(
                signer.key_name(),
                signer.public_key_der().expect("public key"),
                validity_period,
            )
            .expect("issued certificate");
        Identity {
            signer,
            certificate,
        }
    }

    pub fn sign(&self, uri: &str) -> Data {
        let mut data = Data::new(name(uri));
        data.set_content(b"payload".to_vec());
        self.signer.sign_data(&mut data);
        data
    }
}

/// In-memory face: serves published Data matching each Interest, after
/// replaying any scripted responses first.
#[derive(Default)]
pub struct MockFace {
    published: Mutex<Vec<Data>>,
    scripted: Mutex<VecDeque<InterestResponse>>,
    expressed: AtomicUsize,
    names: Mutex<Vec<Name>>,
}

impl MockFace {
    pub fn new() -> Arc<Self> {
        Arc::new(MockFace::default())
    }

    pub fn publish(&self, data: Data) {
        self.published.lock().unwrap().push(data);
    }

    pub fn publish_certificate(&self, certificate: &Certificate) {
        self.publish(certificate.data().clone());
    }

    pub fn script(&self, response: InterestResponse) {
        self.scripted.lock().unwrap().push_back(response);
    }

    pub fn expressed(&self) -> usize {
        self.expressed.load(Ordering::SeqCst)
    }

    pub fn expressed_names(&self) -> Vec<Name> {
        self.names.lock().unwrap().clone()
    }
}

#[async_trait]
impl Face for MockFace {
    async fn express_interest(&self, interest: Interest) -> InterestResponse {
        self.expressed.fetch_add(1, Ordering::SeqCst);
        self.names.lock().unwrap().push(interest.name().clone());

        if let Some(response) = self.scripted.lock().unwrap().pop_front() {
            return response;
        }
        self.published
            .lock()
            .unwrap()
            .iter()
            .find(|data| interest.matches_data(data))
            .cloned()
            .map(InterestResponse::Data)
            .unwrap_or(InterestResponse::Timeout)
    }
}

/// Hierarchical validator fetching through `face`.
pub fn network_validator(face: &Arc<MockFace>) -> Validator {
    Validator::new(
        PolicyChain::new(ValidationPolicySimpleHierarchy),
        Arc::new(CertificateFetcherFromNetwork::new(
            Arc::clone(face) as Arc<dyn Face>
        )),
    )
}
