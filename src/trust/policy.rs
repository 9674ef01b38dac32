//! Validation policies.
//!
//! A policy inspects a packet and either decides (accept, reject), asks for
//! the certificate that signed it, or defers to the next policy in the
//! chain. The validator owns the chain and stops at the first decision.

use log::trace;

use crate::packet::{Data, Interest, KeyLocator, Name, SignatureInfo};
use crate::security::Certificate;
use crate::trust::error::{ValidationError, ValidationErrorCode};
use crate::trust::state::ValidationState;
use crate::trust::types::CertificateRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// No opinion; ask the next policy.
    Continue,
    /// Accept without checking the signature.
    Accept,
    Reject(ValidationError),
    /// Retrieve this certificate and continue with it.
    Request(CertificateRequest),
}

pub trait ValidationPolicy: Send + Sync {
    fn check_data_policy(&self, data: &Data, state: &mut ValidationState) -> PolicyVerdict;

    fn check_interest_policy(
        &self,
        interest: &Interest,
        state: &mut ValidationState,
    ) -> PolicyVerdict;

    /// Certificates are Data packets, so they get the Data rules unless a policy says otherwise.
    fn check_certificate_policy(
        &self,
        certificate: &Certificate,
        state: &mut ValidationState,
    ) -> PolicyVerdict {
        self.check_data_policy(certificate.data(), state)
    }
}

/// Ordered list of policies consulted outermost first.
pub struct PolicyChain {
    policies: Vec<Box<dyn ValidationPolicy>>,
}

impl PolicyChain {
    pub fn new(policy: impl ValidationPolicy + 'static) -> Self {
        PolicyChain {
            policies: vec![Box::new(policy)],
        }
    }

    /// # Panics
    ///
    /// If `policies` is empty.
    pub fn from_policies(policies: Vec<Box<dyn ValidationPolicy>>) -> Self {
        assert!(!policies.is_empty(), "Policy chain must not be empty");
        PolicyChain { policies }
    }

    /// Appends `policy` behind every policy already in the chain.
    pub fn set_inner_policy(&mut self, policy: impl ValidationPolicy + 'static) -> &mut Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    fn decide(
        &self,
        name: &Name,
        mut check: impl FnMut(&dyn ValidationPolicy) -> PolicyVerdict,
    ) -> PolicyVerdict {
        for policy in &self.policies {
            match check(policy.as_ref()) {
                PolicyVerdict::Continue => continue,
                verdict => return verdict,
            }
        }
        PolicyVerdict::Reject(ValidationError::new(
            ValidationErrorCode::ImplementationError,
            format!("No policy in the chain made a decision for `{}`", name),
        ))
    }

    pub fn check_data_policy(&self, data: &Data, state: &mut ValidationState) -> PolicyVerdict {
        self.decide(data.name(), |policy| policy.check_data_policy(data, &mut *state))
    }

    pub fn check_interest_policy(
        &self,
        interest: &Interest,
        state: &mut ValidationState,
    ) -> PolicyVerdict {
        self.decide(interest.name(), |policy| {
            policy.check_interest_policy(interest, &mut *state)
        })
    }

    pub fn check_certificate_policy(
        &self,
        certificate: &Certificate,
        state: &mut ValidationState,
    ) -> PolicyVerdict {
        self.decide(certificate.name(), |policy| {
            policy.check_certificate_policy(certificate, &mut *state)
        })
    }
}

/// Name in the KeyLocator of `info`.
pub fn key_locator_name_from_signature(info: &SignatureInfo) -> Result<Name, ValidationError> {
    match info.key_locator() {
        None => Err(ValidationError::new(
            ValidationErrorCode::InvalidKeyLocator,
            "KeyLocator is missing",
        )),
        Some(KeyLocator::Name(name)) => Ok(name.clone()),
        Some(KeyLocator::KeyDigest(_)) => Err(ValidationError::new(
            ValidationErrorCode::InvalidKeyLocator,
            "KeyLocator type is not Name",
        )),
    }
}

/// Name in the KeyLocator of a signed Interest.
pub fn key_locator_name(interest: &Interest) -> Result<Name, ValidationError> {
    if interest.name().len() < 2 {
        return Err(ValidationError::new(
            ValidationErrorCode::InvalidKeyLocator,
            "Invalid signed Interest: name too short",
        ));
    }
    let signature = interest.signature().map_err(|e| {
        ValidationError::new(
            ValidationErrorCode::InvalidKeyLocator,
            format!("Invalid signed Interest: {}", e),
        )
    })?;
    key_locator_name_from_signature(&signature.info)
}

/// Accepts every packet without looking at it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationPolicyAcceptAll;

impl ValidationPolicy for ValidationPolicyAcceptAll {
    fn check_data_policy(&self, _data: &Data, _state: &mut ValidationState) -> PolicyVerdict {
        PolicyVerdict::Accept
    }

    fn check_interest_policy(
        &self,
        _interest: &Interest,
        _state: &mut ValidationState,
    ) -> PolicyVerdict {
        PolicyVerdict::Accept
    }
}

/// Requires each packet to be signed by a key whose identity is a prefix
/// of the packet name, e.g. `/a/b/data` may be signed by `/a/KEY/...`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationPolicySimpleHierarchy;

impl ValidationPolicySimpleHierarchy {
    fn check(kind: &str, packet_name: &Name, key_name: Result<Name, ValidationError>) -> PolicyVerdict {
        let key_name = match key_name {
            Ok(key_name) => key_name,
            Err(e) => return PolicyVerdict::Reject(e),
        };
        if key_name.prefix(-2).is_prefix_of(packet_name) {
            trace!("{} may be signed by {}", packet_name, key_name);
            PolicyVerdict::Request(CertificateRequest::new(key_name))
        } else {
            PolicyVerdict::Reject(ValidationError::new(
                ValidationErrorCode::InvalidKeyLocator,
                format!(
                    "{} signing policy violation for `{}` by `{}`",
                    kind, packet_name, key_name
                ),
            ))
        }
    }
}

impl ValidationPolicy for ValidationPolicySimpleHierarchy {
    fn check_data_policy(&self, data: &Data, _state: &mut ValidationState) -> PolicyVerdict {
        Self::check(
            "Data",
            data.name(),
            key_locator_name_from_signature(data.signature_info()),
        )
    }

    fn check_interest_policy(
        &self,
        interest: &Interest,
        _state: &mut ValidationState,
    ) -> PolicyVerdict {
        Self::check("Interest", interest.name(), key_locator_name(interest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::DefaultVerifier;
    use std::sync::Arc;

    fn state_for(data: &Data) -> ValidationState {
        ValidationState::for_data(
            data.clone(),
            Box::new(|_| {}),
            Box::new(|_, _| {}),
            Arc::new(DefaultVerifier),
        )
    }

    fn signed_by(name: &str, key: &str) -> Data {
        let mut data = Data::new(name.parse().unwrap());
        data.set_signature_info(SignatureInfo::Sha256WithEcdsa {
            key_locator: Some(KeyLocator::Name(key.parse().unwrap())),
            validity_period: None,
        });
        data
    }

    struct Abstain;

    impl ValidationPolicy for Abstain {
        fn check_data_policy(&self, _: &Data, _: &mut ValidationState) -> PolicyVerdict {
            PolicyVerdict::Continue
        }

        fn check_interest_policy(&self, _: &Interest, _: &mut ValidationState) -> PolicyVerdict {
            PolicyVerdict::Continue
        }
    }

    #[test]
    fn test_simple_hierarchy_requests_key() {
        let data = signed_by("/a/b/data", "/a/KEY/k1");
        let mut state = state_for(&data);
        let verdict = ValidationPolicySimpleHierarchy.check_data_policy(&data, &mut state);
        assert_eq!(
            verdict,
            PolicyVerdict::Request(CertificateRequest::new("/a/KEY/k1".parse().unwrap()))
        );
    }

    #[test]
    fn test_simple_hierarchy_rejects_foreign_key() {
        let data = signed_by("/a/b/data", "/x/KEY/k1");
        let mut state = state_for(&data);
        match ValidationPolicySimpleHierarchy.check_data_policy(&data, &mut state) {
            PolicyVerdict::Reject(error) => {
                assert_eq!(error.code(), ValidationErrorCode::InvalidKeyLocator);
                assert!(error.info().starts_with("Data signing policy violation"));
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_key_locator_errors() {
        let missing = key_locator_name_from_signature(&SignatureInfo::DigestSha256).unwrap_err();
        assert_eq!(missing.info(), "KeyLocator is missing");

        let digest = key_locator_name_from_signature(&SignatureInfo::Sha256WithEcdsa {
            key_locator: Some(KeyLocator::KeyDigest(vec![1])),
            validity_period: None,
        })
        .unwrap_err();
        assert_eq!(digest.info(), "KeyLocator type is not Name");

        let short = key_locator_name(&Interest::new("/a".parse().unwrap())).unwrap_err();
        assert_eq!(short.info(), "Invalid signed Interest: name too short");

        let garbage = key_locator_name(&Interest::new("/a/b/c".parse().unwrap())).unwrap_err();
        assert_eq!(garbage.code(), ValidationErrorCode::InvalidKeyLocator);
    }

    #[test]
    fn test_chain_first_decision_wins() {
        let data = signed_by("/a/data", "/a/KEY/k1");
        let mut state = state_for(&data);
        let mut chain = PolicyChain::new(Abstain);
        chain.set_inner_policy(ValidationPolicyAcceptAll);
        chain.set_inner_policy(ValidationPolicySimpleHierarchy);
        assert_eq!(chain.len(), 3);
        assert_eq!(
            chain.check_data_policy(&data, &mut state),
            PolicyVerdict::Accept
        );
    }

    #[test]
    fn test_chain_without_decision_is_implementation_error() {
        let data = signed_by("/a/data", "/a/KEY/k1");
        let mut state = state_for(&data);
        let chain = PolicyChain::new(Abstain);
        match chain.check_data_policy(&data, &mut state) {
            PolicyVerdict::Reject(error) => {
                assert_eq!(error.code(), ValidationErrorCode::ImplementationError)
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_chain_panics() {
        PolicyChain::from_policies(Vec::new());
    }
}
