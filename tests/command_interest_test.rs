mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{name, Identity};

use ndn::packet::Interest;
use ndn::security::{CommandInterestSigner, DefaultVerifier};
use ndn::time::{Clock, ManualClock};
use ndn::trust::{
    CertificateFetcherOffline, CommandInterestOptions, PolicyChain,
    ValidationErrorCode, ValidationPolicyCommandInterest, ValidationPolicySimpleHierarchy,
    Validator, ValidatorOptions,
};

struct Fixture {
    clock: Arc<ManualClock>,
    root: Identity,
    validator: Validator,
}

impl Fixture {
    fn new(options: CommandInterestOptions) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut policy = PolicyChain::new(ValidationPolicyCommandInterest::with_clock(
            options,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        policy.set_inner_policy(ValidationPolicySimpleHierarchy);
        let validator = Validator::with_options(
            policy,
            Arc::new(CertificateFetcherOffline::new()),
            &ValidatorOptions::default(),
            Arc::new(DefaultVerifier),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let root = Identity::root("/root");
        validator.load_anchor("root", root.certificate.clone()).unwrap();
        Fixture {
            clock,
            root,
            validator,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis() as u64
    }

    fn signer(&self) -> CommandInterestSigner {
        CommandInterestSigner::with_clock(
            self.root.signer.clone(),
            Arc::clone(&self.clock) as Arc<dyn Clock>,
        )
    }

    fn command_at(&self, timestamp: u64) -> Interest {
        self.signer()
            .make_command_interest_at(&name("/root/cmd"), timestamp)
    }
}

#[tokio::test]
async fn test_fresh_command_is_accepted_and_replay_rejected() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let interest = fixture.signer().make_command_interest(&name("/root/cmd"));

    assert!(fixture.validator.check_interest(interest.clone()).await.is_ok());

    let error = fixture.validator.check_interest(interest).await.unwrap_err();
    assert_eq!(error.code(), ValidationErrorCode::PolicyError);
    assert!(error.info().contains("reordered"));
}

#[tokio::test]
async fn test_older_timestamp_is_rejected() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let now = fixture.now_ms();

    assert!(fixture
        .validator
        .check_interest(fixture.command_at(now))
        .await
        .is_ok());
    let error = fixture
        .validator
        .check_interest(fixture.command_at(now - 1))
        .await
        .unwrap_err();
    assert!(error.info().contains("reordered"));
    assert!(fixture
        .validator
        .check_interest(fixture.command_at(now + 1))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_grace_period_bounds_are_inclusive() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let now = fixture.now_ms();
    let grace = 120_000;

    assert!(fixture
        .validator
        .check_interest(fixture.command_at(now - grace))
        .await
        .is_ok());
    assert!(fixture
        .validator
        .check_interest(fixture.command_at(now + grace))
        .await
        .is_ok());

    let error = fixture
        .validator
        .check_interest(fixture.command_at(now + grace + 1))
        .await
        .unwrap_err();
    assert_eq!(error.code(), ValidationErrorCode::PolicyError);
    assert!(error.info().contains("grace period"));
}

#[tokio::test]
async fn test_stale_command_is_rejected() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let stale = fixture.command_at(fixture.now_ms());
    fixture.clock.advance(Duration::minutes(3));

    let error = fixture.validator.check_interest(stale).await.unwrap_err();
    assert!(error.info().contains("grace period"));
}

#[tokio::test]
async fn test_failed_validation_does_not_record_timestamp() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let stranger = Identity::root("/root");
    let first = CommandInterestSigner::with_clock(
        stranger.signer.clone(),
        Arc::clone(&fixture.clock) as Arc<dyn Clock>,
    )
    .make_command_interest_at(&name("/root/cmd"), fixture.now_ms());

    // Unknown key cannot be retrieved offline
    let error = fixture.validator.check_interest(first).await.unwrap_err();
    assert_eq!(error.code(), ValidationErrorCode::CannotRetrieveCertificate);

    fixture
        .validator
        .load_anchor("stranger", stranger.certificate.clone())
        .unwrap();
    let retry = CommandInterestSigner::with_clock(
        stranger.signer.clone(),
        Arc::clone(&fixture.clock) as Arc<dyn Clock>,
    )
    .make_command_interest_at(&name("/root/cmd"), fixture.now_ms());
    assert!(fixture.validator.check_interest(retry).await.is_ok());
}

#[tokio::test]
async fn test_expired_record_allows_older_timestamp() {
    let fixture = Fixture::new(CommandInterestOptions {
        record_lifetime_secs: 1,
        ..CommandInterestOptions::default()
    });
    let now = fixture.now_ms();
    assert!(fixture
        .validator
        .check_interest(fixture.command_at(now))
        .await
        .is_ok());

    fixture.clock.advance(Duration::seconds(2));
    assert!(fixture
        .validator
        .check_interest(fixture.command_at(now - 1))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_unsigned_short_name_is_rejected() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let error = fixture
        .validator
        .check_interest(Interest::new(name("/root/cmd")))
        .await
        .unwrap_err();
    assert_eq!(error.code(), ValidationErrorCode::PolicyError);
    assert!(error.info().contains("too short"));
}

#[tokio::test]
async fn test_data_passes_through_to_hierarchy() {
    let fixture = Fixture::new(CommandInterestOptions::default());
    let data = fixture.root.sign("/root/report");
    assert_eq!(fixture.validator.check_data(data.clone()).await, Ok(data));
}
