//! Freshness and replay protection for command Interests.
//!
//! A command Interest is named `<prefix>/<timestamp>/<nonce>/<SignatureInfo>/<SignatureValue>`.
//! This policy sits in front of a base policy. It rejects commands whose
//! timestamp is outside the grace window around the local clock or is not
//! newer than the last command accepted from the same key, then defers to
//! the next policy. Data packets are passed through untouched.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, trace};

use crate::packet::{Data, Interest, Name};
use crate::time::{Clock, SystemClock};
use crate::trust::config::CommandInterestOptions;
use crate::trust::error::{ValidationError, ValidationErrorCode};
use crate::trust::policy::{key_locator_name, PolicyVerdict, ValidationPolicy};
use crate::trust::state::ValidationState;

/// `<timestamp>/<nonce>/<SignatureInfo>/<SignatureValue>`
const MIN_COMMAND_NAME_LENGTH: usize = 4;
const TIMESTAMP_OFFSET: isize = -4;

#[derive(Debug, Clone)]
struct LastTimestampRecord {
    key_name: Name,
    timestamp: u64,
    last_refreshed: DateTime<Utc>,
}

/// Records ordered by refresh time, oldest first.
#[derive(Debug, Default)]
struct RecordList {
    records: VecDeque<LastTimestampRecord>,
}

impl RecordList {
    fn find(&self, key_name: &Name) -> Option<&LastTimestampRecord> {
        self.records.iter().find(|r| &r.key_name == key_name)
    }

    /// Records `timestamp` for `key_name` unless a newer or equal one is
    /// already stored. Returns whether the record was updated.
    fn insert(&mut self, key_name: Name, timestamp: u64, now: DateTime<Utc>) -> bool {
        if let Some(position) = self.records.iter().position(|r| r.key_name == key_name) {
            if self.records[position].timestamp >= timestamp {
                return false;
            }
            self.records.remove(position);
        }
        self.records.push_back(LastTimestampRecord {
            key_name,
            timestamp,
            last_refreshed: now,
        });
        true
    }

    fn clean_up(&mut self, options: &CommandInterestOptions, now: DateTime<Utc>) {
        let expiring = now.checked_sub_signed(options.record_lifetime());
        while let Some(front) = self.records.front() {
            let too_old = expiring.map_or(false, |t| front.last_refreshed <= t);
            let too_many = options
                .max_records
                .map(|max| self.records.len() > max)
                .unwrap_or(false);
            if !(too_old || too_many) {
                break;
            }
            trace!("Dropping timestamp record for {}", front.key_name);
            self.records.pop_front();
        }
    }
}

pub struct ValidationPolicyCommandInterest {
    options: CommandInterestOptions,
    clock: Arc<dyn Clock>,
    records: Arc<Mutex<RecordList>>,
}

impl ValidationPolicyCommandInterest {
    pub fn new(options: CommandInterestOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(options: CommandInterestOptions, clock: Arc<dyn Clock>) -> Self {
        ValidationPolicyCommandInterest {
            options,
            clock,
            records: Arc::new(Mutex::new(RecordList::default())),
        }
    }

    pub fn options(&self) -> &CommandInterestOptions {
        &self.options
    }

    fn records(&self) -> MutexGuard<'_, RecordList> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of signing keys with a remembered timestamp.
    pub fn record_count(&self) -> usize {
        self.records().records.len()
    }

    /// Evicts records past their lifetime, then the oldest ones beyond the record limit.
    pub fn clean_up(&self) {
        let now = self.clock.now();
        self.records().clean_up(&self.options, now);
    }

    fn parse_command_interest(interest: &Interest) -> Result<(Name, u64), ValidationError> {
        let name = interest.name();
        if name.len() < MIN_COMMAND_NAME_LENGTH {
            return Err(ValidationError::new(
                ValidationErrorCode::PolicyError,
                format!("Command interest name `{}` is too short", name),
            ));
        }
        let timestamp = name
            .get(TIMESTAMP_OFFSET)
            .and_then(|c| c.to_number().ok())
            .ok_or_else(|| {
                ValidationError::new(
                    ValidationErrorCode::PolicyError,
                    format!("Command interest `{}` doesn't include timestamp component", name),
                )
            })?;
        let key_name = key_locator_name(interest)?;
        Ok((key_name, timestamp))
    }

    fn check_timestamp(
        &self,
        state: &mut ValidationState,
        key_name: Name,
        timestamp: u64,
    ) -> PolicyVerdict {
        self.clean_up();

        let now = self.clock.now();
        let now_ms = now.timestamp_millis() as i128;
        let grace_ms = self.options.grace_period().num_milliseconds() as i128;
        let stamp = timestamp as i128;
        if stamp < now_ms - grace_ms || stamp > now_ms + grace_ms {
            return PolicyVerdict::Reject(ValidationError::new(
                ValidationErrorCode::PolicyError,
                format!(
                    "Timestamp is outside the grace period for key `{}`",
                    key_name
                ),
            ));
        }

        if let Some(record) = self.records().find(&key_name) {
            if timestamp <= record.timestamp {
                return PolicyVerdict::Reject(ValidationError::new(
                    ValidationErrorCode::PolicyError,
                    format!("Timestamp is reordered for key `{}`", key_name),
                ));
            }
        }

        let records = Arc::clone(&self.records);
        let clock = Arc::clone(&self.clock);
        state.add_success_hook(Box::new(move |_interest: &Interest| {
            let mut records = records.lock().unwrap_or_else(|e| e.into_inner());
            if records.insert(key_name.clone(), timestamp, clock.now()) {
                debug!("Recording command timestamp {} for {}", timestamp, key_name);
            } else {
                debug!(
                    "Keeping newer command timestamp for {} over {}",
                    key_name, timestamp
                );
            }
        }));
        PolicyVerdict::Continue
    }
}

impl ValidationPolicy for ValidationPolicyCommandInterest {
    fn check_data_policy(&self, _data: &Data, _state: &mut ValidationState) -> PolicyVerdict {
        PolicyVerdict::Continue
    }

    fn check_interest_policy(
        &self,
        interest: &Interest,
        state: &mut ValidationState,
    ) -> PolicyVerdict {
        match Self::parse_command_interest(interest) {
            Ok((key_name, timestamp)) => self.check_timestamp(state, key_name, timestamp),
            Err(e) => PolicyVerdict::Reject(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::DefaultVerifier;
    use crate::time::ManualClock;
    use chrono::Duration;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_record_list_moves_refreshed_key_to_back() {
        let now = Utc::now();
        let mut list = RecordList::default();
        list.insert(name("/a"), 1, now);
        list.insert(name("/b"), 1, now);
        list.insert(name("/a"), 2, now);
        let order: Vec<_> = list.records.iter().map(|r| r.key_name.to_uri()).collect();
        assert_eq!(order, vec!["/b", "/a"]);
        assert_eq!(list.find(&name("/a")).unwrap().timestamp, 2);
    }

    #[test]
    fn test_record_list_keeps_newer_timestamp() {
        let now = Utc::now();
        let mut list = RecordList::default();
        assert!(list.insert(name("/a"), 20, now));
        assert!(!list.insert(name("/a"), 10, now + Duration::seconds(1)));
        assert!(!list.insert(name("/a"), 20, now + Duration::seconds(1)));
        let record = list.find(&name("/a")).unwrap();
        assert_eq!(record.timestamp, 20);
        assert_eq!(record.last_refreshed, now);
    }

    #[test]
    fn test_out_of_order_completion_keeps_latest_timestamp() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let policy = ValidationPolicyCommandInterest::with_clock(
            CommandInterestOptions::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let key = name("/root/KEY/1");
        let now_ms = clock.now().timestamp_millis() as u64;
        let session = || {
            ValidationState::for_interest(
                Interest::new(name("/root/cmd")),
                Box::new(|_| {}),
                Box::new(|_, _| {}),
                Arc::new(DefaultVerifier),
            )
        };

        // Both commands pass before either session completes
        let mut earlier = session();
        let mut later = session();
        assert!(matches!(
            policy.check_timestamp(&mut earlier, key.clone(), now_ms),
            PolicyVerdict::Continue
        ));
        assert!(matches!(
            policy.check_timestamp(&mut later, key.clone(), now_ms + 1),
            PolicyVerdict::Continue
        ));

        later.bypass_validation();
        earlier.bypass_validation();
        assert_eq!(policy.records().find(&key).unwrap().timestamp, now_ms + 1);

        let mut replay = session();
        assert!(matches!(
            policy.check_timestamp(&mut replay, key.clone(), now_ms + 1),
            PolicyVerdict::Reject(_)
        ));
        replay.fail(ValidationErrorCode::PolicyError.into());
    }

    #[test]
    fn test_clean_up_by_lifetime_and_count() {
        let now = Utc::now();
        let options = CommandInterestOptions {
            max_records: Some(2),
            ..CommandInterestOptions::default()
        };
        let mut list = RecordList::default();
        list.insert(name("/old"), 1, now - Duration::hours(1));
        list.insert(name("/a"), 1, now);
        list.insert(name("/b"), 1, now);
        list.insert(name("/c"), 1, now);

        list.clean_up(&options, now);
        let order: Vec<_> = list.records.iter().map(|r| r.key_name.to_uri()).collect();
        assert_eq!(order, vec!["/b", "/c"]);
    }

    #[test]
    fn test_unlimited_records_only_expire_by_age() {
        let now = Utc::now();
        let options = CommandInterestOptions {
            max_records: None,
            ..CommandInterestOptions::default()
        };
        let mut list = RecordList::default();
        for i in 0..50 {
            list.insert(name(&format!("/k{}", i)), 1, now);
        }
        list.clean_up(&options, now);
        assert_eq!(list.records.len(), 50);
        list.clean_up(&options, now + Duration::hours(1));
        assert!(list.records.is_empty());
    }

    #[test]
    fn test_short_name_is_policy_error() {
        let error =
            ValidationPolicyCommandInterest::parse_command_interest(&Interest::new(name("/a/b/c")))
                .unwrap_err();
        assert_eq!(error.code(), ValidationErrorCode::PolicyError);
        assert!(error.info().contains("too short"));
    }
}
