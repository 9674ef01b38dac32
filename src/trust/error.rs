//! Outcome codes reported to validation failure callbacks.

use std::fmt;

use thiserror::Error;

/// First code available for application-defined policy errors.
pub const USER_MIN: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorCode {
    NoError,
    InvalidSignature,
    NoSignature,
    CannotRetrieveCertificate,
    ExpiredCertificate,
    LoopDetected,
    MalformedCertificate,
    ExceededDepthLimit,
    InvalidKeyLocator,
    PolicyError,
    ImplementationError,
    /// Application-defined code, always `>= USER_MIN`.
    User(u32),
}

impl ValidationErrorCode {
    pub fn code(&self) -> u32 {
        match self {
            ValidationErrorCode::NoError => 0,
            ValidationErrorCode::InvalidSignature => 1,
            ValidationErrorCode::NoSignature => 2,
            ValidationErrorCode::CannotRetrieveCertificate => 3,
            ValidationErrorCode::ExpiredCertificate => 4,
            ValidationErrorCode::LoopDetected => 5,
            ValidationErrorCode::MalformedCertificate => 6,
            ValidationErrorCode::ExceededDepthLimit => 7,
            ValidationErrorCode::InvalidKeyLocator => 8,
            ValidationErrorCode::PolicyError => 9,
            ValidationErrorCode::ImplementationError => 255,
            ValidationErrorCode::User(code) => *code,
        }
    }

    /// Maps a numeric code back to its variant. Unassigned codes below `USER_MIN` yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => ValidationErrorCode::NoError,
            1 => ValidationErrorCode::InvalidSignature,
            2 => ValidationErrorCode::NoSignature,
            3 => ValidationErrorCode::CannotRetrieveCertificate,
            4 => ValidationErrorCode::ExpiredCertificate,
            5 => ValidationErrorCode::LoopDetected,
            6 => ValidationErrorCode::MalformedCertificate,
            7 => ValidationErrorCode::ExceededDepthLimit,
            8 => ValidationErrorCode::InvalidKeyLocator,
            9 => ValidationErrorCode::PolicyError,
            255 => ValidationErrorCode::ImplementationError,
            code if code >= USER_MIN => ValidationErrorCode::User(code),
            _ => return None,
        })
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorCode::NoError => f.write_str("No error"),
            ValidationErrorCode::InvalidSignature => f.write_str("Invalid signature"),
            ValidationErrorCode::NoSignature => f.write_str("Missing signature"),
            ValidationErrorCode::CannotRetrieveCertificate => {
                f.write_str("Cannot retrieve certificate")
            }
            ValidationErrorCode::ExpiredCertificate => f.write_str("Certificate expired"),
            ValidationErrorCode::LoopDetected => f.write_str("Loop detected in certification chain"),
            ValidationErrorCode::MalformedCertificate => f.write_str("Malformed certificate"),
            ValidationErrorCode::ExceededDepthLimit => {
                f.write_str("Exceeded validation depth limit")
            }
            ValidationErrorCode::InvalidKeyLocator => {
                f.write_str("Key locator violates validation policy")
            }
            ValidationErrorCode::PolicyError => f.write_str("Validation policy error"),
            ValidationErrorCode::ImplementationError => {
                f.write_str("Internal implementation error")
            }
            ValidationErrorCode::User(code) => write!(f, "Custom error code {}", code),
        }
    }
}

/// Why a validation session failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}{}", info_suffix(.info))]
pub struct ValidationError {
    code: ValidationErrorCode,
    info: String,
}

fn info_suffix(info: &str) -> String {
    if info.is_empty() {
        String::new()
    } else {
        format!(": {}", info)
    }
}

impl ValidationError {
    pub fn new(code: ValidationErrorCode, info: impl Into<String>) -> Self {
        ValidationError {
            code,
            info: info.into(),
        }
    }

    pub fn code(&self) -> ValidationErrorCode {
        self.code
    }

    pub fn info(&self) -> &str {
        &self.info
    }
}

impl From<ValidationErrorCode> for ValidationError {
    fn from(code: ValidationErrorCode) -> Self {
        ValidationError::new(code, "")
    }
}
