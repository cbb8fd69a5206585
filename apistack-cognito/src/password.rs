//! Password policy
//!
//! Besides rendering the `Policies.PasswordPolicy` block, the policy can
//! evaluate a candidate password with the same character classes the pool
//! enforces at sign-up.

use serde_json::{json, Value};
use std::fmt;

use crate::error::CognitoError;

/// Characters the pool counts as symbols
pub const SYMBOLS: &str = "^$*.[]{}()?\"!@#%&/\\,><':;|_~`=+- ";

const MIN_LENGTH_FLOOR: u32 = 6;
const MIN_LENGTH_CEILING: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: u32,
    pub require_digits: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_symbols: bool,
    /// Days a temporary password set by an administrator stays valid
    pub temp_password_validity_days: Option<u32>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digits: true,
            require_lowercase: true,
            require_uppercase: true,
            require_symbols: true,
            temp_password_validity_days: None,
        }
    }
}

/// A rule a password failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordViolation {
    TooShort { min_length: u32 },
    MissingDigit,
    MissingLowercase,
    MissingUppercase,
    MissingSymbol,
    LeadingOrTrailingSpace,
}

impl fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min_length } => {
                write!(f, "Password must have length greater than or equal to {min_length}")
            }
            Self::MissingDigit => f.write_str("Password must have numeric characters"),
            Self::MissingLowercase => f.write_str("Password must have lowercase characters"),
            Self::MissingUppercase => f.write_str("Password must have uppercase characters"),
            Self::MissingSymbol => f.write_str("Password must have symbol characters"),
            Self::LeadingOrTrailingSpace => {
                f.write_str("Password must not begin or end with a space")
            }
        }
    }
}

impl PasswordPolicy {
    /// Reject settings the pool would refuse at deploy time
    pub fn validate_settings(&self) -> Result<(), CognitoError> {
        if !(MIN_LENGTH_FLOOR..=MIN_LENGTH_CEILING).contains(&self.min_length) {
            return Err(CognitoError::InvalidPasswordPolicy(format!(
                "minLength must be between {MIN_LENGTH_FLOOR} and {MIN_LENGTH_CEILING}, got {}",
                self.min_length
            )));
        }
        if let Some(days) = self.temp_password_validity_days {
            if !(1..=365).contains(&days) {
                return Err(CognitoError::InvalidPasswordPolicy(format!(
                    "tempPasswordValidity must be between 1 and 365 days, got {days}"
                )));
            }
        }
        Ok(())
    }

    /// Check a password against the policy, reporting every failed rule
    pub fn validate(&self, password: &str) -> Result<(), Vec<PasswordViolation>> {
        let mut violations = Vec::new();

        if (password.chars().count() as u64) < u64::from(self.min_length) {
            violations.push(PasswordViolation::TooShort {
                min_length: self.min_length,
            });
        }
        if self.require_digits && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PasswordViolation::MissingDigit);
        }
        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            violations.push(PasswordViolation::MissingLowercase);
        }
        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            violations.push(PasswordViolation::MissingUppercase);
        }
        if self.require_symbols && !password.chars().any(|c| c != ' ' && SYMBOLS.contains(c)) {
            violations.push(PasswordViolation::MissingSymbol);
        }
        if password.starts_with(' ') || password.ends_with(' ') {
            violations.push(PasswordViolation::LeadingOrTrailingSpace);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    pub fn to_cfn(&self) -> Value {
        let mut policy = json!({
            "MinimumLength": self.min_length,
            "RequireLowercase": self.require_lowercase,
            "RequireNumbers": self.require_digits,
            "RequireSymbols": self.require_symbols,
            "RequireUppercase": self.require_uppercase,
        });
        if let Some(days) = self.temp_password_validity_days {
            policy["TemporaryPasswordValidityDays"] = json!(days);
        }
        policy
    }
}
