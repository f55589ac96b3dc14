use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// How long a verification code stays valid after it is issued.
pub const OTP_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OtpError {
    #[error("email address is invalid: {raw}")]
    InvalidEmail { raw: String },

    #[error("verification code must be exactly 6 digits")]
    InvalidCode,
}

/// Trimmed, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// # Errors
    ///
    /// Returns `OtpError::InvalidEmail` unless the value has exactly one `@`
    /// with text on both sides and no whitespace.
    pub fn parse(raw: impl Into<String>) -> Result<Self, OtpError> {
        let raw = raw.into();
        let normalized = raw.trim().to_lowercase();
        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !normalized.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(OtpError::InvalidEmail { raw });
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Six-digit one-time password.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// # Errors
    ///
    /// Returns `OtpError::InvalidCode` unless the trimmed value is six ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, OtpError> {
        let s = raw.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::InvalidCode);
        }
        Ok(Self(s.to_owned()))
    }

    /// Formats a number below one million as a zero-padded code.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::InvalidCode` if `n` has more than six digits.
    pub fn from_number(n: u32) -> Result<Self, OtpError> {
        if n > 999_999 {
            return Err(OtpError::InvalidCode);
        }
        Ok(Self(format!("{n:06}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are secrets; keep them out of debug output and logs.
impl std::fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// An issued verification code for an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    email: Email,
    code: OtpCode,
    created_at: DateTime<Utc>,
}

impl OtpRecord {
    #[must_use]
    pub fn new(email: Email, code: OtpCode, created_at: DateTime<Utc>) -> Self {
        Self {
            email,
            code,
            created_at,
        }
    }

    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    #[must_use]
    pub fn code(&self) -> &OtpCode {
        &self.code
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(OTP_TTL_SECS)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    #[must_use]
    pub fn matches(&self, code: &OtpCode) -> bool {
        self.code == *code
    }
}
