use std::sync::Arc;

use async_trait::async_trait;
use course_core::model::{Email, OtpCode, OtpRecord};
use rand::Rng;
use storage::repository::OtpRepository;

use crate::Clock;
use crate::error::{MailError, OtpServiceError};

/// Delivers verification codes to students.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// # Errors
    ///
    /// Returns `MailError` when the mail could not be delivered.
    async fn send_verification(&self, email: &Email, code: &OtpCode) -> Result<(), MailError>;
}

/// Writes the verification mail to the log instead of sending it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &Email, code: &OtpCode) -> Result<(), MailError> {
        tracing::info!(%email, code = code.as_str(), "verification email");
        Ok(())
    }
}

/// Issues and checks email verification codes.
#[derive(Clone)]
pub struct OtpService {
    clock: Clock,
    otps: Arc<dyn OtpRepository>,
    mailer: Arc<dyn Mailer>,
}

impl OtpService {
    #[must_use]
    pub fn new(clock: Clock, otps: Arc<dyn OtpRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            clock,
            otps,
            mailer,
        }
    }

    fn generate_code() -> Result<OtpCode, OtpServiceError> {
        let n: u32 = rand::rng().random_range(0..1_000_000);
        Ok(OtpCode::from_number(n)?)
    }

    /// Generate a code, mail it, then store it.
    ///
    /// Nothing is stored when the mail fails.
    ///
    /// # Errors
    ///
    /// Returns `Otp` for a malformed email, `Mail` when delivery fails,
    /// `Storage` if the record cannot be saved.
    pub async fn send_otp(&self, email: &str) -> Result<OtpRecord, OtpServiceError> {
        let email = Email::parse(email)?;
        let code = Self::generate_code()?;

        self.mailer.send_verification(&email, &code).await?;

        let record = OtpRecord::new(email, code, self.clock.now());
        self.otps.insert_otp(&record).await?;
        tracing::debug!(email = %record.email(), expires_at = %record.expires_at(), "otp issued");
        Ok(record)
    }

    /// Check a code against the latest one issued for `email`.
    ///
    /// A successful check consumes every code issued for the email.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Expired` or `Mismatch` for a failed check; `Otp` for
    /// malformed input; `Storage` on repository failures.
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), OtpServiceError> {
        let email = Email::parse(email)?;
        let code = OtpCode::parse(code)?;

        let record = self
            .otps
            .latest_otp(&email)
            .await?
            .ok_or(OtpServiceError::NotFound)?;
        if record.is_expired(self.clock.now()) {
            return Err(OtpServiceError::Expired);
        }
        if !record.matches(&code) {
            return Err(OtpServiceError::Mismatch);
        }

        self.otps.delete_otps(&email).await?;
        tracing::info!(%email, "email verified");
        Ok(())
    }

    /// Drop codes whose time-to-live has passed. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `OtpServiceError::Storage` on repository failures.
    pub async fn purge_expired(&self) -> Result<u64, OtpServiceError> {
        let removed = self.otps.purge_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "purged expired otps");
        }
        Ok(removed)
    }
}
