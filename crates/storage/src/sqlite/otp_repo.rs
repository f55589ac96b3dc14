use chrono::{DateTime, Utc};
use course_core::model::{Email, OtpRecord};

use super::SqliteRepository;
use super::mapping::{conn, map_otp_row};
use crate::repository::{OtpRepository, StorageError, otp_expiry_cutoff};

#[async_trait::async_trait]
impl OtpRepository for SqliteRepository {
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO otps (email, code, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(record.email().as_str())
        .bind(record.code().as_str())
        .bind(record.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn latest_otp(&self, email: &Email) -> Result<Option<OtpRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT email, code, created_at
            FROM otps
            WHERE email = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_otp_row).transpose()
    }

    async fn delete_otps(&self, email: &Email) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM otps WHERE email = ?1")
            .bind(email.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM otps WHERE created_at <= ?1")
            .bind(otp_expiry_cutoff(now))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected())
    }
}
