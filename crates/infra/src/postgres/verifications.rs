use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;

use lmsops_batch::{EligibilityPredicate, RecordRepository, RepositoryError};
use lmsops_core::{RecordId, UserId, VerificationId};
use lmsops_verification::{EnrollmentLookup, PhotoVerification, VerificationStatus};

use super::{PgContext, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgVerificationStore {
    ctx: PgContext,
}

impl PgVerificationStore {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }
}

fn verification_from_row(row: &PgRow) -> Result<PhotoVerification, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Storage(format!("failed to decode verification row: {e}"));
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(PhotoVerification {
        id: VerificationId::new(row.try_get("id").map_err(decode)?),
        user_id: UserId::new(row.try_get("user_id").map_err(decode)?),
        status: status
            .parse::<VerificationStatus>()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?,
        expiry_date: row.try_get("expiry_date").map_err(decode)?,
        expiry_email_date: row.try_get("expiry_email_date").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

impl RecordRepository for PgVerificationStore {
    type Record = PhotoVerification;

    /// Most recently updated matching attempt per learner.
    #[instrument(skip(self, predicate), err)]
    fn select_eligible(
        &self,
        predicate: &EligibilityPredicate,
    ) -> Result<Vec<PhotoVerification>, RepositoryError> {
        let rows = self
            .ctx
            .block_on(
                sqlx::query(
                    r#"
                    SELECT DISTINCT ON (user_id)
                        id, user_id, status, expiry_date, expiry_email_date, updated_at
                    FROM photo_verifications
                    WHERE status = 'approved'
                      AND (
                        (expiry_date >= $1 AND expiry_date < $2 AND expiry_email_date IS NULL)
                        OR expiry_email_date <= $3
                      )
                    ORDER BY user_id, updated_at DESC, id DESC
                    "#,
                )
                .bind(predicate.window.start)
                .bind(predicate.window.end)
                .bind(predicate.resend_on_or_before)
                .fetch_all(self.ctx.pool()),
            )
            .map_err(|e| map_sqlx_error("select_eligible", e))?;
        rows.iter().map(verification_from_row).collect()
    }

    fn update_watermark(
        &self,
        id: RecordId,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = self
            .ctx
            .block_on(
                sqlx::query("UPDATE photo_verifications SET expiry_email_date = $2 WHERE id = $1")
                    .bind(id.get())
                    .bind(watermark)
                    .execute(self.ctx.pool()),
            )
            .map_err(|e| map_sqlx_error("update_watermark", e))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgEnrollmentLookup {
    ctx: PgContext,
}

impl PgEnrollmentLookup {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }
}

impl EnrollmentLookup for PgEnrollmentLookup {
    fn has_verified_enrollment(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        self.ctx
            .block_on(
                sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM course_enrollments \
                     WHERE user_id = $1 AND mode = 'verified' AND is_active)",
                )
                .bind(user_id.get())
                .fetch_one(self.ctx.pool()),
            )
            .map_err(|e| map_sqlx_error("has_verified_enrollment", e))
    }
}
