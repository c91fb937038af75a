use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;

use lmsops_batch::{BatchRange, RepositoryError};
use lmsops_core::{CourseEntitlementId, UserId};
use lmsops_entitlements::{CourseEntitlement, EntitlementEnrollment, EntitlementRepository};

use super::{PgContext, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgEntitlementStore {
    ctx: PgContext,
}

impl PgEntitlementStore {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }
}

struct EntitlementRow {
    id: i64,
    user_id: i64,
    course_uuid: String,
    mode: String,
    created_at: DateTime<Utc>,
    expired_at: Option<DateTime<Utc>>,
    course_run_key: Option<String>,
    enrolled_at: Option<DateTime<Utc>>,
    course_start: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for EntitlementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntitlementRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            course_uuid: row.try_get("course_uuid")?,
            mode: row.try_get("mode")?,
            created_at: row.try_get("created_at")?,
            expired_at: row.try_get("expired_at")?,
            course_run_key: row.try_get("course_run_key")?,
            enrolled_at: row.try_get("enrolled_at")?,
            course_start: row.try_get("course_start")?,
        })
    }
}

impl From<EntitlementRow> for CourseEntitlement {
    fn from(row: EntitlementRow) -> Self {
        let enrollment = match (row.course_run_key, row.enrolled_at) {
            (Some(course_run_key), Some(enrolled_at)) => Some(EntitlementEnrollment {
                course_run_key,
                enrolled_at,
                course_start: row.course_start.unwrap_or(enrolled_at),
            }),
            _ => None,
        };
        CourseEntitlement {
            id: CourseEntitlementId::new(row.id),
            user_id: UserId::new(row.user_id),
            course_uuid: row.course_uuid,
            mode: row.mode,
            created_at: row.created_at,
            expired_at: row.expired_at,
            enrollment,
        }
    }
}

impl EntitlementRepository for PgEntitlementStore {
    fn max_id(&self) -> Result<Option<CourseEntitlementId>, RepositoryError> {
        let max: Option<i64> = self
            .ctx
            .block_on(
                sqlx::query_scalar("SELECT MAX(id) FROM course_entitlements")
                    .fetch_one(self.ctx.pool()),
            )
            .map_err(|e| map_sqlx_error("max_id", e))?;
        Ok(max.map(CourseEntitlementId::new))
    }

    #[instrument(skip(self), err)]
    fn unexpired_in_range(&self, range: BatchRange) -> Result<Vec<CourseEntitlement>, RepositoryError> {
        let rows: Vec<EntitlementRow> = self
            .ctx
            .block_on(
                sqlx::query_as(
                    r#"
                    SELECT
                        e.id,
                        e.user_id,
                        e.course_uuid,
                        e.mode,
                        e.created_at,
                        e.expired_at,
                        ce.course_run_key,
                        ce.created_at AS enrolled_at,
                        cr.start AS course_start
                    FROM course_entitlements e
                    LEFT JOIN course_enrollments ce ON ce.id = e.enrollment_id
                    LEFT JOIN course_runs cr ON cr.key = ce.course_run_key
                    WHERE e.expired_at IS NULL AND e.id >= $1 AND e.id < $2
                    ORDER BY e.id ASC
                    "#,
                )
                .bind(range.start)
                .bind(range.end)
                .fetch_all(self.ctx.pool()),
            )
            .map_err(|e| map_sqlx_error("unexpired_in_range", e))?;
        Ok(rows.into_iter().map(CourseEntitlement::from).collect())
    }

    fn mark_expired(&self, id: CourseEntitlementId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = self
            .ctx
            .block_on(
                sqlx::query(
                    "UPDATE course_entitlements SET expired_at = $2 \
                     WHERE id = $1 AND expired_at IS NULL",
                )
                .bind(id.get())
                .bind(at)
                .execute(self.ctx.pool()),
            )
            .map_err(|e| map_sqlx_error("mark_expired", e))?;
        Ok(result.rows_affected() > 0)
    }
}
