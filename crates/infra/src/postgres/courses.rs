use chrono::{DateTime, Utc};

use lmsops_batch::RepositoryError;
use lmsops_courses::{Course, CourseStore, CourseStoreError, NewCourse};

use super::{PgContext, map_sqlx_error};

/// Creates courses and grants the creating instructor access in one
/// transaction.
#[derive(Debug, Clone)]
pub struct PgCourseStore {
    ctx: PgContext,
}

impl PgCourseStore {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }

    async fn insert(&self, new: &NewCourse) -> Result<DateTime<Utc>, sqlx::Error> {
        let mut tx = self.ctx.pool().begin().await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO courses (org, course, run, display_name, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(&new.key.org)
        .bind(&new.key.course)
        .bind(&new.key.run)
        .bind(&new.display_name)
        .bind(new.instructor.get())
        .fetch_one(&mut *tx)
        .await?;

        for role in ["instructor", "staff"] {
            sqlx::query(
                "INSERT INTO course_access_roles (user_id, course_key, role) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(new.instructor.get())
            .bind(new.key.to_string())
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created_at)
    }
}

impl CourseStore for PgCourseStore {
    fn create_course(&self, new: &NewCourse) -> Result<Course, CourseStoreError> {
        let created_at = self.ctx.block_on(self.insert(new)).map_err(|e| {
            match map_sqlx_error("create_course", e) {
                RepositoryError::Conflict(_) => CourseStoreError::Duplicate(new.key.clone()),
                other => CourseStoreError::Storage(other.to_string()),
            }
        })?;
        Ok(Course {
            id: new.key.clone(),
            display_name: new.display_name.clone(),
            created_by: new.instructor,
            created_at,
        })
    }
}
