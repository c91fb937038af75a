use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use lmsops_core::{DirectoryError, User, UserDirectory, UserId};

use super::{PgContext, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    ctx: PgContext,
}

impl PgUserDirectory {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }

    fn fetch(
        &self,
        operation: &str,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Option<User>, DirectoryError> {
        let row = self
            .ctx
            .block_on(query.fetch_optional(self.ctx.pool()))
            .map_err(|e| DirectoryError::Storage(map_sqlx_error(operation, e).to_string()))?;
        row.map(|r| user_from_row(&r))
            .transpose()
            .map_err(|e| DirectoryError::Storage(e.to_string()))
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        is_active: row.try_get("is_active")?,
    })
}

impl UserDirectory for PgUserDirectory {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        self.fetch(
            "get_user_by_id",
            sqlx::query("SELECT id, username, email, is_active FROM auth_user WHERE id = $1")
                .bind(id.get()),
        )
    }

    fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        self.fetch(
            "get_user_by_email",
            sqlx::query(
                "SELECT id, username, email, is_active FROM auth_user \
                 WHERE lower(email) = lower($1) ORDER BY id LIMIT 1",
            )
            .bind(email.to_string()),
        )
    }
}
