use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::app::error::CoreResult;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, handle, created_at, last_used \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| User {
            id: row.get("id"),
            handle: row.get("handle"),
            created_at: row.get("created_at"),
            last_used: row.get("last_used"),
        });

        Ok(user)
    }

    /// Mark the user active now; the retention sweep keys off `last_used`.
    pub async fn touch_last_used_with_tx(
        user_id: Uuid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> CoreResult<()> {
        sqlx::query("UPDATE users SET last_used = now() WHERE id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
