use leadops_core::domain::manager::{ManagerName, UserId};
use leadops_core::pipeline::{IdentityResolver, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Maps authenticated user ids to the manager name stamped on dispositions.
pub struct SqlIdentityResolver {
    pool: DbPool,
}

impl SqlIdentityResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_manager_name(
        &self,
        user_id: UserId,
    ) -> Result<Option<ManagerName>, RepositoryError> {
        let username: Option<String> =
            sqlx::query_scalar("SELECT username FROM app_user WHERE id = ?")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(username.map(ManagerName::new))
    }

    pub async fn upsert_user(
        &self,
        user_id: UserId,
        username: &str,
        access_level: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, username, access_level) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                access_level = excluded.access_level",
        )
        .bind(user_id.0)
        .bind(username)
        .bind(access_level)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityResolver for SqlIdentityResolver {
    async fn manager_name(&self, user_id: UserId) -> Result<Option<ManagerName>, StoreError> {
        Ok(self.find_manager_name(user_id).await?)
    }
}
