use chrono::Utc;
use sqlx::Row;

use roleflow_core::domain::role::Role;
use roleflow_core::domain::user::{User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_role(row: &sqlx::sqlite::SqliteRow) -> Result<Role, RepositoryError> {
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let steps_json: String =
        row.try_get("steps_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let steps: Vec<String> = serde_json::from_str(&steps_json)
        .map_err(|e| RepositoryError::Decode(format!("steps for role `{name}`: {e}")))?;

    Ok(Role { name, steps })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let exists = sqlx::query("SELECT id FROM user_record WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT name, steps_json FROM user_role WHERE user_id = ? ORDER BY position ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let roles = rows.iter().map(row_to_role).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(User { id: id.clone(), roles }))
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO user_record (id, created_at, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(user.id.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM user_role WHERE user_id = ?")
            .bind(user.id.as_str())
            .execute(&mut *tx)
            .await?;

        for (position, role) in user.roles.iter().enumerate() {
            let steps_json = serde_json::to_string(&role.steps)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sqlx::query(
                "INSERT INTO user_role (user_id, position, name, steps_json) VALUES (?, ?, ?, ?)",
            )
            .bind(user.id.as_str())
            .bind(position as i64)
            .bind(&role.name)
            .bind(steps_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use roleflow_core::domain::role::Role;
    use roleflow_core::domain::user::{User, UserId};

    use super::SqlUserRepository;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlUserRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlUserRepository::new(pool)
    }

    fn role(name: &str, steps: &[&str]) -> Role {
        Role { name: name.to_owned(), steps: steps.iter().map(|step| (*step).to_owned()).collect() }
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let repo = repository().await;
        assert!(repo.find_by_id(&UserId::from("U404")).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn user_without_roles_round_trips() {
        let repo = repository().await;
        let user = User::new(UserId::from("U1"));

        repo.save(user.clone()).await.expect("save");

        assert_eq!(repo.find_by_id(&user.id).await.expect("find"), Some(user));
    }

    #[tokio::test]
    async fn roles_keep_order_and_steps() {
        let repo = repository().await;
        let mut user = User::new(UserId::from("U1"));
        user.append_role(role("greeter", &["Say hello", "Offer coffee"]));
        user.append_role(role("closer", &[]));
        user.append_role(role("auditor", &["Check \"quotes\" and 'commas', too"]));

        repo.save(user.clone()).await.expect("save");
        let found = repo.find_by_id(&user.id).await.expect("find").expect("present");

        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn resave_replaces_roles_instead_of_duplicating() {
        let repo = repository().await;
        let mut user = User::new(UserId::from("U1"));
        user.append_role(role("greeter", &[]));
        repo.save(user.clone()).await.expect("first save");

        user.append_role(role("closer", &["Ask for the signature"]));
        repo.save(user.clone()).await.expect("second save");

        let found = repo.find_by_id(&user.id).await.expect("find").expect("present");
        assert_eq!(found.roles.len(), 2);
        assert_eq!(found.roles.last(), Some(&role("closer", &["Ask for the signature"])));
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let repo = repository().await;
        let mut first = User::new(UserId::from("U1"));
        first.append_role(role("greeter", &[]));
        repo.save(first).await.expect("save U1");
        repo.save(User::new(UserId::from("U2"))).await.expect("save U2");

        let second = repo.find_by_id(&UserId::from("U2")).await.expect("find").expect("present");
        assert!(second.roles.is_empty());
    }

    #[tokio::test]
    async fn corrupt_steps_surface_as_decode_error() {
        let repo = repository().await;
        repo.save(User::new(UserId::from("U1"))).await.expect("save");
        sqlx::query(
            "INSERT INTO user_role (user_id, position, name, steps_json) VALUES ('U1', 0, 'broken', 'not json')",
        )
        .execute(&repo.pool)
        .await
        .expect("insert corrupt row");

        let error = repo.find_by_id(&UserId::from("U1")).await.expect_err("decode failure");
        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.contains("broken")
        ));
    }
}
