use crate::http::types::Timestamptz;
use crate::http::{Error, Result, ResultExt};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// A row of the `users` table.
///
/// Never serialized directly since it carries the password hash; see [`Author`] and
/// [`UserSummary`] for what the API hands out.
#[cfg_attr(test, derive(Clone, Debug, PartialEq, Eq))]
#[derive(sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Timestamptz,
    pub updated_at: Timestamptz,
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// The public view of a user, embedded as the `author` of posts and the `user` of comments.
#[cfg_attr(test, derive(PartialEq, Eq))]
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: Timestamptz,
    pub updated_at: Timestamptz,
}

/// What registration and login return about the account.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Clone)]
pub struct UserController {
    pool: SqlitePool,
}

impl UserController {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub type DynUserCtrl = Arc<dyn UserCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserCtrlTrait {
    /// Insert a user whose password has already been hashed.
    ///
    /// A clash on `username` or `email` is `Error::Conflict`.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;
    async fn user_by_username(&self, username: &str) -> Result<User>;
    /// Also how `create_user` reads back the row it inserted.
    async fn user_by_id(&self, user_id: i64) -> Result<User>;
    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool>;
    /// Removes the user along with every post and comment they wrote.
    async fn delete_user(&self, user_id: i64) -> Result<()>;
}

#[async_trait]
impl UserCtrlTrait for UserController {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "insert into users (username, email, password_hash) values (?, ?, ?) returning user_id",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        // The handler checks first, but two registrations can still race to the insert.
        .on_unique_violation(|_| Error::Conflict("username or email already exists"))?;

        self.user_by_id(user_id).await
    }

    async fn user_by_username(&self, username: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
                select user_id, username, email, password_hash, created_at, updated_at
                from users where username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound("user not found"))?;

        Ok(user)
    }

    async fn user_by_id(&self, user_id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
                select user_id, username, email, password_hash, created_at, updated_at
                from users where user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound("user not found"))?;

        Ok(user)
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let matches = sqlx::query_scalar::<_, i64>(
            "select count(*) from users where username = ? or email = ?",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(matches > 0)
    }

    async fn delete_user(&self, user_id: i64) -> Result<()> {
        let result = sqlx::query("delete from users where user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("user not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_pool;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "not-really-a-hash".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let users = UserController::new(test_pool().await);

        let created = users.create_user(new_user("a", "a@x.com")).await.unwrap();
        assert_eq!(created.username, "a");
        assert_eq!(created.created_at, created.updated_at);

        assert_eq!(users.user_by_username("a").await.unwrap(), created);
        assert_eq!(users.user_by_id(created.user_id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let users = UserController::new(test_pool().await);

        assert!(matches!(
            users.user_by_username("nobody").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(users.user_by_id(99).await, Err(Error::NotFound(_))));
        assert!(matches!(users.delete_user(99).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn created_user_is_read_back_from_the_table() {
        let users = UserController::new(test_pool().await);

        let first = users.create_user(new_user("a", "a@x.com")).await.unwrap();
        let second = users.create_user(new_user("b", "b@x.com")).await.unwrap();

        assert_ne!(first.user_id, second.user_id);
        assert_eq!(second.email, "b@x.com");
        assert_eq!(second.password_hash, "not-really-a-hash");
        assert_eq!(users.user_by_id(second.user_id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let users = UserController::new(test_pool().await);
        users.create_user(new_user("a", "a@x.com")).await.unwrap();

        assert!(users.username_or_email_taken("a", "other@x.com").await.unwrap());
        assert!(users.username_or_email_taken("other", "a@x.com").await.unwrap());
        assert!(!users.username_or_email_taken("b", "b@x.com").await.unwrap());

        assert!(matches!(
            users.create_user(new_user("a", "other@x.com")).await,
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            users.create_user(new_user("other", "a@x.com")).await,
            Err(Error::Conflict(_))
        ));
    }
}
