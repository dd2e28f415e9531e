use crate::http::types::Timestamptz;
use crate::http::{Error, Result};
use crate::models::user::Author;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use validator::Validate;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, derive(PartialEq, Eq))]
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub author: Author,
    pub created_at: Timestamptz,
    pub updated_at: Timestamptz,
}

/// Body of both `POST /api/posts` and `PUT /api/posts/:id`; an update replaces both fields.
#[derive(serde::Deserialize, Validate, Clone, Debug)]
pub struct PostContent {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

// SQLx has no way to decode the nested `author` object, so the author's columns come back
// flattened with a prefix and get folded into `Post` afterwards.
#[derive(sqlx::FromRow)]
pub struct PostFromQuery {
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub created_at: Timestamptz,
    pub updated_at: Timestamptz,
    pub author_username: String,
    pub author_email: String,
    pub author_created_at: Timestamptz,
    pub author_updated_at: Timestamptz,
}

impl PostFromQuery {
    pub fn into_post(self) -> Post {
        Post {
            id: self.post_id,
            title: self.title,
            content: self.content,
            user_id: self.user_id,
            author: Author {
                id: self.user_id,
                username: self.author_username,
                email: self.author_email,
                created_at: self.author_created_at,
                updated_at: self.author_updated_at,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Selects `PostFromQuery` columns from `posts` joined with its author as `author`.
/// Callers append their own `where`/`order by`.
pub(crate) const SELECT_POST: &str = r#"
    select
        post.post_id,
        post.title,
        post.content,
        post.user_id,
        post.created_at,
        post.updated_at,
        author.username author_username,
        author.email author_email,
        author.created_at author_created_at,
        author.updated_at author_updated_at
    from posts post
    inner join users author using (user_id)
"#;

#[derive(Clone)]
pub struct PostController {
    pool: SqlitePool,
}

impl PostController {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub type DynPostCtrl = Arc<dyn PostCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PostCtrlTrait {
    async fn create_post(&self, user_id: i64, post: PostContent) -> Result<Post>;
    /// The post with its author eager-loaded.
    async fn post_by_id(&self, post_id: i64) -> Result<Post>;
    /// Overwrite title and content. Ownership is the caller's business.
    async fn update_post(&self, post_id: i64, post: PostContent) -> Result<Post>;
    /// Comments on the post go with it.
    async fn delete_post(&self, post_id: i64) -> Result<()>;
}

#[async_trait]
impl PostCtrlTrait for PostController {
    async fn create_post(&self, user_id: i64, post: PostContent) -> Result<Post> {
        // SQLite won't let an `insert ... returning` sit in a CTE, so the author join is a
        // second round trip.
        let post_id = sqlx::query_scalar::<_, i64>(
            "insert into posts (title, content, user_id) values (?, ?, ?) returning post_id",
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        self.post_by_id(post_id).await
    }

    async fn post_by_id(&self, post_id: i64) -> Result<Post> {
        let post = sqlx::query_as::<_, PostFromQuery>(&format!(
            "{} where post.post_id = ?",
            SELECT_POST
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound("post not found"))?
        .into_post();

        Ok(post)
    }

    async fn update_post(&self, post_id: i64, post: PostContent) -> Result<Post> {
        let result = sqlx::query(
            r#"
                update posts
                set title = ?,
                    content = ?,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                where post_id = ?
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Deleted between the handler's ownership check and now.
            return Err(Error::NotFound("post not found"));
        }

        self.post_by_id(post_id).await
    }

    async fn delete_post(&self, post_id: i64) -> Result<()> {
        let result = sqlx::query("delete from posts where post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("post not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_pool;
    use crate::models::user::{NewUser, UserController, UserCtrlTrait};

    fn content(title: &str, content: &str) -> PostContent {
        PostContent {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    async fn user(pool: &SqlitePool, username: &str) -> i64 {
        UserController::new(pool.clone())
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@x.com", username),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
            .user_id
    }

    #[tokio::test]
    async fn created_post_comes_back_with_author() {
        let pool = test_pool().await;
        let user_id = user(&pool, "fred").await;
        let posts = PostController::new(pool);

        let post = posts.create_post(user_id, content("t", "c")).await.unwrap();
        assert_eq!(post.title, "t");
        assert_eq!(post.content, "c");
        assert_eq!(post.user_id, user_id);
        assert_eq!(post.author.id, user_id);
        assert_eq!(post.author.username, "fred");

        assert_eq!(posts.post_by_id(post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn update_overwrites_title_and_content() {
        let pool = test_pool().await;
        let user_id = user(&pool, "fred").await;
        let posts = PostController::new(pool);

        let post = posts.create_post(user_id, content("t", "c")).await.unwrap();
        let updated = posts
            .update_post(post.id, content("t2", "c2"))
            .await
            .unwrap();

        assert_eq!(updated.id, post.id);
        assert_eq!(updated.title, "t2");
        assert_eq!(updated.content, "c2");
        assert_eq!(updated.created_at, post.created_at);
        assert!(updated.updated_at >= post.updated_at);
    }

    #[tokio::test]
    async fn missing_post_is_not_found() {
        let posts = PostController::new(test_pool().await);

        assert!(matches!(posts.post_by_id(1).await, Err(Error::NotFound(_))));
        assert!(matches!(
            posts.update_post(1, content("t", "c")).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(posts.delete_post(1).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn post_needs_an_existing_author() {
        let posts = PostController::new(test_pool().await);

        assert!(matches!(
            posts.create_post(42, content("t", "c")).await,
            Err(Error::Sqlx(_))
        ));
    }

    #[tokio::test]
    async fn deleting_the_author_deletes_their_posts() {
        let pool = test_pool().await;
        let user_id = user(&pool, "fred").await;
        let posts = PostController::new(pool.clone());
        let post = posts.create_post(user_id, content("t", "c")).await.unwrap();

        UserController::new(pool)
            .delete_user(user_id)
            .await
            .unwrap();

        assert!(matches!(
            posts.post_by_id(post.id).await,
            Err(Error::NotFound(_))
        ));
    }
}
