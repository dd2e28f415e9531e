use crate::http::types::Timestamptz;
use crate::http::{Error, Result};
use crate::models::user::Author;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::SqlitePool;
use std::sync::Arc;
use validator::Validate;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, derive(PartialEq, Eq))]
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub user: Author,
    pub post_id: i64,
    pub created_at: Timestamptz,
}

#[derive(serde::Deserialize, Validate, Clone, Debug)]
pub struct AddComment {
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

// Same thing as `PostFromQuery`
#[derive(sqlx::FromRow)]
pub struct CommentFromQuery {
    pub comment_id: i64,
    pub content: String,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: Timestamptz,
    pub author_username: String,
    pub author_email: String,
    pub author_created_at: Timestamptz,
    pub author_updated_at: Timestamptz,
}

impl CommentFromQuery {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: self.comment_id,
            content: self.content,
            user_id: self.user_id,
            user: Author {
                id: self.user_id,
                username: self.author_username,
                email: self.author_email,
                created_at: self.author_created_at,
                updated_at: self.author_updated_at,
            },
            post_id: self.post_id,
            created_at: self.created_at,
        }
    }
}

const SELECT_COMMENT: &str = r#"
    select
        comment.comment_id,
        comment.content,
        comment.user_id,
        comment.post_id,
        comment.created_at,
        author.username author_username,
        author.email author_email,
        author.created_at author_created_at,
        author.updated_at author_updated_at
    from comments comment
    inner join users author using (user_id)
"#;

#[derive(Clone)]
pub struct CommentController {
    pool: SqlitePool,
}

impl CommentController {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub type DynCommentCtrl = Arc<dyn CommentCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommentCtrlTrait {
    async fn create_comment(&self, user_id: i64, post_id: i64, content: &str) -> Result<Comment>;
    /// Oldest first. An unknown post just has no comments; checking that it exists is up to
    /// the caller.
    async fn post_comments(&self, post_id: i64) -> Result<Vec<Comment>>;
}

#[async_trait]
impl CommentCtrlTrait for CommentController {
    async fn create_comment(&self, user_id: i64, post_id: i64, content: &str) -> Result<Comment> {
        let comment_id = sqlx::query_scalar::<_, i64>(
            r#"
                insert into comments (content, user_id, post_id)
                values (?, ?, ?)
                returning comment_id
            "#,
        )
        .bind(content)
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        let comment = sqlx::query_as::<_, CommentFromQuery>(&format!(
            "{} where comment.comment_id = ?",
            SELECT_COMMENT
        ))
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?
        // Only possible if the post was deleted right after we inserted.
        .ok_or(Error::NotFound("comment not found"))?
        .into_comment();

        Ok(comment)
    }

    async fn post_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, CommentFromQuery>(&format!(
            "{} where comment.post_id = ? order by comment.created_at, comment.comment_id",
            SELECT_COMMENT
        ))
        .bind(post_id)
        .fetch(&self.pool)
        .map_ok(CommentFromQuery::into_comment)
        .try_collect()
        .await?;

        Ok(comments)
    }
}
