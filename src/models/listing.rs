use crate::http::{Error, Result};
use crate::models::post::{Post, PostFromQuery, SELECT_POST};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::SqlitePool;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// Query string of `GET /api/posts`.
///
/// Kept as raw strings so a bad value gets our own message instead of a serde error, and so
/// `?limit=` can mean the same as leaving it out.
#[derive(Default, Debug)]
pub struct ListPostsQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl FromIterator<(String, String)> for ListPostsQuery {
    /// The first occurrence of a parameter wins; repeats and unknown keys are ignored.
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "limit" => &mut query.limit,
                "offset" => &mut query.offset,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

/// A validated window into the post list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// `None` returns every post from `offset` on.
    pub limit: Option<i64>,
    pub offset: i64,
}

impl ListPostsQuery {
    pub fn page(&self) -> Result<Page> {
        let limit = match non_empty(&self.limit) {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => return Err(Error::BadRequest("invalid limit".into())),
            },
        };

        let offset = match non_empty(&self.offset) {
            None => 0,
            Some(raw) => match raw.parse::<i64>() {
                Ok(offset) if offset >= 0 => offset,
                _ => return Err(Error::BadRequest("invalid offset".into())),
            },
        };

        Ok(Page { limit, offset })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[derive(Clone)]
pub struct ListingController {
    pool: SqlitePool,
}

impl ListingController {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub type DynListingCtrl = Arc<dyn ListingCtrlTrait + Send + Sync>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListingCtrlTrait {
    /// Newest first, with authors.
    async fn list_posts(&self, page: Page) -> Result<Vec<Post>>;
}

#[async_trait]
impl ListingCtrlTrait for ListingController {
    async fn list_posts(&self, page: Page) -> Result<Vec<Post>> {
        // `limit` and `offset` are not the optimal way to paginate SQL queries, because the query
        // planner essentially has to fetch the whole dataset first and then cull it afterwards.
        // Paginating on `created_at` would be better, but this is what the front end speaks.
        //
        // A negative `limit` means no limit to SQLite. Posts created within the same
        // millisecond fall back to insertion order.
        let posts: Vec<_> = sqlx::query_as::<_, PostFromQuery>(&format!(
            "{} order by post.created_at desc, post.post_id desc limit ? offset ?",
            SELECT_POST
        ))
        .bind(page.limit.unwrap_or(-1))
        .bind(page.offset)
        .fetch(&self.pool)
        .map_ok(PostFromQuery::into_post)
        .try_collect()
        .await?;

        Ok(posts)
    }
}
