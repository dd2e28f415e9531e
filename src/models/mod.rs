use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

#[cfg(test)]
use mockall::automock;

pub mod comment;
pub mod listing;
pub mod post;
pub mod user;

use comment::{CommentController, DynCommentCtrl};
use listing::{DynListingCtrl, ListingController};
use post::{DynPostCtrl, PostController};
use user::{DynUserCtrl, UserController};

pub type DynStore = Arc<dyn StoreTrait + Send + Sync>;

/// Hands out the per-table controllers.
///
/// Handlers only ever see this trait, so tests can swap in `MockStoreTrait`.
#[cfg_attr(test, automock)]
pub trait StoreTrait {
    fn user(&self) -> DynUserCtrl;
    fn post(&self) -> DynPostCtrl;
    fn comment(&self) -> DynCommentCtrl;
    fn listing(&self) -> DynListingCtrl;
}

#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
    user: Arc<UserController>,
    post: Arc<PostController>,
    comment: Arc<CommentController>,
    listing: Arc<ListingController>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(UserController::new(pool.clone()));
        let post = Arc::new(PostController::new(pool.clone()));
        let comment = Arc::new(CommentController::new(pool.clone()));
        let listing = Arc::new(ListingController::new(pool.clone()));
        Self {
            pool,
            user,
            post,
            comment,
            listing,
        }
    }
}

impl StoreTrait for Store {
    fn user(&self) -> DynUserCtrl {
        self.user.clone()
    }

    fn post(&self) -> DynPostCtrl {
        self.post.clone()
    }

    fn comment(&self) -> DynCommentCtrl {
        self.comment.clone()
    }

    fn listing(&self) -> DynListingCtrl {
        self.listing.clone()
    }
}

/// Open a connection pool for `database_url`, creating the database file if needed.
///
/// Every connection to `sqlite::memory:` gets its own empty database, so in that case the pool
/// is pinned to one connection that is never recycled.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database URL {}", database_url))?
        .create_if_missing(true)
        // Cascading deletes rely on this.
        .foreign_keys(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(16)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .context("could not connect to the database")?;

    Ok(pool)
}

/// Bring the schema up to date.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!()
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    log::info!("database initialized");
    Ok(())
}

/// A fresh, migrated in-memory database.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = connect("sqlite::memory:").await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}
