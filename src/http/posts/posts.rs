use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::http::extractor::{AuthUser, PostId, ValidJson};
use crate::http::{ApiContext, Error, Result};
use crate::models::post::{Post, PostContent};

use crate::http::posts::comments::router as comments_router;
use crate::http::posts::listing;

pub(crate) fn router() -> Router<ApiContext> {
    // `listing` can't have a router of its own since every verb under a path has to be
    // listed exactly once.
    Router::new()
        .route("/api/posts", post(create_post).get(listing::list_posts))
        .route(
            "/api/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .merge(comments_router())
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Message {
    message: String,
}

/// Only the author of a post may change it.
fn ensure_author(post: &Post, auth_user: &AuthUser) -> Result<()> {
    if post.user_id != auth_user.user_id {
        log::debug!(
            "user {} tried to modify post {} owned by {}",
            auth_user.user_id,
            post.id,
            post.user_id
        );
        return Err(Error::Forbidden("not the post author"));
    }
    Ok(())
}

async fn create_post(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    ValidJson(req): ValidJson<PostContent>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = ctx.store.post().create_post(auth_user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(ctx: State<ApiContext>, PostId(post_id): PostId) -> Result<Json<Post>> {
    let post = ctx.store.post().post_by_id(post_id).await?;
    Ok(Json(post))
}

async fn update_post(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    PostId(post_id): PostId,
    // The body is only looked at once we know the post exists and belongs to the caller.
    req: Result<ValidJson<PostContent>, Error>,
) -> Result<Json<Post>> {
    let posts = ctx.store.post();

    let post = posts.post_by_id(post_id).await?;
    ensure_author(&post, &auth_user)?;

    let ValidJson(req) = req?;
    let post = posts.update_post(post_id, req).await?;

    Ok(Json(post))
}

async fn delete_post(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    PostId(post_id): PostId,
) -> Result<Json<Message>> {
    let posts = ctx.store.post();

    let post = posts.post_by_id(post_id).await?;
    ensure_author(&post, &auth_user)?;

    posts.delete_post(post_id).await?;

    Ok(Json(Message {
        message: "post deleted".to_string(),
    }))
}

// End handler functions.
