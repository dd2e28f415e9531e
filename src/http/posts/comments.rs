use crate::http::extractor::{AuthUser, PostId, ValidJson};
use crate::http::ApiContext;
use crate::http::{Error, Result};
use crate::models::comment::{AddComment, Comment};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

pub(crate) fn router() -> Router<ApiContext> {
    Router::new().route(
        "/api/posts/:id/comments",
        get(get_post_comments).post(add_comment),
    )
}

async fn get_post_comments(
    ctx: State<ApiContext>,
    PostId(post_id): PostId,
) -> Result<Json<Vec<Comment>>> {
    // With this, we can return 404 if the post doesn't exist instead of an empty list.
    ctx.store.post().post_by_id(post_id).await?;

    let comments = ctx.store.comment().post_comments(post_id).await?;

    Ok(Json(comments))
}

async fn add_comment(
    auth_user: AuthUser,
    ctx: State<ApiContext>,
    PostId(post_id): PostId,
    req: Result<ValidJson<AddComment>, Error>,
) -> Result<(StatusCode, Json<Comment>)> {
    ctx.store.post().post_by_id(post_id).await?;

    let ValidJson(req) = req?;

    let comment = ctx
        .store
        .comment()
        .create_comment(auth_user.user_id, post_id, &req.content)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
