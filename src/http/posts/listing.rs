use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;

use crate::http;
use crate::http::{ApiContext, Error};
use crate::models::listing::ListPostsQuery;
use crate::models::post::Post;

/// `GET /api/posts`, newest first.
///
/// The front end expects a bare JSON array, so unlike most list endpoints there's no
/// envelope with a total count.
pub(in crate::http) async fn list_posts(
    ctx: State<ApiContext>,
    // Taken as raw pairs so `?limit=2&limit=3` isn't a serde "duplicate field" error.
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> http::Result<Json<Vec<Post>>> {
    let Query(pairs) = pairs.map_err(|e| Error::BadRequest(e.body_text()))?;
    let page = pairs.into_iter().collect::<ListPostsQuery>().page()?;

    let posts = ctx.store.listing().list_posts(page).await?;

    Ok(Json(posts))
}
