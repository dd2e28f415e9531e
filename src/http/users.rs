use crate::auth::{hash_password, verify_password};
use crate::http::extractor::{AuthUser, ValidJson};
use crate::http::{ApiContext, Error, Result};
use crate::models::user::{NewUser, UserSummary};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use validator::Validate;

pub(crate) fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
}

#[derive(serde::Deserialize, Validate)]
struct RegisterUser {
    #[validate(length(min = 1, message = "username is required"))]
    username: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
    #[validate(length(min = 1, message = "email is required"))]
    email: String,
}

#[derive(serde::Deserialize, Validate)]
struct LoginUser {
    #[validate(length(min = 1, message = "username is required"))]
    username: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Registered {
    message: String,
    user: UserSummary,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LoggedIn {
    token: String,
    user: UserSummary,
}

async fn register(
    ctx: State<ApiContext>,
    ValidJson(req): ValidJson<RegisterUser>,
) -> Result<(StatusCode, Json<Registered>)> {
    let users = ctx.store.user();

    // The unique constraints would catch this too, but checking up front saves hashing a
    // password we're going to throw away.
    if users
        .username_or_email_taken(&req.username, &req.email)
        .await?
    {
        return Err(Error::Conflict("username or email already exists"));
    }

    let password_hash = hash_password(req.password).await?;

    let user = users
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await?;

    log::info!("registered user {} ({})", user.username, user.user_id);

    Ok((
        StatusCode::CREATED,
        Json(Registered {
            message: "user registered".to_string(),
            user: UserSummary::from(&user),
        }),
    ))
}

async fn login(
    ctx: State<ApiContext>,
    ValidJson(req): ValidJson<LoginUser>,
) -> Result<Json<LoggedIn>> {
    // Unknown user and wrong password get the same answer so the response doesn't reveal
    // which usernames exist.
    const BAD_CREDENTIALS: Error = Error::Unauthorized("invalid username or password");

    let user = match ctx.store.user().user_by_username(&req.username).await {
        Ok(user) => user,
        Err(Error::NotFound(_)) => return Err(BAD_CREDENTIALS),
        Err(e) => return Err(e),
    };

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(BAD_CREDENTIALS);
    }

    let token = AuthUser {
        user_id: user.user_id,
        username: user.username.clone(),
    }
    .to_jwt(&ctx)?;

    Ok(Json(LoggedIn {
        token,
        user: UserSummary::from(&user),
    }))
}
