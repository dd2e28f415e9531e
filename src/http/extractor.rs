use async_trait::async_trait;
use axum::body::HttpBody;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, FromRequest, FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request};
use axum::{BoxError, Json};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::auth;
use crate::http::error::Error;
use crate::http::ApiContext;

const SCHEME: &str = "bearer";

/// Add this as a parameter to a handler function to require the user to be logged in.
///
/// Parses a token from the `Authorization: Bearer <token>` header.
///
/// The identity comes out of the token's claims, so no database lookup is made. Handlers
/// needing more than the id and username should fetch the user themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
}

impl AuthUser {
    pub(in crate::http) fn to_jwt(&self, ctx: &ApiContext) -> Result<String, Error> {
        Ok(auth::issue_token(
            ctx.config.signing_secret(),
            self.user_id,
            &self.username,
        )?)
    }

    /// Attempt to parse `Self` from an `Authorization` header.
    fn from_authorization(ctx: &ApiContext, auth_header: &HeaderValue) -> Result<Self, Error> {
        let auth_header = auth_header.to_str().map_err(|_| {
            log::debug!("Authorization header is not UTF-8");
            Error::Unauthorized("invalid authorization header")
        })?;

        let token = match auth_header.split_once(' ') {
            // An empty token is left for `verify_token` to reject.
            Some((scheme, token)) if scheme.eq_ignore_ascii_case(SCHEME) => token,
            _ => {
                log::debug!("Authorization header is not a bearer credential");
                return Err(Error::Unauthorized("invalid authorization header"));
            }
        };

        let claims = auth::verify_token(ctx.config.signing_secret(), token).map_err(|e| {
            log::debug!("rejecting token: {}", e);
            Error::Unauthorized("invalid or expired token")
        })?;

        Ok(Self {
            user_id: claims.user_id,
            username: claims.username,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    ApiContext: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = ApiContext::from_ref(state);

        // Get the value of the `Authorization` header, if it was sent at all.
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(Error::Unauthorized("missing authorization header"))?;

        Self::from_authorization(&ctx, auth_header)
    }
}

/// The `:id` segment of a `/api/posts/:id...` route.
///
/// Post ids are unsigned integers; anything else is a 400 rather than axum's default
/// path rejection so the client gets the same JSON error body as everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for PostId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| Error::BadRequest("invalid post id".into()))?;

        raw.parse::<u64>()
            .ok()
            .and_then(|id| i64::try_from(id).ok())
            .map(PostId)
            .ok_or_else(|| Error::BadRequest("invalid post id".into()))
    }
}

/// Like `Json<T>`, but with the body also run through `T`'s `Validate` impl.
///
/// Syntax errors, missing fields and failed validation all become a `400 Bad Request`
/// carrying the reason.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| Error::BadRequest(rejection.body_text()))?;

        value
            .validate()
            .map_err(|e| Error::BadRequest(e.to_string()))?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::MockStoreTrait;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use rstest::rstest;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "Yabba Dabba Doo!";

    fn test_app() -> Router {
        let ctx = ApiContext {
            store: Arc::new(MockStoreTrait::new()),
            config: Arc::new(Config {
                jwt_secret: Some(SECRET.to_string()),
                ..Default::default()
            }),
        };

        async fn whoami(auth_user: AuthUser) -> String {
            format!("{}:{}", auth_user.user_id, auth_user.username)
        }

        Router::new().route("/whoami", get(whoami)).with_state(ctx)
    }

    async fn call(authorization: Option<String>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = test_app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn valid_bearer_token_yields_identity() {
        let token = auth::issue_token(SECRET.as_bytes(), 7, "wilma").unwrap();

        for scheme in ["Bearer", "bearer", "BEARER"] {
            let (status, body) = call(Some(format!("{} {}", scheme, token))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, b"7:wilma");
        }
    }

    #[rstest]
    #[case::missing(None, "missing authorization header")]
    #[case::wrong_scheme(Some("Token abc".to_string()), "invalid authorization header")]
    #[case::no_token(Some("Bearer".to_string()), "invalid authorization header")]
    #[case::empty_token(Some("Bearer ".to_string()), "invalid or expired token")]
    #[case::garbage_token(Some("Bearer abc.def.ghi".to_string()), "invalid or expired token")]
    #[case::foreign_key(
        Some(format!("Bearer {}", auth::issue_token(b"another key", 7, "wilma").unwrap())),
        "invalid or expired token"
    )]
    #[tokio::test]
    async fn rejected_authorization(#[case] header: Option<String>, #[case] message: &str) {
        let (status, body) = call(header).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], message);
    }
}
