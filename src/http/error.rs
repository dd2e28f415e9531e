use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::error::DatabaseError;

/// A common error type that can be used throughout the API.
///
/// Can be returned in a `Result` from an API handler function.
///
/// For convenience, this represents both API errors as well as internal recoverable errors,
/// and maps them to appropriate status codes along with at least a minimally useful error
/// message in a plain JSON body `{"error": "<message>"}`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Return `400 Bad Request`
    ///
    /// Used for malformed bodies, missing or empty required fields, and bad path or query
    /// parameters. The message is shown to the client as-is.
    #[error("{0}")]
    BadRequest(String),

    /// Return `401 Unauthorized`
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Return `403 Forbidden`
    #[error("{0}")]
    Forbidden(&'static str),

    /// Return `404 Not Found`
    #[error("{0}")]
    NotFound(&'static str),

    /// Return `409 Conflict`
    #[error("{0}")]
    Conflict(&'static str),

    /// Automatically return `500 Internal Server Error` on a `sqlx::Error`.
    ///
    /// Via the generated `From<sqlx::Error> for Error` impl,
    /// this allows using `?` on database calls in handler functions without a manual mapping step.
    ///
    /// The actual error message isn't returned to the client for security reasons.
    /// It should be logged instead.
    #[error("an error occurred with the database")]
    Sqlx(#[from] sqlx::Error),

    /// Return `500 Internal Server Error` on a `anyhow::Error`.
    ///
    /// `anyhow::Error` is used in a few places to capture context and backtraces
    /// on unrecoverable (but technically non-fatal) errors which could be highly useful for
    /// debugging. We use it a lot in our code for background tasks or making API calls
    /// to external services so we can use `.context()` to refine the logged error.
    ///
    /// Via the generated `From<anyhow::Error> for Error` impl, this allows the
    /// use of `?` in handler functions to automatically convert `anyhow::Error` into a response.
    ///
    /// Like with `Error::Sqlx`, the actual error message is not returned to the client
    /// for security reasons.
    #[error("an internal server error occurred")]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Sqlx(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message the client gets to see.
    fn public_message(&self) -> String {
        match self {
            Self::Sqlx(_) | Self::Anyhow(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Axum allows you to return `Result` from handler functions, but the error type
/// also must be some sort of response type.
///
/// By default, the generated `Display` impl is used to return a plaintext error message
/// to the client; here it's wrapped in JSON instead.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            // The internal errors get logged with full detail here since that is the only
            // place they'll ever be seen.
            Self::Sqlx(e) => {
                log::error!("SQLx error: {:?}", e);
            }
            Self::Anyhow(e) => {
                log::error!("Generic error: {:?}", e);
            }
            // Other errors get mapped normally.
            _ => (),
        }

        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (self.status_code(), body).into_response()
    }
}

/// A little helper trait for more easily converting database constraint errors into API errors.
///
/// ```rust,ignore
/// let user_id = sqlx::query_scalar::<_, i64>(
///     "insert into users (username, email, password_hash) values (?, ?, ?) returning user_id",
/// )
/// .bind(username)
/// .bind(email)
/// .bind(password_hash)
/// .fetch_one(&pool)
/// .await
/// .on_unique_violation(|_| Error::Conflict("username or email already exists"))?;
/// ```
pub trait ResultExt<T> {
    /// If `self` contains a SQLx database error caused by a `unique` constraint,
    /// transform the error.
    ///
    /// Otherwise, the result is passed through unchanged.
    fn on_unique_violation(
        self,
        f: impl FnOnce(Box<dyn DatabaseError>) -> Error,
    ) -> Result<T, Error>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn on_unique_violation(
        self,
        map_err: impl FnOnce(Box<dyn DatabaseError>) -> Error,
    ) -> Result<T, Error> {
        self.map_err(|e| match e.into() {
            Error::Sqlx(sqlx::Error::Database(dbe)) if is_unique_violation(&*dbe) => map_err(dbe),
            e => e,
        })
    }
}

// SQLite reports the extended result code, `SQLITE_CONSTRAINT_UNIQUE` (2067), or
// `SQLITE_CONSTRAINT_PRIMARYKEY` (1555) for a clashing rowid.
fn is_unique_violation(error: &dyn DatabaseError) -> bool {
    matches!(error.code().as_deref(), Some("2067") | Some("1555"))
        || error.message().starts_with("UNIQUE constraint failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let (status, json) = body_json(Error::Forbidden("not the post author")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "not the post author");

        let (status, json) = body_json(Error::BadRequest("invalid limit".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid limit");
    }

    #[tokio::test]
    async fn internal_errors_hide_their_detail() {
        let error = Error::from(anyhow::anyhow!("disk on fire at /var/lib/blog.db"));
        let (status, json) = body_json(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "internal server error");

        let (status, json) = body_json(Error::Sqlx(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "internal server error");
    }

    #[test]
    fn non_constraint_errors_pass_through() {
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        let mapped = result.on_unique_violation(|_| Error::Conflict("taken"));
        assert!(matches!(mapped, Err(Error::Sqlx(sqlx::Error::RowNotFound))));
    }
}
