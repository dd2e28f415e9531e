use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use sha2::Sha256;
use time::OffsetDateTime;

/// Value of the `iss` claim on every token we sign.
pub const TOKEN_ISSUER: &str = "blog-api";

/// How long a token stays valid after it was issued.
pub const SESSION_LENGTH: time::Duration = time::Duration::hours(24);

/// The payload of a session token.
///
/// Tokens are stateless: the server keeps no record of them, so everything a handler needs to
/// know about the caller has to be in here.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    /// Malformed, signed with another key, or signed with an algorithm other than HS256.
    #[error("invalid token: {0}")]
    Invalid(#[from] jwt::Error),

    #[error("token expired")]
    Expired,
}

impl Claims {
    pub fn new(user_id: i64, username: impl Into<String>, issued_at: OffsetDateTime) -> Self {
        Self {
            user_id,
            username: username.into(),
            iss: TOKEN_ISSUER.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + SESSION_LENGTH).unix_timestamp(),
        }
    }

    /// Sign these claims as an HS256 JWT.
    pub fn sign(&self, secret: &[u8]) -> anyhow::Result<String> {
        self.sign_with_key(&signing_key(secret))
            .context("failed to sign session token")
    }
}

/// Issue a token for the given user, valid for [`SESSION_LENGTH`] from now.
pub fn issue_token(secret: &[u8], user_id: i64, username: &str) -> anyhow::Result<String> {
    Claims::new(user_id, username, OffsetDateTime::now_utc()).sign(secret)
}

/// Check the token's algorithm, signature and expiry, and return what it says about the caller.
pub fn verify_token(secret: &[u8], token: &str) -> Result<Claims, TokenError> {
    // `jwt` compares the algorithm named in the header against the key's own algorithm before
    // looking at the signature, so `alg: none` and HS384/RS256 tokens fail here with
    // `AlgorithmMismatch`.
    let claims: Claims = token.verify_with_key(&signing_key(secret))?;

    if claims.exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

fn signing_key(secret: &[u8]) -> Hmac<Sha256> {
    Hmac::<Sha256>::new_from_slice(secret).expect("HMAC-SHA-256 can accept any key length")
}

/// Hash a password with argon2 and a random salt, returning the PHC string to store.
pub async fn hash_password(password: String) -> anyhow::Result<String> {
    // Argon2 hashing is designed to be computationally intensive,
    // so we need to do this on a blocking thread.
    tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let salt = SaltString::generate(rand::thread_rng());
        Ok(PasswordHash::generate(Argon2::default(), password, &salt)
            .map_err(|e| anyhow::anyhow!("failed to generate password hash: {}", e))?
            .to_string())
    })
    .await
    .context("panic in generating password hash")?
}

/// Returns `Ok(false)` if the password doesn't match, and `Err` only if the stored hash
/// can't be used at all.
pub async fn verify_password(password: String, password_hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("invalid password hash: {}", e))?;

        match hash.verify_password(&[&Argon2::default()], password) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("failed to verify password hash: {}", e)),
        }
    })
    .await
    .context("panic in verifying password hash")?
}
