use std::path::PathBuf;

/// Secret used to sign tokens when `JWT_SECRET` is unset or empty.
///
/// Keeping a fallback lets the server start with zero configuration during development,
/// but any deployment must set `JWT_SECRET`: tokens signed with this value can be forged
/// by anyone who has read this file.
pub const DEV_JWT_SECRET: &str = "dev_secret_change_me";

/// The configuration parameters for the application.
///
/// These can either be passed on the command line, or pulled from environment variables.
/// The latter is preferred as environment variables are one of the recommended ways to
/// get configuration from Kubernetes Secrets in deployment.
///
/// For development convenience, these can also be read from a `.env` file in the working
/// directory where the application is started.
///
/// See `.env.sample` in the repository root for details.
#[derive(clap::Parser, Debug, Default)]
pub struct Config {
    /// The connection URL for the SQLite database this application should use.
    /// `sqlite::memory:` gives a throwaway database.
    #[clap(long, env, default_value = "sqlite:blog.db")]
    pub database_url: String,

    /// The HMAC signing key used for session tokens.
    ///
    /// Anyone holding this key can forge a token for any user, so it must be kept secret.
    #[clap(long, env)]
    pub jwt_secret: Option<String>,

    /// The port the HTTP server listens on.
    #[clap(long, env, default_value = "8080")]
    pub port: u16,

    /// Directory holding the browser front end, served for any path not matched by the API.
    #[clap(long, env, default_value = "web")]
    pub static_dir: PathBuf,
}

impl Config {
    /// The key tokens are signed and verified with.
    pub fn signing_secret(&self) -> &[u8] {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.as_bytes(),
            _ => DEV_JWT_SECRET.as_bytes(),
        }
    }

    pub fn jwt_secret_is_default(&self) -> bool {
        self.signing_secret() == DEV_JWT_SECRET.as_bytes()
    }
}
