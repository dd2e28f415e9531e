use anyhow::Context;
use clap::Parser;

use blog_api::config::Config;
use blog_api::{http, models};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // This returns an error if the `.env` file doesn't exist, but that's not what we want
    // since we're not going to use a `.env` file if we deploy this application.
    dotenvy::dotenv().ok();

    // Initialize the logger. Use `RUST_LOG` to set levels, e.g. `RUST_LOG=blog_api=debug`.
    env_logger::init();

    // Parse our configuration from the environment.
    // This will exit with a help message if something is wrong.
    let config = Config::parse();

    if config.jwt_secret_is_default() {
        log::warn!(
            "JWT_SECRET is not set; signing tokens with the built-in development secret. \
             Anyone who knows it can forge sessions."
        );
    }

    let db = models::connect(&config.database_url)
        .await
        .with_context(|| format!("could not open database {}", config.database_url))?;

    models::migrate(&db).await?;

    http::serve(config, db).await?;

    Ok(())
}
