/// Password hashing and the signed session tokens handed out by `POST /api/login`.
pub mod auth;

/// Command-line and environment configuration.
pub mod config;

/// The HTTP layer: routes, handlers, extractors and the error type they share.
pub mod http;

/// Everything that touches the database.
pub mod models;
