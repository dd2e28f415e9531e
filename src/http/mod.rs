/// Defines a common error type to use for all request handlers.
mod error;

/// Contains definitions for application-specific parameters to handler functions,
/// such as `AuthUser` which checks for the `Authorization: Bearer <token>` header in the request,
/// verifies `<token>` as a JWT and checks the signature,
/// then deserializes the information it contains.
pub mod extractor;

/// A catch-all module for other common types in the API.
pub mod types;

// Modules introducing API routes, in the order they are merged in `api_router()`.
mod posts;
mod users;

pub mod server;
pub use server::{api_router, serve};

pub mod api_context;
pub use api_context::ApiContext;

pub use error::{Error, ResultExt};

pub type Result<T, E = Error> = std::result::Result<T, E>;
