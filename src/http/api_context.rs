use std::sync::Arc;

use crate::config::Config;
use crate::models::DynStore;

/// Shared state every handler can reach through `State<ApiContext>`.
///
/// Both fields are behind `Arc`, so cloning this per request is cheap.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<Config>,
    pub store: DynStore,
}
