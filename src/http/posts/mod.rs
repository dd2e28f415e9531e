mod comments;
mod listing;
#[allow(clippy::module_inception)]
mod posts;

pub(crate) use posts::router;
