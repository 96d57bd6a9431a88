// GitHub API module.
// Client, listing endpoints and pagination for the repository fetch pipeline.

pub mod api;
pub mod client;
pub mod endpoints;
pub mod pagination;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use api::RepositoryApi;
pub use client::GitHubClient;
pub use pagination::{
    DEFAULT_MAX_PAGES, PaginationLimits, fetch_all_organizations, fetch_all_pages,
};
pub use types::*;
