// Repository listing capability.
// The seam between the fetch pipeline and a concrete GitHub host.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{Endpoint, OrganizationPage, Page};

/// What the pipeline needs from one authenticated host.
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Host name repositories are cloned from, e.g. `github.com`.
    fn host(&self) -> &str;

    /// Login of the authenticated identity.
    async fn current_user(&self) -> Result<String>;

    /// Fetch one 1-based page of the identity's organization logins.
    async fn organizations_page(&self, page: u32) -> Result<OrganizationPage>;

    /// Fetch one 1-based page of `endpoint`.
    ///
    /// Failures are reported as `GhpickError::Page` naming the endpoint and page.
    async fn fetch_page(&self, endpoint: &Endpoint, page: u32) -> Result<Page>;
}
