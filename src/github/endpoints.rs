// GitHub API endpoint functions.
// Typed calls for the authenticated user, its organizations and repository pages.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{GhpickError, Result};

use super::api::RepositoryApi;
use super::client::GitHubClient;
use super::pagination::{LinkPagination, parse_link_header};
use super::types::{ApiRepository, Endpoint, OrganizationPage, Owner, PER_PAGE, Page};

impl GitHubClient {
    /// Get the authenticated user.
    pub async fn get_current_user(&self) -> Result<Owner> {
        let response = self.get("/user").await?;
        let user: Owner = response.json().await?;
        Ok(user)
    }

    /// Get one page of organizations for the authenticated user.
    pub async fn get_user_orgs(&self, page: u32) -> Result<OrganizationPage> {
        let params = [
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        let response = self.get_with_params("/user/orgs", &params).await?;

        let link = GitHubClient::link_header(&response)?;
        let body = response.text().await?;
        decode_organization_page(link.as_deref(), &body)
    }

    /// Get one page of repositories together with its pagination cursors.
    pub async fn get_repository_page(&self, endpoint: &Endpoint, page: u32) -> Result<Page> {
        let response = self
            .get_with_params(&endpoint.path(), &endpoint.query(page))
            .await?;

        let link = GitHubClient::link_header(&response)?;
        let body = response.text().await?;
        decode_repository_page(link.as_deref(), &body)
    }
}

/// Decode a listing body and the cursors of its `Link` header.
fn decode_listing<T: DeserializeOwned>(
    link: Option<&str>,
    body: &str,
) -> Result<(Vec<T>, LinkPagination)> {
    let items: Vec<T> = serde_json::from_str(body)?;
    let cursors = match link {
        Some(header) => parse_link_header(header)?,
        None => LinkPagination::default(),
    };
    Ok((items, cursors))
}

pub fn decode_repository_page(link: Option<&str>, body: &str) -> Result<Page> {
    let (items, cursors) = decode_listing::<ApiRepository>(link, body)?;
    let repositories = items
        .into_iter()
        .map(ApiRepository::into_domain)
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        repositories,
        next_page: cursors.next_page,
        last_page: cursors.last_page,
    })
}

pub fn decode_organization_page(link: Option<&str>, body: &str) -> Result<OrganizationPage> {
    let (orgs, cursors) = decode_listing::<Owner>(link, body)?;
    Ok(OrganizationPage {
        organizations: orgs.into_iter().map(|org| org.login).collect(),
        next_page: cursors.next_page,
    })
}

/// Wrap a failure with the owner label and page it happened on.
fn page_context(owner: String, page: u32) -> impl FnOnce(GhpickError) -> GhpickError {
    move |source| GhpickError::Page {
        owner,
        page,
        source: Box::new(source),
    }
}

#[async_trait]
impl RepositoryApi for GitHubClient {
    fn host(&self) -> &str {
        GitHubClient::host(self)
    }

    async fn current_user(&self) -> Result<String> {
        Ok(self.get_current_user().await?.login)
    }

    async fn organizations_page(&self, page: u32) -> Result<OrganizationPage> {
        let owner = format!("{}/@me (organizations)", GitHubClient::host(self));
        self.get_user_orgs(page)
            .await
            .map_err(page_context(owner, page))
    }

    async fn fetch_page(&self, endpoint: &Endpoint, page: u32) -> Result<Page> {
        self.get_repository_page(endpoint, page)
            .await
            .map_err(page_context(endpoint.describe(GitHubClient::host(self)), page))
    }
}
