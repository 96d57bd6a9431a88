// Link header cursors and page fan-out.
// Repository pages fan out through a bounded pool; organization pages follow `rel="next"`.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GhpickError, Result};
use crate::repository::Repository;

use super::api::RepositoryApi;
use super::types::{Endpoint, Page};

/// Default ceiling on simultaneous page requests for one owner.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 5;

/// Default ceiling on pages per owner.
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// Cursors read from a `Link` header; 0 means the relation was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    pub next_page: u32,
    pub last_page: u32,
}

/// Parse a `Link` header.
///
/// Only `rel="next"` and `rel="last"` are read, and only their `page` query
/// parameter. An empty header means no more pages.
pub fn parse_link_header(link_header: &str) -> Result<LinkPagination> {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let mut url = None;
        let mut rel = None;
        for segment in part.split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
            {
                url = Some(inner);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"'));
            }
        }

        let slot = match rel {
            Some("next") => &mut info.next_page,
            Some("last") => &mut info.last_page,
            _ => continue,
        };
        let url = url.ok_or_else(|| GhpickError::InvalidLinkHeader(part.to_string()))?;
        if let Some(page) = page_from_url(url)? {
            *slot = page;
        }
    }

    Ok(info)
}

/// Extract the `page` query parameter from a link target.
fn page_from_url(url: &str) -> Result<Option<u32>> {
    let parsed = Url::parse(url).map_err(|e| GhpickError::InvalidLinkHeader(format!("{url}: {e}")))?;
    let Some((_, value)) = parsed.query_pairs().find(|(key, _)| key == "page") else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|_| GhpickError::InvalidLinkHeader(format!("{url}: bad page {value:?}")))
}

/// Bounds for one owner's page fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub concurrency: usize,
    pub max_pages: u32,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_PAGE_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Fetch every page of `endpoint`, first page first.
///
/// A server reporting more than `limits.max_pages` pages fails the owner with
/// `PageLimitExceeded` instead of yielding a truncated list. Any page failure
/// fails the whole call and aborts the pages still in flight.
pub async fn fetch_all_pages(
    api: &Arc<dyn RepositoryApi>,
    endpoint: &Endpoint,
    limits: PaginationLimits,
    cancel: &CancellationToken,
) -> Result<Vec<Repository>> {
    let first = fetch_page(api.as_ref(), endpoint, 1, cancel).await?;
    if first.last_page <= 1 {
        return Ok(first.repositories);
    }

    let owner = endpoint.describe(api.host());
    if first.last_page > limits.max_pages {
        return Err(GhpickError::PageLimitExceeded {
            owner,
            last_page: first.last_page,
            max_pages: limits.max_pages,
        });
    }

    let start = first.next_page.max(2);
    debug!(%owner, from = start, to = first.last_page, "fetching remaining pages");

    let semaphore = Arc::new(Semaphore::new(limits.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for page in start..=first.last_page {
        let api = Arc::clone(api);
        let endpoint = endpoint.clone();
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let _permit = tokio::select! {
                _ = cancel.cancelled() => return (page, Err(GhpickError::Cancelled)),
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return (page, Err(GhpickError::Cancelled)),
                },
            };
            (page, fetch_page(api.as_ref(), &endpoint, page, &cancel).await)
        });
    }

    let mut pages = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (page, result) =
            joined.map_err(|e| GhpickError::Other(format!("page task failed: {e}")))?;
        // Returning drops the JoinSet, which aborts the remaining pages.
        pages.insert(page, result?.repositories);
    }

    let mut repositories = first.repositories;
    repositories.extend(pages.into_values().flatten());
    Ok(repositories)
}

/// Follow `rel="next"` through `/user/orgs` and collect every login.
///
/// Organization listings carry no usable `rel="last"` up front, so pages are
/// walked one after another. Walking past `max_pages` fails with
/// `PageLimitExceeded`.
pub async fn fetch_all_organizations(
    api: &dyn RepositoryApi,
    max_pages: u32,
) -> Result<Vec<String>> {
    let mut organizations = Vec::new();
    let mut page = 1;
    loop {
        let current = api.organizations_page(page).await?;
        organizations.extend(current.organizations);

        let next = current.next_page;
        if next == 0 || next <= page {
            break;
        }
        if next > max_pages {
            return Err(GhpickError::PageLimitExceeded {
                owner: format!("{}/@me (organizations)", api.host()),
                last_page: next,
                max_pages,
            });
        }
        page = next;
    }

    debug!(
        host = api.host(),
        pages = page,
        count = organizations.len(),
        "fetched organizations"
    );
    Ok(organizations)
}

async fn fetch_page(
    api: &dyn RepositoryApi,
    endpoint: &Endpoint,
    page: u32,
    cancel: &CancellationToken,
) -> Result<Page> {
    tokio::select! {
        _ = cancel.cancelled() => Err(GhpickError::Cancelled),
        result = api.fetch_page(endpoint, page) => result,
    }
}
