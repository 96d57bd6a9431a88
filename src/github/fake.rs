// In-memory RepositoryApi for tests.
// Serves canned pages with Link-style cursors and records every request.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{GhpickError, Result};
use crate::repository::Repository;

use super::api::RepositoryApi;
use super::types::{Endpoint, OrganizationPage, Page};

/// Repositories `host/org/<name>` for each name.
pub fn repos(host: &str, org: &str, names: &[&str]) -> Vec<Repository> {
    names
        .iter()
        .map(|name| Repository::new(host, org, *name))
        .collect()
}

#[derive(Default)]
pub struct FakeApi {
    host: String,
    login: String,
    org_pages: Vec<Vec<String>>,
    orgs_fail: bool,
    org_requests: AtomicUsize,
    pages: HashMap<Endpoint, Vec<Vec<Repository>>>,
    reported_last_page: HashMap<Endpoint, u32>,
    failing: HashSet<(Endpoint, u32)>,
    delay: Duration,
    requests: Mutex<Vec<(Endpoint, u32)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeApi {
    pub fn new(host: &str, login: &str) -> Self {
        Self {
            host: host.to_string(),
            login: login.to_string(),
            ..Default::default()
        }
    }

    pub fn with_orgs(self, orgs: &[&str]) -> Self {
        self.with_org_pages(vec![orgs.to_vec()])
    }

    /// Serve `pages[n - 1]` for organization page `n`, each with a `rel="next"` to the following one.
    pub fn with_org_pages(mut self, pages: Vec<Vec<&str>>) -> Self {
        self.org_pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self
    }

    pub fn with_failing_orgs(mut self) -> Self {
        self.orgs_fail = true;
        self
    }

    /// Serve `pages[n - 1]` for page `n`; `rel="last"` is the page count.
    pub fn with_pages(mut self, endpoint: Endpoint, pages: Vec<Vec<Repository>>) -> Self {
        self.pages.insert(endpoint, pages);
        self
    }

    /// Override the `rel="last"` cursor reported on every page.
    pub fn with_reported_last_page(mut self, endpoint: Endpoint, last_page: u32) -> Self {
        self.reported_last_page.insert(endpoint, last_page);
        self
    }

    pub fn failing(mut self, endpoint: Endpoint, page: u32) -> Self {
        self.failing.insert((endpoint, page));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_for(&self, endpoint: &Endpoint) -> usize {
        self.pages_requested(endpoint).len()
    }

    /// Requested page numbers for `endpoint`, sorted.
    pub fn pages_requested(&self, endpoint: &Endpoint) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, page)| *page)
            .collect();
        pages.sort_unstable();
        pages
    }

    pub fn organization_requests(&self) -> usize {
        self.org_requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryApi for FakeApi {
    fn host(&self) -> &str {
        &self.host
    }

    async fn current_user(&self) -> Result<String> {
        Ok(self.login.clone())
    }

    async fn organizations_page(&self, page: u32) -> Result<OrganizationPage> {
        self.org_requests.fetch_add(1, Ordering::SeqCst);
        if self.orgs_fail {
            return Err(GhpickError::Unauthorized);
        }
        let next_page = if (page as usize) < self.org_pages.len() {
            page + 1
        } else {
            0
        };
        Ok(OrganizationPage {
            organizations: self
                .org_pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default(),
            next_page,
        })
    }

    async fn fetch_page(&self, endpoint: &Endpoint, page: u32) -> Result<Page> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.clone(), page));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.contains(&(endpoint.clone(), page)) {
            return Err(GhpickError::Page {
                owner: endpoint.describe(&self.host),
                page,
                source: Box::new(GhpickError::Http {
                    status: 502,
                    body: "bad gateway".to_string(),
                }),
            });
        }

        let pages = self.pages.get(endpoint).cloned().unwrap_or_default();
        let last_page = self
            .reported_last_page
            .get(endpoint)
            .copied()
            .unwrap_or(if pages.len() > 1 { pages.len() as u32 } else { 0 });
        let next_page = if last_page > 1 && page < last_page {
            page + 1
        } else {
            0
        };

        Ok(Page {
            repositories: pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default(),
            next_page,
            last_page,
        })
    }
}
