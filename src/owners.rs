// Repository owners visible to the authenticated identity.
// The identity itself, its organizations, and repositories it collaborates on.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::PartitionSource;
use crate::error::{GhpickError, OwnerFailure, Result};
use crate::github::{
    Affiliation, DEFAULT_MAX_PAGES, Endpoint, PaginationLimits, RepositoryApi,
    fetch_all_organizations, fetch_all_pages,
};
use crate::repository::{RepositoryGroup, group_by_namespace};

/// The kinds of repository source an owner can be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerKind {
    /// The authenticated identity.
    Me { login: String },
    /// An organization the identity belongs to.
    Organization { name: String },
    /// Repositories in other namespaces shared with the identity.
    Collaborator,
}

/// A repository source on one host.
#[derive(Clone)]
pub struct Owner {
    api: Arc<dyn RepositoryApi>,
    kind: OwnerKind,
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("host", &self.api.host())
            .field("kind", &self.kind)
            .finish()
    }
}

impl Owner {
    pub fn me(api: Arc<dyn RepositoryApi>, login: impl Into<String>) -> Self {
        Self {
            api,
            kind: OwnerKind::Me {
                login: login.into(),
            },
        }
    }

    pub fn organization(api: Arc<dyn RepositoryApi>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GhpickError::EmptyOrganizationName);
        }
        Ok(Self {
            api,
            kind: OwnerKind::Organization { name },
        })
    }

    pub fn collaborator(api: Arc<dyn RepositoryApi>) -> Self {
        Self {
            api,
            kind: OwnerKind::Collaborator,
        }
    }

    pub fn host(&self) -> &str {
        self.api.host()
    }

    /// Stable identifier, `host/login` or `host/org`.
    pub fn id(&self) -> String {
        match &self.kind {
            OwnerKind::Me { login } => format!("{}/{}", self.host(), login),
            OwnerKind::Organization { name } => format!("{}/{}", self.host(), name),
            OwnerKind::Collaborator => format!("{}/~collaborator", self.host()),
        }
    }

    /// Which partition family this owner's groups are saved under.
    pub fn partition_source(&self) -> PartitionSource {
        match self.kind {
            OwnerKind::Collaborator => PartitionSource::Collaborator,
            _ => PartitionSource::Owned,
        }
    }

    fn endpoint(&self) -> Endpoint {
        match &self.kind {
            OwnerKind::Me { .. } => Endpoint::UserRepos {
                affiliation: Affiliation::Owner,
            },
            OwnerKind::Organization { name } => Endpoint::OrgRepos { org: name.clone() },
            OwnerKind::Collaborator => Endpoint::UserRepos {
                affiliation: Affiliation::Collaborator,
            },
        }
    }

    /// Fetch every repository this owner lists, as cache-ready groups.
    ///
    /// Self and organization owners yield at most one group. Collaborator
    /// repositories are regrouped by their own namespace after the fetch.
    pub async fn fetch_all(
        &self,
        limits: PaginationLimits,
        cancel: &CancellationToken,
    ) -> Result<Vec<RepositoryGroup>> {
        let repositories = fetch_all_pages(&self.api, &self.endpoint(), limits, cancel).await?;
        debug!(owner = %self.id(), count = repositories.len(), "fetched repositories");

        match self.kind {
            OwnerKind::Collaborator => group_by_namespace(repositories),
            _ if repositories.is_empty() => Ok(Vec::new()),
            _ => Ok(vec![RepositoryGroup::new(repositories)?]),
        }
    }
}

/// Owners of every authenticated host plus the login seen on each.
#[derive(Debug, Default)]
pub struct ResolvedOwners {
    pub owners: Vec<Owner>,
    /// host -> login of the authenticated identity.
    pub identities: BTreeMap<String, String>,
}

/// Enumerates owners across authenticated hosts.
#[derive(Clone)]
pub struct OwnerResolver {
    apis: Vec<Arc<dyn RepositoryApi>>,
    max_pages: u32,
}

impl OwnerResolver {
    pub fn new(apis: Vec<Arc<dyn RepositoryApi>>) -> Self {
        Self {
            apis,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Page ceiling for organization listings.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Resolve self, organization and collaborator owners for each host.
    ///
    /// A host that fails to resolve is skipped; the call only fails when no
    /// host produced any owner.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<ResolvedOwners> {
        if self.apis.is_empty() {
            return Err(GhpickError::NoHosts);
        }

        let mut resolved = ResolvedOwners::default();
        let mut failures = Vec::new();

        for api in &self.apis {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(GhpickError::Cancelled),
                result = resolve_host(api, self.max_pages) => result,
            };
            match result {
                Ok((login, owners)) => {
                    resolved.identities.insert(api.host().to_string(), login);
                    resolved.owners.extend(owners);
                }
                Err(error) => {
                    warn!(host = api.host(), %error, "could not resolve owners");
                    failures.push(OwnerFailure {
                        owner: api.host().to_string(),
                        error,
                    });
                }
            }
        }

        if resolved.owners.is_empty() {
            return Err(GhpickError::RefreshFailed(failures));
        }
        Ok(resolved)
    }
}

async fn resolve_host(
    api: &Arc<dyn RepositoryApi>,
    max_pages: u32,
) -> Result<(String, Vec<Owner>)> {
    let login = api.current_user().await?;
    let orgs = fetch_all_organizations(api.as_ref(), max_pages).await?;

    let mut owners = vec![Owner::me(Arc::clone(api), login.clone())];
    for org in orgs {
        match Owner::organization(Arc::clone(api), org) {
            Ok(owner) => owners.push(owner),
            Err(error) => warn!(host = api.host(), %error, "skipping organization"),
        }
    }
    owners.push(Owner::collaborator(Arc::clone(api)));

    debug!(host = api.host(), %login, owners = owners.len(), "resolved owners");
    Ok((login, owners))
}
