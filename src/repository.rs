//! Remote repository client
//!
//! A repository answers three requests:
//!
//! - `GET /info?id=<id>` with `{"success": bool, "data": {id, name, version}}`
//! - `GET /search` with `{"data": [{id, name, version}, ...]}`
//! - `GET /download?spec=<spec>` with the package archive
//!
//! Network and parse failures are soft. A repository that cannot be reached
//! simply contributes nothing.

use crate::fetcher::Fetcher;
use crate::installer::install_from_repo;
use crate::registry::{LocalPackage, LocalRegistry};
use crate::{Context, Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// A remote catalog endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub url: String,
    pub timeout: Duration,
}

/// A package a repository offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallablePackage {
    pub id: String,
    pub name: String,
    pub version: String,
    pub repo: Repository,
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    id: String,
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    success: bool,
    data: Option<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<CatalogItem>,
}

impl Repository {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Repositories for configured URLs, all sharing one timeout
    pub fn from_urls(urls: &[String], timeout: Duration) -> Vec<Self> {
        urls.iter()
            .map(|url| Self::with_timeout(url.as_str(), timeout))
            .collect()
    }

    pub fn info_url(&self, id: &str) -> String {
        format!("{}/info?id={}", self.url, urlencoding::encode(id))
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.url)
    }

    pub fn download_url(&self, spec: &str) -> String {
        format!("{}/download?spec={}", self.url, urlencoding::encode(spec))
    }

    /// Metadata for one package, or `None` if unknown or unreachable
    pub fn single(&self, fetcher: &Fetcher, name: &str) -> Option<InstallablePackage> {
        let body = fetcher.fetch(&self.info_url(name), self.timeout)?;

        let response: InfoResponse = match serde_json::from_slice(&body) {
            Ok(response) => response,
            Err(e) => {
                warn!(repo = %self.url, "Malformed package info for {:?}: {}", name, e);
                return None;
            }
        };

        if !response.success {
            debug!(repo = %self.url, "Package {:?} not found", name);
            return None;
        }

        response.data.map(|item| self.installable(item))
    }

    /// Every package in the catalog that is not installed locally
    pub fn list(&self, fetcher: &Fetcher, registry: &LocalRegistry) -> Vec<InstallablePackage> {
        let Some(body) = fetcher.fetch(&self.search_url(), self.timeout) else {
            error!(repo = %self.url, "Error fetching repo: connection error");
            return Vec::new();
        };

        let response: SearchResponse = match serde_json::from_slice(&body) {
            Ok(response) => response,
            Err(e) => {
                error!(repo = %self.url, "Error fetching repo: {}", e);
                return Vec::new();
            }
        };

        response
            .data
            .into_iter()
            .filter(|item| !matches!(registry.by_name(&item.id), Ok(Some(_))))
            .map(|item| self.installable(item))
            .collect()
    }

    /// Raw archive bytes for `spec`
    pub fn download(&self, fetcher: &Fetcher, spec: &str) -> Option<Vec<u8>> {
        fetcher.fetch(&self.download_url(spec), self.timeout)
    }

    fn installable(&self, item: CatalogItem) -> InstallablePackage {
        InstallablePackage {
            id: item.id,
            name: item.name,
            version: item.version,
            repo: self.clone(),
        }
    }
}

impl InstallablePackage {
    /// Install this package (and its dependencies) from the repository it came from
    pub fn install(&self, ctx: &Context, upgrade: bool) -> Result<LocalPackage> {
        install_from_repo(ctx, &self.repo, &self.id, upgrade)
    }
}

/// Catalogs of all `repos`, fetched concurrently and concatenated in order
///
/// At most `ctx.max_concurrent()` repositories are queried at once. A failed
/// repository contributes nothing. The fan-out runs on a private runtime;
/// when called from inside a tokio runtime it moves to a scoped thread.
pub fn get_online_packages(ctx: &Context, repos: &[Repository]) -> Result<Vec<InstallablePackage>> {
    if repos.is_empty() {
        return Ok(Vec::new());
    }

    let fetcher = ctx.fetcher().clone();
    let registry = ctx.registry().clone();
    let max_concurrent = ctx.max_concurrent();

    if tokio::runtime::Handle::try_current().is_err() {
        return fan_out(fetcher, registry, repos, max_concurrent);
    }

    debug!("Inside a runtime, fetching catalogs from a scoped thread");
    thread::scope(|scope| {
        scope
            .spawn(move || fan_out(fetcher, registry, repos, max_concurrent))
            .join()
            .map_err(|_| Error::Other("Catalog worker panicked".to_string()))?
    })
}

fn fan_out(
    fetcher: Fetcher,
    registry: LocalRegistry,
    repos: &[Repository],
    max_concurrent: usize,
) -> Result<Vec<InstallablePackage>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    let results = runtime.block_on(async move {
        let mut handles = Vec::with_capacity(repos.len());

        for repo in repos.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = fetcher.clone();
            let registry = registry.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                tokio::task::spawn_blocking(move || repo.list(&fetcher, &registry))
                    .await
                    .ok()
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(packages)) => results.push(packages),
                Ok(None) => warn!("Repository worker did not finish"),
                Err(e) => warn!("Repository worker panicked: {}", e),
            }
        }
        results
    });

    Ok(results.into_iter().flatten().collect())
}
