//! Explicit context threaded through every operation
//!
//! Instead of reading the packages root, repositories or the search-path
//! variable from globals, every operation receives a [`Context`].
//!
//! # Examples
//!
//! ```no_run
//! use plugpm::{main_thread::main_thread, Config, Context};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (handle, _queue) = main_thread();
//! let ctx = Context::from_config(&Config::load()?, handle)?;
//! for pkg in ctx.registry().all()? {
//!     println!("{} {}", pkg.id, pkg.version);
//! }
//! # Ok(())
//! # }
//! ```

use crate::fetcher::Fetcher;
use crate::host::{HeadlessHost, Host};
use crate::main_thread::MainThreadHandle;
use crate::registry::{FileRemover, LocalRegistry};
use crate::repository::Repository;
use crate::scripts::ScriptRunner;
use crate::search_path::{EnvVarStore, SearchPath, SearchPathStore};
use crate::{Config, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct Context {
    registry: LocalRegistry,
    fetcher: Fetcher,
    repos: Vec<Repository>,
    search_path: SearchPath,
    store: Arc<dyn SearchPathStore>,
    host: Arc<dyn Host>,
    scripts: ScriptRunner,
    main_thread: MainThreadHandle,
    max_concurrent: usize,
}

impl Context {
    pub fn builder<P: Into<PathBuf>>(packages_root: P) -> ContextBuilder {
        ContextBuilder::new(packages_root.into())
    }

    /// Context for running outside the host: env-var search path, headless host
    pub fn from_config(config: &Config, main_thread: MainThreadHandle) -> Result<Self> {
        let runtime = config.runtime_dir();
        Context::builder(config.packages_dir())
            .repos(Repository::from_urls(&config.repos, config.timeout()))
            .search_path(SearchPath::native(config.host.user_dir.as_deref()))
            .store(Arc::new(EnvVarStore::new(&config.host.search_path_var)))
            .host(Arc::new(HeadlessHost::new(
                config.host.script_extensions.clone(),
            )))
            .scripts(ScriptRunner::new(
                &config.scripts.interpreter,
                Some(runtime),
            ))
            .max_concurrent(config.network.max_concurrent)
            .build(main_thread)
    }

    pub fn registry(&self) -> &LocalRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Configured repositories, in priority order
    pub fn repos(&self) -> &[Repository] {
        &self.repos
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn store(&self) -> &Arc<dyn SearchPathStore> {
        &self.store
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn scripts(&self) -> &ScriptRunner {
        &self.scripts
    }

    pub fn main_thread(&self) -> &MainThreadHandle {
        &self.main_thread
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

pub struct ContextBuilder {
    packages_root: PathBuf,
    remover: Option<Arc<dyn FileRemover>>,
    repos: Vec<Repository>,
    search_path: Option<SearchPath>,
    store: Option<Arc<dyn SearchPathStore>>,
    host: Option<Arc<dyn Host>>,
    scripts: Option<ScriptRunner>,
    max_concurrent: usize,
}

impl ContextBuilder {
    fn new(packages_root: PathBuf) -> Self {
        Self {
            packages_root,
            remover: None,
            repos: Vec::new(),
            search_path: None,
            store: None,
            host: None,
            scripts: None,
            max_concurrent: 10,
        }
    }

    pub fn repos(mut self, repos: Vec<Repository>) -> Self {
        self.repos = repos;
        self
    }

    pub fn repo_url(mut self, url: &str, timeout: Duration) -> Self {
        self.repos.push(Repository::with_timeout(url, timeout));
        self
    }

    pub fn search_path(mut self, search_path: SearchPath) -> Self {
        self.search_path = Some(search_path);
        self
    }

    pub fn store(mut self, store: Arc<dyn SearchPathStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn scripts(mut self, scripts: ScriptRunner) -> Self {
        self.scripts = Some(scripts);
        self
    }

    /// Replace how files are deleted (e.g. to simulate files held open)
    pub fn remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn build(self, main_thread: MainThreadHandle) -> Result<Context> {
        std::fs::create_dir_all(&self.packages_root)?;

        let registry = match self.remover {
            Some(remover) => LocalRegistry::with_remover(&self.packages_root, remover),
            None => LocalRegistry::new(&self.packages_root),
        };

        Ok(Context {
            registry,
            fetcher: Fetcher::new()?,
            repos: self.repos,
            search_path: self.search_path.unwrap_or_else(|| SearchPath::native(None)),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(EnvVarStore::new("PLUGPM_USR"))),
            host: self
                .host
                .unwrap_or_else(|| Arc::new(HeadlessHost::default())),
            scripts: self
                .scripts
                .unwrap_or_else(|| ScriptRunner::new("python3", None)),
            main_thread,
            max_concurrent: self.max_concurrent,
        })
    }
}
