//! plugpm - A package manager for plugins of a closed host application
//!
//! plugpm downloads self-contained plugin bundles from HTTP repositories,
//! installs them with their dependencies, and wires them into the host's
//! plugin search path:
//!
//! - Recursive dependency installation with cycle detection
//! - Idempotent installs and in-place upgrades
//! - Deferred deletion of packages whose files the host holds open
//! - Concurrent catalog queries across repositories
//! - Install scripts run under a bundled runtime
//!
//! # Examples
//!
//! ```no_run
//! use plugpm::{install_from_repo, main_thread::main_thread, Config, Context};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let (handle, _queue) = main_thread();
//! let ctx = Context::from_config(&config, handle)?;
//!
//! let repo = &ctx.repos()[0];
//! let pkg = install_from_repo(&ctx, repo, "ifred", false)?;
//! println!("{} {} installed at {}", pkg.id, pkg.version, pkg.path.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`installer`] - Resolve and install a package with its dependencies
//! - [`registry`] - Packages installed on disk, deferred deletion
//! - [`repository`] - Query remote repositories
//! - [`fetcher`] - Timeout-bounded HTTP downloads
//! - [`search_path`] - Edit the host's search-path variable
//! - [`loader`] - Make installed packages visible to the host
//! - [`scripts`] - Run package install scripts
//! - [`discovery`] - Find loadable modules inside a package
//! - [`host`] - Interface to the host application
//! - [`main_thread`] - Run work on the host's main context
//! - [`manifest`] - Parse `info.json`
//! - [`platform`] - OS and address-width detection
//! - [`config`] - User configuration
//! - [`context`] - Shared state passed to every operation
//! - [`error`] - Error types and result handling

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod host;
pub mod installer;
pub mod loader;
pub mod main_thread;
pub mod manifest;
pub mod platform;
pub mod registry;
pub mod repository;
pub mod scripts;
pub mod search_path;

pub use config::Config;
pub use context::{Context, ContextBuilder};
pub use error::{Error, Result};
pub use installer::{
    install_from_repo, install_with_options, InstallOptions, ProgressCallback, Traversal,
};
pub use loader::{init_environment, load, populate_env, LoadOutcome};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use registry::{LocalPackage, LocalRegistry, PackageState, RemovalOutcome};
pub use repository::{get_online_packages, InstallablePackage, Repository};
pub use search_path::{SearchPath, SearchPathStore};
