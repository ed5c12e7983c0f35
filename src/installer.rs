//! Dependency-resolving installation
//!
//! Installing a spec downloads its archive, reads the manifest straight out of
//! it and compares against what is already installed. Fresh or upgraded
//! packages are extracted to `<packages_root>/<id>`. Dependencies are then
//! installed recursively, before this package's install scripts run, and the
//! package is finally loaded.
//!
//! One [`Traversal`] spans a whole top-level install. A spec met twice in the
//! same traversal is a dependency cycle; the second visit is skipped and the
//! first one finishes the job.
//!
//! # Examples
//!
//! ```no_run
//! use plugpm::{install_from_repo, main_thread::main_thread, Config, Context, Repository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (handle, _queue) = main_thread();
//! let ctx = Context::from_config(&Config::load()?, handle)?;
//! let repo = Repository::new("https://plugins.example.org");
//!
//! let pkg = install_from_repo(&ctx, &repo, "ifred", false)?;
//! println!("Installed {} {} to {:?}", pkg.id, pkg.version, pkg.path);
//! # Ok(())
//! # }
//! ```

use crate::loader::{self, LoadOutcome};
use crate::manifest::Manifest;
use crate::registry::{is_valid_package_name, LocalPackage};
use crate::repository::Repository;
use crate::{Context, Error, Result};
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use tar::Archive;
use tracing::{error, info, warn};

/// Progress callback for installation operations
///
/// Called with:
/// - `message`: Description of current operation (e.g., "Extracting ifred...")
/// - `current`: Current step
/// - `total`: Total steps
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

const STEPS: u64 = 4;

/// Specs visited during one top-level install
#[derive(Debug, Default)]
pub struct Traversal {
    visited: HashSet<String>,
    cycles: Vec<String>,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `spec` as visited; `false` if it already was (a cycle)
    pub fn enter(&mut self, spec: &str) -> bool {
        if self.visited.insert(spec.to_string()) {
            return true;
        }
        warn!(spec, "Cyclic dependency found, skipping");
        self.cycles.push(spec.to_string());
        false
    }

    /// Specs that were re-encountered, in the order they were met
    pub fn cycles(&self) -> &[String] {
        &self.cycles
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }
}

#[derive(Clone, Default)]
pub struct InstallOptions {
    /// Replace installed packages whose version differs from the repository's
    pub upgrade: bool,
    /// Delete a freshly installed package whose install scripts fail
    pub remove_on_fail: bool,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for InstallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallOptions")
            .field("upgrade", &self.upgrade)
            .field("remove_on_fail", &self.remove_on_fail)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Install `spec` and its dependencies from `repo`
pub fn install_from_repo(
    ctx: &Context,
    repo: &Repository,
    spec: &str,
    upgrade: bool,
) -> Result<LocalPackage> {
    let options = InstallOptions {
        upgrade,
        ..Default::default()
    };
    install_with_options(ctx, repo, spec, &options)
}

/// Install `spec` and its dependencies from `repo` as one top-level call
pub fn install_with_options(
    ctx: &Context,
    repo: &Repository,
    spec: &str,
    options: &InstallOptions,
) -> Result<LocalPackage> {
    let mut traversal = Traversal::new();
    let pkg = resolve(ctx, repo, spec, options, &mut traversal)?
        .ok_or_else(|| Error::PackageNotFound(spec.to_string()))?;

    info!(id = %pkg.id, version = %pkg.version, "Done!");
    report(options, &format!("Installed {} {}", pkg.id, pkg.version), STEPS);
    Ok(pkg)
}

/// Install `spec` within an ongoing traversal
///
/// Returns `None` when `spec` was already visited in `traversal`.
pub fn resolve(
    ctx: &Context,
    repo: &Repository,
    spec: &str,
    options: &InstallOptions,
    traversal: &mut Traversal,
) -> Result<Option<LocalPackage>> {
    if !traversal.enter(spec) {
        return Ok(None);
    }

    report(options, &format!("Downloading {}...", spec), 0);
    let archive = repo
        .download(ctx.fetcher(), spec)
        .ok_or_else(|| Error::DownloadFailed(spec.to_string()))?;

    let manifest = Manifest::from_archive(&archive)?;
    if !is_valid_package_name(&manifest.id) {
        return Err(Error::CorruptPackage(format!(
            "package id {:?} cannot be used as a directory name",
            manifest.id
        )));
    }

    let (pkg, fresh) = match ctx.registry().by_name(&manifest.id)? {
        Some(prev) if !(options.upgrade && prev.version != manifest.version) => {
            info!(id = %prev.id, version = %prev.version, "Requirement already satisfied: {}", spec);
            (prev, false)
        }
        existing => {
            let target = ctx.registry().package_path(&manifest.id);
            if let Some(mut prev) = existing {
                info!(id = %prev.id, "Upgrading {} -> {}", prev.version, manifest.version);
                prev.remove(ctx)?;
                if target.exists() {
                    return Err(Error::InstallPathOccupied(target));
                }
            }
            (extract(ctx, &archive, &manifest, options)?, true)
        }
    };

    for dep in manifest.dependency_names() {
        resolve(ctx, repo, dep, options, traversal)?;
    }

    if fresh {
        report(options, &format!("Running installers for {}...", pkg.id), 2);
        if let Err(e) = ctx
            .scripts()
            .run_all(&pkg.id, &pkg.path, &manifest.installers)
        {
            if options.remove_on_fail {
                warn!(id = %pkg.id, "Installer failed, removing package");
                let mut pkg = pkg;
                if let Err(remove_err) = pkg.remove(ctx) {
                    error!(id = %pkg.id, "Could not remove failed package: {}", remove_err);
                }
            }
            return Err(e);
        }
    }

    report(options, &format!("Loading {}...", pkg.id), 3);
    if let LoadOutcome::MissingDependencies(missing) = loader::load(ctx, &pkg, false)? {
        warn!(id = %pkg.id, missing = ?missing, "Installed but not loaded");
    }

    Ok(Some(pkg))
}

fn extract(
    ctx: &Context,
    archive_bytes: &[u8],
    manifest: &Manifest,
    options: &InstallOptions,
) -> Result<LocalPackage> {
    let target = ctx.registry().package_path(&manifest.id);
    ctx.registry().clear_tombstone(&target)?;
    fs::create_dir_all(&target)?;

    info!(id = %manifest.id, "Extracting into {}...", target.display());
    report(options, &format!("Extracting {}...", manifest.id), 1);

    // A partial tree would carry info.json and look installed
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(archive_bytes)));
    if let Err(e) = archive.unpack(&target) {
        error!(id = %manifest.id, "Extraction failed, discarding {}", target.display());
        ctx.registry().remove_package_dir(&target);
        return Err(e.into());
    }

    Ok(LocalPackage::new(&manifest.id, target, &manifest.version))
}

fn report(options: &InstallOptions, message: &str, step: u64) {
    if let Some(ref cb) = options.progress {
        cb(message, step, STEPS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_traversal_detects_revisits() {
        let mut traversal = Traversal::new();
        assert!(traversal.enter("a"));
        assert!(traversal.enter("b"));
        assert!(!traversal.enter("a"));
        assert!(!traversal.enter("a"));
        assert_eq!(traversal.visited(), 2);
        assert_eq!(traversal.cycles(), &["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_specs_are_distinct_strings() {
        let mut traversal = Traversal::new();
        assert!(traversal.enter("ifred"));
        assert!(traversal.enter("ifred>=1.0"));
        assert!(traversal.cycles().is_empty());
    }

    #[test]
    fn test_report_uses_callback() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        let options = InstallOptions {
            progress: Some(Arc::new(move |msg, current, total| {
                sink.lock().unwrap().push(format!("{} {}/{}", msg, current, total));
            })),
            ..Default::default()
        };

        report(&options, "Extracting x...", 1);
        report(&InstallOptions::default(), "ignored", 1);

        assert_eq!(*messages.lock().unwrap(), vec!["Extracting x... 1/4"]);
        assert!(format!("{:?}", options).contains("progress: true"));
    }
}
