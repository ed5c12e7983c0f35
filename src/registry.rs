//! Local package registry
//!
//! Installed packages live under a single root, one directory per package id,
//! each holding its `info.json`. The manifest on disk is the only source of
//! truth and is re-read on every lookup.
//!
//! Deleting a package can fail half-way when the host still holds some of its
//! files open. The directory is then renamed aside with a `.removed`
//! tombstone inside, and the next registry scan that meets it retries the
//! deletion. A package therefore moves through three states:
//! [`PackageState::Active`], [`PackageState::PendingDeletion`] and
//! [`PackageState::Gone`].
//!
//! # Examples
//!
//! ```no_run
//! use plugpm::LocalRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = LocalRegistry::new("/home/me/.plugpm/packages");
//! if let Some(pkg) = registry.by_name("ifred")? {
//!     println!("ifred {} at {}", pkg.version, pkg.path.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::{Context, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Zero-byte marker: deletion of this directory is pending
pub const TOMBSTONE_FILE: &str = ".removed";

/// Suffix of a package directory moved aside for deferred deletion
pub const REMOVED_SUFFIX: &str = "-removed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Installed and usable
    Active,
    /// Moved aside with a tombstone, swept on a later scan
    PendingDeletion,
    /// Fully deleted
    Gone,
}

/// A package installed under the packages root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    pub id: String,
    pub version: String,
    pub path: PathBuf,
    pub state: PackageState,
}

/// What [`LocalPackage::remove`] managed to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// Some files could not be deleted; the rest was moved to `path`
    Deferred { path: PathBuf },
}

impl LocalPackage {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            path: normalize(&path.into()),
            state: PackageState::Active,
        }
    }

    /// Re-read `info.json` from the package directory
    pub fn metadata(&self) -> Result<Manifest> {
        Manifest::load(&self.path)
    }

    /// Search-path entry for this package
    pub fn search_path_entry(&self) -> String {
        self.path.display().to_string()
    }

    /// Unregister the package from the search path and delete it
    ///
    /// If some files cannot be deleted the directory is renamed to
    /// `<id>-removed` (plus a random suffix when that name is taken), a
    /// tombstone is left inside, and `self.path` follows the rename.
    pub fn remove(&mut self, ctx: &Context) -> Result<RemovalOutcome> {
        let entry = self.search_path_entry();
        let store = Arc::clone(ctx.store());
        let host = Arc::clone(ctx.host());
        let search_path = ctx.search_path().clone();

        ctx.main_thread().execute(move || -> Result<()> {
            if let Some(current) = store.get() {
                if search_path.contains(&current, &entry) {
                    let updated = search_path.remove(&current, &entry)?;
                    store.set(&updated);
                    host.invalidate_search_path();
                }
            }
            Ok(())
        })??;

        if ctx.registry().remove_package_dir(&self.path) {
            info!(id = %self.id, "Removed {}", self.path.display());
            self.state = PackageState::Gone;
            return Ok(RemovalOutcome::Removed);
        }

        warn!(
            id = %self.id,
            "Package directory is in use and will be removed after restart"
        );

        let new_path = deferred_path(&self.path);
        fs::rename(&self.path, &new_path)?;
        self.path = new_path.clone();
        self.state = PackageState::PendingDeletion;

        Ok(RemovalOutcome::Deferred { path: new_path })
    }
}

fn deferred_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let candidate = path.with_file_name(format!("{}{}", name, REMOVED_SUFFIX));
    if !candidate.exists() {
        return candidate;
    }
    path.with_file_name(format!(
        "{}{}-{:x}",
        name,
        REMOVED_SUFFIX,
        rand::random::<u64>()
    ))
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Whether `name` can be used as a directory directly under the root
pub fn is_valid_package_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// How files and directories get deleted
///
/// The registry deletes bottom-up and keeps going past failures, so an
/// implementation only decides the fate of one path at a time.
pub trait FileRemover: Send + Sync {
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Plain filesystem deletion
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

impl FileRemover for FsRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

#[derive(Clone)]
pub struct LocalRegistry {
    root: PathBuf,
    remover: Arc<dyn FileRemover>,
}

impl std::fmt::Debug for LocalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRegistry")
            .field("root", &self.root)
            .finish()
    }
}

impl LocalRegistry {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_remover(root, Arc::new(FsRemover))
    }

    pub fn with_remover<P: AsRef<Path>>(root: P, remover: Arc<dyn FileRemover>) -> Self {
        Self {
            root: normalize(root.as_ref()),
            remover,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a package with this id is installed to
    pub fn package_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Look up an installed package by directory name
    ///
    /// A tombstoned directory is swept (deletion retried) and reported as
    /// absent whatever the outcome. A directory without `info.json` is absent.
    pub fn by_name(&self, name: &str) -> Result<Option<LocalPackage>> {
        if !is_valid_package_name(name) {
            debug!(name, "Not a package directory name");
            return Ok(None);
        }

        let path = self.package_path(name);

        if path.join(TOMBSTONE_FILE).is_file() {
            debug!(path = %path.display(), "Sweeping package pending deletion");
            self.remove_package_dir(&path);
            return Ok(None);
        }

        if !path.join(MANIFEST_FILE).is_file() {
            debug!("Warning: {} is not found at {}", MANIFEST_FILE, path.display());
            return Ok(None);
        }

        let manifest = Manifest::load(&path)?;
        Ok(Some(LocalPackage::new(manifest.id, path, manifest.version)))
    }

    /// Every installed package, sorted by directory name
    ///
    /// Corrupt packages are logged and skipped; pending deletions are swept.
    pub fn all(&self) -> Result<Vec<LocalPackage>> {
        let mut packages = Vec::new();
        for name in self.directory_names()? {
            match self.by_name(&name) {
                Ok(Some(pkg)) => packages.push(pkg),
                Ok(None) => {}
                Err(e) => warn!(name = %name, "Skipping package: {}", e),
            }
        }
        Ok(packages)
    }

    /// Directories under the root carrying a tombstone
    pub fn pending_deletions(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .directory_names()?
            .into_iter()
            .map(|name| self.package_path(&name))
            .filter(|path| path.join(TOMBSTONE_FILE).is_file())
            .collect())
    }

    /// Lifecycle state of the directory `name`, without sweeping it
    pub fn state(&self, name: &str) -> PackageState {
        let path = self.package_path(name);
        if !is_valid_package_name(name) || !path.is_dir() {
            PackageState::Gone
        } else if path.join(TOMBSTONE_FILE).is_file() {
            PackageState::PendingDeletion
        } else if path.join(MANIFEST_FILE).is_file() {
            PackageState::Active
        } else {
            PackageState::Gone
        }
    }

    /// Delete a package directory, continuing past files that cannot go
    ///
    /// Returns `false` if anything was left behind, in which case a tombstone
    /// is written into the directory.
    pub fn remove_package_dir(&self, path: &Path) -> bool {
        let mut errors = 0usize;

        for entry in WalkDir::new(path).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("{}", e);
                    errors += 1;
                    continue;
                }
            };

            let result = if entry.file_type().is_dir() {
                self.remover.remove_dir(entry.path())
            } else {
                self.remover.remove_file(entry.path())
            };

            if let Err(e) = result {
                error!("{}: {}", entry.path().display(), e);
                errors += 1;
            }
        }

        if errors == 0 {
            return true;
        }

        if let Err(e) = fs::File::create(path.join(TOMBSTONE_FILE)) {
            error!(path = %path.display(), "Cannot mark package for removal: {}", e);
        }
        false
    }

    /// Delete a stale tombstone so a fresh install at `path` is not swept
    pub fn clear_tombstone(&self, path: &Path) -> Result<()> {
        let tombstone = path.join(TOMBSTONE_FILE);
        if tombstone.is_file() {
            fs::remove_file(&tombstone)?;
        }
        Ok(())
    }

    fn directory_names(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
