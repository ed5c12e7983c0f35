//! Package loading
//!
//! Loading a package means making the host see it: its directory joins the
//! search path, its plugins are loaded and the host is told about processor
//! modules. Dependencies are loaded first. Everything that touches the search
//! path or the host runs on the main context.

use crate::discovery::{find_loadable_modules, PLUGINS_DIR, PROCS_DIR};
use crate::installer::install_from_repo;
use crate::platform::current_os;
use crate::registry::LocalPackage;
use crate::{Context, Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Already on the search path (or being loaded further up a cycle)
    AlreadyLoaded,
    /// Declared dependencies that are not installed; nothing was loaded
    MissingDependencies(Vec<String>),
}

/// Load `pkg` and its dependencies into the host
///
/// Unless `force` is set, a package whose directory is already on the search
/// path is left alone.
pub fn load(ctx: &Context, pkg: &LocalPackage, force: bool) -> Result<LoadOutcome> {
    let mut visited = HashSet::new();
    load_inner(ctx, pkg, force, &mut visited)
}

fn load_inner(
    ctx: &Context,
    pkg: &LocalPackage,
    force: bool,
    visited: &mut HashSet<String>,
) -> Result<LoadOutcome> {
    if !visited.insert(pkg.id.clone()) {
        debug!(id = %pkg.id, "Load already in progress");
        return Ok(LoadOutcome::AlreadyLoaded);
    }

    let entry = pkg.search_path_entry();
    if !force {
        let current = ctx.store().get();
        if current.is_some_and(|value| ctx.search_path().contains(&value, &entry)) {
            debug!(id = %pkg.id, "Already loaded");
            return Ok(LoadOutcome::AlreadyLoaded);
        }
    }

    let (deps, missing) = resolve_dependencies(ctx, pkg)?;
    if !missing.is_empty() {
        return Ok(LoadOutcome::MissingDependencies(missing));
    }
    for dep in &deps {
        load_inner(ctx, dep, false, visited)?;
    }

    let store = Arc::clone(ctx.store());
    let host = Arc::clone(ctx.host());
    let search_path = ctx.search_path().clone();
    let root = pkg.path.clone();
    let os = current_os();

    let procs = ctx.main_thread().execute(move || {
        host.invalidate_search_path();
        let updated = search_path.add(store.get().as_deref(), &entry);
        store.set(&updated);

        let exts = host.script_extensions();
        let width = host.address_width();
        find_loadable_modules(&root, PLUGINS_DIR, &exts, os, width, |path| {
            debug!(path = %path.display(), "Loading plugin");
            host.load_plugin(path);
        });

        let mut procs = 0usize;
        find_loadable_modules(&root, PROCS_DIR, &exts, os, width, |_| procs += 1);
        if procs > 0 {
            host.invalidate_proc_cache();
        }
        procs
    })?;

    info!(id = %pkg.id, procs, "Loaded {}", pkg.id);
    Ok(LoadOutcome::Loaded)
}

/// Add `pkg` and its dependencies to the search path without loading modules
///
/// Used at startup, before the host scans the search path by itself.
pub fn populate_env(ctx: &Context, pkg: &LocalPackage) -> Result<LoadOutcome> {
    let mut visited = HashSet::new();
    populate_inner(ctx, pkg, &mut visited)
}

fn populate_inner(
    ctx: &Context,
    pkg: &LocalPackage,
    visited: &mut HashSet<String>,
) -> Result<LoadOutcome> {
    if !visited.insert(pkg.id.clone()) {
        return Ok(LoadOutcome::AlreadyLoaded);
    }

    let (deps, missing) = resolve_dependencies(ctx, pkg)?;
    if !missing.is_empty() {
        return Ok(LoadOutcome::MissingDependencies(missing));
    }
    for dep in &deps {
        populate_inner(ctx, dep, visited)?;
    }

    let store = Arc::clone(ctx.store());
    let search_path = ctx.search_path().clone();
    let entry = pkg.search_path_entry();
    ctx.main_thread().execute(move || {
        let updated = search_path.add(store.get().as_deref(), &entry);
        store.set(&updated);
    })?;

    Ok(LoadOutcome::Loaded)
}

/// Installed dependencies of `pkg`, and the names of those not installed
///
/// Each missing dependency is logged.
fn resolve_dependencies(
    ctx: &Context,
    pkg: &LocalPackage,
) -> Result<(Vec<LocalPackage>, Vec<String>)> {
    let manifest = pkg.metadata()?;
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for name in manifest.dependency_names() {
        match ctx.registry().by_name(name)? {
            Some(dep) => found.push(dep),
            None => {
                error!(id = %pkg.id, "Dependency not found: {:?}", name);
                missing.push(name.to_string());
            }
        }
    }

    Ok((found, missing))
}

/// Prepare the environment at host startup
///
/// Packages listed in `initial_packages` that are not installed yet are
/// installed from the first configured repository. Then every installed
/// package is put on the search path. Returns the resulting search-path value.
pub fn init_environment(ctx: &Context, initial_packages: &[String]) -> Result<Option<String>> {
    let mut missing = Vec::new();
    for id in initial_packages {
        if ctx.registry().by_name(id)?.is_none() {
            missing.push(id.as_str());
        }
    }

    if !missing.is_empty() {
        let repo = ctx.repos().first().ok_or_else(|| {
            Error::Other("No repository configured to fetch initial packages from".to_string())
        })?;
        info!("Downloading initial dependencies...");
        for id in missing {
            install_from_repo(ctx, repo, id, false)?;
        }
    }

    for pkg in ctx.registry().all()? {
        if let LoadOutcome::MissingDependencies(deps) = populate_env(ctx, &pkg)? {
            warn!(id = %pkg.id, missing = ?deps, "Not added to the search path");
        }
    }

    Ok(ctx.store().get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::main_thread::main_thread;
    use crate::platform::AddressWidth;
    use crate::search_path::{MemoryStore, SearchPath};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_package(root: &Path, id: &str, deps: &[&str]) -> LocalPackage {
        let path = root.join(id);
        fs::create_dir_all(path.join(PLUGINS_DIR)).unwrap();
        fs::create_dir_all(path.join(PROCS_DIR)).unwrap();
        let deps: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|d| (d.to_string(), serde_json::Value::String("*".into())))
            .collect();
        let manifest = serde_json::json!({"_id": id, "version": "1.0.0", "dependencies": deps});
        fs::write(path.join("info.json"), manifest.to_string()).unwrap();
        fs::write(path.join(PLUGINS_DIR).join(format!("{}.py", id)), "").unwrap();
        LocalPackage::new(id, path, "1.0.0")
    }

    fn context(root: &Path, host: Arc<RecordingHost>) -> Context {
        let (handle, _queue) = main_thread();
        Context::builder(root)
            .search_path(SearchPath::new(':', "/base"))
            .store(Arc::new(MemoryStore::new(None)))
            .host(host)
            .build(handle)
            .unwrap()
    }

    #[test]
    fn test_load_adds_path_and_loads_plugins() {
        let temp_dir = TempDir::new().unwrap();
        let host = Arc::new(RecordingHost::with_width(AddressWidth::Bits64));
        let ctx = context(temp_dir.path(), host.clone());
        let pkg = write_package(temp_dir.path(), "ifred", &[]);
        fs::write(pkg.path.join(PROCS_DIR).join("arch64.so"), b"").unwrap();

        assert_eq!(load(&ctx, &pkg, false).unwrap(), LoadOutcome::Loaded);

        let value = ctx.store().get().unwrap();
        assert_eq!(value, format!("/base:{}", pkg.search_path_entry()));
        assert_eq!(host.loaded(), vec![pkg.path.join(PLUGINS_DIR).join("ifred.py")]);
        assert_eq!(host.search_path_invalidations(), 1);
        if current_os() == crate::platform::OsFamily::Linux {
            assert_eq!(host.proc_cache_invalidations(), 1);
        }

        // Second load is a no-op unless forced
        assert_eq!(load(&ctx, &pkg, false).unwrap(), LoadOutcome::AlreadyLoaded);
        assert_eq!(host.loaded().len(), 1);
        assert_eq!(load(&ctx, &pkg, true).unwrap(), LoadOutcome::Loaded);
        assert_eq!(host.loaded().len(), 2);
        assert_eq!(ctx.store().get().unwrap(), value);
    }

    #[test]
    fn test_dependencies_load_first() {
        let temp_dir = TempDir::new().unwrap();
        let host = Arc::new(RecordingHost::default());
        let ctx = context(temp_dir.path(), host.clone());
        let dep = write_package(temp_dir.path(), "dep", &[]);
        let pkg = write_package(temp_dir.path(), "app", &["dep"]);

        load(&ctx, &pkg, false).unwrap();

        let value = ctx.store().get().unwrap();
        let entries = ctx.search_path().entries(&value);
        let entries: Vec<String> = entries.into_iter().map(str::to_string).collect();
        assert_eq!(
            entries,
            vec![
                "/base".to_string(),
                dep.search_path_entry(),
                pkg.search_path_entry()
            ]
        );
    }

    #[test]
    fn test_missing_dependency_aborts_load() {
        let temp_dir = TempDir::new().unwrap();
        let host = Arc::new(RecordingHost::default());
        let ctx = context(temp_dir.path(), host.clone());
        let pkg = write_package(temp_dir.path(), "app", &["ghost"]);

        assert_eq!(
            load(&ctx, &pkg, false).unwrap(),
            LoadOutcome::MissingDependencies(vec!["ghost".to_string()])
        );
        assert!(ctx.store().get().is_none());
        assert!(host.loaded().is_empty());
    }

    #[test]
    fn test_cyclic_dependencies_terminate() {
        let temp_dir = TempDir::new().unwrap();
        let host = Arc::new(RecordingHost::default());
        let ctx = context(temp_dir.path(), host.clone());
        let a = write_package(temp_dir.path(), "a", &["b"]);
        write_package(temp_dir.path(), "b", &["a"]);

        assert_eq!(load(&ctx, &a, false).unwrap(), LoadOutcome::Loaded);
        assert_eq!(host.loaded().len(), 2);

        let ctx2 = context(temp_dir.path(), Arc::new(RecordingHost::default()));
        assert_eq!(populate_env(&ctx2, &a).unwrap(), LoadOutcome::Loaded);
        let value = ctx2.store().get().unwrap();
        assert_eq!(ctx2.search_path().entries(&value).len(), 3);
    }

    #[test]
    fn test_populate_env_does_not_load_modules() {
        let temp_dir = TempDir::new().unwrap();
        let host = Arc::new(RecordingHost::default());
        let ctx = context(temp_dir.path(), host.clone());
        let pkg = write_package(temp_dir.path(), "ifred", &[]);

        populate_env(&ctx, &pkg).unwrap();
        populate_env(&ctx, &pkg).unwrap();

        assert!(host.loaded().is_empty());
        let value = ctx.store().get().unwrap();
        assert_eq!(value, format!("/base:{}", pkg.search_path_entry()));
    }

    #[test]
    fn test_init_environment_with_everything_installed() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path(), Arc::new(RecordingHost::default()));
        let a = write_package(temp_dir.path(), "a", &[]);
        let b = write_package(temp_dir.path(), "b", &["a"]);

        let value = init_environment(&ctx, &["a".to_string()]).unwrap().unwrap();
        assert!(ctx.search_path().contains(&value, &a.search_path_entry()));
        assert!(ctx.search_path().contains(&value, &b.search_path_entry()));
    }

    #[test]
    fn test_init_environment_without_repository() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(temp_dir.path(), Arc::new(RecordingHost::default()));
        assert!(init_environment(&ctx, &["missing".to_string()]).is_err());
    }
}
