//! Native and script module discovery inside an installed package

use crate::platform::{AddressWidth, OsFamily};
use std::path::Path;
use walkdir::WalkDir;

/// Plugins are loaded as soon as the package is loaded
pub const PLUGINS_DIR: &str = "plugins";

/// Processor modules are picked up by the host on demand
pub const PROCS_DIR: &str = "procs";

/// Hand every loadable module in `<package_root>/<subdir>` to `callback`
///
/// Script modules come first, one pass per extension in the order given.
/// Native modules follow, restricted to those built for `width`. Matching is
/// not recursive and files are visited in name order.
pub fn find_loadable_modules<F>(
    package_root: &Path,
    subdir: &str,
    script_extensions: &[String],
    os: OsFamily,
    width: AddressWidth,
    mut callback: F,
) where
    F: FnMut(&Path),
{
    let dir = package_root.join(subdir);
    if !dir.is_dir() {
        return;
    }

    for ext in script_extensions {
        let suffix = format!(".{}", ext.trim_start_matches('.'));
        for_each_with_suffix(&dir, &suffix, |path, _| callback(path));
    }

    for_each_with_suffix(&dir, os.native_suffix(), |path, stem| {
        if width.matches_stem(stem) {
            callback(path);
        }
    });
}

fn for_each_with_suffix<F>(dir: &Path, suffix: &str, mut f: F)
where
    F: FnMut(&Path, &str),
{
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let name = entry.file_name().to_string_lossy();
        if let Some(stem) = name.strip_suffix(suffix) {
            f(entry.path(), stem);
        }
    }
}
