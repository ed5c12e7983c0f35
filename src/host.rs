//! Host application interface
//!
//! The manager never links against the host. Everything it needs from the
//! host (which script extensions it can load, how wide its addresses are, and
//! the hooks to load a plugin or drop cached lookups) goes through [`Host`].

use crate::platform::AddressWidth;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub trait Host: Send + Sync {
    /// File extensions (without the dot) of script modules the host can run
    fn script_extensions(&self) -> Vec<String>;

    /// Addressing width of the running host
    fn address_width(&self) -> AddressWidth;

    /// Load a plugin module right away
    fn load_plugin(&self, path: &Path);

    /// Drop the host's cached view of the search-path variable
    fn invalidate_search_path(&self);

    /// Drop the host's cached list of processor modules
    fn invalidate_proc_cache(&self);
}

/// Host used when the manager runs outside the host application
///
/// Loading is a no-op; the search path still gets updated so a host started
/// from the same environment sees the packages.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    script_extensions: Vec<String>,
}

impl HeadlessHost {
    pub fn new(script_extensions: Vec<String>) -> Self {
        Self { script_extensions }
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(vec!["py".to_string()])
    }
}

impl Host for HeadlessHost {
    fn script_extensions(&self) -> Vec<String> {
        self.script_extensions.clone()
    }

    fn address_width(&self) -> AddressWidth {
        AddressWidth::current()
    }

    fn load_plugin(&self, path: &Path) {
        debug!(path = %path.display(), "No host attached, plugin will load on next host start");
    }

    fn invalidate_search_path(&self) {}

    fn invalidate_proc_cache(&self) {}
}

/// Host that records every call, for tests
#[doc(hidden)]
#[derive(Debug, Default)]
pub struct RecordingHost {
    width: Option<AddressWidth>,
    loaded: Mutex<Vec<PathBuf>>,
    search_path_invalidations: Mutex<usize>,
    proc_cache_invalidations: Mutex<usize>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(width: AddressWidth) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn loaded(&self) -> Vec<PathBuf> {
        self.loaded.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn search_path_invalidations(&self) -> usize {
        self.search_path_invalidations.lock().map(|n| *n).unwrap_or(0)
    }

    pub fn proc_cache_invalidations(&self) -> usize {
        self.proc_cache_invalidations.lock().map(|n| *n).unwrap_or(0)
    }
}

impl Host for RecordingHost {
    fn script_extensions(&self) -> Vec<String> {
        vec!["py".to_string()]
    }

    fn address_width(&self) -> AddressWidth {
        self.width.unwrap_or_else(AddressWidth::current)
    }

    fn load_plugin(&self, path: &Path) {
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.push(path.to_path_buf());
        }
    }

    fn invalidate_search_path(&self) {
        if let Ok(mut n) = self.search_path_invalidations.lock() {
            *n += 1;
        }
    }

    fn invalidate_proc_cache(&self) {
        if let Ok(mut n) = self.proc_cache_invalidations.lock() {
            *n += 1;
        }
    }
}
