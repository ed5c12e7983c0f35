//! Host search-path management
//!
//! The host discovers plugin directories through a single environment value:
//! a delimiter-joined, duplicate-free list of absolute paths. [`SearchPath`]
//! computes additions and removals on that value; [`SearchPathStore`] reads
//! and writes it.
//!
//! # Examples
//!
//! ```
//! use plugpm::SearchPath;
//!
//! let sp = SearchPath::new(':', "/home/me/.pluginhost");
//! let added = sp.add(Some("/a:/b"), "/c");
//! assert_eq!(added, "/a:/b:/c");
//! assert_eq!(sp.remove(&added, "/c").unwrap(), "/a:/b");
//! ```

use crate::platform::current_os;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Mutex;

/// Formatting rules for the search-path value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    delimiter: char,
    default_base: String,
}

impl SearchPath {
    pub fn new(delimiter: char, default_base: impl Into<String>) -> Self {
        Self {
            delimiter,
            default_base: default_base.into(),
        }
    }

    /// Rules for the current platform
    ///
    /// `user_dir` overrides the platform default base path.
    pub fn native(user_dir: Option<&str>) -> Self {
        let os = current_os();
        let base = match user_dir {
            Some(dir) => dir.to_string(),
            None => os
                .default_user_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        };
        Self::new(os.path_delimiter(), base)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Split a value into its entries
    pub fn entries<'a>(&self, value: &'a str) -> Vec<&'a str> {
        value.split(self.delimiter).collect()
    }

    /// Whether `entry` is one of the value's entries (exact match)
    pub fn contains(&self, value: &str, entry: &str) -> bool {
        value.split(self.delimiter).any(|e| e == entry)
    }

    /// Append `new_entry`, keeping first-seen order and dropping duplicates
    ///
    /// An unset value starts from the default base path.
    pub fn add(&self, current: Option<&str>, new_entry: &str) -> String {
        let current = current.unwrap_or(&self.default_base);

        let mut seen = HashSet::new();
        let entries: Vec<&str> = current
            .split(self.delimiter)
            .chain(std::iter::once(new_entry))
            .filter(|entry| seen.insert(*entry))
            .collect();

        self.join(&entries)
    }

    /// Remove `target` by exact match
    ///
    /// Fails with [`Error::SearchPathMismatch`] if `target` is not an entry;
    /// callers are expected to check first.
    pub fn remove(&self, current: &str, target: &str) -> Result<String> {
        let mut entries = self.entries(current);
        let index = entries.iter().position(|e| *e == target).ok_or_else(|| {
            Error::SearchPathMismatch {
                current: current.to_string(),
                target: target.to_string(),
            }
        })?;
        entries.remove(index);
        Ok(self.join(&entries))
    }

    fn join(&self, entries: &[&str]) -> String {
        let mut delimiter = [0u8; 4];
        entries.join(self.delimiter.encode_utf8(&mut delimiter))
    }
}

/// Where the search-path value lives
///
/// Reads and writes are not locked against each other; callers that mutate
/// from several threads must serialize (the loader does so by running every
/// mutation on the main context).
pub trait SearchPathStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, value: &str);
}

/// Process environment variable
#[derive(Debug, Clone)]
pub struct EnvVarStore {
    name: String,
}

impl EnvVarStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SearchPathStore for EnvVarStore {
    fn get(&self) -> Option<String> {
        std::env::var(&self.name).ok()
    }

    fn set(&self, value: &str) {
        std::env::set_var(&self.name, value);
    }
}

/// In-memory value, for embedding hosts that own the variable themselves
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new(initial: Option<&str>) -> Self {
        Self {
            value: Mutex::new(initial.map(str::to_string)),
        }
    }
}

impl SearchPathStore for MemoryStore {
    fn get(&self) -> Option<String> {
        self.value.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn set(&self, value: &str) {
        if let Ok(mut guard) = self.value.lock() {
            *guard = Some(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix() -> SearchPath {
        SearchPath::new(':', "/home/user/.pluginhost")
    }

    fn windows() -> SearchPath {
        SearchPath::new(';', r"C:\Users\me\AppData\Roaming\PluginHost")
    }

    #[test]
    fn test_add_appends() {
        assert_eq!(unix().add(Some("/a:/b"), "/c"), "/a:/b:/c");
        assert_eq!(windows().add(Some(r"C:\a"), r"D:\b"), r"C:\a;D:\b");
    }

    #[test]
    fn test_add_unset_uses_default_base() {
        assert_eq!(
            unix().add(None, "/pkgs/ifred"),
            "/home/user/.pluginhost:/pkgs/ifred"
        );
        assert_eq!(
            windows().add(None, r"C:\pkgs\ifred"),
            r"C:\Users\me\AppData\Roaming\PluginHost;C:\pkgs\ifred"
        );
    }

    #[test]
    fn test_add_deduplicates_preserving_order() {
        assert_eq!(unix().add(Some("/a:/b:/a"), "/b"), "/a:/b");
        assert_eq!(unix().add(Some("/a:/b"), "/a"), "/a:/b");
    }

    #[test]
    fn test_remove_exact_match() {
        assert_eq!(unix().remove("/a:/b:/c", "/b").unwrap(), "/a:/c");
        // A prefix of an entry is not an entry
        let err = unix().remove("/a:/bb", "/b").unwrap_err();
        assert!(matches!(err, Error::SearchPathMismatch { .. }));
    }

    #[test]
    fn test_remove_absent_fails() {
        let result = unix().remove("/a:/b", "/z");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("/z"));
    }

    #[test]
    fn test_round_trip() {
        let sp = unix();
        for current in ["/a", "/a:/b:/c", "", "/x/y:/z"] {
            let added = sp.add(Some(current), "/pkgs/new");
            assert_eq!(sp.remove(&added, "/pkgs/new").unwrap(), current);
        }
    }

    #[test]
    fn test_contains() {
        assert!(unix().contains("/a:/b", "/b"));
        assert!(!unix().contains("/a:/bc", "/b"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new(None);
        assert_eq!(store.get(), None);
        store.set("/a:/b");
        assert_eq!(store.get().as_deref(), Some("/a:/b"));
    }

    #[test]
    fn test_env_var_store() {
        let store = EnvVarStore::new("PLUGPM_TEST_SEARCH_PATH_STORE");
        assert_eq!(store.get(), None);
        store.set("/x");
        assert_eq!(store.get().as_deref(), Some("/x"));
        std::env::remove_var(store.name());
    }
}
