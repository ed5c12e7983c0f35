//! Platform detection for search-path formatting and native module lookup
//!
//! The host's search variable is delimited differently per OS family, and its
//! default value (used when the variable is unset) points at the host's
//! per-user directory. Native modules carry an OS-specific suffix and encode
//! their addressing width in the file stem.
//!
//! # Examples
//!
//! ```
//! use plugpm::platform::{current_os, OsFamily};
//!
//! let os = current_os();
//! println!("delimiter: {}", os.path_delimiter());
//! if os == OsFamily::Windows {
//!     assert_eq!(os.native_suffix(), ".dll");
//! }
//! ```

use std::env;
use std::path::PathBuf;

/// Directory name of the host's per-user data on Windows (under `%APPDATA%`)
pub const WINDOWS_USER_DIR: &str = "PluginHost";

/// Directory name of the host's per-user data elsewhere (under `$HOME`)
pub const UNIX_USER_DIR: &str = ".pluginhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    Mac,
}

impl OsFamily {
    /// Delimiter of the host search-path variable
    pub fn path_delimiter(self) -> char {
        match self {
            OsFamily::Windows => ';',
            OsFamily::Linux | OsFamily::Mac => ':',
        }
    }

    /// File suffix of native host modules
    pub fn native_suffix(self) -> &'static str {
        match self {
            OsFamily::Windows => ".dll",
            OsFamily::Linux => ".so",
            OsFamily::Mac => ".dylib",
        }
    }

    /// Default search-path base used when the variable is unset
    ///
    /// Windows uses the roaming config directory, other platforms the home
    /// directory. Returns `None` if the directory cannot be determined.
    pub fn default_user_dir(self) -> Option<PathBuf> {
        match self {
            OsFamily::Windows => dirs::config_dir().map(|d| d.join(WINDOWS_USER_DIR)),
            OsFamily::Linux | OsFamily::Mac => dirs::home_dir().map(|d| d.join(UNIX_USER_DIR)),
        }
    }

    /// Name of the directory holding executables inside a bundled runtime
    pub fn runtime_bin_dir(self) -> &'static str {
        match self {
            OsFamily::Windows => "Scripts",
            OsFamily::Linux | OsFamily::Mac => "bin",
        }
    }
}

/// Detect the OS family the manager runs on
///
/// BSDs and other unix-likes are treated as Linux (same delimiter and
/// `.so` suffix).
pub fn current_os() -> OsFamily {
    match env::consts::OS {
        "windows" => OsFamily::Windows,
        "macos" => OsFamily::Mac,
        _ => OsFamily::Linux,
    }
}

/// Addressing width of a host build, used to pick native modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressWidth {
    Bits32,
    Bits64,
}

impl AddressWidth {
    /// Width of the current process
    pub fn current() -> Self {
        if cfg!(target_pointer_width = "64") {
            AddressWidth::Bits64
        } else {
            AddressWidth::Bits32
        }
    }

    /// Whether a native module with this file stem targets the given width
    ///
    /// Modules for 64-bit hosts end with `64` (`foo64.so`); anything else is a
    /// 32-bit module.
    pub fn matches_stem(self, stem: &str) -> bool {
        stem.ends_with("64") == (self == AddressWidth::Bits64)
    }
}
