//! Package manifest (`info.json`) handling
//!
//! Every package carries an `info.json` at its root. The installer reads it
//! straight out of the downloaded archive before anything touches the disk;
//! the registry re-reads it from the package directory on every lookup.
//!
//! # Examples
//!
//! ```no_run
//! use plugpm::Manifest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = Manifest::load("/home/me/.plugpm/packages/ifred")?;
//! println!("{} {}", manifest.id, manifest.version);
//! for dep in manifest.dependency_names() {
//!     println!("  depends on {}", dep);
//! }
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use tar::Archive;

/// The manifest filename
pub const MANIFEST_FILE: &str = "info.json";

/// Package manifest
///
/// Dependency values are carried but never interpreted: only the keys (the
/// dependency specs) drive installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "_id")]
    pub id: String,

    pub version: String,

    #[serde(default)]
    pub dependencies: BTreeMap<String, Value>,

    /// Install scripts, relative to the package root, run in order
    #[serde(default)]
    pub installers: Vec<String>,
}

impl Manifest {
    /// Parse a manifest from raw JSON
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::CorruptPackage(format!("{} is not valid JSON: {}", MANIFEST_FILE, e)))?;

        let object = value.as_object().ok_or_else(|| {
            Error::CorruptPackage(format!("{} is not a JSON object", MANIFEST_FILE))
        })?;

        if let Some(installers) = object.get("installers") {
            if !installers.is_array() {
                return Err(Error::CorruptPackage(
                    "installers key is not a list".to_string(),
                ));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| Error::CorruptPackage(format!("invalid {}: {}", MANIFEST_FILE, e)))
    }

    /// Load `info.json` from a package directory
    pub fn load<P: AsRef<Path>>(package_dir: P) -> Result<Self> {
        let path = package_dir.as_ref().join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::CorruptPackage(format!(
                "{} not found at {}",
                MANIFEST_FILE,
                package_dir.as_ref().display()
            )));
        }
        let bytes = fs::read(&path)?;
        Self::from_slice(&bytes)
    }

    /// Read the manifest embedded in a `.tar.gz` package archive
    ///
    /// Only the archive root is searched; `./info.json` is accepted as well.
    pub fn from_archive(archive_bytes: &[u8]) -> Result<Self> {
        let mut archive = Archive::new(GzDecoder::new(Cursor::new(archive_bytes)));

        for entry in archive.entries()? {
            let mut entry = entry?;
            let is_manifest = {
                let path = entry.path()?;
                let mut components = path
                    .components()
                    .filter(|c| !matches!(c, Component::CurDir));
                matches!(
                    (components.next(), components.next()),
                    (Some(Component::Normal(name)), None) if name == MANIFEST_FILE
                )
            };

            if is_manifest {
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                return Self::from_slice(&bytes);
            }
        }

        Err(Error::CorruptPackage(format!(
            "{} missing from package archive",
            MANIFEST_FILE
        )))
    }

    /// Dependency specs in a stable order
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }
}
