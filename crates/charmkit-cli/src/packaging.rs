//! Unpacking a unit source into a charm tree
//!
//! Layout written under the charm root:
//!
//! ```text
//! <root>/metadata.yaml
//! <root>/actions.yaml
//! <root>/config.yaml
//! <root>/charmcraft.yaml
//! <root>/src/charm.py
//! <root>/src/<included files and directories>
//! ```

use charmkit_ast::{discover_unit, DiscoveryOptions};
use charmkit_manifest::{write_to_dir, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::PackageError;

pub const SRC_DIR: &str = "src";
pub const CHARM_FILE: &str = "charm.py";

#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Python file defining the unit class
    pub source: PathBuf,
    /// Charm root directory
    pub root: PathBuf,
    /// Header prepended to every manifest
    pub license: String,
    /// Replace an existing `src/charm.py`
    pub overwrite: bool,
    /// Extra files and directories copied into `src/`
    pub include: Vec<PathBuf>,
    pub discovery: DiscoveryOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    Written {
        unit: String,
        manifests: Vec<PathBuf>,
        charm: PathBuf,
        included: Vec<PathBuf>,
    },
    /// Manifests were written but the source tree was left alone.
    Conflict(String),
}

/// Split `--include` values on `;`, dropping empty entries.
pub fn split_includes<S: AsRef<str>>(values: &[S]) -> Vec<PathBuf> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split(';'))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Discover the unit in `request.source`, write its manifests and copy the
/// source tree into the charm root.
pub fn unpack(request: &PackageRequest) -> Result<PackageOutcome, PackageError> {
    let class = discover_unit(&request.source, &request.discovery)?;
    let set = Serializer::new(&class).manifests()?;
    let manifests = write_to_dir(&set, &request.root, &request.license)?;

    let src = request.root.join(SRC_DIR);
    let charm = src.join(CHARM_FILE);
    if src.exists() && !src.is_dir() {
        return Ok(PackageOutcome::Conflict(format!(
            "expected a {} directory; found a '{}' file",
            src.display(),
            SRC_DIR
        )));
    }
    if charm.exists() && !request.overwrite {
        return Ok(PackageOutcome::Conflict(format!(
            "found existing {}. pass --overwrite to overwrite",
            charm.display()
        )));
    }

    fs::create_dir_all(&src).map_err(PackageError::io(&src))?;
    if charm.exists() && same_file(&request.source, &charm)? {
        debug!("{} is already the charm source", charm.display());
    } else {
        fs::copy(&request.source, &charm).map_err(PackageError::io(&charm))?;
        debug!("Copied {} to {}", request.source.display(), charm.display());
    }
    make_executable(&charm)?;

    let mut included = Vec::with_capacity(request.include.len());
    for path in &request.include {
        included.push(copy_into(path, &src)?);
    }

    Ok(PackageOutcome::Written {
        unit: set.metadata.name,
        manifests,
        charm,
        included,
    })
}

fn same_file(a: &Path, b: &Path) -> Result<bool, PackageError> {
    let a = fs::canonicalize(a).map_err(PackageError::io(a))?;
    let b = fs::canonicalize(b).map_err(PackageError::io(b))?;
    Ok(a == b)
}

/// Copy a file, or a directory recursively, into `dest_dir` under its own name.
fn copy_into(path: &Path, dest_dir: &Path) -> Result<PathBuf, PackageError> {
    let name = path.file_name().ok_or_else(|| PackageError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let target = dest_dir.join(name);

    if !path.is_dir() {
        fs::copy(path, &target).map_err(PackageError::io(path))?;
        return Ok(target);
    }

    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            let failed = e.path().unwrap_or(path).to_path_buf();
            PackageError::Io {
                path: failed,
                source: e.into(),
            }
        })?;
        let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(PackageError::io(&dest))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(PackageError::io(&dest))?;
        }
    }
    Ok(target)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), PackageError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(PackageError::io(path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), PackageError> {
    Ok(())
}
