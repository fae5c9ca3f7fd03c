//! Error types for the charmkit CLI

use charmkit_ast::DiscoveryError;
use charmkit_manifest::{DeclarationError, ManifestError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while unpacking a unit into a charm tree
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl From<DeclarationError> for PackageError {
    fn from(err: DeclarationError) -> Self {
        PackageError::Manifest(ManifestError::Declaration(err))
    }
}

impl PackageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> PackageError {
        let path = path.into();
        move |source| PackageError::Io { path, source }
    }
}
