use charmkit_manifest::DeclarationError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering a unit class in Python source
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} does not define or import the unit base type '{base}'", path.display())]
    MissingUnitType { base: String, path: PathBuf },

    #[error("{} defines more than one concrete unit class: {}", path.display(), classes.join(", "))]
    MultipleUnitSubclasses { path: PathBuf, classes: Vec<String> },

    #[error("{} defines no subclass of '{base}'", path.display())]
    NoUnitSubclass { base: String, path: PathBuf },

    #[error("Unsupported declaration {class}.{attr}: {reason}")]
    UnsupportedDeclaration {
        class: String,
        attr: String,
        reason: String,
    },

    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_multiple_subclasses_lists_classes() {
        let err = DiscoveryError::MultipleUnitSubclasses {
            path: PathBuf::from("charm.py"),
            classes: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "charm.py defines more than one concrete unit class: A, B"
        );
    }

    #[test]
    fn test_missing_unit_type_names_base() {
        let err = DiscoveryError::MissingUnitType {
            base: "Unit".to_string(),
            path: PathBuf::from("charm.py"),
        };
        assert!(err.to_string().contains("'Unit'"));
    }
}
