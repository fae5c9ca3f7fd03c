use std::io;
use thiserror::Error;

use crate::declarations::DeclarationKind;

/// Errors raised while declaring, collecting or binding unit declarations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("{kind} declaration is not bound to a name: pass an explicit name or assign it to a unit class attribute")]
    UnboundName { kind: DeclarationKind },

    #[error("two distinct {kind} declarations are named '{name}'")]
    DuplicateDeclaration { kind: DeclarationKind, name: String },

    #[error("Cannot linearize the base classes of unit class '{0}'")]
    InconsistentHierarchy(String),

    #[error("Unit class '{class}' has no declaration attribute '{attr}'")]
    UnknownAttribute { class: String, attr: String },

    #[error("Attribute '{attr}' is a {found} declaration, not a {expected}")]
    KindMismatch {
        attr: String,
        expected: DeclarationKind,
        found: DeclarationKind,
    },

    #[error("No event scope '{0}' is registered with the runtime")]
    UnknownEventScope(String),

    #[error("Unit class '{0}' does not set a unit name")]
    MissingUnitName(String),
}

/// Errors that can occur while rendering or writing manifests
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_unbound_name_display_names_the_kind() {
        let err = DeclarationError::UnboundName {
            kind: DeclarationKind::Storage,
        };
        assert!(err.to_string().starts_with("storage declaration is not bound"));
    }

    #[test]
    fn test_duplicate_display() {
        let err = DeclarationError::DuplicateDeclaration {
            kind: DeclarationKind::Relation,
            name: "db".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "two distinct relation declarations are named 'db'"
        );
    }
}
