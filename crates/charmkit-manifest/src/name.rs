//! Late-bound declaration names
//!
//! A declaration is usually created before the attribute it will be assigned
//! to exists, so its name is resolved in one of two ways: explicitly at
//! construction, or by the collector from the attribute name. The first
//! resolution wins and the name never changes afterwards.

use once_cell::sync::OnceCell;

/// A write-once name slot.
#[derive(Debug, Default)]
pub struct LateName {
    cell: OnceCell<String>,
}

impl LateName {
    /// An unresolved name.
    pub fn unbound() -> Self {
        LateName::default()
    }

    /// A name resolved at construction.
    pub fn bound(name: impl Into<String>) -> Self {
        LateName {
            cell: OnceCell::with_value(name.into()),
        }
    }

    pub fn get(&self) -> Option<&str> {
        self.cell.get().map(String::as_str)
    }

    pub fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Resolve the name to `candidate` unless it is already resolved.
    ///
    /// Returns `true` when this call performed the resolution.
    pub fn bind(&self, candidate: &str) -> bool {
        self.cell.set(candidate.to_string()).is_ok()
    }
}

/// Convert a manifest name into the scope used for runtime event names.
///
/// Event names cannot contain hyphens, so `db-peers` becomes `db_peers`.
/// Manifests keep the name verbatim.
pub fn event_scope(name: &str) -> String {
    name.replace('-', "_")
}
