//! Static discovery of charmkit units in Python sources
//!
//! Charm authors write their unit as a Python class deriving from the unit
//! base type. This crate reads that source with ast-grep, without executing
//! it, and rebuilds the class as a [`charmkit_manifest::UnitClass`]:
//!
//! ```text
//! from charmkit import *
//!
//! class MyUnit(Unit):
//!     name = 'my-unit'
//!     db = require('pgsql')
//!     port = config(integer('listen port', default=8080))
//! ```

pub mod declarations;
pub mod discovery;
pub mod errors;
pub mod naming;
pub mod source;

pub use discovery::{discover_unit, DiscoveryOptions, UnitDiscovery};
pub use errors::DiscoveryError;
pub use naming::camel_to_kebab;
