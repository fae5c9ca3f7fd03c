//! charmkit library - expose modules for testing
//!
//! The binary is a thin wrapper over these modules.

pub mod commands;
pub mod common;
pub mod errors;
pub mod packaging;

pub use charmkit_logger as logger;
pub use common::GlobalOpts;
