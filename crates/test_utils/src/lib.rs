//! Test Utilities Crate
//!
//! Shared test infrastructure for the billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for test data construction
//! - `mocks`: In-memory implementations of the external-collaborator ports
//! - `logging`: Tracing initialization for tests

pub mod builders;
pub mod fixtures;
pub mod logging;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use logging::*;
pub use mocks::*;
