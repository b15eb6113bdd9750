//! mousetrace-capture library entry point.
//!
//! Re-exports the application and infrastructure modules so that
//! integration tests in `tests/` and the binary in `main.rs` share the same
//! module tree.

pub mod application;
pub mod infrastructure;
