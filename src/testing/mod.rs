//! Testing utilities and mock implementations
//!
//! Lets the router be exercised without classifier services, a dashboard
//! broker or pattern files on disk.

pub mod mocks;

pub use mocks::*;
