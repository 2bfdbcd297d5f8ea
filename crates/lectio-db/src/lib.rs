//! Lectio content store.
//!
//! [`VideoStore`] and [`ClassStore`] are the seams the pipeline and the HTTP handlers
//! depend on. Postgres implementations live in [`db`]; in-memory implementations for
//! tests live in [`test_helpers`].

pub mod db;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use db::*;
