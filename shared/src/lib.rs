//! Photogram Shared Library
//!
//! Wire types, pagination math and input validation shared by the backend
//! and its tests. Nothing in here performs I/O.

pub mod pagination;
pub mod types;
pub mod validation;

pub use pagination::*;
pub use types::*;
