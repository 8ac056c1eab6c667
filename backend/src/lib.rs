//! Photogram backend library
//!
//! Exposes the backend modules to the binary and to integration tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
