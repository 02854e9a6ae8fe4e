//! Shared helpers for integration tests.

pub mod image_server;
