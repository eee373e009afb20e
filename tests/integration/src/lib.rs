//! Integration test utilities for the identity storage driver
//!
//! This crate provides helpers for running end-to-end scenarios against
//! the in-memory store and, when configured, PostgreSQL and Redis.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
