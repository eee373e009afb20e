//! Test fixtures and data generators
//!
//! Generated names are unique per process run so tests can share a
//! persistent database.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

fn run_id() -> i64 {
    static RUN_ID: OnceLock<i64> = OnceLock::new();
    *RUN_ID.get_or_init(|| chrono::Utc::now().timestamp_millis())
}

/// Get a unique suffix for test data
pub fn unique_suffix() -> String {
    format!("{}{}", run_id(), COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Email-shaped login, unique for this run
pub fn unique_login() -> String {
    format!("user{}@example.com", unique_suffix())
}

pub fn unique_role() -> String {
    format!("role-{}", unique_suffix())
}

/// Nickname candidate, unique for this run
pub fn unique_nickname() -> String {
    format!("nick{}", unique_suffix())
}
