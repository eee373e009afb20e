//! Password hashing and random secrets

mod password;

pub use password::{hash_password, random_password, random_token, verify_password, PasswordService};
