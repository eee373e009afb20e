//! Relation records between two users
//!
//! Follows and blocks are not stored on the user document. Each is a record
//! of its own holding two user references, unique per ordered pair.

use auth_common::AuthSettings;
use auth_core::IndexSpec;

use crate::fields::UserField;
use crate::schema::{FieldDef, Schema};

pub(crate) fn setup_follower_fields(schema: &mut Schema, _settings: &AuthSettings) {
    schema
        .define_field(FieldDef::new("follower", UserField::new()).required())
        .define_field(FieldDef::new("follows", UserField::new()).required());
}

pub(crate) fn setup_follower_indexes(schema: &mut Schema) {
    schema.define_index(IndexSpec::asc(["follower", "follows"]).unique());
}

pub(crate) fn setup_blocked_user_fields(schema: &mut Schema, _settings: &AuthSettings) {
    schema
        .define_field(FieldDef::new("blocker", UserField::new()).required())
        .define_field(FieldDef::new("blocked", UserField::new()).required());
}

pub(crate) fn setup_blocked_user_indexes(schema: &mut Schema) {
    schema.define_index(IndexSpec::asc(["blocker", "blocked"]).unique());
}
