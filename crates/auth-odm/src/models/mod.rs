//! Built-in models and their domain views

mod edges;
mod role;
mod user;

use std::sync::Arc;

use auth_core::{Identity, ANONYMOUS_UID, SYSTEM_UID};

use crate::hooks::{NoHooks, RoleHooks, UserHooks};
use crate::registry::ModelDef;

pub use role::Role;
pub use user::User;

pub(crate) use user::Placeholder;

pub const ROLE_MODEL: &str = "role";
pub const USER_MODEL: &str = "user";
pub const FOLLOWER_MODEL: &str = "follower";
pub const BLOCKED_USER_MODEL: &str = "blocked_user";

/// Login of the anonymous placeholder user
pub const ANONYMOUS_LOGIN: &str = "anonymous@anonymous.anonymous";

/// Login of the system placeholder user
pub const SYSTEM_LOGIN: &str = "system@system.system";

/// Identity on whose behalf a save or delete runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    uid: String,
}

impl ActorContext {
    pub fn system() -> Self {
        Self {
            uid: SYSTEM_UID.to_string(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            uid: ANONYMOUS_UID.to_string(),
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self { uid: user.uid() }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn is_system(&self) -> bool {
        self.uid == SYSTEM_UID
    }
}

/// Definitions of the models every storage registers
pub fn builtin_models() -> Vec<ModelDef> {
    vec![
        ModelDef {
            name: ROLE_MODEL,
            collection: <Role as Identity>::KIND.collection(),
            fields: role::setup_fields,
            indexes: role::setup_indexes,
            hooks: Arc::new(RoleHooks),
        },
        ModelDef {
            name: USER_MODEL,
            collection: <User as Identity>::KIND.collection(),
            fields: user::setup_fields,
            indexes: user::setup_indexes,
            hooks: Arc::new(UserHooks),
        },
        ModelDef {
            name: FOLLOWER_MODEL,
            collection: "followers",
            fields: edges::setup_follower_fields,
            indexes: edges::setup_follower_indexes,
            hooks: Arc::new(NoHooks),
        },
        ModelDef {
            name: BLOCKED_USER_MODEL,
            collection: "blocked_users",
            fields: edges::setup_blocked_user_fields,
            indexes: edges::setup_blocked_user_indexes,
            hooks: Arc::new(NoHooks),
        },
    ]
}
