pub mod persistence;
pub mod schema;

pub use persistence::*;
pub use schema::*;

use crate::vfs::Env;

pub const CREATE_KEY: &str = "create";
pub const DEFAULT_OWNER_KEY: &str = "defaultOwner";
pub const DEFAULT_GROUP_KEY: &str = "defaultGroup";
pub const COMPRESSION_METHOD_KEY: &str = "compressionMethod";

/// Name of the user running this process.
///
/// Falls back to `$USER`, then to `"unknown"`, when the user database has no
/// entry for the current uid.
pub fn current_principal() -> String {
    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(Some(user)) => user.name,
        _ => std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
    }
}

/// Owner and group defaults applied to every archive mount.
pub fn default_owner_env() -> Env {
    let principal = current_principal();
    let mut env = Env::default();
    env.insert(DEFAULT_OWNER_KEY.to_string(), principal.clone());
    env.insert(DEFAULT_GROUP_KEY.to_string(), principal);
    env
}

/// Defaults for a mount that may create its backing archive.
pub fn create_env() -> Env {
    let mut env = default_owner_env();
    env.insert(CREATE_KEY.to_string(), "true".to_string());
    env
}

/// Overlay `overrides` on `defaults`. Keys present in `overrides` win.
pub fn merge_env(mut defaults: Env, overrides: &Env) -> Env {
    defaults.extend(
        overrides
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    defaults
}
