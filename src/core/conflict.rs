// src/core/conflict.rs

use crate::constants::COMMANDS_NAMESPACE;
use std::collections::BTreeSet;

/// Checks whether a library module name collides with a reserved or already used
/// top-level symbol. Returns the symbol it collides with.
///
/// Library modules live under the `Commands` namespace, so `Commands::Env` and
/// `Env::Vars` are both checked as `Env`. The check is advisory: callers warn and
/// carry on.
pub fn check(candidate: &str, reserved: &BTreeSet<String>) -> Option<String> {
    let unprefixed = candidate
        .strip_prefix(COMMANDS_NAMESPACE)
        .and_then(|rest| rest.strip_prefix("::"))
        .unwrap_or(candidate);

    let top_level = unprefixed.split("::").next().unwrap_or(unprefixed).trim();
    if top_level.is_empty() {
        return None;
    }

    reserved.get(top_level).cloned()
}
