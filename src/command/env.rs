//! Child process environment
//!
//! Every spawned child inherits the supervisor's environment with colored output
//! forced on and Expo telemetry disabled. Known auth tokens are forwarded from the
//! ambient environment, and caller overrides are applied last.

use std::collections::HashMap;

use crate::types::config::{AUTH_TOKEN_VARS, FORCE_COLOR_VAR, TELEMETRY_DISABLE_VAR};

/// Build the environment for a child process from the current process environment
///
/// Variables whose name or value is not valid UTF-8 are skipped.
pub fn build_env(overrides: &HashMap<String, String>) -> HashMap<String, String> {
    let ambient = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
    build_env_from(ambient, overrides)
}

/// Build the environment for a child process from an explicit ambient environment
pub fn build_env_from<I>(ambient: I, overrides: &HashMap<String, String>) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: HashMap<String, String> = ambient.into_iter().collect();

    env.insert(FORCE_COLOR_VAR.to_string(), "1".to_string());
    env.insert(TELEMETRY_DISABLE_VAR.to_string(), "1".to_string());

    for (key, value) in overrides {
        env.insert(key.clone(), value.clone());
    }

    // Tokens that are unset or empty in the ambient environment are not forwarded
    for var in AUTH_TOKEN_VARS {
        if env.get(var).is_some_and(|v| v.is_empty()) {
            env.remove(var);
        }
    }

    env
}

/// Names of the auth-token variables present in an environment, for logging
pub fn forwarded_tokens(env: &HashMap<String, String>) -> Vec<&'static str> {
    AUTH_TOKEN_VARS
        .into_iter()
        .filter(|var| env.contains_key(*var))
        .collect()
}
