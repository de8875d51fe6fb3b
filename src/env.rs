use std::collections::HashMap;
use std::env as stdenv;

/// Read-only snapshot of the process environment used for `${name}` expansion
/// and for builtins that consult variables such as `HOME`.
///
/// Children spawned by the interpreter inherit the real process environment;
/// this snapshot only serves lookups made by the interpreter itself, which
/// lets tests inject variables without touching the process-wide state.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment into a new `Environment`.
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    pub fn new() -> Self {
        let vars = stdenv::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build an environment from explicit key-value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Get the value of a variable, or `None` when it is unset.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable in the snapshot.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}
