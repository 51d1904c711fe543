//! Named FSM states with optional entry actions.

use crate::error::CoreError;
use crate::script::{CompiledAction, ScriptEnv};

/// A vertex of the automaton. The entry action, when present, runs exactly
/// once per entry, including the implicit entry into the initial state at
/// startup.
#[derive(Debug, Clone)]
pub struct State {
    name: String,
    on_enter: Option<CompiledAction>,
}

impl State {
    pub fn new(name: impl Into<String>, on_enter: Option<CompiledAction>) -> Self {
        Self {
            name: name.into(),
            on_enter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Option<&CompiledAction> {
        self.on_enter.as_ref()
    }

    /// Runs the entry action if one is attached.
    pub fn on_enter(&self, env: &mut ScriptEnv) -> Result<(), CoreError> {
        match &self.on_enter {
            Some(action) => action.run(env),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptHost;
    use crate::value::Value;
    use std::collections::HashMap;

    #[test]
    fn test_state_without_action_is_a_noop() {
        let state = State::new("IDLE", None);
        let mut env = ScriptEnv::new(HashMap::new(), HashMap::new(), 0);
        assert!(state.on_enter(&mut env).is_ok());
        assert!(state.action().is_none());
    }

    #[test]
    fn test_entry_action_runs() {
        let mut host = ScriptHost::new();
        let action = host.compile_action("output(\"out\", 1)").unwrap();
        let state = State::new("ACTIVE", Some(action));

        let mut env = ScriptEnv::new(HashMap::new(), HashMap::new(), 0);
        state.on_enter(&mut env).unwrap();
        assert_eq!(env.outputs().get("out"), Some(&"1".to_string()));
        assert_eq!(state.name(), "ACTIVE");
    }

    #[test]
    fn test_entry_action_error_surfaces() {
        let mut host = ScriptHost::new();
        let action = host.compile_action("x = ghost").unwrap();
        let state = State::new("S", Some(action));

        let mut env = ScriptEnv::new(HashMap::new(), HashMap::new(), 0);
        assert!(matches!(
            state.on_enter(&mut env),
            Err(CoreError::ScriptEval { .. })
        ));
    }

    #[test]
    fn test_vars_are_plain_identifiers() {
        let mut host = ScriptHost::new();
        let action = host.compile_action("n = n + 1").unwrap();
        let state = State::new("S", Some(action));

        let mut vars = HashMap::new();
        vars.insert("n".to_string(), Value::Int(41));
        let mut env = ScriptEnv::new(vars, HashMap::new(), 0);
        state.on_enter(&mut env).unwrap();
        assert_eq!(env.vars().get("n"), Some(&Value::Int(42)));
    }
}
