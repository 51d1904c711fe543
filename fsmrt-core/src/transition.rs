//! FSM transitions: trigger matching, guards and delays.

use crate::error::CoreError;
use crate::script::{CompiledGuard, ScriptEnv};
use crate::value::Variable;
use std::collections::HashMap;
use std::time::Duration;

/// Minimum positive delay. Even "immediate" transitions arm a timer so that
/// every firing flows through the scheduler and keeps its ordering.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// How long to wait before a triggered transition fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delay {
    /// Fire on the next scheduler pass.
    Immediate,
    /// Fixed delay in milliseconds.
    Fixed(u32),
    /// Delay read from a variable at the moment the transition is armed.
    FromVariable(String),
}

/// An edge between two states. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Trigger input name ("" = unconditional).
    trigger: String,
    guard: Option<CompiledGuard>,
    delay: Delay,
    src: usize,
    dst: usize,
}

impl Transition {
    pub fn new(
        trigger: impl Into<String>,
        guard: Option<CompiledGuard>,
        delay: Delay,
        src: usize,
        dst: usize,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            guard,
            delay,
            src,
            dst,
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn delay(&self) -> &Delay {
        &self.delay
    }

    pub fn src(&self) -> usize {
        self.src
    }

    pub fn dst(&self) -> usize {
        self.dst
    }

    /// Decides whether this edge is a candidate for the incoming trigger.
    ///
    /// The empty trigger matches only the internal tick raised after a timer
    /// fires or a state changes. A guard evaluation failure propagates so
    /// the executor can log it and treat the edge as not triggered.
    pub fn is_triggered(
        &self,
        incoming: &str,
        env: &mut ScriptEnv,
    ) -> Result<bool, CoreError> {
        if incoming != self.trigger {
            return Ok(false);
        }
        match &self.guard {
            None => Ok(true),
            Some(guard) => guard.evaluate(env),
        }
    }

    /// Concrete duration to arm when this edge becomes eligible.
    ///
    /// Variable delays read the variable's current integer value; a missing,
    /// non-numeric or non-positive value falls back to the 1 ms floor.
    pub fn arm_delay(&self, vars: &HashMap<String, Variable>) -> Duration {
        match &self.delay {
            Delay::Immediate => MIN_DELAY,
            Delay::Fixed(ms) => Duration::from_millis((*ms).max(1) as u64),
            Delay::FromVariable(name) => vars
                .get(name)
                .and_then(|var| var.value().as_ms())
                .filter(|ms| *ms > 0)
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(MIN_DELAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptHost;
    use crate::value::{Value, VarType, Variable};

    fn env_with_input(name: &str, value: &str) -> ScriptEnv {
        let mut inputs = HashMap::new();
        inputs.insert(name.to_string(), value.to_string());
        ScriptEnv::new(HashMap::new(), inputs, 0)
    }

    #[test]
    fn test_trigger_must_match() {
        let t = Transition::new("go", None, Delay::Immediate, 0, 1);
        let mut env = env_with_input("go", "1");
        assert!(t.is_triggered("go", &mut env).unwrap());
        assert!(!t.is_triggered("", &mut env).unwrap());
        assert!(!t.is_triggered("other", &mut env).unwrap());
    }

    #[test]
    fn test_empty_trigger_matches_only_tick() {
        let t = Transition::new("", None, Delay::Immediate, 0, 1);
        let mut env = ScriptEnv::new(HashMap::new(), HashMap::new(), 0);
        assert!(t.is_triggered("", &mut env).unwrap());
        assert!(!t.is_triggered("go", &mut env).unwrap());
    }

    #[test]
    fn test_guard_gates_the_trigger() {
        let mut host = ScriptHost::new();
        let guard = host.compile_guard("valueof(\"in\") == \"1\"").unwrap();
        let t = Transition::new("in", Some(guard), Delay::Immediate, 0, 1);

        let mut env = env_with_input("in", "1");
        assert!(t.is_triggered("in", &mut env).unwrap());

        let mut env = env_with_input("in", "0");
        assert!(!t.is_triggered("in", &mut env).unwrap());
    }

    #[test]
    fn test_guard_error_propagates() {
        let mut host = ScriptHost::new();
        let guard = host.compile_guard("ghost == 1").unwrap();
        let t = Transition::new("in", Some(guard), Delay::Immediate, 0, 1);
        let mut env = env_with_input("in", "1");
        assert!(t.is_triggered("in", &mut env).is_err());
    }

    #[test]
    fn test_arm_delay_resolution() {
        let mut vars = HashMap::new();
        vars.insert(
            "timeout".to_string(),
            Variable::new("timeout", VarType::Int, Value::Int(250)),
        );
        vars.insert(
            "label".to_string(),
            Variable::new("label", VarType::String, Value::Str("x".to_string())),
        );

        let immediate = Transition::new("", None, Delay::Immediate, 0, 1);
        assert_eq!(immediate.arm_delay(&vars), MIN_DELAY);

        let fixed = Transition::new("", None, Delay::Fixed(500), 0, 1);
        assert_eq!(fixed.arm_delay(&vars), Duration::from_millis(500));

        let zero = Transition::new("", None, Delay::Fixed(0), 0, 1);
        assert_eq!(zero.arm_delay(&vars), MIN_DELAY);

        let var = Transition::new("", None, Delay::FromVariable("timeout".to_string()), 0, 1);
        assert_eq!(var.arm_delay(&vars), Duration::from_millis(250));

        // Non-numeric and missing variables fall back to the floor.
        let bad = Transition::new("", None, Delay::FromVariable("label".to_string()), 0, 1);
        assert_eq!(bad.arm_delay(&vars), MIN_DELAY);
        let missing = Transition::new("", None, Delay::FromVariable("ghost".to_string()), 0, 1);
        assert_eq!(missing.arm_delay(&vars), MIN_DELAY);
    }

    #[test]
    fn test_arm_delay_tracks_variable_updates() {
        let mut vars = HashMap::new();
        vars.insert(
            "timeout".to_string(),
            Variable::new("timeout", VarType::Int, Value::Int(250)),
        );
        let t = Transition::new("", None, Delay::FromVariable("timeout".to_string()), 0, 1);
        assert_eq!(t.arm_delay(&vars), Duration::from_millis(250));

        vars.get_mut("timeout").unwrap().set_from_string("50");
        assert_eq!(t.arm_delay(&vars), Duration::from_millis(50));
    }
}
