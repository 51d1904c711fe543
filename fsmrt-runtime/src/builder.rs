//! Builds a runnable automaton from a validated document.

use fsmrt_core::{
    Automaton, CoreError, Delay, DelaySpec, FsmDocument, ScriptHost, State, Transition, Value,
    VarType, Variable,
};
use std::collections::HashMap;

/// Converts the persisted document into a live automaton.
///
/// Variables take their initial value typed from the JSON literal; states
/// get entry actions and transitions get guards compiled through `host`.
/// A guard or action that fails to compile aborts the build, as does a
/// transition naming an unknown state.
pub fn build_automaton(doc: &FsmDocument, host: &mut ScriptHost) -> Result<Automaton, CoreError> {
    let mut fsm = Automaton::new();

    for v in &doc.variables {
        let ty = VarType::from_tag(&v.var_type);
        fsm.add_variable(Variable::new(&v.name, ty, Value::from_json(&v.init)));
    }

    let mut index = HashMap::new();
    for (i, s) in doc.states.iter().enumerate() {
        index.insert(s.id.clone(), i);
        let action = if s.on_enter.is_empty() {
            None
        } else {
            Some(host.compile_action(&s.on_enter)?)
        };
        fsm.add_state(State::new(&s.id, action), s.initial);
    }

    for t in &doc.transitions {
        let src = *index
            .get(&t.from)
            .ok_or_else(|| CoreError::UnknownState { id: t.from.clone() })?;
        let dst = *index
            .get(&t.to)
            .ok_or_else(|| CoreError::UnknownState { id: t.to.clone() })?;
        let guard = if t.guard.is_empty() {
            None
        } else {
            Some(host.compile_guard(&t.guard)?)
        };
        let delay = match &t.delay_ms {
            None => Delay::Immediate,
            Some(DelaySpec::Fixed(ms)) => Delay::Fixed(*ms),
            Some(DelaySpec::Variable(name)) => Delay::FromVariable(name.clone()),
        };
        fsm.add_transition(Transition::new(&t.trigger, guard, delay, src, dst));
    }

    Ok(fsm)
}
