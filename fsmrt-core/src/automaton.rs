//! The automaton: owns states, transitions and variables, and drives the
//! Moore-style execution loop.
//!
//! All live state is touched only by the executor thread running [`Automaton::run`].
//! Other threads interact through an [`AutomatonHandle`], which enqueues
//! commands onto a mailbox guarded by one mutex and a condvar; the executor
//! drains it between scheduler passes.

use crate::channel::{Channel, Packet};
use crate::scheduler::Scheduler;
use crate::script::ScriptEnv;
use crate::state::State;
use crate::transition::Transition;
use crate::value::Variable;
use fsmrt_protocol::Snapshot;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest the executor parks when no timer is pending.
const IDLE_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// A state-entry record kept for monitoring and tests.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    /// Name of the state entered.
    pub state: String,
    /// Input that caused the entry; empty for timeouts.
    pub trigger: String,
}

/// Callback invoked with the new state name on every state change.
pub type SnapshotHook = Box<dyn FnMut(&str) + Send>;

#[derive(Debug)]
enum Command {
    Input { name: String, value: String },
    SetVar { name: String, value: String },
}

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Command>,
    stop: bool,
}

#[derive(Default)]
struct Shared {
    mailbox: Mutex<Mailbox>,
    wakeup: Condvar,
}

/// Cloneable, thread-safe handle onto a running automaton.
///
/// Every call enqueues through the mailbox and wakes the executor; the lock
/// is never held across script evaluation or channel I/O.
#[derive(Clone)]
pub struct AutomatonHandle {
    shared: Arc<Shared>,
}

impl AutomatonHandle {
    /// Queues an input event for the executor.
    pub fn inject_input(&self, name: impl Into<String>, value: impl Into<String>) {
        {
            let mut mailbox = self.shared.mailbox.lock();
            mailbox.queue.push_back(Command::Input {
                name: name.into(),
                value: value.into(),
            });
        }
        self.shared.wakeup.notify_one();
    }

    /// Queues a variable update, coerced to the declared type by the
    /// executor. Unknown variables are silently ignored.
    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        {
            let mut mailbox = self.shared.mailbox.lock();
            mailbox.queue.push_back(Command::SetVar {
                name: name.into(),
                value: value.into(),
            });
        }
        self.shared.wakeup.notify_one();
    }

    /// Asks the executor loop to exit at the next opportunity.
    pub fn request_stop(&self) {
        {
            let mut mailbox = self.shared.mailbox.lock();
            mailbox.stop = true;
        }
        self.shared.wakeup.notify_one();
    }
}

/// Drives a timed Moore-style finite-state machine.
pub struct Automaton {
    states: Vec<State>,
    transitions: Vec<Transition>,
    active: usize,

    variables: HashMap<String, Variable>,
    last_inputs: HashMap<String, String>,
    outputs: HashMap<String, String>,

    scheduler: Scheduler,
    event_log: Vec<EventRecord>,
    seq: u64,

    state_entered_at: Instant,
    state_entered_ms: i64,

    shared: Arc<Shared>,
    channel: Option<Arc<dyn Channel>>,
    snapshot_hook: Option<SnapshotHook>,
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new()
    }
}

impl Automaton {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            transitions: Vec::new(),
            active: 0,
            variables: HashMap::new(),
            last_inputs: HashMap::new(),
            outputs: HashMap::new(),
            scheduler: Scheduler::new(),
            event_log: Vec::new(),
            seq: 0,
            state_entered_at: Instant::now(),
            state_entered_ms: chrono::Utc::now().timestamp_millis(),
            shared: Arc::new(Shared::default()),
            channel: None,
            snapshot_hook: None,
        }
    }

    // =========================================================================
    // Model construction
    // =========================================================================

    /// Registers an internal variable.
    pub fn add_variable(&mut self, var: Variable) {
        self.variables.insert(var.name().to_string(), var);
    }

    /// Appends a state. The first state added, or any state added with
    /// `initial`, becomes the active state; later declarations override
    /// earlier ones.
    pub fn add_state(&mut self, state: State, initial: bool) {
        self.states.push(state);
        if self.states.len() == 1 || initial {
            self.active = self.states.len() - 1;
        }
    }

    /// Appends a transition.
    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    /// Connects the channel snapshots are broadcast through.
    pub fn attach_channel(&mut self, channel: Arc<dyn Channel>) {
        self.channel = Some(channel);
    }

    /// Registers a callback invoked with the new state name on every state
    /// change.
    pub fn set_snapshot_hook(&mut self, hook: SnapshotHook) {
        self.snapshot_hook = Some(hook);
    }

    /// Returns a thread-safe handle for injecting inputs, setting variables
    /// and requesting shutdown.
    pub fn handle(&self) -> AutomatonHandle {
        AutomatonHandle {
            shared: self.shared.clone(),
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Name of the currently active state.
    pub fn current_state(&self) -> &str {
        self.states[self.active].name()
    }

    /// All state-entry events recorded so far.
    pub fn log(&self) -> &[EventRecord] {
        &self.event_log
    }

    /// Last-seen input values since the previous transition.
    pub fn inputs(&self) -> &HashMap<String, String> {
        &self.last_inputs
    }

    /// Current variables.
    pub fn vars(&self) -> &HashMap<String, Variable> {
        &self.variables
    }

    /// Last-written output values.
    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Blocking executor loop; returns after [`AutomatonHandle::request_stop`].
    ///
    /// Inputs injected while a timer fires are handled after that firing and
    /// its entry action complete. Simultaneously expired timers fire in
    /// due-time order with insertion-order tie-breaks.
    pub fn run(&mut self) {
        if self.states.is_empty() {
            tracing::warn!("automaton has no states, nothing to run");
            return;
        }

        self.state_entered_at = Instant::now();
        self.state_entered_ms = chrono::Utc::now().timestamp_millis();

        // The initial state is entered like any other.
        self.run_entry_action();
        self.broadcast_snapshot();

        loop {
            // Arm whatever is eligible right now from the active state.
            self.arm_eligible("");

            // Park until the next timer, a mailbox entry, or stop.
            let timeout = self.scheduler.next_timeout().unwrap_or(IDLE_WAIT);
            {
                let deadline = Instant::now() + timeout;
                let mut mailbox = self.shared.mailbox.lock();
                while !mailbox.stop && mailbox.queue.is_empty() {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    if self
                        .shared
                        .wakeup
                        .wait_for(&mut mailbox, deadline - now)
                        .timed_out()
                    {
                        break;
                    }
                }
                if mailbox.stop {
                    break;
                }
            }

            // Fire expired timers in due-time order.
            let now = Instant::now();
            for idx in self.scheduler.pop_expired(now) {
                if self.fire_transition(idx, "") {
                    self.broadcast_snapshot();
                }
            }

            // Drain queued commands; the lock is never held across script
            // evaluation.
            loop {
                let command = self.shared.mailbox.lock().queue.pop_front();
                let Some(command) = command else { break };
                match command {
                    Command::Input { name, value } => {
                        self.last_inputs.insert(name.clone(), value);
                        self.arm_eligible(&name);
                    }
                    Command::SetVar { name, value } => self.apply_set_variable(&name, &value),
                }
            }
        }
    }

    /// Executes transition `idx`, entering its destination state.
    ///
    /// Returns false for stale timers whose source is no longer active.
    pub fn fire_transition(&mut self, idx: usize, trigger: &str) -> bool {
        let (src, dst) = {
            let t = &self.transitions[idx];
            (t.src(), t.dst())
        };
        if src != self.active {
            return false;
        }

        let old = self.active;
        self.active = dst;
        let entered = self.states[dst].name().to_string();
        self.event_log.push(EventRecord {
            ts: chrono::Utc::now().timestamp_millis(),
            state: entered.clone(),
            trigger: trigger.to_string(),
        });
        if let Some(hook) = self.snapshot_hook.as_mut() {
            hook(&entered);
        }

        // Stale timers from the previous state must not fire.
        let active = self.active;
        let transitions = &self.transitions;
        self.scheduler
            .purge_for_state(active, |i| transitions[i].src());

        if self.active != old {
            self.state_entered_at = Instant::now();
            self.state_entered_ms = chrono::Utc::now().timestamp_millis();
        }

        self.run_entry_action();
        self.last_inputs.clear();
        true
    }

    /// Evaluates every outgoing transition of the active state against
    /// `trigger` and arms the eligible ones. Firing happens only through
    /// the scheduler.
    fn arm_eligible(&mut self, trigger: &str) {
        let mut env = self.script_env();
        for (idx, t) in self.transitions.iter().enumerate() {
            if t.src() != self.active {
                continue;
            }
            match t.is_triggered(trigger, &mut env) {
                Ok(true) => {
                    let delay = t.arm_delay(&self.variables);
                    tracing::debug!(
                        from = t.src(),
                        to = t.dst(),
                        delay_ms = delay.as_millis() as u64,
                        "arming transition"
                    );
                    self.scheduler.arm(idx, delay);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(transition = idx, error = %e, "guard evaluation failed");
                }
            }
        }
    }

    /// Coerces and stores a variable update. Unknown names are ignored.
    fn apply_set_variable(&mut self, name: &str, value: &str) {
        match self.variables.get_mut(name) {
            Some(var) => var.set_from_string(value),
            None => tracing::debug!(name, "ignoring update for unknown variable"),
        }
    }

    /// Runs the active state's entry action and pulls mutations back.
    fn run_entry_action(&mut self) {
        let Some(action) = self.states[self.active].action().cloned() else {
            return;
        };
        let entered = self.states[self.active].name().to_string();

        let mut env = self.script_env();
        if let Err(e) = action.run(&mut env) {
            tracing::warn!(state = %entered, error = %e, "entry action failed");
        }

        // Writes made before a failure still count, like the rest of the
        // action's effects.
        for (name, var) in &mut self.variables {
            if let Some(value) = env.vars().get(name) {
                let coerced = var.declared_type().coerce(value);
                var.set(coerced);
            }
        }
        for (name, value) in env.outputs() {
            self.outputs.insert(name.clone(), value.clone());
        }
    }

    /// Builds the script-visible view of the live maps.
    fn script_env(&self) -> ScriptEnv {
        let vars = self
            .variables
            .iter()
            .map(|(name, var)| (name.clone(), var.value().clone()))
            .collect();
        ScriptEnv::new(vars, self.last_inputs.clone(), self.state_entered_ms)
    }

    /// Sends the current state through the channel, if one is attached.
    fn broadcast_snapshot(&mut self) {
        let Some(channel) = self.channel.clone() else {
            return;
        };

        self.seq += 1;
        let mut snapshot = Snapshot::new(
            self.seq,
            chrono::Utc::now().timestamp_millis(),
            self.states[self.active].name(),
        );
        snapshot.inputs = self
            .last_inputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        snapshot.vars = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.value().to_json()))
            .collect();
        snapshot.outputs = self
            .outputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        match snapshot.encode() {
            Ok(json) => {
                tracing::trace!(%json, "snapshot");
                if !channel.send(&Packet::new(json)) {
                    tracing::warn!("snapshot send failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "snapshot encode failed"),
        }
    }
}
