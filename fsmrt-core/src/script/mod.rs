//! Guard and action scripting.
//!
//! Guards are boolean expressions deciding whether an edge is eligible;
//! entry actions are small statement programs run when a state is entered.
//! Both compile once into an AST and evaluate against a [`ScriptEnv`] view
//! of the automaton's variables, inputs and outputs.
//!
//! Every script sees the declared variables as plain identifiers (so actions
//! read `x = x + 1`), inputs as string-valued identifiers, and the helpers
//! `valueof`, `defined`, `atoi`, `elapsed` and `output`.
//!
//! Compilation failures are fatal at build time. Evaluation failures are
//! recoverable: a failing guard counts as "not triggered" and a failing
//! action leaves the state change in effect; both are logged by the caller.

mod eval;
mod parse;

pub use eval::ScriptEnv;

use crate::error::CoreError;
use parse::{Block, Expr};
use std::collections::HashMap;
use std::sync::Arc;

/// A compiled, reusable guard predicate.
#[derive(Debug, Clone)]
pub struct CompiledGuard {
    source: String,
    expr: Arc<Expr>,
}

impl CompiledGuard {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the guard; the truthiness of the result decides
    /// eligibility.
    pub fn evaluate(&self, env: &mut ScriptEnv) -> Result<bool, CoreError> {
        Ok(eval::eval_expr(&self.expr, env)?.is_truthy())
    }
}

/// A compiled entry-action program.
#[derive(Debug, Clone)]
pub struct CompiledAction {
    source: String,
    block: Arc<Block>,
}

impl CompiledAction {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs the action, accumulating variable and output writes in `env`.
    pub fn run(&self, env: &mut ScriptEnv) -> Result<(), CoreError> {
        eval::run_block(&self.block, env)
    }
}

/// Compiles guards and actions, caching programs by their source text.
///
/// The cache is content-addressed: compiling the same source twice hands out
/// the same parsed program. The host is owned by whoever builds automatons
/// and passed explicitly; there is no process-wide engine.
#[derive(Debug, Default)]
pub struct ScriptHost {
    guards: HashMap<String, Arc<Expr>>,
    actions: HashMap<String, Arc<Block>>,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a guard expression, reusing a cached parse when available.
    pub fn compile_guard(&mut self, source: &str) -> Result<CompiledGuard, CoreError> {
        if let Some(expr) = self.guards.get(source) {
            return Ok(CompiledGuard {
                source: source.to_string(),
                expr: expr.clone(),
            });
        }
        let expr = Arc::new(parse::parse_guard(source)?);
        self.guards.insert(source.to_string(), expr.clone());
        Ok(CompiledGuard {
            source: source.to_string(),
            expr,
        })
    }

    /// Compiles an action program, reusing a cached parse when available.
    pub fn compile_action(&mut self, source: &str) -> Result<CompiledAction, CoreError> {
        if let Some(block) = self.actions.get(source) {
            return Ok(CompiledAction {
                source: source.to_string(),
                block: block.clone(),
            });
        }
        let block = Arc::new(parse::parse_action(source)?);
        self.actions.insert(source.to_string(), block.clone());
        Ok(CompiledAction {
            source: source.to_string(),
            block,
        })
    }
}
