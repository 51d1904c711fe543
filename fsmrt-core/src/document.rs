//! FSM document model and JSON persistence.
//!
//! Documents use a JSON DSL:
//!
//! ```json
//! {
//!   "name": "TOF",
//!   "comment": "turn-off delay",
//!   "inputs": ["in"],
//!   "outputs": ["out"],
//!   "variables": [{"name": "timeout", "type": "int", "init": 5000}],
//!   "states": [
//!     {"id": "IDLE", "initial": true},
//!     {"id": "ACTIVE", "onEnter": "output(\"out\", 1)"}
//!   ],
//!   "transitions": [
//!     {"from": "IDLE", "to": "ACTIVE", "trigger": "in", "guard": "valueof(\"in\") == \"1\""},
//!     {"from": "ACTIVE", "to": "IDLE", "delay_ms": "timeout"}
//!   ]
//! }
//! ```
//!
//! `delay_ms` is polymorphic: an integer is a fixed delay in milliseconds, a
//! string names a variable to read when the transition is armed, and null or
//! absent means the transition fires on the next scheduler pass.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;

/// Description of an internal variable.
///
/// The type tag stays a raw string so documents round-trip losslessly; it is
/// resolved to a [`crate::value::VarType`] only when an automaton is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDesc {
    pub name: String,

    #[serde(rename = "type")]
    pub var_type: String,

    /// Initial value, preserved as the JSON literal.
    pub init: JsonValue,
}

/// Description of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDesc {
    pub id: String,

    /// True for the start state. At most one state should set this; the
    /// last one wins.
    #[serde(default, skip_serializing_if = "is_false")]
    pub initial: bool,

    /// Source of the entry action ("" = none).
    #[serde(rename = "onEnter", default, skip_serializing_if = "String::is_empty")]
    pub on_enter: String,
}

/// Description of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDesc {
    pub from: String,
    pub to: String,

    /// Input event name ("" = unconditional).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trigger: String,

    /// Guard expression ("" = always true).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guard: String,

    /// Delay before firing; absent or null means immediate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<DelaySpec>,
}

/// Polymorphic `delay_ms` field: milliseconds or a variable name.
///
/// Any other JSON type fails deserialisation, which surfaces as a schema
/// error on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelaySpec {
    Fixed(u32),
    Variable(String),
}

/// In-memory representation of one FSM document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmDocument {
    /// Automaton name. The legacy top-level key `id` is accepted on load.
    #[serde(alias = "id")]
    pub name: String,

    #[serde(default)]
    pub comment: String,

    /// Declared input names.
    pub inputs: Vec<String>,

    /// Declared output names.
    pub outputs: Vec<String>,

    pub variables: Vec<VariableDesc>,
    pub states: Vec<StateDesc>,
    pub transitions: Vec<TransitionDesc>,
}

/// A non-fatal finding from document validation.
///
/// Warnings never prevent execution; loading reports at most the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    GuardWithoutTrigger {
        from: String,
        to: String,
    },
    UnknownTrigger {
        trigger: String,
        from: String,
        to: String,
        inputs: Vec<String>,
    },
    UnknownSymbol {
        symbol: String,
        from: String,
        to: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::GuardWithoutTrigger { from, to } => {
                write!(f, "Transition `{from}`\u{2192}`{to}` has a guard but no trigger.")
            }
            LoadWarning::UnknownTrigger {
                trigger,
                from,
                to,
                inputs,
            } => {
                write!(
                    f,
                    "Unknown trigger `{trigger}` in transition `{from}`\u{2192}`{to}`; \
                     must be one of: {inputs:?}"
                )
            }
            LoadWarning::UnknownSymbol { symbol, from, to } => {
                write!(
                    f,
                    "Guard in transition `{from}`\u{2192}`{to}` references unknown \
                     symbol `{symbol}`"
                )
            }
        }
    }
}

impl FsmDocument {
    /// Loads a document from disk.
    ///
    /// I/O failures, JSON parse failures and schema mismatches are hard
    /// errors. Validation findings are returned alongside the document and
    /// never prevent the load.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Option<LoadWarning>), CoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parses a document from its JSON text.
    pub fn from_json_str(text: &str) -> Result<(Self, Option<LoadWarning>), CoreError> {
        let doc: FsmDocument = serde_json::from_str(text)?;
        let warning = doc.validate();
        Ok((doc, warning))
    }

    /// Runs the static sanity checks and returns the first finding.
    ///
    /// Checked per transition, in declaration order:
    /// 1. a guard without a trigger,
    /// 2. a trigger not listed in the declared inputs,
    /// 3. a `valueof("X")` guard reference to an unknown symbol.
    pub fn validate(&self) -> Option<LoadWarning> {
        let value_of = Regex::new(r#"valueof\("([^"]+)"\)"#).unwrap();

        let is_input = |name: &str| self.inputs.iter().any(|i| i == name);
        let is_symbol =
            |name: &str| is_input(name) || self.variables.iter().any(|v| v.name == name);

        for t in &self.transitions {
            if !t.guard.is_empty() && t.trigger.is_empty() {
                return Some(LoadWarning::GuardWithoutTrigger {
                    from: t.from.clone(),
                    to: t.to.clone(),
                });
            }

            if !t.trigger.is_empty() && !is_input(&t.trigger) {
                return Some(LoadWarning::UnknownTrigger {
                    trigger: t.trigger.clone(),
                    from: t.from.clone(),
                    to: t.to.clone(),
                    inputs: self.inputs.clone(),
                });
            }

            if let Some(captures) = value_of.captures(&t.guard) {
                let symbol = &captures[1];
                if !is_symbol(symbol) {
                    return Some(LoadWarning::UnknownSymbol {
                        symbol: symbol.to_string(),
                        from: t.from.clone(),
                        to: t.to.clone(),
                    });
                }
            }
        }

        None
    }

    /// Saves the document, pretty-printed with 4-space indentation when
    /// `pretty` is set.
    pub fn save(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), CoreError> {
        std::fs::write(path, self.to_json_string(pretty)?)?;
        Ok(())
    }

    /// Serialises the document, eliding default fields.
    pub fn to_json_string(&self, pretty: bool) -> Result<String, CoreError> {
        let mut out = if pretty {
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            self.serialize(&mut ser)?;
            String::from_utf8(buf).expect("serde_json emits UTF-8")
        } else {
            serde_json::to_string(self)?
        };
        out.push('\n');
        Ok(out)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tof_json() -> String {
        json!({
            "name": "TOF",
            "comment": "turn-off delay",
            "inputs": ["in"],
            "outputs": ["out"],
            "variables": [{"name": "timeout", "type": "int", "init": 5000}],
            "states": [
                {"id": "IDLE", "initial": true},
                {"id": "ACTIVE"},
                {"id": "TIMING"}
            ],
            "transitions": [
                {"from": "IDLE", "to": "ACTIVE", "trigger": "in", "guard": "valueof(\"in\") == \"1\""},
                {"from": "ACTIVE", "to": "TIMING", "trigger": "in", "guard": "valueof(\"in\") == \"0\""},
                {"from": "TIMING", "to": "ACTIVE", "trigger": "in", "guard": "valueof(\"in\") == \"1\""},
                {"from": "TIMING", "to": "IDLE", "delay_ms": "timeout"}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_document() {
        let (doc, warning) = FsmDocument::from_json_str(&tof_json()).unwrap();
        assert!(warning.is_none());
        assert_eq!(doc.name, "TOF");
        assert_eq!(doc.inputs, vec!["in"]);
        assert_eq!(doc.states.len(), 3);
        assert!(doc.states[0].initial);
        assert_eq!(doc.transitions.len(), 4);
        assert_eq!(
            doc.transitions[3].delay_ms,
            Some(DelaySpec::Variable("timeout".to_string()))
        );
        assert_eq!(doc.transitions[0].delay_ms, None);
    }

    #[test]
    fn test_legacy_id_key() {
        let (doc, _) = FsmDocument::from_json_str(
            r#"{"id":"legacy","inputs":[],"outputs":[],"variables":[],"states":[],"transitions":[]}"#,
        )
        .unwrap();
        assert_eq!(doc.name, "legacy");
    }

    #[test]
    fn test_delay_spec_variants() {
        let fixed: TransitionDesc =
            serde_json::from_str(r#"{"from":"A","to":"B","delay_ms":250}"#).unwrap();
        assert_eq!(fixed.delay_ms, Some(DelaySpec::Fixed(250)));

        let var: TransitionDesc =
            serde_json::from_str(r#"{"from":"A","to":"B","delay_ms":"t"}"#).unwrap();
        assert_eq!(var.delay_ms, Some(DelaySpec::Variable("t".to_string())));

        let null: TransitionDesc =
            serde_json::from_str(r#"{"from":"A","to":"B","delay_ms":null}"#).unwrap();
        assert_eq!(null.delay_ms, None);

        // Any other JSON type is a schema error.
        let bad = serde_json::from_str::<TransitionDesc>(r#"{"from":"A","to":"B","delay_ms":true}"#);
        assert!(bad.is_err());
        let bad = serde_json::from_str::<TransitionDesc>(r#"{"from":"A","to":"B","delay_ms":1.5}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_warning_guard_without_trigger() {
        let (_, warning) = FsmDocument::from_json_str(
            r#"{"name":"w","inputs":["in"],"outputs":[],"variables":[],
                "states":[{"id":"A"},{"id":"B"}],
                "transitions":[{"from":"A","to":"B","guard":"1 == 1"}]}"#,
        )
        .unwrap();
        assert_eq!(
            warning,
            Some(LoadWarning::GuardWithoutTrigger {
                from: "A".to_string(),
                to: "B".to_string()
            })
        );
    }

    #[test]
    fn test_warning_unknown_trigger() {
        let (doc, warning) = FsmDocument::from_json_str(
            r#"{"name":"w","inputs":["in"],"outputs":[],"variables":[],
                "states":[{"id":"A"},{"id":"B"}],
                "transitions":[{"from":"A","to":"B","trigger":"foo"}]}"#,
        )
        .unwrap();
        let warning = warning.unwrap();
        assert!(warning
            .to_string()
            .starts_with("Unknown trigger `foo` in transition `A`\u{2192}`B`"));
        // The load still succeeded.
        assert_eq!(doc.transitions.len(), 1);
    }

    #[test]
    fn test_warning_unknown_symbol() {
        let (_, warning) = FsmDocument::from_json_str(
            r#"{"name":"w","inputs":["in"],"outputs":[],"variables":[],
                "states":[{"id":"A"},{"id":"B"}],
                "transitions":[{"from":"A","to":"B","trigger":"in","guard":"valueof(\"ghost\") == \"1\""}]}"#,
        )
        .unwrap();
        assert_eq!(
            warning,
            Some(LoadWarning::UnknownSymbol {
                symbol: "ghost".to_string(),
                from: "A".to_string(),
                to: "B".to_string()
            })
        );
    }

    #[test]
    fn test_only_first_warning_is_reported() {
        let (_, warning) = FsmDocument::from_json_str(
            r#"{"name":"w","inputs":[],"outputs":[],"variables":[],
                "states":[{"id":"A"},{"id":"B"}],
                "transitions":[
                    {"from":"A","to":"B","trigger":"foo"},
                    {"from":"B","to":"A","trigger":"bar"}
                ]}"#,
        )
        .unwrap();
        assert!(matches!(
            warning,
            Some(LoadWarning::UnknownTrigger { ref trigger, .. }) if trigger == "foo"
        ));
    }

    #[test]
    fn test_valueof_against_variables_is_clean() {
        let (_, warning) = FsmDocument::from_json_str(
            r#"{"name":"w","inputs":["tick"],"outputs":[],
                "variables":[{"name":"limit","type":"int","init":3}],
                "states":[{"id":"A"},{"id":"B"}],
                "transitions":[{"from":"A","to":"B","trigger":"tick","guard":"valueof(\"limit\") == \"3\""}]}"#,
        )
        .unwrap();
        assert!(warning.is_none());
    }

    #[test]
    fn test_schema_error_is_hard() {
        let result = FsmDocument::from_json_str(r#"{"name":"x","inputs":"oops"}"#);
        assert!(result.is_err());

        let result = FsmDocument::from_json_str("{not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tof.fsm.json");

        let (doc, _) = FsmDocument::from_json_str(&tof_json()).unwrap();
        doc.save(&path, true).unwrap();

        let (reloaded, warning) = FsmDocument::load(&path).unwrap();
        assert!(warning.is_none());
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_canonical_save_is_stable() {
        let (doc, _) = FsmDocument::from_json_str(&tof_json()).unwrap();
        let first = doc.to_json_string(true).unwrap();
        let (reparsed, _) = FsmDocument::from_json_str(&first).unwrap();
        let second = reparsed.to_json_string(true).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with('\n'));
        // Defaults are elided.
        assert!(!first.contains("\"initial\": false"));
        assert!(!first.contains("\"delay_ms\": null"));
    }

    #[test]
    fn test_warned_document_roundtrips_unchanged() {
        let text = r#"{"name":"w","inputs":[],"outputs":[],"variables":[],
            "states":[{"id":"A"},{"id":"B"}],
            "transitions":[{"from":"A","to":"B","trigger":"foo"}]}"#;
        let (doc, warning) = FsmDocument::from_json_str(text).unwrap();
        assert!(warning.is_some());

        let saved = doc.to_json_string(false).unwrap();
        let (reloaded, warning_again) = FsmDocument::from_json_str(&saved).unwrap();
        assert_eq!(reloaded, doc);
        assert_eq!(warning_again, warning);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = FsmDocument::load("/nonexistent/no.fsm.json");
        assert!(matches!(result, Err(crate::error::CoreError::Io(_))));
    }
}
