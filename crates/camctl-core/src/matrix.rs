//! Video matrix cross-point mappings, switch planning and rule evaluation.
//!
//! # What is a cross-point? (for beginners)
//!
//! A video matrix has numbered input ports (sources) and output ports
//! (destinations).  Every output shows exactly one input at a time; one input
//! may feed many outputs.  A *cross-point* is one `input → output`
//! connection, and a *mapping* is the full set of them.
//!
//! Switching is expensive (outputs blank for a moment), so the reconciler
//! only sends switch commands for outputs that are not already showing the
//! desired input.  [`plan_switches`] computes that difference.
//!
//! Wire format (MT-VIKI HTTP API): every request is a GET with a single
//! `matrixdata` query parameter holding compact JSON:
//! ```text
//! {"COMMAND":"SW <input> <output1> <output2>..."}   switch
//! {"COMMAND":"GETSWS"}                              read mapping
//! ```
//! The read response is `{"SWS":"<input for output 1> <input for output 2> ..."}`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use thiserror::Error;

use crate::scene::{SceneId, SceneOverrides};

/// Physical port number on the matrix.  Port numbers start at 1.
pub type Port = u16;

/// Errors raised by matrix operations.
#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("Video matrix device settings are not present.")]
    Disabled,

    #[error("Error: Destination channels list is empty.")]
    EmptyDestination,

    #[error("Error: Source or destination channel out of range.")]
    ChannelOutOfRange,

    #[error("Error: Unknown matrix macro '{0}'.")]
    UnknownMacro(String),

    #[error("malformed matrix response: {0}")]
    MalformedResponse(String),

    #[error("Matrix request failed: {0}")]
    Transport(String),
}

// ── Mapping ───────────────────────────────────────────────────────────────────

/// Set of cross-points: input port → output ports it feeds.
///
/// An output appears under at most one input.  [`MatrixMapping::route`]
/// maintains that by detaching outputs from their previous input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixMapping {
    routes: BTreeMap<Port, BTreeSet<Port>>,
}

impl MatrixMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from `(input, outputs)` pairs, applied in order.
    pub fn from_routes<I, O>(routes: I) -> Self
    where
        I: IntoIterator<Item = (Port, O)>,
        O: IntoIterator<Item = Port>,
    {
        let mut mapping = Self::new();
        for (input, outputs) in routes {
            mapping.route(input, outputs);
        }
        mapping
    }

    /// Connects `outputs` to `input`, detaching them from any other input.
    pub fn route(&mut self, input: Port, outputs: impl IntoIterator<Item = Port>) {
        for output in outputs {
            for (other, targets) in self.routes.iter_mut() {
                if *other != input {
                    targets.remove(&output);
                }
            }
            self.routes.entry(input).or_default().insert(output);
        }
        self.routes.retain(|_, targets| !targets.is_empty());
    }

    /// Outputs currently fed by `input`.
    pub fn outputs_of(&self, input: Port) -> Option<&BTreeSet<Port>> {
        self.routes.get(&input)
    }

    /// Input currently feeding `output`.
    pub fn input_of(&self, output: Port) -> Option<Port> {
        self.routes
            .iter()
            .find(|(_, targets)| targets.contains(&output))
            .map(|(input, _)| *input)
    }

    pub fn is_routed(&self, input: Port, output: Port) -> bool {
        self.outputs_of(input)
            .map_or(false, |targets| targets.contains(&output))
    }

    pub fn routes(&self) -> impl Iterator<Item = (Port, &BTreeSet<Port>)> {
        self.routes.iter().map(|(input, targets)| (*input, targets))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Applies every command in `switches` on top of this mapping.
    pub fn apply(&mut self, switches: &[SwitchCommand]) {
        for switch in switches {
            self.route(switch.input, switch.outputs.iter().copied());
        }
    }
}

// ── Switch planning ───────────────────────────────────────────────────────────

/// One `SW` command: connect `outputs` to `input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    pub input: Port,
    pub outputs: Vec<Port>,
}

impl SwitchCommand {
    /// Creates a command, rejecting an empty output list.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::EmptyDestination`] if `outputs` is empty.
    pub fn new(input: Port, outputs: Vec<Port>) -> Result<Self, MatrixError> {
        if outputs.is_empty() {
            return Err(MatrixError::EmptyDestination);
        }
        Ok(Self { input, outputs })
    }

    /// The device command string, e.g. `"SW 9 4 7"`.
    pub fn command_string(&self) -> String {
        let mut command = format!("SW {}", self.input);
        for output in &self.outputs {
            command.push(' ');
            command.push_str(&output.to_string());
        }
        command
    }
}

/// Computes the switch commands that move `current` to `desired`.
///
/// For every input in `desired`, only outputs not already fed by that input
/// are switched.  Inputs whose outputs are all in place produce no command.
/// With `current == None` (the read failed) every desired pair is switched.
///
/// Commands are ordered by input port; outputs are in ascending order.
pub fn plan_switches(
    current: Option<&MatrixMapping>,
    desired: &MatrixMapping,
) -> Vec<SwitchCommand> {
    desired
        .routes()
        .filter_map(|(input, wanted)| {
            let missing: Vec<Port> = match current.and_then(|c| c.outputs_of(input)) {
                Some(existing) => wanted.difference(existing).copied().collect(),
                None => wanted.iter().copied().collect(),
            };
            (!missing.is_empty()).then(|| SwitchCommand {
                input,
                outputs: missing,
            })
        })
        .collect()
}

// ── Wire format ───────────────────────────────────────────────────────────────

/// Value of the `matrixdata` query parameter for a switch.
pub fn switch_request(command: &SwitchCommand) -> String {
    serde_json::json!({ "COMMAND": command.command_string() }).to_string()
}

/// Value of the `matrixdata` query parameter for reading the mapping.
pub fn read_request() -> String {
    serde_json::json!({ "COMMAND": "GETSWS" }).to_string()
}

#[derive(Deserialize)]
struct ReadResponse {
    #[serde(rename = "SWS")]
    sws: String,
}

/// Parses the body of a `GETSWS` response into a mapping.
///
/// The `n`-th number is the input feeding output `n` (1-based).  Input `0`
/// means the output is not connected.
///
/// # Errors
///
/// Returns [`MatrixError::MalformedResponse`] if the body is not the expected
/// JSON object or contains a non-numeric port.
pub fn parse_read_response(body: &str) -> Result<MatrixMapping, MatrixError> {
    let response: ReadResponse = serde_json::from_str(body)
        .map_err(|e| MatrixError::MalformedResponse(e.to_string()))?;

    let mut mapping = MatrixMapping::new();
    for (index, token) in response.sws.split_whitespace().enumerate() {
        let input: Port = token
            .parse()
            .map_err(|_| MatrixError::MalformedResponse(format!("invalid input port '{token}'")))?;
        if input == 0 {
            continue;
        }
        let output = Port::try_from(index + 1)
            .map_err(|_| MatrixError::MalformedResponse("too many outputs".to_string()))?;
        mapping.route(input, [output]);
    }
    Ok(mapping)
}

// ── Rules ─────────────────────────────────────────────────────────────────────

/// Cross-point that must be present for a rule to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteCondition {
    pub input: Port,
    pub output: Port,
}

/// What a rule does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    /// Sets scene-name overrides; later entries win.
    AddOverrides(Vec<(SceneId, String)>),
    /// Removes every override.
    ClearOverrides,
}

/// Condition → actions entry evaluated after every mapping change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRule {
    /// `None` fires on every change.
    pub when: Option<RouteCondition>,
    pub actions: Vec<RuleAction>,
}

impl MatrixRule {
    pub fn matches(&self, mapping: &MatrixMapping) -> bool {
        self.when
            .map_or(true, |condition| mapping.is_routed(condition.input, condition.output))
    }
}

/// Actions of every rule satisfied by `mapping`, in declaration order.
pub fn fire_rules(rules: &[MatrixRule], mapping: &MatrixMapping) -> Vec<RuleAction> {
    rules
        .iter()
        .filter(|rule| rule.matches(mapping))
        .flat_map(|rule| rule.actions.iter().cloned())
        .collect()
}

/// Applies fired actions to `overrides` in order.
pub fn apply_rule_actions(actions: &[RuleAction], overrides: &mut SceneOverrides) {
    for action in actions {
        match action {
            RuleAction::AddOverrides(entries) => {
                for (id, name) in entries {
                    overrides.set(*id, name.clone());
                }
            }
            RuleAction::ClearOverrides => overrides.clear(),
        }
    }
}

/// Fires every rule satisfied by `mapping` directly into `overrides`.
///
/// Returns the number of rules that fired.
pub fn apply_rules(rules: &[MatrixRule], mapping: &MatrixMapping, overrides: &mut SceneOverrides) -> usize {
    let fired = rules.iter().filter(|rule| rule.matches(mapping)).count();
    apply_rule_actions(&fire_rules(rules, mapping), overrides);
    fired
}
