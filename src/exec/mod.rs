// Execution gateway — remote code evaluation with a two-phase variant.
//
// The gateway owns the protocol, not the evaluation: code goes to the
// host bridge, failures come back as structured outcomes, and nothing the
// evaluated code does can panic across the control-plane boundary.
//
// The two-phase call exists so a caller can compute a value inside the
// host process and react to it there as well, without a network round-trip
// between "compute" and "react".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::host::{Bindings, HostBridge};

/// Placeholder substituted for values that cannot survive JSON transport.
pub const UNSERIALIZABLE_MARKER: &str = "[unserializable]";

/// Depth past which nested structures are truncated to the marker instead
/// of risking a stack overflow during serialization.
const MAX_VALUE_DEPTH: usize = 64;

/// Binding name under which the first-phase value is visible to the
/// reaction phase.
pub const RESULT_BINDING: &str = "result";

/// Structured outcome of one evaluation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecOutcome {
    pub fn ok(value: Value) -> Self {
        Self {
            success: true,
            result: Some(value),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Combined outcome of a compute-then-react call. `reaction` is None when
/// the first phase failed — the reaction never runs against a failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoPhaseOutcome {
    pub result: ExecOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<ExecOutcome>,
}

#[derive(Clone)]
pub struct ExecutionGateway {
    bridge: Arc<dyn HostBridge>,
}

impl ExecutionGateway {
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self { bridge }
    }

    /// Evaluate `code` with an empty binding set.
    pub async fn execute(&self, code: &str) -> ExecOutcome {
        self.evaluate_phase(code, &Bindings::new()).await
    }

    /// Evaluate `code`, then — only on success — evaluate `reaction` with
    /// the first value bound as `result`. A reaction failure is reported on
    /// its own and does not retroactively fail the first phase.
    pub async fn execute_with_reaction(&self, code: &str, reaction: &str) -> TwoPhaseOutcome {
        let first = self.evaluate_phase(code, &Bindings::new()).await;
        if !first.success {
            return TwoPhaseOutcome {
                result: first,
                reaction: None,
            };
        }

        let mut bindings = Bindings::new();
        bindings.insert(
            RESULT_BINDING.to_string(),
            first.result.clone().unwrap_or(Value::Null),
        );
        let second = self.evaluate_phase(reaction, &bindings).await;

        TwoPhaseOutcome {
            result: first,
            reaction: Some(second),
        }
    }

    async fn evaluate_phase(&self, code: &str, bindings: &Bindings) -> ExecOutcome {
        if code.trim().is_empty() {
            return ExecOutcome::failed("no code provided");
        }
        match self.bridge.evaluate(code, bindings).await {
            Ok(value) => ExecOutcome::ok(sanitize(value, 0)),
            Err(err) => {
                tracing::debug!(%err, "Evaluation failed");
                ExecOutcome::failed(err.to_string())
            }
        }
    }
}

/// Replace transport-hostile values with the placeholder marker rather
/// than failing the call: non-finite numbers and absurdly deep nesting.
fn sanitize(value: Value, depth: usize) -> Value {
    if depth > MAX_VALUE_DEPTH {
        return Value::String(UNSERIALIZABLE_MARKER.to_string());
    }
    match value {
        Value::Number(n) => {
            if n.as_f64().map(f64::is_finite).unwrap_or(true) {
                Value::Number(n)
            } else {
                Value::String(UNSERIALIZABLE_MARKER.to_string())
            }
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize(v, depth + 1)))
                .collect(),
        ),
        other => other,
    }
}
