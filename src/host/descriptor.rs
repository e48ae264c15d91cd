//! JSON descriptors for shipping policy lists across the host adapter.

use serde::Serialize;
use serde_json::{Value, json};

use crate::policy::{KeyboardPolicy, PointerPolicy, PolicyKind, PropagationMode};

#[derive(Serialize)]
struct PolicyListDescriptor<'a, P: Serialize> {
    kind: PolicyKind,
    policies: &'a [P],
}

pub fn keyboard(policies: &[KeyboardPolicy]) -> Result<Value, serde_json::Error> {
    serde_json::to_value(PolicyListDescriptor {
        kind: PolicyKind::Keyboard,
        policies,
    })
}

pub fn pointer(policies: &[PointerPolicy]) -> Result<Value, serde_json::Error> {
    serde_json::to_value(PolicyListDescriptor {
        kind: PolicyKind::Pointer,
        policies,
    })
}

pub fn mode(kind: PolicyKind, mode: PropagationMode) -> Value {
    json!({ "kind": kind, "defaultMode": mode })
}
