use serde_json::Value;
use waitnotify::testkit::callback::{Invocation, RecordingCallback};

/// Assert the callback ran exactly once and return that call.
pub fn single_invocation(callback: &RecordingCallback) -> Invocation {
    let calls = callback.invocations();
    assert_eq!(calls.len(), 1, "expected one invocation, got {calls:?}");
    calls.into_iter().next().expect("one invocation")
}

/// Assert `call` carried exactly these correlation IDs and payloads.
pub fn assert_payloads(call: &Invocation, expected: &[(&str, Value)]) {
    let actual: Vec<(&str, &Value)> = call
        .responses
        .values()
        .map(|r| (r.correlation_id.as_str(), &r.payload))
        .collect();
    let expected: Vec<(&str, &Value)> = expected.iter().map(|(id, v)| (*id, v)).collect();
    assert_eq!(actual, expected);
}
