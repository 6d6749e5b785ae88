//! Shared agent state and the store that serializes every mutation of it

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::message::unix_timestamp;

/// Agent status shown to every client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Processing,
    Streaming,
    Complete,
    Error,
}

/// Kind of UI change an action describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Render,
}

/// One immutable unit of work output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Unix time in seconds
    pub timestamp: f64,
    #[serde(rename = "componentType", default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Action {
    /// Create an action with a fresh id, stamped now
    pub fn new(kind: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            timestamp: unix_timestamp(),
            component_type: None,
            props: None,
            content: None,
            metadata: None,
        }
    }

    pub fn with_component(mut self, component_type: impl Into<String>) -> Self {
        self.component_type = Some(component_type.into());
        self
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = Some(props);
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The single process-wide object synchronized to clients.
///
/// `error` is present exactly when `status` is [`Status::Error`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    #[serde(default)]
    pub actions: Vec<Action>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SharedState {
    /// Mark work as started, keeping accumulated actions
    pub fn processing(self) -> Self {
        Self {
            status: Status::Processing,
            error: None,
            ..self
        }
    }

    /// Append a finished action and mark the request complete
    pub fn completed_with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self.status = Status::Complete;
        self.error = None;
        self
    }

    /// Record a failed request
    pub fn failed(self, description: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            error: Some(description.into()),
            ..self
        }
    }

    /// Restore the `error` <=> `status == Error` invariant
    fn normalized(mut self) -> Self {
        match self.status {
            Status::Error => {
                if self.error.as_deref().map_or(true, str::is_empty) {
                    self.error = Some("Unknown error".to_string());
                }
            }
            _ => self.error = None,
        }
        self
    }
}

/// Owner of the shared state.
///
/// Transitions run one at a time in arrival order; the tokio mutex queues
/// waiters fairly, so no two transition functions ever overlap.
pub struct StateStore {
    state: Mutex<SharedState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_state(SharedState::default())
    }

    pub fn with_state(state: SharedState) -> Self {
        Self {
            state: Mutex::new(state.normalized()),
        }
    }

    /// Consistent snapshot of the current state
    pub async fn read(&self) -> SharedState {
        self.state.lock().await.clone()
    }

    /// Hand the current state to `publish` without letting a transition
    /// slip in between the read and the delivery
    pub async fn read_then<P, Fut>(&self, publish: P) -> SharedState
    where
        P: FnOnce(SharedState) -> Fut,
        Fut: Future<Output = ()>,
    {
        let guard = self.state.lock().await;
        let current = guard.clone();
        publish(current.clone()).await;
        current
    }

    /// Apply `f` under mutual exclusion and return the new state
    pub async fn transition<F>(&self, f: F) -> SharedState
    where
        F: FnOnce(SharedState) -> SharedState,
    {
        self.transition_then(f, |_| async {}).await
    }

    /// Apply `f`, then run `publish` on the result before the next
    /// transition may start.
    ///
    /// Publishing under the lock keeps every client's view in transition
    /// order. `publish` must only enqueue; a blocking send stalls all
    /// other transitions.
    pub async fn transition_then<F, P, Fut>(&self, f: F, publish: P) -> SharedState
    where
        F: FnOnce(SharedState) -> SharedState,
        P: FnOnce(SharedState) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut guard = self.state.lock().await;
        let next = f(guard.clone()).normalized();
        *guard = next.clone();
        publish(next.clone()).await;
        next
    }

    /// Replace state with an idle, empty one
    pub async fn reset(&self) -> SharedState {
        self.reset_then(|_| async {}).await
    }

    /// Reset, then run `publish` on the idle state while still exclusive
    pub async fn reset_then<P, Fut>(&self, publish: P) -> SharedState
    where
        P: FnOnce(SharedState) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut guard = self.state.lock().await;
        *guard = SharedState::default();
        let next = guard.clone();
        publish(next.clone()).await;
        next
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_state_serializes_without_absent_fields() {
        let value = serde_json::to_value(SharedState::default()).unwrap();
        assert_eq!(value, json!({"actions": [], "status": "idle"}));
    }

    #[test]
    fn test_action_uses_wire_field_names() {
        let action = Action::new(ActionKind::Render).with_component("card");
        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["type"], "render");
        assert_eq!(value["componentType"], "card");
        assert!(value.get("props").is_none());
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_action_ids_are_unique() {
        let first = Action::new(ActionKind::Create);
        let second = Action::new(ActionKind::Create);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_helpers_keep_error_invariant() {
        let failed = SharedState::default().failed("boom");
        assert_eq!(failed.status, Status::Error);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let recovered = failed.processing();
        assert_eq!(recovered.status, Status::Processing);
        assert!(recovered.error.is_none());
    }

    #[tokio::test]
    async fn test_transition_is_visible_to_read() {
        let store = StateStore::new();
        let action = Action::new(ActionKind::Render);

        let next = store
            .transition(|s| s.completed_with(action.clone()))
            .await;

        assert_eq!(next.status, Status::Complete);
        assert_eq!(store.read().await, next);
        assert_eq!(store.read().await.actions, vec![action]);
    }

    #[tokio::test]
    async fn test_transition_normalizes_invariant_violations() {
        let store = StateStore::new();

        let next = store
            .transition(|mut s| {
                s.status = Status::Complete;
                s.error = Some("stale".to_string());
                s
            })
            .await;
        assert!(next.error.is_none());

        let next = store
            .transition(|mut s| {
                s.status = Status::Error;
                s
            })
            .await;
        assert!(next.error.is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_actions_and_status() {
        let store = StateStore::new();
        store
            .transition(|s| s.completed_with(Action::new(ActionKind::Create)))
            .await;
        store.transition(|s| s.failed("nope")).await;

        let state = store.reset().await;
        assert_eq!(state, SharedState::default());
        assert_eq!(store.read().await, SharedState::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_published_states_follow_transition_order() {
        let store = Arc::new(StateStore::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                store
                    .transition_then(
                        |s| s.completed_with(Action::new(ActionKind::Create)),
                        |next| async move {
                            tokio::task::yield_now().await;
                            let _ = tx.send(next.actions.len());
                        },
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        drop(tx);

        let mut published = Vec::new();
        while let Some(len) = rx.recv().await {
            published.push(len);
        }
        assert_eq!(published, (1..=16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_reset_then_publishes_idle_state() {
        let store = StateStore::new();
        store.transition(|s| s.failed("nope")).await;

        let mut seen = None;
        store
            .reset_then(|state| {
                seen = Some(state);
                async {}
            })
            .await;
        assert_eq!(seen, Some(SharedState::default()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_never_overlap() {
        let store = Arc::new(StateStore::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let in_flight = in_flight.clone();
            let overlaps = overlaps.clone();
            handles.push(tokio::spawn(async move {
                store
                    .transition(|s| {
                        if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        std::thread::sleep(std::time::Duration::from_millis(1));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        s.completed_with(Action::new(ActionKind::Update))
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(store.read().await.actions.len(), 32);
    }
}
