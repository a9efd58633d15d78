//! Routing of user-triggered actions.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::connection::{ConnectionManager, Link};
use crate::pages::PageStore;
use crate::protocol::exec_envelope;

pub const NAVIGATE_ACTION: &str = "navigate";
pub const HAPTIC_PULSE: Duration = Duration::from_millis(50);

/// Where an action goes once the user triggers it.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRoute {
    /// Handled by the page store, never sent.
    Navigate(String),
    /// Forwarded to the backend inside an `exec` message, untouched.
    Remote(Value),
}

/// Navigation actions look like `{"type":"navigate","target":"<page>"}`.
/// Everything else, including a navigate action without a string target,
/// belongs to the backend.
pub fn classify(action: Value) -> ActionRoute {
    let target = (action.get("type").and_then(Value::as_str) == Some(NAVIGATE_ACTION))
        .then(|| action.get("target").and_then(Value::as_str))
        .flatten()
        .map(str::to_string);

    match target {
        Some(page) => ActionRoute::Navigate(page),
        None => ActionRoute::Remote(action),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Navigated,
    Sent,
    /// The channel was not open; the action is gone.
    Dropped,
}

/// Runs one user action. Navigation never touches the channel; everything
/// else becomes an `exec` message and buzzes the device once written.
pub fn dispatch<L: Link>(
    action: Value,
    store: &mut PageStore,
    connection: &mut ConnectionManager<L>,
    haptics: &mut dyn Haptics,
) -> Dispatched {
    match classify(action) {
        ActionRoute::Navigate(page) => {
            store.navigate(&page);
            Dispatched::Navigated
        }
        ActionRoute::Remote(action) => {
            if connection.send(&exec_envelope(action)) {
                haptics.pulse(HAPTIC_PULSE);
                Dispatched::Sent
            } else {
                debug!("action dropped while disconnected");
                Dispatched::Dropped
            }
        }
    }
}

/// Vibration motor of the device, if it has one.
pub trait Haptics {
    fn pulse(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&mut self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingHaptics, RecordingLink};
    use serde_json::json;

    #[test]
    fn navigate_actions_stay_local() {
        assert_eq!(
            classify(json!({"type": "navigate", "target": "obs"})),
            ActionRoute::Navigate("obs".to_string())
        );
    }

    #[test]
    fn other_actions_are_remote_and_opaque() {
        let action = json!({"type": "spotify", "cmd": "dislike", "track_id": "t1"});
        assert_eq!(classify(action.clone()), ActionRoute::Remote(action));

        let action = json!({"type": "system", "cmd": "volume", "val": 30});
        assert_eq!(classify(action.clone()), ActionRoute::Remote(action));
    }

    #[test]
    fn navigate_without_target_is_forwarded() {
        let action = json!({"type": "navigate", "target": 7});
        assert_eq!(classify(action.clone()), ActionRoute::Remote(action));
    }

    #[test]
    fn dispatch_navigates_without_sending() {
        let mut store = PageStore::new();
        let mut connection = ConnectionManager::new(RecordingLink::default());
        connection.on_open();
        let mut haptics = CountingHaptics::default();

        let outcome = dispatch(
            json!({"type": "navigate", "target": "obs"}),
            &mut store,
            &mut connection,
            &mut haptics,
        );

        assert_eq!(outcome, Dispatched::Navigated);
        assert_eq!(store.current_page(), "obs");
        assert!(connection.link().sent.is_empty());
        assert!(haptics.pulses.is_empty());
    }

    #[test]
    fn dispatch_sends_exec_and_pulses() {
        let mut store = PageStore::new();
        let mut connection = ConnectionManager::new(RecordingLink::default());
        connection.on_open();
        let mut haptics = CountingHaptics::default();

        let outcome = dispatch(
            json!({"type": "spotify", "cmd": "toggle_play"}),
            &mut store,
            &mut connection,
            &mut haptics,
        );

        assert_eq!(outcome, Dispatched::Sent);
        assert_eq!(haptics.pulses, vec![HAPTIC_PULSE]);
        assert_eq!(
            connection.link().sent_json(),
            vec![json!({"type": "exec", "action": {"type": "spotify", "cmd": "toggle_play"}})]
        );
    }

    #[test]
    fn dispatch_while_closed_is_silent() {
        let mut store = PageStore::new();
        let mut connection = ConnectionManager::new(RecordingLink::default());
        connection.on_close();
        let mut haptics = CountingHaptics::default();

        let outcome = dispatch(
            json!({"type": "system", "cmd": "lock"}),
            &mut store,
            &mut connection,
            &mut haptics,
        );

        assert_eq!(outcome, Dispatched::Dropped);
        assert!(haptics.pulses.is_empty());
        assert_eq!(store.current_page(), "home");
    }
}
