//! Transient status notifications with timed dismissal.
//!
//! Each [`Notifier`] owns its visible notification and the pending dismissal
//! task. A new notification cancels the previous dismissal before scheduling
//! its own, so an older timer can never hide a newer message.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Default,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
}

#[derive(Default)]
struct NotifierState {
    current: Option<Notification>,
    pending: Option<CancellationToken>,
    generation: u64,
}

/// Holds at most one visible notification.
#[derive(Clone)]
pub struct Notifier {
    state: Arc<Mutex<NotifierState>>,
    dismiss_after: Duration,
}

impl Notifier {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(NotifierState::default())),
            dismiss_after,
        }
    }

    /// Show a notification and schedule its dismissal.
    ///
    /// Must be called from within a tokio runtime for the dismissal to be
    /// scheduled; outside one the notification stays until [`Notifier::clear`].
    pub fn notify(&self, message: impl Into<String>, kind: NotificationKind) {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.pending.take() {
                previous.cancel();
            }
            state.generation = state.generation.wrapping_add(1);
            state.current = Some(Notification {
                message: message.into(),
                kind,
            });
            state.pending = Some(token.clone());
            state.generation
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime; notification will not auto-dismiss");
                return;
            }
        };

        let state = Arc::clone(&self.state);
        let delay = self.dismiss_after;
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut state = state.lock();
                    if state.generation == generation {
                        state.current = None;
                        state.pending = None;
                    }
                }
            }
        });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(message, NotificationKind::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(message, NotificationKind::Error);
    }

    /// The notification currently visible, if any.
    pub fn current(&self) -> Option<Notification> {
        self.state.lock().current.clone()
    }

    /// Hide the current notification and cancel its pending dismissal.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.current = None;
    }
}
