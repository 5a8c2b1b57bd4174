use parking_lot::Mutex;
use tracing::debug;

use super::entities::{Notification, RegistrationState};

/// Surface that reflects a running registration to the user
#[cfg_attr(test, mockall::automock)]
pub trait RegistrationObserver: Send + Sync {
    /// Whether a submission is being processed
    fn set_loading(&self, loading: bool);

    fn state_changed(&self, state: RegistrationState);

    fn notify(&self, notification: Notification);

    fn navigate(&self, path: &str);
}

#[derive(Debug, Default, Clone)]
struct Recorded {
    loading: bool,
    states: Vec<RegistrationState>,
    notifications: Vec<Notification>,
    navigations: Vec<String>,
}

/// Observer that keeps everything it was told, e.g. to answer an HTTP request
#[derive(Debug, Default)]
pub struct RecordingObserver {
    recorded: Mutex<Recorded>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_notification(&self) -> Option<Notification> {
        self.recorded.lock().notifications.last().cloned()
    }
}

#[cfg(test)]
impl RecordingObserver {
    pub fn is_loading(&self) -> bool {
        self.recorded.lock().loading
    }

    pub fn states(&self) -> Vec<RegistrationState> {
        self.recorded.lock().states.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.recorded.lock().notifications.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.recorded.lock().navigations.clone()
    }
}

impl RegistrationObserver for RecordingObserver {
    fn set_loading(&self, loading: bool) {
        self.recorded.lock().loading = loading;
    }

    fn state_changed(&self, state: RegistrationState) {
        self.recorded.lock().states.push(state);
    }

    fn notify(&self, notification: Notification) {
        debug!(level = ?notification.level, message = %notification.message, "notification");
        self.recorded.lock().notifications.push(notification);
    }

    fn navigate(&self, path: &str) {
        self.recorded.lock().navigations.push(path.to_string());
    }
}
