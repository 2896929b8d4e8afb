// src/notify.rs
//
// Notification seam. The state machine emits explicit events; delivery
// (admin dashboards, email digests) is a consumer concern, which keeps the
// core testable without a live notification sink.
use crate::models::ResetMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetEvent {
    RequestSubmitted {
        request_id: String,
        username: String,
    },
    RequestApproved {
        request_id: String,
        username: String,
        method: ResetMethod,
    },
    RequestRejected {
        request_id: String,
        username: String,
    },
}

pub trait ResetNotifier: Send + Sync {
    fn notify(&self, event: &ResetEvent);
}

/// Default notifier: structured log lines only.
pub struct LogNotifier;

impl ResetNotifier for LogNotifier {
    fn notify(&self, event: &ResetEvent) {
        match event {
            ResetEvent::RequestSubmitted {
                request_id,
                username,
            } => {
                log::info!("password reset requested: {} (user {})", request_id, username);
            }
            ResetEvent::RequestApproved {
                request_id,
                username,
                method,
            } => {
                log::info!(
                    "password reset approved: {} (user {}, method {})",
                    request_id,
                    username,
                    method
                );
            }
            ResetEvent::RequestRejected {
                request_id,
                username,
            } => {
                log::info!("password reset rejected: {} (user {})", request_id, username);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records events for assertions in tests.
    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<ResetEvent>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ResetEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ResetNotifier for RecordingNotifier {
        fn notify(&self, event: &ResetEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
