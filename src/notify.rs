//! Local-notification collaborator
//!
//! The dispatcher raises a notification for inbound messages that arrive
//! while the surrounding UI is not focused. The actual presentation
//! (desktop notification, sound) belongs to the host; this crate only
//! defines the seam and a silent default.

/// Host-side notification sink
pub trait Notifier: Send + Sync {
    /// Whether the surrounding UI currently has focus
    fn is_focused(&self) -> bool;

    /// Present a notification to the user
    fn notify(&self, title: &str, body: &str);
}

/// Default notifier: always focused, never notifies
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn is_focused(&self) -> bool {
        true
    }

    fn notify(&self, _title: &str, _body: &str) {}
}
