//! Notification side effect for incoming messages.

use daterr_core::ChatMessage;

/// Called for every inbound message written by someone other than the local
/// user (sound, badge, toast).
///
/// Runs on the session task: implementations must return quickly.
pub trait Notifier: Send + Sync {
    fn message_received(&self, message: &ChatMessage);
}

/// A notifier that does nothing.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn message_received(&self, _message: &ChatMessage) {}
}
