//! Remote typing indicator.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Whether the peer is currently composing, and who.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingState {
    pub is_typing: bool,
    pub typing_peer_id: Option<UserId>,
}

impl TypingState {
    /// Indicator showing `peer` as typing.
    pub fn typing(peer: UserId) -> Self {
        Self {
            is_typing: true,
            typing_peer_id: Some(peer),
        }
    }

    /// Cleared indicator.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Returns true if `peer` is the one currently shown as typing.
    pub fn is_peer(&self, peer: &UserId) -> bool {
        self.typing_peer_id.as_ref() == Some(peer)
    }
}
