//! Ordered message history for one conversation.
//!
//! Entries are kept in arrival order. Timestamps are displayed but never used
//! to reorder: the backend is responsible for delivering a causally
//! consistent stream per conversation.

use std::collections::HashMap;

use crate::message::{ChatMessage, MessageKind};

/// Append-only list of messages in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHistory {
    entries: Vec<ChatMessage>,
}

/// Identity used to recognise the same message arriving over REST and the socket.
type MessageKey<'a> = (&'a str, i64, &'a str, MessageKind);

fn key(msg: &ChatMessage) -> MessageKey<'_> {
    (msg.sender_id.as_str(), msg.timestamp, msg.content.as_str(), msg.kind)
}

impl MessageHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message at the end.
    pub fn push(&mut self, msg: ChatMessage) {
        self.entries.push(msg);
    }

    /// Merge a backlog fetched over REST.
    ///
    /// The backlog goes first, followed by live messages not already in it.
    /// Each backlog entry absorbs at most one live copy, so repeated identical
    /// messages survive. Returns the number of live messages dropped.
    pub fn merge_backlog(&mut self, backlog: Vec<ChatMessage>) -> usize {
        let live = std::mem::take(&mut self.entries);
        let before = live.len();

        let keep: Vec<bool> = {
            let mut pending: HashMap<MessageKey<'_>, usize> = HashMap::new();
            for msg in &backlog {
                *pending.entry(key(msg)).or_default() += 1;
            }
            live.iter()
                .map(|m| match pending.get_mut(&key(m)) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        false
                    }
                    _ => true,
                })
                .collect()
        };
        let kept: Vec<ChatMessage> = live
            .into_iter()
            .zip(keep)
            .filter_map(|(m, keep)| keep.then_some(m))
            .collect();
        let dropped = before - kept.len();

        self.entries = backlog;
        self.entries.extend(kept);
        dropped
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }

    /// Copy out the messages.
    pub fn to_vec(&self) -> Vec<ChatMessage> {
        self.entries.clone()
    }
}
