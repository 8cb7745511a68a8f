//! Real-time chat session for Daterr.
//!
//! One [`ChatSession`] drives the socket for a single conversation view:
//! - WebSocket transport with automatic reconnection
//! - Ordered message history, optionally seeded from a REST backlog
//! - Typing indicators in both directions
//!
//! State changes are delivered as [`SessionEvent`]s and as
//! [`SessionSnapshot`]s through a `watch` channel.

mod actor;
pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod session;
pub mod state;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use config::SessionConfig;
pub use error::{SendError, TransportError};
pub use event::{SessionEvent, SessionSnapshot};
pub use notify::{Notifier, SilentNotifier};
pub use session::ChatSession;
pub use state::ChatState;
pub use transport::{Connector, InboundFrame, Transport, WebSocketConnector, WebSocketTransport};
