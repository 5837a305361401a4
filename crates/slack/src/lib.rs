//! Slack interface for roleflow.
//!
//! - **Socket Mode** (`socket`) - envelope pump with acknowledgement and reconnect backoff
//! - **Events** (`events`) - message classification and dispatch to handlers
//! - **Commands** (`commands`) - `onboard`, `add`, `edit`, `view` parsing and routing
//! - **Handlers** (`handlers`) - role command replies backed by the user repository
//! - **Dialogue** (`dialogue`) - guided create-role conversations
//! - **Transport** (`transport`) - Web API client for replies and reactions
//! - **Websocket** (`websocket`) - live Socket Mode connection feeding the pump
//! - **Block Kit** (`blocks`) - outbound message templates
//!
//! # Architecture
//!
//! ```text
//! Slack envelopes → SocketModeRunner → EventDispatcher → MessageHandler
//!                                                          ├─ DialogueService (active dialogue)
//!                                                          └─ CommandRouter → RoleHandlers
//!                  ChatTransport ← Response (message | reaction)
//! ```

pub mod blocks;
pub mod commands;
pub mod dialogue;
pub mod events;
pub mod handlers;
pub mod socket;
pub mod transport;
pub mod websocket;

pub use dialogue::DialogueService;
pub use events::{EventDispatcher, MessageHandler};
pub use handlers::RoleHandlers;
pub use socket::{ReconnectPolicy, SocketModeRunner};
pub use transport::{ChatTransport, NoopChatTransport, WebApiChatTransport};
pub use websocket::WebSocketTransport;
