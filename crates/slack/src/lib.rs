//! Slack surface for helsesjekk - Socket Mode bot interface
//!
//! - **Web API** (`api`) - `conversations.info`, `views.open`, `chat.postMessage`, `chat.update`
//! - **Membership** (`membership`) - decides whether the bot may act in a channel
//! - **Slash command** (`commands`) - `/helsesjekk` opens the team settings modal
//! - **Mentions** (`mentions`) - non-production keyword shortcuts, behind a failure boundary
//! - **Survey** (`survey`) - posting, revealing and scoring survey rounds
//! - **Events** (`events`) - envelope model and dispatcher
//! - **Socket Mode** (`socket`, `transport`) - WebSocket connection with reconnection logic
//! - **Block Kit** (`blocks`) - message and modal builders
//!
//! # Architecture
//!
//! ```text
//! Slack → WebSocketTransport → SocketModeRunner → EventDispatcher → Handlers
//!                                                                     ↓
//!                                               Team/Ask repositories, Slack web API
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod membership;
pub mod mentions;
pub mod socket;
pub mod survey;
pub mod transport;
