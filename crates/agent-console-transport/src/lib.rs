//! Transport layer for the agent console.
//!
//! Provides:
//! - Wire protocol for the browser console socket
//! - In-process event bus and simulated backend (loopback)
//! - WebSocket surface (feature: websocket)
//! - TUI renderer (feature: tui)

pub mod loopback;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "tui")]
pub mod tui;

pub use loopback::{EventBus, SimulatedBackend, Step};
pub use protocol::{ClientMessage, ServerMessage};
