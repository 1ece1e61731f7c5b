//! Device session orchestration
//!
//! Startup goes Disconnected -> Connecting -> Registering -> Ready. On an
//! interrupt the reporter is stopped first, the worker finishes its current
//! task, queued tasks are abandoned and the transport is closed.

mod inbound;
mod manager;

pub use inbound::InboundHandler;
pub use manager::{DeviceSession, SessionExit};
